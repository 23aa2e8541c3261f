/*
Copyright 2021 Jakub Lewandowski

This file is part of JAXA Rainfall Field Generator (jaxa-rfield).

JAXA Rainfall Field Generator (jaxa-rfield) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

JAXA Rainfall Field Generator (jaxa-rfield) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with JAXA Rainfall Field Generator (jaxa-rfield). If not, see https://www.gnu.org/licenses/.
*/

//! Module building a regular grid out of the filtered point cloud.
//!
//! The GSMaP native grid is regular, so after restricting it to
//! a bounding box every distinct latitude must appear with every
//! distinct longitude exactly once. The axes are taken from the
//! distinct coordinates actually present, and the grid is rejected
//! when the points do not cover them completely.

use super::parser::RainPoint;
use crate::{errors::GridShapeError, Float};
use float_cmp::approx_eq;
use ndarray::{s, Array2, ArrayView2};

/// Rain rates on a regular lat-lon grid.
///
/// `values[[i, j]]` holds the rate at `(lat_axis[i], lon_axis[j])`,
/// with both axes ascending.
#[derive(Clone, PartialEq, Debug)]
pub struct Grid {
    lat_axis: Vec<Float>,
    lon_axis: Vec<Float>,
    values: Array2<Float>,
}

impl Grid {
    /// Builds the grid from points sorted by latitude and then longitude.
    pub fn from_sorted_points(points: &[RainPoint]) -> Result<Self, GridShapeError> {
        if points.is_empty() {
            return Err(GridShapeError::Empty);
        }

        let lat_axis = distinct_sorted(points.iter().map(|point| point.lat));
        let lon_axis = distinct_sorted(points.iter().map(|point| point.lon));
        let (rows, cols) = (lat_axis.len(), lon_axis.len());

        if points.len() != rows * cols {
            return Err(GridShapeError::Count {
                points: points.len(),
                rows,
                cols,
            });
        }

        // equal count is not enough when duplicates hide a missing cell
        for (index, point) in points.iter().enumerate() {
            let (row, col) = (index / cols, index % cols);

            if point.lat != lat_axis[row] || point.lon != lon_axis[col] {
                return Err(GridShapeError::Misplaced {
                    lat: point.lat,
                    lon: point.lon,
                    row,
                    col,
                });
            }
        }

        let values = Array2::from_shape_vec(
            (rows, cols),
            points.iter().map(|point| point.rain_rate).collect(),
        )?;

        Ok(Grid {
            lat_axis,
            lon_axis,
            values,
        })
    }

    pub fn lat_axis(&self) -> &[Float] {
        &self.lat_axis
    }

    pub fn lon_axis(&self) -> &[Float] {
        &self.lon_axis
    }

    pub fn nrows(&self) -> usize {
        self.lat_axis.len()
    }

    pub fn ncols(&self) -> usize {
        self.lon_axis.len()
    }

    /// Values with the southernmost row first.
    pub fn natural_order(&self) -> ArrayView2<Float> {
        self.values.view()
    }

    /// Values with the northernmost row first, as rasters are stored.
    pub fn raster_order(&self) -> ArrayView2<Float> {
        self.values.slice(s![..;-1, ..])
    }

    /// Checks if the distance between neighbouring axis values
    /// matches `cell_size`. Single-value axes always match.
    pub fn has_spacing(&self, cell_size: Float) -> bool {
        let fits = |axis: &[Float]| {
            axis.windows(2)
                .all(|pair| approx_eq!(Float, pair[1] - pair[0], cell_size, epsilon = 1e-6))
        };

        fits(&self.lat_axis) && fits(&self.lon_axis)
    }
}

fn distinct_sorted(values: impl Iterator<Item = Float>) -> Vec<Float> {
    let mut values: Vec<Float> = values.collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();

    values
}
