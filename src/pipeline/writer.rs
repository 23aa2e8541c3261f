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

//! Module writing grids to disk.
//!
//! Two formats are produced: the ESRI ASCII raster (header and
//! rows from north to south) and the rainfall field read by the
//! downstream model (one value per line, no header, south to north).
//!
//! Files are written under a temporary name and renamed into place,
//! so a reader never sees a half-written output. Existing non-empty
//! files are kept unless overwriting is requested.

use super::{configuration::GridSettings, fetcher::partial_path_for, grid::Grid};
use crate::{
    constants::{HEADER_PRECISION, VALUE_PRECISION},
    errors::OutputError,
    Float,
};
use log::info;
use ndarray::ArrayView2;
use std::{
    fs,
    io::{self, BufWriter, Write},
    path::Path,
};

/// What happened to the target file.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WriteStatus {
    Written,
    Kept,
}

/// Writes the grid as an ESRI ASCII raster, northernmost row first.
pub fn write_raster(
    grid: &Grid,
    settings: &GridSettings,
    path: &Path,
    overwrite: bool,
) -> Result<WriteStatus, OutputError> {
    write_atomically(path, overwrite, |out| {
        write_raster_header(out, grid, settings)?;
        write_rows(out, grid.raster_order())
    })
}

/// Writes the grid as a single column of values, southernmost row first.
pub fn write_rainfield(grid: &Grid, path: &Path, overwrite: bool) -> Result<WriteStatus, OutputError> {
    write_atomically(path, overwrite, |out| {
        for value in grid.natural_order().iter() {
            writeln!(out, "{:.*}", VALUE_PRECISION, value)?;
        }

        Ok(())
    })
}

fn write_raster_header<W: Write>(out: &mut W, grid: &Grid, settings: &GridSettings) -> io::Result<()> {
    // corner is the lowest axis value, not the outer cell edge
    let xll = grid.lon_axis().first().copied().unwrap_or_default();
    let yll = grid.lat_axis().first().copied().unwrap_or_default();

    writeln!(out, "NCOLS {}", grid.ncols())?;
    writeln!(out, "NROWS {}", grid.nrows())?;
    writeln!(out, "XLLCORNER {:.*}", HEADER_PRECISION, xll)?;
    writeln!(out, "YLLCORNER {:.*}", HEADER_PRECISION, yll)?;
    writeln!(out, "CELLSIZE {:.*}", HEADER_PRECISION, settings.cell_size)?;
    writeln!(out, "NODATA_VALUE {}", settings.no_data)?;

    Ok(())
}

fn write_rows<W: Write>(out: &mut W, rows: ArrayView2<Float>) -> io::Result<()> {
    for row in rows.rows() {
        let line: Vec<String> = row
            .iter()
            .map(|value| format!("{:.*}", VALUE_PRECISION, value))
            .collect();

        writeln!(out, "{}", line.join(" "))?;
    }

    Ok(())
}

fn is_nonempty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn write_atomically<F>(path: &Path, overwrite: bool, fill: F) -> Result<WriteStatus, OutputError>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> io::Result<()>,
{
    if !overwrite && is_nonempty_file(path) {
        info!("{} already exists", path.display());
        return Ok(WriteStatus::Kept);
    }

    let partial_path = partial_path_for(path);

    let written = fs::File::create(&partial_path).and_then(|file| {
        let mut out = BufWriter::new(file);
        fill(&mut out)?;
        out.into_inner()
            .map_err(|err| err.into_error())?
            .sync_all()?;
        fs::rename(&partial_path, path)
    });

    if let Err(err) = written {
        let _ = fs::remove_file(&partial_path);
        return Err(OutputError::Io(err, path.display().to_string()));
    }

    Ok(WriteStatus::Written)
}
