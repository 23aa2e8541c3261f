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

//! Module restricting the point cloud to the region of interest.

use super::{configuration::BoundingBox, parser::RainPoint};

impl BoundingBox {
    /// Inclusive on all four bounds.
    pub fn contains(&self, point: &RainPoint) -> bool {
        point.lat >= self.lat_min
            && point.lat <= self.lat_max
            && point.lon >= self.lon_min
            && point.lon <= self.lon_max
    }
}

/// Keeps the points inside `domain`, sorted by latitude and then longitude,
/// which is the row-major order the grid builder expects.
///
/// No point inside the box is a valid, empty result.
pub fn filter_region(points: &[RainPoint], domain: &BoundingBox) -> Vec<RainPoint> {
    let mut inside: Vec<RainPoint> = points
        .iter()
        .filter(|point| domain.contains(point))
        .copied()
        .collect();

    inside.sort_by(|a, b| a.lat.total_cmp(&b.lat).then(a.lon.total_cmp(&b.lon)));

    inside
}
