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

//! Module parsing the product table into a point cloud.
//!
//! Header names differ between product variants (leading spaces,
//! an extra gauge-calibrated column), so the header is normalised
//! and checked against the accepted schemas before any row is read.
//! An unknown header is an error: guessing column positions could
//! silently mix up latitudes and rain rates.

use crate::{
    constants::{ACCEPTED_SCHEMAS, LAT_COLUMN, LON_COLUMN, RAIN_COLUMN},
    errors::ParseError,
    Float,
};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use std::{io, path::Path};

/// Single observation of the product.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug)]
pub struct RainPoint {
    pub lat: Float,
    pub lon: Float,
    pub rain_rate: Float,
}

/// Positions of the used columns in a table row.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
struct Columns {
    lat: usize,
    lon: usize,
    rain_rate: usize,
}

impl Columns {
    fn from_header(header: &StringRecord) -> Result<Self, ParseError> {
        let names: Vec<&str> = header.iter().map(str::trim).collect();

        if !ACCEPTED_SCHEMAS.iter().any(|schema| *schema == names.as_slice()) {
            return Err(ParseError::UnrecognizedSchema(
                names.iter().map(|name| name.to_string()).collect(),
            ));
        }

        let position = |column: &str| names.iter().position(|name| *name == column);

        match (position(LAT_COLUMN), position(LON_COLUMN), position(RAIN_COLUMN)) {
            (Some(lat), Some(lon), Some(rain_rate)) => Ok(Columns { lat, lon, rain_rate }),
            _ => Err(ParseError::UnrecognizedSchema(
                names.iter().map(|name| name.to_string()).collect(),
            )),
        }
    }
}

/// Reads all rows of the table file, in file order.
pub fn parse_table(path: &Path) -> Result<Vec<RainPoint>, ParseError> {
    let reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    let points = read_points(reader)?;

    debug!("Parsed {} points from {}", points.len(), path.display());

    Ok(points)
}

fn read_points<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<RainPoint>, ParseError> {
    let columns = Columns::from_header(reader.headers()?)?;
    let mut points = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();

        points.push(RainPoint {
            lat: parse_field(&record, columns.lat, LAT_COLUMN, line)?,
            lon: parse_field(&record, columns.lon, LON_COLUMN, line)?,
            rain_rate: parse_field(&record, columns.rain_rate, RAIN_COLUMN, line)?,
        });
    }

    Ok(points)
}

fn parse_field(
    record: &StringRecord,
    index: usize,
    column: &'static str,
    line: u64,
) -> Result<Float, ParseError> {
    let raw = record.get(index).unwrap_or_default();

    match raw.parse::<Float>() {
        // -0.0 and 0.0 must land on one grid row
        Ok(value) if value == 0.0 => Ok(0.0),
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::Malformed {
            line,
            column,
            value: raw.to_string(),
        }),
    }
}
