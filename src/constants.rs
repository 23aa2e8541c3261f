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

//! Module containing constants describing the GSMaP "now" product
//! and the files produced from it.

/// Prefix of every GSMaP "now" archive name.
pub const PRODUCT_PREFIX: &str = "gsmap_now";

/// Suffix of the tabular file inside the archive.
pub const TABLE_SUFFIX: &str = "csv";

/// Compression suffix stripped from the archive name to get the table name.
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Suffix used for files that are still being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Column names the point-cloud parser normalises to.
pub const LAT_COLUMN: &str = "Lat";
pub const LON_COLUMN: &str = "Lon";
pub const RAIN_COLUMN: &str = "RainRate";

/// Extra column present in gauge-calibrated variants of the product.
pub const GAUGE_COLUMN: &str = "Gauge-calibratedRain";

/// Table headers (after trimming) accepted by the parser.
pub const ACCEPTED_SCHEMAS: [&[&str]; 2] = [
    &[LAT_COLUMN, LON_COLUMN, RAIN_COLUMN],
    &[LAT_COLUMN, LON_COLUMN, RAIN_COLUMN, GAUGE_COLUMN],
];

/// Format of timestamps accepted on the command line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used in output file names.
pub const FILE_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// Decimal places of rain rates in output files.
pub const VALUE_PRECISION: usize = 4;

/// Decimal places of floating header fields in raster files.
pub const HEADER_PRECISION: usize = 6;

/// Longest accepted window, step and retry spans.
pub const MAX_WINDOW_MINUTES: i64 = 24 * 60;
pub const MAX_LATENCY_MINUTES: i64 = 7 * 24 * 60;
pub const MAX_DELAY_SECONDS: u64 = 24 * 60 * 60;
