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

use crate::{pipeline::Stage, Float};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RfieldError {
    #[error("Error while reading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot prepare directory {1}: {0}")]
    Directory(#[source] std::io::Error, String),

    #[error("Cannot create remote source: {0}")]
    Source(#[from] FetchError),

    #[error("Cannot parse timestamp '{0}', expected format YYYY-MM-DD HH:MM:SS")]
    Timestamp(String),

    #[error("Time range is empty: start {0} is after end {1}")]
    EmptyRange(String, String),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open configuration file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize configuration file: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds: {0}")]
    OutOfBounds(&'static str),
}

/// Errors of a single pipeline run, tagged with the stage that failed.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Grid(#[from] GridShapeError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Remote resource {0} is not available yet")]
    NotAvailable(String),

    #[error("Transfer of {0} produced an empty file")]
    EmptyTransfer(String),

    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("FTP transfer failed: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("HTTP transfer failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP transfer of {0} failed with status {1}")]
    HttpStatus(String, u16),

    #[error("Transfer failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remote host {0} rejected the login")]
    LoginRejected(String),

    #[error("Cannot store downloaded file {1}: {0}")]
    Store(#[source] std::io::Error, String),
}

impl FetchError {
    /// Errors that waiting for the product to be published will not fix:
    /// local disk failures and rejected credentials.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Store(..) | FetchError::LoginRejected(_))
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Archive is corrupt: {0}")]
    Corrupt(#[from] zip::result::ZipError),

    #[error("Archive {0} contains no entries")]
    Empty(String),

    #[error("Archive does not contain expected entry {0}")]
    MissingEntry(String),

    #[error("Extracted entry {0} is empty")]
    EmptyEntry(String),

    #[error("Cannot extract archive: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unrecognized table header: {0:?}")]
    UnrecognizedSchema(Vec<String>),

    #[error("Malformed value '{value}' in column {column} at line {line}")]
    Malformed {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("Cannot read table: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum GridShapeError {
    #[error("No points within the bounding box")]
    Empty,

    #[error("{points} points cannot fill a {rows}x{cols} grid")]
    Count {
        points: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Point ({lat}, {lon}) does not match grid cell ({row}, {col})")]
    Misplaced {
        lat: Float,
        lon: Float,
        row: usize,
        col: usize,
    },

    #[error("Cannot shape grid values: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Cannot write {1}: {0}")]
    Io(#[source] std::io::Error, String),
}
