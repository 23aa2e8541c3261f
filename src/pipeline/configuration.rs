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

//! Module responsible for parsing and checking the configuration file.
//!
//! The configuration file uses [YAML](https://en.wikipedia.org/wiki/YAML)
//! and `serde` to enforce strong typing and automatic type checking.
//! Every field is optional, so an empty file (or no file at all)
//! gives the operational defaults.
//!
//! The structures and their fields in this module directly correspond to
//! the fields inside the configuration file so you can check this documentation
//! for more details how to set the config file.

use crate::{
    constants::{MAX_DELAY_SECONDS, MAX_LATENCY_MINUTES, MAX_WINDOW_MINUTES},
    errors::ConfigError,
};
use serde::Deserialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::Float;

/// Fields describing where and what the pipeline writes.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default)]
pub struct Output {
    /// Directory for raster and rainfield files.
    ///
    /// Defaults to `./output`.
    pub directory: PathBuf,

    /// _(Optional)_ Directory for downloaded archives and extracted tables.
    /// Must not be shared by two runs in flight at the same time.
    ///
    /// Defaults to `jaxa_data` inside the output directory.
    pub work_directory: Option<PathBuf>,

    /// Prefix of output file names.
    pub prefix: String,

    /// Replace existing non-empty output files.
    ///
    /// Defaults to `false`, so re-running a window keeps what was written before.
    pub overwrite: bool,

    /// Write the ESRI ASCII raster.
    pub raster: bool,

    /// Write the single-column rainfall field for the model.
    pub rainfield: bool,
}

impl Output {
    pub fn work_directory(&self) -> PathBuf {
        self.work_directory
            .clone()
            .unwrap_or_else(|| self.directory.join("jaxa_data"))
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() {
            return Err(ConfigError::OutOfBounds("Output prefix cannot be empty"));
        }

        if !self.raster && !self.rainfield {
            return Err(ConfigError::OutOfBounds(
                "At least one of raster and rainfield outputs must be enabled",
            ));
        }

        Ok(())
    }
}

impl Default for Output {
    fn default() -> Self {
        Output {
            directory: PathBuf::from("./output"),
            work_directory: None,
            prefix: "jaxa".to_string(),
            overwrite: false,
            raster: true,
            rainfield: true,
        }
    }
}

/// Region of interest. All bounds are inclusive.
///
/// Defaults to the d03 domain of the downstream model.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub lat_min: Float,
    pub lat_max: Float,
    pub lon_min: Float,
    pub lon_max: Float,
}

impl BoundingBox {
    /// Checks if the box follows conventions and limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.lat_min) || !(-90.0..=90.0).contains(&self.lat_max) {
            return Err(ConfigError::OutOfBounds(
                "Domain latitude is too low or too high",
            ));
        }

        if !(-180.0..=360.0).contains(&self.lon_min) || !(-180.0..=360.0).contains(&self.lon_max)
        {
            return Err(ConfigError::OutOfBounds(
                "Domain longitude is too low or too high",
            ));
        }

        if self.lat_min > self.lat_max {
            return Err(ConfigError::OutOfBounds(
                "Domain lat_min cannot be greater than lat_max",
            ));
        }

        if self.lon_min > self.lon_max {
            return Err(ConfigError::OutOfBounds(
                "Domain lon_min cannot be greater than lon_max",
            ));
        }

        Ok(())
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox {
            lat_min: 5.722969,
            lat_max: 10.064255,
            lon_min: 79.521461,
            lon_max: 82.189919,
        }
    }
}

/// Raster metadata written into the file header.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Cell size in degrees. Defaults to `0.1`, the native GSMaP resolution.
    pub cell_size: Float,

    /// Value marking missing cells. Defaults to `-99`.
    pub no_data: i32,
}

impl GridSettings {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !(self.cell_size > 0.0) {
            return Err(ConfigError::OutOfBounds(
                "Cell size must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        GridSettings {
            cell_size: 0.1,
            no_data: -99,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Fields with information about the remote product source.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default)]
pub struct Source {
    /// Directory URL holding the archives. `ftp`, `http(s)`
    /// and `file` schemes are supported.
    pub base_url: String,

    /// Region code appended to archive names, eg. `05_AsiaSS`.
    pub region_code: String,

    /// _(Optional)_ Login for the remote host. Anonymous when missing.
    pub credentials: Option<Credentials>,

    /// Transfer timeout in seconds.
    pub timeout: u64,

    /// How many times a fetch is attempted before the window
    /// is reported as not available. Cannot be less than `1`.
    pub attempts: u32,

    /// Delay in seconds before the first retry, doubled on each next one.
    pub retry_delay: u64,

    /// Upper limit of the retry delay in seconds.
    pub max_retry_delay: u64,
}

impl Source {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.attempts < 1 {
            return Err(ConfigError::OutOfBounds(
                "Fetch attempts cannot be less than 1",
            ));
        }

        if !(1..=MAX_DELAY_SECONDS).contains(&self.timeout) {
            return Err(ConfigError::OutOfBounds(
                "Transfer timeout must be between 1 second and 1 day",
            ));
        }

        if self.retry_delay > MAX_DELAY_SECONDS || self.max_retry_delay > MAX_DELAY_SECONDS {
            return Err(ConfigError::OutOfBounds(
                "Retry delays cannot be longer than 1 day",
            ));
        }

        if self.region_code.is_empty() {
            return Err(ConfigError::OutOfBounds("Region code cannot be empty"));
        }

        Ok(())
    }
}

impl Default for Source {
    fn default() -> Self {
        Source {
            base_url: "ftp://hokusai.eorc.jaxa.jp/now/txt/05_AsiaSS/".to_string(),
            region_code: "05_AsiaSS".to_string(),
            credentials: None,
            timeout: 600,
            attempts: 1,
            retry_delay: 30,
            max_retry_delay: 600,
        }
    }
}

/// Fields with information about time windows.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Minutes between consecutive windows in batch mode.
    pub step_minutes: i64,

    /// Length of a product window in minutes.
    pub window_minutes: i64,

    /// How far behind the current time the latest window is taken,
    /// as the product is published with a delay.
    pub latency_minutes: i64,
}

impl Schedule {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_WINDOW_MINUTES).contains(&self.step_minutes) {
            return Err(ConfigError::OutOfBounds(
                "Step must be between 1 minute and 1 day",
            ));
        }

        if !(1..=MAX_WINDOW_MINUTES).contains(&self.window_minutes) {
            return Err(ConfigError::OutOfBounds(
                "Window must be between 1 minute and 1 day",
            ));
        }

        if !(0..=MAX_LATENCY_MINUTES).contains(&self.latency_minutes) {
            return Err(ConfigError::OutOfBounds(
                "Latency must be between 0 and 7 days",
            ));
        }

        Ok(())
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            step_minutes: 30,
            window_minutes: 60,
            latency_minutes: 180,
        }
    }
}

/// Main config structure representing the fields in
/// configuration file.
#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: Output,

    pub domain: BoundingBox,

    pub grid: GridSettings,

    pub source: Source,

    pub schedule: Schedule,
}

impl Config {
    /// Config structure constructor, responsible for
    /// deserializing configuration and checking it.
    pub fn new_from_file(file_path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read(file_path)?;
        let config: Config = serde_yaml::from_slice(data.as_slice())?;

        config.check_bounds()?;

        Ok(config)
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        self.output.check_bounds()?;
        self.domain.check_bounds()?;
        self.grid.check_bounds()?;
        self.source.check_bounds()?;
        self.schedule.check_bounds()?;

        Ok(())
    }
}
