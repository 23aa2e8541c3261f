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

//! Module containing the rainfall field pipeline.
//!
//! A single run takes one product window through the stages
//! fetch, extract, parse, filter, grid and write. Every stage
//! returns an error instead of a sentinel value, so this module
//! is the only place where failures are classified:
//!
//! - an archive that cannot be fetched is reported as not available
//!   yet and the run ends without an error, as the product is often
//!   published later than the window suggests,
//! - any other failure ends the run with a [`PipelineError`] naming the stage.
//!
//! Downloaded archives and extracted tables are removed when the run
//! ends, whatever its result. Only the raster and rainfield files remain.
//!
//! Batch runs process windows one after another, as each window downloads
//! a large archive from the same remote service. A failed window is logged
//! and the batch moves on to the next one.

pub mod configuration;
mod extractor;
mod fetcher;
mod grid;
mod parser;
mod region;
pub mod window;
mod writer;

#[cfg(test)]
mod super_tests;

use crate::{
    constants::FILE_STAMP_FORMAT,
    errors::{FetchError, PipelineError, RfieldError, StageError},
};
use chrono::NaiveDateTime;
use configuration::Config;
use fetcher::Fetcher;
use grid::Grid;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use window::TimeWindow;
use writer::WriteStatus;

/// Stages of a single run.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Stage {
    Fetching,
    Extracting,
    Parsing,
    Filtering,
    Gridding,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetch",
            Stage::Extracting => "extract",
            Stage::Parsing => "parse",
            Stage::Filtering => "filter",
            Stage::Gridding => "grid",
            Stage::Writing => "write",
        };

        f.write_str(name)
    }
}

/// Result of a run that did not fail.
#[derive(Debug)]
pub enum RunReport {
    /// Outputs were produced (or kept from a previous run).
    Generated {
        window: TimeWindow,
        outputs: Vec<(PathBuf, WriteStatus)>,
    },

    /// The remote archive could not be retrieved; try again later.
    NotAvailable {
        window: TimeWindow,
        reason: FetchError,
    },
}

/// Outcome of a batch run, by window start.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub generated: Vec<NaiveDateTime>,
    pub unavailable: Vec<NaiveDateTime>,
    pub failed: Vec<(NaiveDateTime, PipelineError)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.generated.len() + self.unavailable.len() + self.failed.len()
    }

    /// Counts followed by the window starts of each non-empty outcome.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Batch finished: {} generated, {} not available, {} failed",
            self.generated.len(),
            self.unavailable.len(),
            self.failed.len()
        )];

        if !self.generated.is_empty() {
            lines.push(format!("Generated: {}", join_stamps(&self.generated)));
        }

        if !self.unavailable.is_empty() {
            lines.push(format!("Not available: {}", join_stamps(&self.unavailable)));
        }

        if !self.failed.is_empty() {
            let failed: Vec<NaiveDateTime> = self.failed.iter().map(|(start, _)| *start).collect();
            lines.push(format!("Failed: {}", join_stamps(&failed)));
        }

        lines
    }
}

/// Intermediate files of a run, removed when the run ends.
#[derive(Debug, Default)]
struct Intermediates {
    files: Vec<PathBuf>,
}

impl Intermediates {
    fn track(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }
}

impl Drop for Intermediates {
    fn drop(&mut self) {
        for path in &self.files {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => (),
                Err(err) => warn!("Cannot remove {}: {}", path.display(), err),
            }
        }
    }
}

fn enter(stage: Stage, window: &TimeWindow) {
    debug!("Entering {} stage for {}", stage, window.start());
}

fn at<E: Into<StageError>>(stage: Stage) -> impl Fn(E) -> PipelineError {
    move |err| PipelineError {
        stage,
        source: err.into(),
    }
}

/// Rainfall field generator for a fixed configuration.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    fetcher: Fetcher,
}

impl Pipeline {
    /// Checks the source and creates output and work directories.
    pub fn new(config: Config) -> Result<Self, RfieldError> {
        let fetcher = Fetcher::new(&config.source)?;

        prepare_directory(&config.output.directory)?;
        prepare_directory(&config.output.work_directory())?;

        Ok(Pipeline { config, fetcher })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Produces the rainfall field for the configured-length window starting at `start`.
    pub fn generate_one(&self, start: NaiveDateTime) -> Result<RunReport, PipelineError> {
        let window = TimeWindow::starting_at(start, self.config.schedule.window_minutes);
        self.run_window(window)
    }

    /// Produces the rainfall field for the most recent window expected to be published.
    pub fn generate_latest(&self, now: NaiveDateTime) -> Result<RunReport, PipelineError> {
        let schedule = &self.config.schedule;
        let start =
            window::latest_window_start(now, schedule.latency_minutes, schedule.step_minutes);

        self.generate_one(start)
    }

    /// Produces rainfall fields for windows starting every `step_minutes`
    /// from `start` up to and including `end`.
    pub fn generate_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        step_minutes: i64,
        window_minutes: i64,
    ) -> BatchSummary {
        let starts: Vec<NaiveDateTime> = window::window_starts(start, end, step_minutes).collect();
        let mut summary = BatchSummary::default();

        info!(
            "Generating {} rainfall field(s) from {} to {}",
            starts.len(),
            start,
            end
        );

        let windows_bar = ProgressBar::new(starts.len() as u64);
        windows_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .progress_chars("#>-"),
        );
        windows_bar.set_prefix("Windows");

        for window_start in starts {
            let window = TimeWindow::starting_at(window_start, window_minutes);

            match self.run_window(window) {
                Ok(RunReport::Generated { .. }) => summary.generated.push(window_start),
                Ok(RunReport::NotAvailable { .. }) => summary.unavailable.push(window_start),
                Err(err) => {
                    error!("Rainfield for {} failed: {}", window_start, err);
                    summary.failed.push((window_start, err));
                }
            }

            windows_bar.inc(1);
        }

        windows_bar.finish_and_clear();

        for line in summary.report_lines() {
            info!("{}", line);
        }

        summary
    }

    fn run_window(&self, window: TimeWindow) -> Result<RunReport, PipelineError> {
        info!(
            "Creating rainfield for {} - {}",
            window.start(),
            window.end()
        );

        let work_dir = self.config.output.work_directory();
        let mut intermediates = Intermediates::default();

        enter(Stage::Fetching, &window);
        let archive = match self.fetch_with_retry(&window, &work_dir) {
            Ok(archive) => archive,
            Err(err) if err.is_fatal() => return Err(at(Stage::Fetching)(err)),
            Err(reason) => {
                info!(
                    "JAXA data not available yet for {}: {}",
                    window.start(),
                    reason
                );
                return Ok(RunReport::NotAvailable { window, reason });
            }
        };

        intermediates.track(archive.clone());
        intermediates.track(work_dir.join(extractor::table_name(&archive)));

        enter(Stage::Extracting, &window);
        let extraction = extractor::extract(&archive, &work_dir).map_err(at(Stage::Extracting))?;
        for file in &extraction.files {
            intermediates.track(file.clone());
        }

        enter(Stage::Parsing, &window);
        let points = parser::parse_table(&extraction.table).map_err(at(Stage::Parsing))?;

        enter(Stage::Filtering, &window);
        let inside = region::filter_region(&points, &self.config.domain);
        debug!(
            "{} of {} points inside the domain",
            inside.len(),
            points.len()
        );

        enter(Stage::Gridding, &window);
        let grid = Grid::from_sorted_points(&inside).map_err(at(Stage::Gridding))?;

        if !grid.has_spacing(self.config.grid.cell_size) {
            warn!(
                "Grid spacing differs from configured cell size {}",
                self.config.grid.cell_size
            );
        }

        enter(Stage::Writing, &window);
        let outputs = self.write_outputs(&grid, &window).map_err(at(Stage::Writing))?;

        info!("JAXA rainfield for {} completed", window.start());

        Ok(RunReport::Generated { window, outputs })
    }

    /// Fetches the archive, retrying remote failures with exponential backoff.
    fn fetch_with_retry(&self, window: &TimeWindow, work_dir: &Path) -> Result<PathBuf, FetchError> {
        let source = &self.config.source;
        let max_delay = Duration::from_secs(source.max_retry_delay);
        let mut delay = Duration::from_secs(source.retry_delay).min(max_delay);
        let mut attempt = 1;

        loop {
            match self.fetcher.fetch(window, work_dir) {
                Ok(archive) => return Ok(archive),
                Err(err) if attempt < source.attempts && !err.is_fatal() => {
                    warn!(
                        "Fetch attempt {}/{} failed: {}, retrying in {} s",
                        attempt,
                        source.attempts,
                        err,
                        delay.as_secs()
                    );

                    thread::sleep(delay);
                    delay = delay.saturating_mul(2).min(max_delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn write_outputs(
        &self,
        grid: &Grid,
        window: &TimeWindow,
    ) -> Result<Vec<(PathBuf, WriteStatus)>, StageError> {
        let output = &self.config.output;
        let mut outputs = Vec::with_capacity(2);

        if output.raster {
            let path = self.raster_path(window);
            let status = writer::write_raster(grid, &self.config.grid, &path, output.overwrite)?;
            outputs.push((path, status));
        }

        if output.rainfield {
            let path = self.rainfield_path(window);
            let status = writer::write_rainfield(grid, &path, output.overwrite)?;
            outputs.push((path, status));
        }

        Ok(outputs)
    }

    /// Path of the ESRI ASCII raster for the window.
    pub fn raster_path(&self, window: &TimeWindow) -> PathBuf {
        self.config.output.directory.join(format!(
            "{}_sat_{}.asc",
            self.config.output.prefix,
            window.start().format(FILE_STAMP_FORMAT)
        ))
    }

    /// Path of the model rainfall field for the window.
    pub fn rainfield_path(&self, window: &TimeWindow) -> PathBuf {
        self.config.output.directory.join(format!(
            "{}_{}.txt",
            self.config.output.prefix,
            window.start().format(FILE_STAMP_FORMAT)
        ))
    }
}

fn prepare_directory(path: &Path) -> Result<(), RfieldError> {
    fs::create_dir_all(path).map_err(|err| RfieldError::Directory(err, path.display().to_string()))
}

fn join_stamps(stamps: &[NaiveDateTime]) -> String {
    stamps
        .iter()
        .map(|stamp| stamp.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
