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

//! JAXA Rainfall Field Generator creates gridded rainfall fields
//! from the near-real-time GSMaP "now" satellite product.
//!
//! For each product window the archive is downloaded from the JAXA host,
//! the point table is restricted to the model domain and reshaped
//! into a regular grid, which is written both as an ESRI ASCII raster
//! and as a single-column rainfall field for the downstream hydrological model.
//!
//! The program is meant to be triggered by an external scheduler;
//! a window that is not published yet ends the run without an error
//! so the next trigger can pick it up.

mod constants;
mod errors;
mod pipeline;

use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use constants::TIMESTAMP_FORMAT;
use env_logger::Env;
use errors::RfieldError;
use log::{error, info};
use pipeline::{configuration::Config, Pipeline, RunReport};
use std::{path::PathBuf, process};

type Float = f64;

#[derive(Parser, Debug)]
#[command(name = "jaxa-rfield")]
#[command(about = "Gridded rainfall fields from JAXA GSMaP near-real-time product")]
struct Args {
    /// Configuration file (YAML). Defaults are used when omitted.
    #[arg(short, long, env = "RFIELD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for raster and rainfield files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process the most recent window expected to be published
    Latest,

    /// Process the window starting at TIMESTAMP (YYYY-MM-DD HH:MM:SS, UTC)
    One { timestamp: String },

    /// Process every window starting from START up to and including END
    Range {
        start: String,
        end: String,

        /// Minutes between window starts
        #[arg(long)]
        step: Option<i64>,

        /// Window length in minutes
        #[arg(long)]
        window: Option<i64>,
    },
}

/// The main program function.
/// Prepares the logger and calls [`run`].
///
/// To provide meaningful and high-quality error messages the `env_logger`
/// needs to be initiated before any log messages are possible to occur.
fn main() {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("RFIELD_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("RFIELD_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(_) => info!("Rainfield generation finished. Check the output directory and log."),
        Err(err) => {
            error!("Rainfield generation failed with error: {}", err);
            process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<(), RfieldError> {
    let mut config = match &args.config {
        Some(path) => Config::new_from_file(path)?,
        None => Config::default(),
    };

    if let Some(output_dir) = args.output_dir {
        config.output.directory = output_dir;
    }

    config.output.overwrite |= args.overwrite;

    if let Command::Range { step, window, .. } = &args.command {
        config.schedule.step_minutes = step.unwrap_or(config.schedule.step_minutes);
        config.schedule.window_minutes = window.unwrap_or(config.schedule.window_minutes);
    }

    config.check_bounds()?;

    let pipeline = Pipeline::new(config)?;

    match args.command {
        Command::Latest => {
            report(pipeline.generate_latest(Utc::now().naive_utc())?);
        }
        Command::One { timestamp } => {
            report(pipeline.generate_one(parse_timestamp(&timestamp)?)?);
        }
        Command::Range { start, end, .. } => {
            let (start, end) = (parse_timestamp(&start)?, parse_timestamp(&end)?);

            if start > end {
                return Err(RfieldError::EmptyRange(start.to_string(), end.to_string()));
            }

            let schedule = pipeline.config().schedule;
            let summary =
                pipeline.generate_range(start, end, schedule.step_minutes, schedule.window_minutes);

            info!(
                "Processed {} window(s) with output in {}",
                summary.total(),
                pipeline.config().output.directory.display()
            );
        }
    }

    Ok(())
}

fn report(run: RunReport) {
    match run {
        RunReport::Generated { window, outputs } => {
            info!("Rainfield for {} ready", window.start());

            for (path, status) in outputs {
                info!("{} ({:?})", path.display(), status);
            }
        }
        RunReport::NotAvailable { window, reason } => {
            info!(
                "Nothing generated for {} ({}), retry later",
                window.start(),
                reason
            );
        }
    }
}

fn parse_timestamp(stamp: &str) -> Result<NaiveDateTime, RfieldError> {
    NaiveDateTime::parse_from_str(stamp.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| RfieldError::Timestamp(stamp.to_string()))
}
