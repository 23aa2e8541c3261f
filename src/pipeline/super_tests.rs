//! This is a module for integration tests of the pipeline,
//! but with access to private fields and methods.
//!
//! Each test serves archives from a local directory through a `file://`
//! source, so whole runs can be checked without a network connection.

use super::{
    configuration::{BoundingBox, Config, Output, Source},
    window::TimeWindow,
    writer::WriteStatus,
    Pipeline, RunReport, Stage,
};
use crate::errors::StageError;
use chrono::NaiveDateTime;
use reqwest::Url;
use std::{fs, io::Write, path::Path};
use tempfile::TempDir;
use zip::{write::FileOptions, ZipWriter};

struct Scene {
    remote: TempDir,
    output: TempDir,
    pipeline: Pipeline,
}

impl Scene {
    fn new() -> Self {
        Scene::with_output(|_| ())
    }

    fn with_domain(domain: BoundingBox) -> Self {
        Scene::configured(|config| config.domain = domain)
    }

    fn with_output(adjust: impl FnOnce(&mut Output)) -> Self {
        Scene::configured(|config| adjust(&mut config.output))
    }

    fn configured(adjust: impl FnOnce(&mut Config)) -> Self {
        let remote = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let mut config = Config {
            output: Output {
                directory: output.path().join("rfield"),
                work_directory: Some(output.path().join("work")),
                ..Output::default()
            },
            domain: BoundingBox {
                lat_min: 6.0,
                lat_max: 6.1,
                lon_min: 71.0,
                lon_max: 71.2,
            },
            source: Source {
                base_url: Url::from_directory_path(remote.path()).unwrap().to_string(),
                ..Source::default()
            },
            ..Config::default()
        };
        adjust(&mut config);

        let pipeline = Pipeline::new(config).unwrap();

        Scene {
            remote,
            output,
            pipeline,
        }
    }

    fn publish(&self, start: NaiveDateTime, table: &str) {
        let window = TimeWindow::starting_at(start, self.pipeline.config.schedule.window_minutes);
        let archive_name = self.pipeline.fetcher.archive_name(&window);
        let table_name = archive_name.trim_end_matches(".zip");

        let mut zip = ZipWriter::new(fs::File::create(self.remote.path().join(&archive_name)).unwrap());
        zip.start_file(table_name, FileOptions::default()).unwrap();
        zip.write_all(table.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    fn publish_raw(&self, start: NaiveDateTime, bytes: &[u8]) {
        let window = TimeWindow::starting_at(start, self.pipeline.config.schedule.window_minutes);
        let archive_name = self.pipeline.fetcher.archive_name(&window);

        fs::write(self.remote.path().join(archive_name), bytes).unwrap();
    }

    fn work_dir_is_empty(&self) -> bool {
        fs::read_dir(self.output.path().join("work")).unwrap().count() == 0
    }

    fn output_files(&self) -> usize {
        fs::read_dir(self.output.path().join("rfield"))
            .unwrap()
            .filter(|entry| entry.as_ref().unwrap().path().is_file())
            .count()
    }
}

fn at(stamp: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Regular 0.1 degree grid around the domain, in file order
/// from north to south and with the gauge-calibrated column.
fn product_table() -> String {
    let mut table = String::from(" Lat,  Lon,  RainRate,  Gauge-calibratedRain\n");
    for lat in ["6.2", "6.1", "6.0", "5.9"] {
        for lon in ["70.9", "71.0", "71.1", "71.2", "71.3"] {
            let rate = if lat == "6.1" { 2.5 } else { 0.25 };
            table.push_str(&format!("  {},  {},  {},  0.00\n", lat, lon, rate));
        }
    }
    table
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn single_run_writes_both_outputs() {
    let scene = Scene::new();
    let start = at("2019-03-26 04:30:00");
    scene.publish(start, &product_table());

    let report = scene.pipeline.generate_one(start).unwrap();

    let outputs = match report {
        RunReport::Generated { outputs, .. } => outputs,
        other => panic!("unexpected report: {:?}", other),
    };
    assert_eq!(outputs.len(), 2);
    assert!(outputs.iter().all(|(_, status)| *status == WriteStatus::Written));

    let window = TimeWindow::starting_at(start, 60);
    let raster_path = scene.pipeline.raster_path(&window);
    let rainfield_path = scene.pipeline.rainfield_path(&window);

    assert!(raster_path.ends_with("jaxa_sat_2019-03-26_04-30.asc"));
    assert!(rainfield_path.ends_with("jaxa_2019-03-26_04-30.txt"));

    assert_eq!(
        read(&raster_path),
        "NCOLS 3\n\
         NROWS 2\n\
         XLLCORNER 71.000000\n\
         YLLCORNER 6.000000\n\
         CELLSIZE 0.100000\n\
         NODATA_VALUE -99\n\
         2.5000 2.5000 2.5000\n\
         0.2500 0.2500 0.2500\n"
    );
    assert_eq!(
        read(&rainfield_path),
        "0.2500\n0.2500\n0.2500\n2.5000\n2.5000\n2.5000\n"
    );
    assert!(scene.work_dir_is_empty());
}

#[test]
fn rerun_is_byte_identical() {
    let scene = Scene::with_output(|output| output.overwrite = true);
    let start = at("2019-03-26 04:30:00");
    let window = TimeWindow::starting_at(start, 60);
    scene.publish(start, &product_table());

    scene.pipeline.generate_one(start).unwrap();
    let first = (
        fs::read(scene.pipeline.raster_path(&window)).unwrap(),
        fs::read(scene.pipeline.rainfield_path(&window)).unwrap(),
    );

    scene.pipeline.generate_one(start).unwrap();
    let second = (
        fs::read(scene.pipeline.raster_path(&window)).unwrap(),
        fs::read(scene.pipeline.rainfield_path(&window)).unwrap(),
    );

    assert_eq!(first, second);
}

#[test]
fn rerun_keeps_outputs_by_default() {
    let scene = Scene::new();
    let start = at("2019-03-26 04:30:00");
    scene.publish(start, &product_table());

    scene.pipeline.generate_one(start).unwrap();

    match scene.pipeline.generate_one(start).unwrap() {
        RunReport::Generated { outputs, .. } => {
            assert!(outputs.iter().all(|(_, status)| *status == WriteStatus::Kept))
        }
        other => panic!("unexpected report: {:?}", other),
    }
}

#[test]
fn missing_archive_is_not_available() {
    let scene = Scene::new();

    let report = scene.pipeline.generate_one(at("2019-03-26 04:30:00")).unwrap();

    assert!(matches!(report, RunReport::NotAvailable { .. }));
    assert_eq!(scene.output_files(), 0);
    assert!(scene.work_dir_is_empty());
}

#[test]
fn empty_archive_is_not_available() {
    let scene = Scene::new();
    let start = at("2019-03-26 04:30:00");
    scene.publish_raw(start, b"");

    let report = scene.pipeline.generate_one(start).unwrap();

    assert!(matches!(report, RunReport::NotAvailable { .. }));
    assert_eq!(scene.output_files(), 0);
}

#[test]
fn sparse_table_fails_at_grid_stage() {
    let scene = Scene::new();
    let start = at("2019-03-26 04:30:00");
    let table: String = product_table()
        .lines()
        .filter(|line| !line.starts_with("  6.1,  71.1,"))
        .map(|line| format!("{}\n", line))
        .collect();
    scene.publish(start, &table);

    let err = scene.pipeline.generate_one(start).unwrap_err();

    assert_eq!(err.stage, Stage::Gridding);
    assert!(matches!(err.source, StageError::Grid(_)));
    assert_eq!(scene.output_files(), 0);
    assert!(scene.work_dir_is_empty());
}

#[test]
fn domain_without_points_fails_at_grid_stage() {
    let scene = Scene::new();
    let start = at("2019-03-26 04:30:00");
    scene.publish(start, " Lat,  Lon,  RainRate\n  -3.1,  90.4,  0.0\n");

    let err = scene.pipeline.generate_one(start).unwrap_err();

    assert_eq!(err.stage, Stage::Gridding);
}

#[test]
fn malformed_table_fails_at_parse_stage() {
    let scene = Scene::new();
    let start = at("2019-03-26 04:30:00");
    scene.publish(start, "Lat,Lon,RainRate\n6.0,71.0,n/a\n");

    let err = scene.pipeline.generate_one(start).unwrap_err();

    assert_eq!(err.stage, Stage::Parsing);
    assert!(err.to_string().starts_with("parse stage failed"));
    assert!(scene.work_dir_is_empty());
}

#[test]
fn batch_continues_past_corrupt_archive() {
    let scene = Scene::new();
    let (first, second, third) = (
        at("2019-03-26 04:00:00"),
        at("2019-03-26 04:30:00"),
        at("2019-03-26 05:00:00"),
    );
    scene.publish(first, &product_table());
    scene.publish_raw(second, b"PK\x03\x04 truncated archive");
    scene.publish(third, &product_table());

    let summary = scene.pipeline.generate_range(first, third, 30, 60);

    assert_eq!(summary.generated, vec![first, third]);
    assert!(summary.unavailable.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, second);
    assert_eq!(summary.failed[0].1.stage, Stage::Extracting);
    assert_eq!(summary.total(), 3);
    assert_eq!(scene.output_files(), 4);
    assert!(scene.work_dir_is_empty());

    assert_eq!(
        summary.report_lines(),
        vec![
            "Batch finished: 2 generated, 0 not available, 1 failed".to_string(),
            "Generated: 2019-03-26 04:00:00, 2019-03-26 05:00:00".to_string(),
            "Failed: 2019-03-26 04:30:00".to_string(),
        ]
    );
}

#[test]
fn batch_reports_unavailable_windows() {
    let scene = Scene::new();
    let (first, last) = (at("2019-03-26 04:00:00"), at("2019-03-26 05:00:00"));
    scene.publish(first, &product_table());

    let summary = scene.pipeline.generate_range(first, last, 30, 60);

    assert_eq!(summary.generated, vec![first]);
    assert_eq!(
        summary.unavailable,
        vec![at("2019-03-26 04:30:00"), last]
    );
    assert!(summary.failed.is_empty());
}

#[test]
fn latest_window_uses_latency() {
    let scene = Scene::new();
    scene.publish(at("2019-10-14 07:00:00"), &product_table());

    let report = scene
        .pipeline
        .generate_latest(at("2019-10-14 10:05:31"))
        .unwrap();

    match report {
        RunReport::Generated { window, .. } => {
            assert_eq!(window.start(), at("2019-10-14 07:00:00"));
            assert_eq!(window.end(), at("2019-10-14 07:59:00"));
        }
        other => panic!("unexpected report: {:?}", other),
    }
}

#[test]
fn equator_grid_with_signed_zeros_is_complete() {
    let scene = Scene::with_domain(BoundingBox {
        lat_min: -0.1,
        lat_max: 0.1,
        lon_min: 100.0,
        lon_max: 100.1,
    });
    let start = at("2019-03-26 04:30:00");
    scene.publish(
        start,
        "Lat,Lon,RainRate\n\
         0.1,100.0,3.0\n0.1,100.1,3.0\n\
         0.0,100.0,2.0\n-0.0,100.1,2.0\n\
         -0.1,100.0,1.0\n-0.1,100.1,1.0\n",
    );

    let report = scene.pipeline.generate_one(start).unwrap();

    assert!(matches!(report, RunReport::Generated { .. }));
    let window = TimeWindow::starting_at(start, 60);
    assert_eq!(
        read(&scene.pipeline.rainfield_path(&window)),
        "1.0000\n1.0000\n2.0000\n2.0000\n3.0000\n3.0000\n"
    );
}
