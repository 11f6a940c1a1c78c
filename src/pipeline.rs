//! End-to-end run: snapshots in, three CSV datasets out.
//!
//! Stages run strictly in order and each consumes the previous stage's
//! output. Nothing is written to the output directory until every stage has
//! succeeded.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::dedup::{remove_duplicates, DuplicateReport};
use crate::deltas::{
    prepare_daily_dataset, prepare_hourly_dataset, validate_config, DeltaConfig, DeltaError,
    DeltaReport,
};
use crate::merge::{merge_readings_with_locations, MergeReport};
use crate::output::{write_datasets, OutputError, OutputPaths};
use crate::reconcile::{
    reconcile_station_names, reconcile_turnstile_names, CorrectionTable, ReconcileError,
};
use crate::schema::{normalize_station_table, normalize_turnstile_table, SchemaError};
use crate::snapshots::{
    load_station_table, load_turnstile_table, retain_from_start, ReqwestBlockingFetcher,
    SnapshotConfig, SnapshotError, SnapshotFetcher, SnapshotRequest,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub request: SnapshotRequest,
    pub snapshots: SnapshotConfig,
    pub deltas: DeltaConfig,
    pub output_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("snapshot stage failed: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("schema stage failed: {0}")]
    Schema(#[from] SchemaError),
    #[error("reconcile stage failed: {0}")]
    Reconcile(#[from] ReconcileError),
    #[error("delta stage failed: {0}")]
    Delta(#[from] DeltaError),
    #[error("output stage failed: {0}")]
    Output(#[from] OutputError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSummary {
    pub table: String,
    pub rule_count: usize,
    pub fingerprint: String,
}

impl CorrectionSummary {
    fn of(table: &CorrectionTable) -> Self {
        Self {
            table: table.name().to_string(),
            rule_count: table.rules().len(),
            fingerprint: table.fingerprint().to_string(),
        }
    }
}

/// Row counts and filter outcomes for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub raw_rows: u64,
    pub rows_in_window: u64,
    pub duplicates: DuplicateReport,
    pub station_rows: u64,
    pub corrections: Vec<CorrectionSummary>,
    pub merge: MergeReport,
    pub daily: DeltaReport,
    pub hourly: DeltaReport,
    pub outputs: OutputPaths,
}

/// Runs the pipeline against the live MTA endpoints.
pub fn run_pipeline(cfg: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    let fetcher = ReqwestBlockingFetcher::new(cfg.snapshots.http_timeout_ms)?;
    run_pipeline_with_fetcher(cfg, &fetcher)
}

pub fn run_pipeline_with_fetcher(
    cfg: &PipelineConfig,
    fetcher: &dyn SnapshotFetcher,
) -> Result<PipelineReport, PipelineError> {
    validate_config(&cfg.deltas)?;
    let turnstile_corrections = CorrectionTable::turnstile_names();
    let location_corrections = CorrectionTable::location_names()?;

    info!(
        component = "pipeline",
        event = "pipeline.start",
        start_date = %cfg.request.start_date,
        end_date = %cfg.request.end_date,
        output_dir = %cfg.output_dir.display()
    );

    let raw = load_turnstile_table(&cfg.request, &cfg.snapshots, fetcher)?;
    let readings = normalize_turnstile_table(&raw)?;
    let raw_rows = readings.len() as u64;
    drop(raw);

    let readings = retain_from_start(readings, cfg.request.start_date);
    let rows_in_window = readings.len() as u64;
    let (readings, duplicates) = remove_duplicates(readings);

    let station_raw = load_station_table(&cfg.snapshots, fetcher)?;
    let stations = normalize_station_table(&station_raw)?;
    let station_rows = stations.len() as u64;

    let readings = reconcile_turnstile_names(readings, &turnstile_corrections);
    let stations = reconcile_station_names(stations, &location_corrections);

    let (merged, merge) = merge_readings_with_locations(readings, &stations);
    let (daily_rows, daily) = prepare_daily_dataset(&merged, &cfg.deltas)?;
    let (hourly_rows, hourly) = prepare_hourly_dataset(&merged, &cfg.deltas)?;

    let outputs = OutputPaths::in_dir(&cfg.output_dir);
    write_datasets(&outputs, &merged, &daily_rows, &hourly_rows)?;

    let report = PipelineReport {
        start_date: cfg.request.start_date,
        end_date: cfg.request.end_date,
        raw_rows,
        rows_in_window,
        duplicates,
        station_rows,
        corrections: vec![
            CorrectionSummary::of(&turnstile_corrections),
            CorrectionSummary::of(&location_corrections),
        ],
        merge,
        daily,
        hourly,
        outputs,
    };

    info!(
        component = "pipeline",
        event = "pipeline.finish",
        raw_rows = report.raw_rows,
        merged_rows = report.merge.merged_rows,
        daily_rows = report.daily.kept,
        hourly_rows = report.hourly.kept
    );

    Ok(report)
}
