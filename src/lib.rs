//! Ridership core crate.
//!
//! Current implemented scope:
//! - weekly turnstile snapshot download, caching and concatenation
//! - schema normalization, duplicate removal and station-name reconciliation
//! - turnstile/station join with daily and hourly delta datasets
//! - borough, weekday and hour-block rollups for reporting

mod aggregate;
mod config;
mod corrections;
mod dedup;
mod deltas;
mod merge;
mod observability;
mod output;
mod pipeline;
mod reconcile;
mod schema;
mod snapshots;

pub use aggregate::{
    entries_per_hour_block, mean_entries_by_weekday, parse_borough, top_stations_by_borough,
    AggregateError, Borough, HourBlockEntries, StationRanking, WeekdayMean,
};
pub use config::{
    output_dir_from_env, pipeline_config_from_env, top_k_from_env, ConfigError,
    DEFAULT_OUTPUT_DIR,
};
pub use corrections::{LOCATION_EXACT, LOCATION_PATTERNS, TURNSTILE_EXACT};
pub use dedup::{count_duplicates, remove_duplicates, DuplicateReport};
pub use deltas::{
    daily_delta_candidates, filter_deltas, hour_block, hourly_delta_candidates,
    prepare_daily_dataset, prepare_hourly_dataset, quantile, validate_config, weekday_name,
    DailyDelta, DeltaConfig, DeltaError, DeltaReport, HourlyDelta, DAILY_OUTLIER_QUANTILE,
    HOURLY_OUTLIER_QUANTILE, HOUR_BLOCKS,
};
pub use merge::{
    merge_readings_with_locations, merged_columns, merged_record_columns, MergeReport,
    MergedRecord, JOIN_KEYS, LEFT_SUFFIX, RIGHT_SUFFIX,
};
pub use observability::{
    init_logging, log_app_start, logging_config_from_env, LogFormat, LoggingConfig,
    LoggingInitError,
};
pub use output::{
    read_daily_csv, read_hourly_csv, read_rows, write_daily_csv, write_datasets,
    write_hourly_csv, write_merged_csv, write_rows, OutputError, OutputPaths, DAILY_FILE_NAME,
    HOURLY_FILE_NAME, HOUR_BLOCKS_FILE_NAME, LOCATIONS_FILE_NAME, TOP_STATIONS_FILE_NAME,
    WEEKDAY_MEANS_FILE_NAME,
};
pub use pipeline::{
    run_pipeline, run_pipeline_with_fetcher, CorrectionSummary, PipelineConfig, PipelineError,
    PipelineReport,
};
pub use reconcile::{
    reconcile_station_names, reconcile_turnstile_names, CorrectionRule, CorrectionTable,
    MatchKind, Matcher, ReconcileError,
};
pub use schema::{
    normalize_location_column, normalize_station_table, normalize_turnstile_column,
    normalize_turnstile_table, SchemaError, StationLocation, TurnstileKey, TurnstileReading,
    READING_DATETIME_FORMAT, READING_DATE_FORMAT,
};
pub use snapshots::{
    concat_tables, load_station_table, load_turnstile_table, parse_request_date,
    plan_snapshot_dates, plan_snapshots, read_raw_table, retain_from_start,
    station_reference_snapshot, sync_snapshots, turnstile_snapshot, LocalSnapshot,
    LocalSnapshotSource, RawTable, ReqwestBlockingFetcher, SnapshotConfig, SnapshotError,
    SnapshotFetcher, SnapshotKind, SnapshotRef, SnapshotRequest, DEFAULT_STATIONS_URL,
    DEFAULT_TURNSTILE_BASE_URL, REQUEST_DATE_FORMAT,
};
