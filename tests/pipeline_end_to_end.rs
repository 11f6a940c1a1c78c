use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use ridership::{
    read_daily_csv, read_hourly_csv, read_rows, run_pipeline_with_fetcher, top_stations_by_borough,
    Borough, DeltaConfig, OutputPaths, PipelineConfig, PipelineError, SnapshotConfig,
    SnapshotError, SnapshotFetcher, SnapshotRequest,
};

const TURNSTILE_URL: &str = "http://mock/turnstile/turnstile_190406.txt";
const STATIONS_URL: &str = "http://mock/Stations.csv";

const TURNSTILE_BODY: &str = "\
C/A,UNIT,SCP,STATION,LINENAME,DIVISION,DATE,TIME,DESC,ENTRIES,EXITS
R238,R046,01-00-00,GRD CNTRL-42 ST,4567S,IRT,03/30/2019,04:00:00,REGULAR,990,10
R238,R046,01-00-00,GRD CNTRL-42 ST,4567S,IRT,04/01/2019,04:00:00,REGULAR,1000,10
R238,R046,01-00-00,GRD CNTRL-42 ST,4567S,IRT,04/01/2019,04:00:00,REGULAR,1000,10
R238,R046,01-00-00,GRD CNTRL-42 ST,4567S,IRT,04/02/2019,04:00:00,REGULAR,1050,12
R238,R046,01-00-00,GRD CNTRL-42 ST,4567S,IRT,04/03/2019,04:00:00,REGULAR,1200,15
R238,R046,01-00-02,GRD CNTRL-42 ST,4567S,IRT,04/01/2019,04:00:00,REGULAR,500,5
R238,R046,01-00-02,GRD CNTRL-42 ST,4567S,IRT,04/01/2019,08:00:00,RECOVR AUD,480,5
R238,R046,01-00-02,GRD CNTRL-42 ST,4567S,IRT,04/01/2019,12:00:00,REGULAR,530,6
A002,R051,02-00-00,59 ST,NQR456W,BMT,04/01/2019,04:00:00,REGULAR,1000000,300
A002,R051,02-00-00,59 ST,NQR456W,BMT,04/02/2019,04:00:00,REGULAR,1100000,400
A002,R051,02-00-00,59 ST,NQR456W,BMT,04/03/2019,04:00:00,REGULAR,1300000,500
Z999,R999,00-00-00,NOWHERE,Z,IRT,04/01/2019,04:00:00,REGULAR,1,1
";

const STATIONS_BODY: &str = "\
Station ID,Complex ID,GTFS Stop ID,Division,Line,Stop Name,Borough,Daytime Routes,Structure,GTFS Latitude,GTFS Longitude,North Direction Label,South Direction Label
402,610,631,IRT,Lexington Av,Grand Central-42 St,M,4 5 6,Subway,40.751776,-73.976848,Uptown & The Bronx,Downtown & Brooklyn
8,8,R13,BMT,Broadway,59 St,M,N W,Subway,40.764811,-73.973347,Uptown - Queens,Downtown & Brooklyn
";

#[derive(Default)]
struct MockFetcher {
    responses: HashMap<String, Vec<u8>>,
}

impl MockFetcher {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    fn mta() -> Self {
        Self::default()
            .with(TURNSTILE_URL, TURNSTILE_BODY)
            .with(STATIONS_URL, STATIONS_BODY)
    }
}

impl SnapshotFetcher for MockFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, SnapshotError> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| SnapshotError::HttpRequest {
                url: url.to_string(),
                message: "unexpected HTTP status 404 Not Found".to_string(),
            })
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn test_cfg(root: &Path) -> PipelineConfig {
    PipelineConfig {
        request: SnapshotRequest {
            start_date: date(2019, 4, 1),
            end_date: date(2019, 4, 3),
        },
        snapshots: SnapshotConfig {
            data_root: root.join("cache"),
            turnstile_base_url: "http://mock/turnstile".to_string(),
            stations_url: STATIONS_URL.to_string(),
            max_retries: 0,
            retry_backoff_ms: 0,
            ..SnapshotConfig::default()
        },
        deltas: DeltaConfig::default(),
        output_dir: root.join("out"),
    }
}

#[test]
fn pipeline_writes_all_three_datasets() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_cfg(temp.path());

    let report = run_pipeline_with_fetcher(&cfg, &MockFetcher::mta()).unwrap();

    assert_eq!(report.raw_rows, 12);
    assert_eq!(report.rows_in_window, 11);
    assert_eq!(report.duplicates.duplicates_found, 1);
    assert_eq!(report.duplicates.duplicates_remaining, 0);
    assert_eq!(report.station_rows, 2);
    assert_eq!(report.merge.unmatched_readings, 1);
    assert_eq!(report.merge.merged_rows, 9);
    assert_eq!(report.outputs, OutputPaths::in_dir(&cfg.output_dir));

    for path in [
        &report.outputs.locations,
        &report.outputs.daily,
        &report.outputs.hourly,
    ] {
        assert!(path.exists(), "missing {}", path.display());
    }
}

#[test]
fn grand_central_readings_join_on_reconciled_name() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_cfg(temp.path());
    let report = run_pipeline_with_fetcher(&cfg, &MockFetcher::mta()).unwrap();

    let rows: Vec<HashMap<String, String>> = read_rows(&report.outputs.locations).unwrap();
    assert_eq!(rows.len(), 9);
    for row in &rows {
        assert_eq!(row["station"], row["stop_name"]);
        assert!(!row["division"].is_empty());
        assert_eq!(row["borough"], "M");
    }
    assert!(rows.iter().any(|row| row["stop_name"] == "GRD CNTRL-42 ST"));
    let grand_central = rows
        .iter()
        .find(|row| row["station"] == "GRD CNTRL-42 ST")
        .unwrap();
    assert_eq!(grand_central["north_direction_label"], "Uptown & The Bronx");
    assert_eq!(grand_central["south_direction_label"], "Downtown & Brooklyn");
    assert!(rows.iter().all(|row| row["station"] != "NOWHERE"));
}

#[test]
fn daily_dataset_keeps_forward_deltas_below_the_cutoff() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_cfg(temp.path());
    let report = run_pipeline_with_fetcher(&cfg, &MockFetcher::mta()).unwrap();

    let daily = read_daily_csv(&report.outputs.daily).unwrap();
    let grand_central: Vec<(NaiveDate, i64)> = daily
        .iter()
        .filter(|row| row.scp == "01-00-00")
        .map(|row| (row.date, row.daily_entries))
        .collect();
    assert_eq!(
        grand_central,
        vec![(date(2019, 4, 1), 50), (date(2019, 4, 2), 150)]
    );

    // The 200k jump on 59 ST is the single largest delta and is cut.
    assert_eq!(report.daily.candidates, 4);
    assert_eq!(report.daily.outliers_dropped, 1);
    let cutoff = report.daily.cutoff.unwrap();
    assert!(daily
        .iter()
        .all(|row| row.daily_entries >= 0 && (row.daily_entries as f64) < cutoff));

    let top = top_stations_by_borough(&daily, Borough::Manhattan, 10);
    assert_eq!(top[0].station, "59 ST");
    assert_eq!(top[1].station, "GRD CNTRL-42 ST");
    assert!((top[1].mean_weekly_entries - 200.0).abs() < 1e-9);
}

#[test]
fn hourly_dataset_drops_counter_resets() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_cfg(temp.path());
    let report = run_pipeline_with_fetcher(&cfg, &MockFetcher::mta()).unwrap();

    let hourly = read_hourly_csv(&report.outputs.hourly).unwrap();
    let recovering: Vec<_> = hourly.iter().filter(|row| row.scp == "01-00-02").collect();
    assert_eq!(recovering.len(), 1);
    assert_eq!(recovering[0].prev_entries, 480);
    assert_eq!(recovering[0].hourly_entries, 50);
    assert_eq!(recovering[0].hour, 12);
    assert_eq!(recovering[0].dow, "Monday");

    assert_eq!(report.hourly.negative_dropped, 1);
    assert_eq!(report.hourly.outliers_dropped, 1);
    assert!(hourly.iter().all(|row| row.hourly_entries >= 0));
}

#[test]
fn failed_snapshot_fetch_writes_no_outputs() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_cfg(temp.path());
    let fetcher = MockFetcher::default().with(STATIONS_URL, STATIONS_BODY);

    let err = run_pipeline_with_fetcher(&cfg, &fetcher).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Snapshot(SnapshotError::HttpRequest { ref url, .. }) if url == TURNSTILE_URL
    ));
    assert!(!cfg.output_dir.exists() || fs::read_dir(&cfg.output_dir).unwrap().next().is_none());
}

#[test]
fn unwritable_hourly_target_leaves_no_outputs() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_cfg(temp.path());
    let paths = OutputPaths::in_dir(&cfg.output_dir);
    fs::create_dir_all(&paths.hourly).unwrap();

    let err = run_pipeline_with_fetcher(&cfg, &MockFetcher::mta()).unwrap_err();

    assert!(matches!(err, PipelineError::Output(_)));
    assert!(!paths.locations.exists());
    assert!(!paths.daily.exists());
    assert!(paths.hourly.is_dir());
}

#[test]
fn second_run_is_served_from_the_cache() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_cfg(temp.path());
    let first = run_pipeline_with_fetcher(&cfg, &MockFetcher::mta()).unwrap();

    let second = run_pipeline_with_fetcher(&cfg, &MockFetcher::default()).unwrap();

    assert_eq!(first, second);
}
