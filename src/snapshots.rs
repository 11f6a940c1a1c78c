//! Weekly turnstile snapshot planning, download, caching and concatenation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, NaiveDate};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::{normalize_turnstile_column, TurnstileReading};

pub const DEFAULT_TURNSTILE_BASE_URL: &str = "http://web.mta.info/developers/data/nyct/turnstile";
pub const DEFAULT_STATIONS_URL: &str =
    "http://web.mta.info/developers/data/nyct/subway/Stations.csv";
pub const REQUEST_DATE_FORMAT: &str = "%m/%d/%Y";

const SNAPSHOT_WEEKDAY_FROM_MONDAY: u32 = 5; // Saturday
const STATIONS_FILE_NAME: &str = "Stations.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotKind {
    Turnstile,
    StationReference,
}

impl SnapshotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Turnstile => "turnstile",
            Self::StationReference => "stations",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRef {
    pub kind: SnapshotKind,
    pub date: Option<NaiveDate>,
    pub id: String,
    pub url: String,
    pub relative_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalSnapshotSource {
    Cached,
    Downloaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    pub snapshot: SnapshotRef,
    pub local_path: PathBuf,
    pub source: LocalSnapshotSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl SnapshotRequest {
    pub fn parse(start: &str, end: &str) -> Result<Self, SnapshotError> {
        Ok(Self {
            start_date: parse_request_date(start)?,
            end_date: parse_request_date(end)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub data_root: PathBuf,
    pub turnstile_base_url: String,
    pub stations_url: String,
    pub http_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub refresh_cached: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data/mta"),
            turnstile_base_url: DEFAULT_TURNSTILE_BASE_URL.to_string(),
            stations_url: DEFAULT_STATIONS_URL.to_string(),
            http_timeout_ms: 30_000,
            max_retries: 2,
            retry_backoff_ms: 500,
            refresh_cached: false,
        }
    }
}

/// A delimited table exactly as published, before any column or type cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid snapshot request: {0}")]
    InvalidRequest(String),
    #[error("invalid date '{value}', expected month/day/year")]
    InvalidDate { value: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    #[error("HTTP request failed for {url}: {message}")]
    HttpRequest { url: String, message: String },
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("snapshot {id} header {found:?} does not match {expected:?}")]
    HeaderMismatch {
        id: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

pub fn parse_request_date(raw: &str) -> Result<NaiveDate, SnapshotError> {
    NaiveDate::parse_from_str(raw.trim(), REQUEST_DATE_FORMAT).map_err(|_| {
        SnapshotError::InvalidDate {
            value: raw.to_string(),
        }
    })
}

/// Every Saturday in `[start, end + 1 week]`, ascending.
pub fn plan_snapshot_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let Some(window_end) = end.checked_add_days(Days::new(7)) else {
        return Vec::new();
    };

    let offset = (SNAPSHOT_WEEKDAY_FROM_MONDAY + 7 - start.weekday().num_days_from_monday()) % 7;
    let mut out = Vec::new();
    let mut current = start.checked_add_days(Days::new(u64::from(offset)));

    while let Some(date) = current {
        if date > window_end {
            break;
        }
        out.push(date);
        current = date.checked_add_days(Days::new(7));
    }

    out
}

pub fn plan_snapshots(req: &SnapshotRequest, cfg: &SnapshotConfig) -> Vec<SnapshotRef> {
    plan_snapshot_dates(req.start_date, req.end_date)
        .into_iter()
        .map(|date| turnstile_snapshot(date, cfg))
        .collect()
}

pub fn turnstile_snapshot(date: NaiveDate, cfg: &SnapshotConfig) -> SnapshotRef {
    let id = date.format("%y%m%d").to_string();
    let filename = format!("turnstile_{id}.txt");
    let base = cfg.turnstile_base_url.trim_end_matches('/');

    SnapshotRef {
        kind: SnapshotKind::Turnstile,
        date: Some(date),
        url: format!("{base}/{filename}"),
        relative_path: PathBuf::from(SnapshotKind::Turnstile.as_str()).join(&filename),
        id,
    }
}

pub fn station_reference_snapshot(cfg: &SnapshotConfig) -> SnapshotRef {
    SnapshotRef {
        kind: SnapshotKind::StationReference,
        date: None,
        id: STATIONS_FILE_NAME.to_string(),
        url: cfg.stations_url.clone(),
        relative_path: PathBuf::from(SnapshotKind::StationReference.as_str())
            .join(STATIONS_FILE_NAME),
    }
}

/// Fetches every weekly snapshot covering the request and concatenates them.
///
/// Any snapshot that cannot be fetched fails the whole load.
pub fn load_turnstile_table(
    req: &SnapshotRequest,
    cfg: &SnapshotConfig,
    fetcher: &dyn SnapshotFetcher,
) -> Result<RawTable, SnapshotError> {
    validate_request(req)?;
    let snapshots = plan_snapshots(req, cfg);
    info!(
        component = "snapshots",
        event = "snapshots.turnstile.start",
        start_date = %req.start_date,
        end_date = %req.end_date,
        snapshot_count = snapshots.len()
    );

    let local = sync_snapshots(&snapshots, cfg, fetcher)?;
    let mut tables = Vec::with_capacity(local.len());
    for snapshot in &local {
        tables.push(read_raw_table(&snapshot.local_path)?);
    }

    let labelled = local
        .iter()
        .map(|snapshot| snapshot.snapshot.id.clone())
        .zip(tables)
        .collect();
    let table = concat_tables(labelled)?;

    info!(
        component = "snapshots",
        event = "snapshots.turnstile.finish",
        snapshot_count = local.len(),
        row_count = table.len()
    );

    Ok(table)
}

pub fn load_station_table(
    cfg: &SnapshotConfig,
    fetcher: &dyn SnapshotFetcher,
) -> Result<RawTable, SnapshotError> {
    let reference = station_reference_snapshot(cfg);
    let local = sync_snapshots(std::slice::from_ref(&reference), cfg, fetcher)?;
    let table = match local.first() {
        Some(snapshot) => read_raw_table(&snapshot.local_path)?,
        None => RawTable::default(),
    };

    info!(
        component = "snapshots",
        event = "snapshots.stations.finish",
        row_count = table.len()
    );

    Ok(table)
}

/// Makes every snapshot available under the data root, downloading the ones
/// that are not cached yet.
pub fn sync_snapshots(
    snapshots: &[SnapshotRef],
    cfg: &SnapshotConfig,
    fetcher: &dyn SnapshotFetcher,
) -> Result<Vec<LocalSnapshot>, SnapshotError> {
    let mut local = Vec::with_capacity(snapshots.len());

    for snapshot in snapshots {
        let local_path = cfg.data_root.join(&snapshot.relative_path);
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if local_path.exists() && !cfg.refresh_cached {
            info!(
                component = "snapshots",
                event = "snapshots.file.cached",
                kind = snapshot.kind.as_str(),
                id = %snapshot.id,
                path = %local_path.display()
            );
            local.push(LocalSnapshot {
                snapshot: snapshot.clone(),
                local_path,
                source: LocalSnapshotSource::Cached,
            });
            continue;
        }

        let bytes = retry(cfg, || fetcher.get_bytes(&snapshot.url))?;
        write_atomic(&local_path, &bytes)?;

        info!(
            component = "snapshots",
            event = "snapshots.file.downloaded",
            kind = snapshot.kind.as_str(),
            id = %snapshot.id,
            path = %local_path.display(),
            bytes = bytes.len()
        );
        debug!(
            component = "snapshots",
            event = "snapshots.file.downloaded.debug",
            url = %snapshot.url
        );

        local.push(LocalSnapshot {
            snapshot: snapshot.clone(),
            local_path,
            source: LocalSnapshotSource::Downloaded,
        });
    }

    Ok(local)
}

pub fn read_raw_table(path: &Path) -> Result<RawTable, SnapshotError> {
    let csv_err = |source| SnapshotError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record.map_err(csv_err)?);
    }

    Ok(RawTable { headers, rows })
}

/// Appends tables in order. Headers must agree once normalized.
pub fn concat_tables(tables: Vec<(String, RawTable)>) -> Result<RawTable, SnapshotError> {
    let mut iter = tables.into_iter();
    let Some((_, mut combined)) = iter.next() else {
        return Ok(RawTable::default());
    };
    let expected = normalized_headers(&combined.headers);

    for (id, table) in iter {
        let found = normalized_headers(&table.headers);
        if found != expected {
            return Err(SnapshotError::HeaderMismatch {
                id,
                expected,
                found,
            });
        }
        combined.rows.extend(table.rows);
    }

    Ok(combined)
}

/// Drops readings dated before the requested start. The weekly snapshots
/// reach back up to six days before it.
pub fn retain_from_start(
    readings: Vec<TurnstileReading>,
    start_date: NaiveDate,
) -> Vec<TurnstileReading> {
    let before = readings.len();
    let kept: Vec<TurnstileReading> = readings
        .into_iter()
        .filter(|reading| reading.date >= start_date)
        .collect();

    info!(
        component = "snapshots",
        event = "snapshots.window.trimmed",
        start_date = %start_date,
        rows_before = before,
        rows_after = kept.len()
    );

    kept
}

fn normalized_headers(headers: &StringRecord) -> Vec<String> {
    headers.iter().map(normalize_turnstile_column).collect()
}

fn validate_request(req: &SnapshotRequest) -> Result<(), SnapshotError> {
    if req.end_date < req.start_date {
        return Err(SnapshotError::InvalidRequest(format!(
            "end date {} precedes start date {}",
            req.end_date, req.start_date
        )));
    }
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| {
            SnapshotError::InvalidRequest(format!("invalid cache path: {}", path.display()))
        })?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

/// Source of raw snapshot payloads.
pub trait SnapshotFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, SnapshotError>;
}

pub struct ReqwestBlockingFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestBlockingFetcher {
    pub fn new(timeout_ms: u64) -> Result<Self, SnapshotError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| SnapshotError::HttpClientBuild(err.to_string()))?;
        Ok(Self { client })
    }
}

impl SnapshotFetcher for ReqwestBlockingFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, SnapshotError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SnapshotError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SnapshotError::HttpRequest {
                url: url.to_string(),
                message: format!("unexpected HTTP status {status}"),
            });
        }

        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| SnapshotError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })
    }
}

fn retry<T>(
    cfg: &SnapshotConfig,
    mut f: impl FnMut() -> Result<T, SnapshotError>,
) -> Result<T, SnapshotError> {
    let mut attempt: u32 = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= cfg.max_retries => return Err(err),
            Err(_) => {
                attempt = attempt.saturating_add(1);
                let shift = attempt.saturating_sub(1).min(10);
                let factor = 1u64 << shift;
                let sleep_ms = cfg.retry_backoff_ms.saturating_mul(factor);
                std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[derive(Default)]
    struct MockFetcher {
        responses: HashMap<String, Vec<u8>>,
        calls: Cell<u32>,
    }

    impl MockFetcher {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.responses
                .insert(url.to_string(), body.as_bytes().to_vec());
            self
        }
    }

    impl SnapshotFetcher for MockFetcher {
        fn get_bytes(&self, url: &str) -> Result<Vec<u8>, SnapshotError> {
            self.calls.set(self.calls.get() + 1);
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| SnapshotError::HttpRequest {
                    url: url.to_string(),
                    message: "missing mock response".to_string(),
                })
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_cfg(root: &Path) -> SnapshotConfig {
        SnapshotConfig {
            data_root: root.to_path_buf(),
            turnstile_base_url: "http://mock/turnstile".to_string(),
            stations_url: "http://mock/Stations.csv".to_string(),
            max_retries: 0,
            retry_backoff_ms: 0,
            ..SnapshotConfig::default()
        }
    }

    const HEADER: &str =
        "C/A,UNIT,SCP,STATION,LINENAME,DIVISION,DATE,TIME,DESC,ENTRIES,EXITS                                                               \n";

    #[test]
    fn request_dates_use_month_day_year() {
        assert_eq!(parse_request_date("4/1/2019").unwrap(), date(2019, 4, 1));
        assert_eq!(parse_request_date(" 04/29/2019 ").unwrap(), date(2019, 4, 29));
        assert!(matches!(
            parse_request_date("2019-04-01").unwrap_err(),
            SnapshotError::InvalidDate { .. }
        ));
    }

    #[test]
    fn plan_covers_saturdays_through_one_week_after_end() {
        // 2019-04-01 is a Monday, 2019-04-29 a Monday.
        let dates = plan_snapshot_dates(date(2019, 4, 1), date(2019, 4, 29));
        assert_eq!(
            dates,
            vec![
                date(2019, 4, 6),
                date(2019, 4, 13),
                date(2019, 4, 20),
                date(2019, 4, 27),
                date(2019, 5, 4),
            ]
        );
    }

    #[test]
    fn plan_includes_boundaries_that_fall_on_saturday() {
        let dates = plan_snapshot_dates(date(2019, 4, 6), date(2019, 4, 6));
        assert_eq!(dates, vec![date(2019, 4, 6), date(2019, 4, 13)]);
    }

    #[test]
    fn snapshot_urls_use_two_digit_year_identifiers() {
        let cfg = SnapshotConfig::default();
        let snapshot = turnstile_snapshot(date(2019, 4, 6), &cfg);
        assert_eq!(snapshot.id, "190406");
        assert_eq!(
            snapshot.url,
            "http://web.mta.info/developers/data/nyct/turnstile/turnstile_190406.txt"
        );
        assert_eq!(
            snapshot.relative_path,
            PathBuf::from("turnstile/turnstile_190406.txt")
        );
    }

    #[test]
    fn concat_rejects_mismatched_headers() {
        let a = RawTable {
            headers: StringRecord::from(vec!["C/A", "UNIT"]),
            rows: vec![StringRecord::from(vec!["A002", "R051"])],
        };
        let b = RawTable {
            headers: StringRecord::from(vec!["c/a ", "unit"]),
            rows: vec![StringRecord::from(vec!["A003", "R052"])],
        };
        let c = RawTable {
            headers: StringRecord::from(vec!["C/A", "STATION"]),
            rows: Vec::new(),
        };

        let combined =
            concat_tables(vec![("a".to_string(), a.clone()), ("b".to_string(), b)]).unwrap();
        assert_eq!(combined.len(), 2);

        let err = concat_tables(vec![("a".to_string(), a), ("c".to_string(), c)]).unwrap_err();
        assert!(matches!(err, SnapshotError::HeaderMismatch { ref id, .. } if id == "c"));
    }

    #[test]
    fn missing_snapshot_aborts_the_load() {
        let temp = tempdir().unwrap();
        let cfg = test_cfg(temp.path());
        let req = SnapshotRequest {
            start_date: date(2019, 4, 1),
            end_date: date(2019, 4, 8),
        };
        let body = format!("{HEADER}A002,R051,02-00-00,59 ST,NQR456W,BMT,04/01/2019,00:00:00,REGULAR,100,50\n");
        let fetcher = MockFetcher::default().with("http://mock/turnstile/turnstile_190406.txt", &body);

        let err = load_turnstile_table(&req, &cfg, &fetcher).unwrap_err();
        assert!(matches!(err, SnapshotError::HttpRequest { ref url, .. } if url.ends_with("turnstile_190413.txt")));
    }

    #[test]
    fn cached_snapshots_skip_download_unless_refreshed() {
        let temp = tempdir().unwrap();
        let mut cfg = test_cfg(temp.path());
        let snapshot = turnstile_snapshot(date(2019, 4, 6), &cfg);
        let path = cfg.data_root.join(&snapshot.relative_path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, HEADER).unwrap();

        let fetcher = MockFetcher::default().with(&snapshot.url, HEADER);
        let local = sync_snapshots(std::slice::from_ref(&snapshot), &cfg, &fetcher).unwrap();
        assert_eq!(local[0].source, LocalSnapshotSource::Cached);
        assert_eq!(fetcher.calls.get(), 0);

        cfg.refresh_cached = true;
        let local = sync_snapshots(std::slice::from_ref(&snapshot), &cfg, &fetcher).unwrap();
        assert_eq!(local[0].source, LocalSnapshotSource::Downloaded);
        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn retry_gives_up_after_configured_attempts() {
        let temp = tempdir().unwrap();
        let cfg = SnapshotConfig {
            max_retries: 2,
            ..test_cfg(temp.path())
        };
        let fetcher = MockFetcher::default();
        let snapshot = station_reference_snapshot(&cfg);

        let err = sync_snapshots(std::slice::from_ref(&snapshot), &cfg, &fetcher).unwrap_err();
        assert!(matches!(err, SnapshotError::HttpRequest { .. }));
        assert_eq!(fetcher.calls.get(), 3);
        assert!(!cfg.data_root.join(&snapshot.relative_path).exists());
    }
}
