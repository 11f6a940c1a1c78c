//! CSV persistence for the merged, daily and hourly datasets and the
//! aggregate tables.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::deltas::{DailyDelta, HourlyDelta};
use crate::merge::{merged_record_columns, MergedRecord};

pub const LOCATIONS_FILE_NAME: &str = "mta_locations.csv";
pub const DAILY_FILE_NAME: &str = "mta_daily.csv";
pub const HOURLY_FILE_NAME: &str = "mta_hourly.csv";

pub const TOP_STATIONS_FILE_NAME: &str = "top_stations.csv";
pub const WEEKDAY_MEANS_FILE_NAME: &str = "weekday_means.csv";
pub const HOUR_BLOCKS_FILE_NAME: &str = "hour_blocks.csv";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Where the pipeline's three datasets live inside an output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    pub locations: PathBuf,
    pub daily: PathBuf,
    pub hourly: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            locations: dir.join(LOCATIONS_FILE_NAME),
            daily: dir.join(DAILY_FILE_NAME),
            hourly: dir.join(HOURLY_FILE_NAME),
        }
    }
}

/// Writes the merged, daily and hourly datasets as one unit: all three are
/// staged next to their targets and only renamed into place once every one
/// was written. If a rename fails, files already renamed by this call are
/// removed again, so a failed run leaves none of the three behind.
pub fn write_datasets(
    paths: &OutputPaths,
    merged: &[MergedRecord],
    daily: &[DailyDelta],
    hourly: &[HourlyDelta],
) -> Result<(), OutputError> {
    let staged = [
        stage_merged(&paths.locations, merged),
        stage_rows(&paths.daily, daily),
        stage_rows(&paths.hourly, hourly),
    ];

    let mut ready = Vec::with_capacity(staged.len());
    let mut first_err = None;
    for result in staged {
        match result {
            Ok(file) => ready.push(file),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_err {
        discard(&ready);
        return Err(err);
    }

    commit(ready)
}

pub fn write_merged_csv(path: &Path, records: &[MergedRecord]) -> Result<(), OutputError> {
    commit(vec![stage_merged(path, records)?])
}

pub fn write_daily_csv(path: &Path, rows: &[DailyDelta]) -> Result<(), OutputError> {
    write_rows(path, rows)
}

pub fn write_hourly_csv(path: &Path, rows: &[HourlyDelta]) -> Result<(), OutputError> {
    write_rows(path, rows)
}

pub fn read_daily_csv(path: &Path) -> Result<Vec<DailyDelta>, OutputError> {
    read_rows(path)
}

pub fn read_hourly_csv(path: &Path) -> Result<Vec<HourlyDelta>, OutputError> {
    read_rows(path)
}

/// Serializes `rows` with a header derived from `T`'s field names.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), OutputError> {
    commit(vec![stage_rows(path, rows)?])
}

pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, OutputError> {
    let csv_err = |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.map_err(csv_err)?);
    }

    info!(
        component = "output",
        event = "output.file.read",
        path = %path.display(),
        row_count = rows.len()
    );
    Ok(rows)
}

/// A fully written `.tmp` sibling waiting to be renamed onto `target`.
struct StagedFile {
    tmp: PathBuf,
    target: PathBuf,
    row_count: usize,
}

fn stage_merged(path: &Path, records: &[MergedRecord]) -> Result<StagedFile, OutputError> {
    let extra = records
        .first()
        .map(|record| record.location.extra_columns())
        .unwrap_or_default();
    stage_csv(path, records.len(), |writer| {
        writer.write_record(merged_record_columns(&extra))?;
        for record in records {
            writer.write_record(record.to_record())?;
        }
        Ok(())
    })
}

fn stage_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<StagedFile, OutputError> {
    stage_csv(path, rows.len(), |writer| {
        for row in rows {
            writer.serialize(row)?;
        }
        Ok(())
    })
}

fn stage_csv(
    path: &Path,
    row_count: usize,
    fill: impl FnOnce(&mut csv::Writer<fs::File>) -> Result<(), csv::Error>,
) -> Result<StagedFile, OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let staged = StagedFile {
        tmp: PathBuf::from(tmp_name),
        target: path.to_path_buf(),
        row_count,
    };

    let written = csv::Writer::from_path(&staged.tmp)
        .map_err(csv_err)
        .and_then(|mut writer| {
            fill(&mut writer).map_err(csv_err)?;
            writer.flush().map_err(io_err)
        });
    if let Err(err) = written {
        discard(std::slice::from_ref(&staged));
        return Err(err);
    }

    Ok(staged)
}

fn commit(staged: Vec<StagedFile>) -> Result<(), OutputError> {
    for (idx, file) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(&file.tmp, &file.target) {
            for done in &staged[..idx] {
                remove_quietly(&done.target);
            }
            discard(&staged[idx..]);
            return Err(OutputError::Io {
                path: file.target.clone(),
                source,
            });
        }
    }

    for file in &staged {
        info!(
            component = "output",
            event = "output.file.written",
            path = %file.target.display(),
            row_count = file.row_count
        );
    }
    Ok(())
}

fn discard(staged: &[StagedFile]) {
    for file in staged {
        remove_quietly(&file.tmp);
    }
}

fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(
                component = "output",
                event = "output.cleanup.failed",
                path = %path.display(),
                error = %err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn daily_row(station: &str, entries: i64) -> DailyDelta {
        DailyDelta {
            c_a: "A002".to_string(),
            unit: "R051".to_string(),
            scp: "02-00-00".to_string(),
            station: station.to_string(),
            borough: "M".to_string(),
            date: NaiveDate::from_ymd_opt(2019, 4, 1).unwrap(),
            entries: 7_000_000,
            daily_entries: entries,
            dow: "Monday".to_string(),
            dow_num: 0,
        }
    }

    #[test]
    fn daily_rows_survive_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DAILY_FILE_NAME);
        let rows = vec![daily_row("59 ST", 1_200), daily_row("GRD CNTRL-42 ST", 3_400)];

        write_daily_csv(&path, &rows).unwrap();
        let back = read_daily_csv(&path).unwrap();

        assert_eq!(back, rows);
        assert!(!dir.path().join("mta_daily.csv.tmp").exists());
        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("c_a,unit,scp,station,borough,date,"));
    }

    #[test]
    fn writes_create_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out").join(HOURLY_FILE_NAME);

        write_hourly_csv(&path, &[]).unwrap();
        assert!(path.exists());
        assert!(read_hourly_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn dataset_write_failure_leaves_no_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::in_dir(dir.path());
        fs::create_dir_all(&paths.hourly).unwrap();

        let err = write_datasets(&paths, &[], &[daily_row("59 ST", 10)], &[]).unwrap_err();

        assert!(matches!(err, OutputError::Io { ref path, .. } if *path == paths.hourly));
        assert!(!paths.locations.exists());
        assert!(!paths.daily.exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn dataset_write_places_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::in_dir(&dir.path().join("out"));

        write_datasets(&paths, &[], &[daily_row("59 ST", 10)], &[]).unwrap();

        assert!(paths.locations.exists());
        assert_eq!(read_daily_csv(&paths.daily).unwrap().len(), 1);
        assert!(paths.hourly.is_file());
    }

    #[test]
    fn reading_a_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_daily_csv(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, OutputError::Csv { .. }));
    }

    #[test]
    fn output_paths_use_fixed_file_names() {
        let paths = OutputPaths::in_dir(Path::new("/data/out"));
        assert_eq!(paths.locations, PathBuf::from("/data/out/mta_locations.csv"));
        assert_eq!(paths.daily, PathBuf::from("/data/out/mta_daily.csv"));
        assert_eq!(paths.hourly, PathBuf::from("/data/out/mta_hourly.csv"));
    }
}
