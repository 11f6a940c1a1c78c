//! Column and type normalization for the turnstile and station tables.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::snapshots::RawTable;

pub const READING_DATE_FORMAT: &str = "%m/%d/%Y";
pub const READING_DATETIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// One cumulative counter reading from a single turnstile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnstileReading {
    pub c_a: String,
    pub unit: String,
    pub scp: String,
    pub station: String,
    pub linename: String,
    pub division: String,
    pub date: NaiveDate,
    pub desc: String,
    pub entries: i64,
    pub exits: i64,
    pub datetime: NaiveDateTime,
}

impl TurnstileReading {
    pub const COLUMNS: [&'static str; 11] = [
        "c_a", "unit", "scp", "station", "linename", "division", "date", "desc", "entries",
        "exits", "datetime",
    ];

    pub fn key(&self) -> TurnstileKey {
        TurnstileKey {
            c_a: self.c_a.clone(),
            unit: self.unit.clone(),
            scp: self.scp.clone(),
            station: self.station.clone(),
        }
    }
}

/// Identity of one physical counting device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnstileKey {
    pub c_a: String,
    pub unit: String,
    pub scp: String,
    pub station: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationLocation {
    pub station_id: String,
    pub complex_id: String,
    pub gtfs_stop_id: String,
    pub division: String,
    pub line: String,
    pub stop_name: String,
    pub borough: String,
    pub daytime_routes: String,
    pub structure: String,
    pub gtfs_latitude: Option<f64>,
    pub gtfs_longitude: Option<f64>,
    /// Remaining reference columns as `(normalized name, value)`, in file order.
    pub extra: Vec<(String, String)>,
}

impl StationLocation {
    pub const COLUMNS: [&'static str; 11] = [
        "station_id",
        "complex_id",
        "gtfs_stop_id",
        "division",
        "line",
        "stop_name",
        "borough",
        "daytime_routes",
        "structure",
        "gtfs_latitude",
        "gtfs_longitude",
    ];

    pub fn extra_columns(&self) -> Vec<&str> {
        self.extra.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{table} table is missing column '{column}'")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
    #[error("row {row}: '{value}' does not match the {format} timestamp format")]
    InvalidTimestamp {
        row: usize,
        value: String,
        format: &'static str,
    },
    #[error("row {row}: cumulative counter {field} is negative: {value}")]
    NegativeCounter {
        row: usize,
        field: &'static str,
        value: i64,
    },
    #[error("row {row}: failed to parse field {field} value '{value}'")]
    ParseField {
        row: usize,
        field: &'static str,
        value: String,
    },
}

pub fn normalize_turnstile_column(raw: &str) -> String {
    raw.trim().to_lowercase().replace('/', "_")
}

pub fn normalize_location_column(raw: &str) -> String {
    normalize_turnstile_column(raw).replace(' ', "_")
}

/// Parses raw turnstile rows, composing `date` and `time` into one timestamp.
pub fn normalize_turnstile_table(table: &RawTable) -> Result<Vec<TurnstileReading>, SchemaError> {
    let columns = ColumnIndex::new("turnstile", &table.headers, normalize_turnstile_column);
    let c_a = columns.require("c_a")?;
    let unit = columns.require("unit")?;
    let scp = columns.require("scp")?;
    let station = columns.require("station")?;
    let linename = columns.require("linename")?;
    let division = columns.require("division")?;
    let date = columns.require("date")?;
    let time = columns.require("time")?;
    let desc = columns.require("desc")?;
    let entries = columns.require("entries")?;
    let exits = columns.require("exits")?;

    let mut out = Vec::with_capacity(table.rows.len());
    for (idx, record) in table.rows.iter().enumerate() {
        let row = idx + 1;
        let date_raw = field(record, date);
        let stamp = format!("{} {}", date_raw, field(record, time));
        let datetime = NaiveDateTime::parse_from_str(&stamp, READING_DATETIME_FORMAT).map_err(
            |_| SchemaError::InvalidTimestamp {
                row,
                value: stamp.clone(),
                format: READING_DATETIME_FORMAT,
            },
        )?;

        out.push(TurnstileReading {
            c_a: field(record, c_a).to_string(),
            unit: field(record, unit).to_string(),
            scp: field(record, scp).to_string(),
            station: field(record, station).to_string(),
            linename: field(record, linename).to_string(),
            division: field(record, division).to_string(),
            date: datetime.date(),
            desc: field(record, desc).to_string(),
            entries: parse_counter(record, entries, row, "entries")?,
            exits: parse_counter(record, exits, row, "exits")?,
            datetime,
        });
    }

    info!(
        component = "schema",
        event = "schema.turnstile.normalized",
        row_count = out.len()
    );

    Ok(out)
}

/// Parses the station reference rows; `stop_name` is upper-cased and trimmed.
pub fn normalize_station_table(table: &RawTable) -> Result<Vec<StationLocation>, SchemaError> {
    let columns = ColumnIndex::new("station", &table.headers, normalize_location_column);
    let division = columns.require("division")?;
    let stop_name = columns.require("stop_name")?;
    let borough = columns.require("borough")?;
    let station_id = columns.optional("station_id");
    let complex_id = columns.optional("complex_id");
    let gtfs_stop_id = columns.optional("gtfs_stop_id");
    let line = columns.optional("line");
    let daytime_routes = columns.optional("daytime_routes");
    let structure = columns.optional("structure");
    let latitude = columns.optional("gtfs_latitude");
    let longitude = columns.optional("gtfs_longitude");
    let extra_columns = extra_columns(&table.headers);

    let mut out = Vec::with_capacity(table.rows.len());
    for (idx, record) in table.rows.iter().enumerate() {
        let row = idx + 1;
        out.push(StationLocation {
            station_id: optional_field(record, station_id),
            complex_id: optional_field(record, complex_id),
            gtfs_stop_id: optional_field(record, gtfs_stop_id),
            division: field(record, division).to_string(),
            line: optional_field(record, line),
            stop_name: field(record, stop_name).to_uppercase().trim().to_string(),
            borough: field(record, borough).to_string(),
            daytime_routes: optional_field(record, daytime_routes),
            structure: optional_field(record, structure),
            gtfs_latitude: parse_coordinate(record, latitude, row, "gtfs_latitude")?,
            gtfs_longitude: parse_coordinate(record, longitude, row, "gtfs_longitude")?,
            extra: extra_columns
                .iter()
                .map(|(name, idx)| (name.clone(), optional_field(record, Some(*idx))))
                .collect(),
        });
    }

    info!(
        component = "schema",
        event = "schema.stations.normalized",
        row_count = out.len()
    );

    Ok(out)
}

struct ColumnIndex {
    table: &'static str,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(table: &'static str, headers: &StringRecord, normalize: fn(&str) -> String) -> Self {
        let mut positions = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            positions.entry(normalize(header)).or_insert(idx);
        }
        Self { table, positions }
    }

    fn require(&self, column: &'static str) -> Result<usize, SchemaError> {
        self.optional(column).ok_or(SchemaError::MissingColumn {
            table: self.table,
            column,
        })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }
}

/// Location columns outside the fixed schema, first occurrence per name.
fn extra_columns(headers: &StringRecord) -> Vec<(String, usize)> {
    let mut out: Vec<(String, usize)> = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        let name = normalize_location_column(header);
        if name.is_empty()
            || StationLocation::COLUMNS.contains(&name.as_str())
            || out.iter().any(|(seen, _)| *seen == name)
        {
            continue;
        }
        out.push((name, idx));
    }
    out
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or_default()
}

fn optional_field(record: &StringRecord, idx: Option<usize>) -> String {
    idx.map(|idx| field(record, idx).trim().to_string())
        .unwrap_or_default()
}

fn parse_counter(
    record: &StringRecord,
    idx: usize,
    row: usize,
    name: &'static str,
) -> Result<i64, SchemaError> {
    let raw = field(record, idx).trim();
    let value = raw.parse::<i64>().map_err(|_| SchemaError::ParseField {
        row,
        field: name,
        value: raw.to_string(),
    })?;
    if value < 0 {
        return Err(SchemaError::NegativeCounter {
            row,
            field: name,
            value,
        });
    }
    Ok(value)
}

fn parse_coordinate(
    record: &StringRecord,
    idx: Option<usize>,
    row: usize,
    name: &'static str,
) -> Result<Option<f64>, SchemaError> {
    let Some(idx) = idx else {
        return Ok(None);
    };
    let raw = field(record, idx).trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| SchemaError::ParseField {
            row,
            field: name,
            value: raw.to_string(),
        })
}
