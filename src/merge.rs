//! Inner join of reconciled turnstile readings with station locations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::schema::{StationLocation, TurnstileReading};

/// `(reading column, location column)` pairs that must be equal to join.
pub const JOIN_KEYS: [(&str, &str); 2] = [("station", "stop_name"), ("division", "division")];

pub const LEFT_SUFFIX: &str = "_left";
pub const RIGHT_SUFFIX: &str = "_right";

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub reading: TurnstileReading,
    pub location: StationLocation,
}

impl MergedRecord {
    /// Values in [`merged_record_columns`] order: the fixed reading and
    /// location columns, then the location's extra columns.
    pub fn to_record(&self) -> Vec<String> {
        let r = &self.reading;
        let l = &self.location;
        let mut out = vec![
            r.c_a.clone(),
            r.unit.clone(),
            r.scp.clone(),
            r.station.clone(),
            r.linename.clone(),
            r.division.clone(),
            r.date.to_string(),
            r.desc.clone(),
            r.entries.to_string(),
            r.exits.to_string(),
            r.datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];
        out.extend([
            l.station_id.clone(),
            l.complex_id.clone(),
            l.gtfs_stop_id.clone(),
            l.line.clone(),
            l.stop_name.clone(),
            l.borough.clone(),
            l.daytime_routes.clone(),
            l.structure.clone(),
            l.gtfs_latitude.map(|v| v.to_string()).unwrap_or_default(),
            l.gtfs_longitude.map(|v| v.to_string()).unwrap_or_default(),
        ]);
        out.extend(l.extra.iter().map(|(_, value)| value.clone()));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub readings_in: u64,
    pub locations_in: u64,
    pub merged_rows: u64,
    pub unmatched_readings: u64,
}

/// Output header for a join: left columns, then right columns. A join key
/// that has the same name on both sides appears once; any other name present
/// on both sides gets a `_left` / `_right` suffix.
pub fn merged_columns(left: &[&str], right: &[&str], keys: &[(&str, &str)]) -> Vec<String> {
    let shared_keys: Vec<&str> = keys
        .iter()
        .filter(|(l, r)| l == r)
        .map(|(l, _)| *l)
        .collect();
    let collides = |name: &str| {
        !shared_keys.contains(&name) && left.contains(&name) && right.contains(&name)
    };

    let mut out = Vec::with_capacity(left.len() + right.len());
    for name in left {
        if collides(*name) {
            out.push(format!("{name}{LEFT_SUFFIX}"));
        } else {
            out.push((*name).to_string());
        }
    }
    for name in right {
        if shared_keys.contains(name) {
            continue;
        }
        if collides(*name) {
            out.push(format!("{name}{RIGHT_SUFFIX}"));
        } else {
            out.push((*name).to_string());
        }
    }
    out
}

/// Header for [`MergedRecord::to_record`], given the extra location columns
/// of the station table the records were joined against.
pub fn merged_record_columns(extra_location_columns: &[&str]) -> Vec<String> {
    let mut right: Vec<&str> = StationLocation::COLUMNS.to_vec();
    right.extend_from_slice(extra_location_columns);
    merged_columns(&TurnstileReading::COLUMNS, &right, &JOIN_KEYS)
}

/// Joins on {station = stop_name, division}. Every matching location yields
/// one record; readings without a match are dropped.
pub fn merge_readings_with_locations(
    readings: Vec<TurnstileReading>,
    locations: &[StationLocation],
) -> (Vec<MergedRecord>, MergeReport) {
    let mut index: HashMap<(&str, &str), Vec<&StationLocation>> = HashMap::new();
    for location in locations {
        index
            .entry((location.stop_name.as_str(), location.division.as_str()))
            .or_default()
            .push(location);
    }

    let readings_in = readings.len() as u64;
    let mut unmatched_readings = 0u64;
    let mut merged = Vec::with_capacity(readings.len());

    for reading in readings {
        let Some(matches) = index.get(&(reading.station.as_str(), reading.division.as_str()))
        else {
            unmatched_readings += 1;
            continue;
        };

        for location in matches {
            merged.push(MergedRecord {
                reading: reading.clone(),
                location: (*location).clone(),
            });
        }
    }

    let report = MergeReport {
        readings_in,
        locations_in: locations.len() as u64,
        merged_rows: merged.len() as u64,
        unmatched_readings,
    };

    info!(
        component = "merge",
        event = "merge.finish",
        readings_in = report.readings_in,
        locations_in = report.locations_in,
        merged_rows = report.merged_rows,
        unmatched_readings = report.unmatched_readings
    );

    (merged, report)
}
