//! Exact-duplicate removal keyed by turnstile identity and timestamp.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::schema::TurnstileReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub duplicates_found: u64,
    pub duplicates_remaining: u64,
    pub rows_after: u64,
}

type ReadingKey<'a> = (&'a str, &'a str, &'a str, &'a str, NaiveDateTime);

fn reading_key(reading: &TurnstileReading) -> ReadingKey<'_> {
    (
        reading.c_a.as_str(),
        reading.unit.as_str(),
        reading.scp.as_str(),
        reading.station.as_str(),
        reading.datetime,
    )
}

/// Number of rows that repeat an earlier row's key.
pub fn count_duplicates(readings: &[TurnstileReading]) -> u64 {
    let mut seen = HashSet::with_capacity(readings.len());
    readings
        .iter()
        .filter(|reading| !seen.insert(reading_key(reading)))
        .count() as u64
}

/// Keeps the first reading per {c_a, unit, scp, station, datetime}.
pub fn remove_duplicates(
    readings: Vec<TurnstileReading>,
) -> (Vec<TurnstileReading>, DuplicateReport) {
    let duplicates_found = count_duplicates(&readings);
    info!(
        component = "dedup",
        event = "dedup.start",
        row_count = readings.len(),
        duplicates_found
    );

    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(readings.len());
        readings
            .iter()
            .map(|reading| seen.insert(reading_key(reading)))
            .collect()
    };
    let deduped: Vec<TurnstileReading> = readings
        .into_iter()
        .zip(keep)
        .filter_map(|(reading, keep)| keep.then_some(reading))
        .collect();

    let duplicates_remaining = count_duplicates(&deduped);
    info!(
        component = "dedup",
        event = "dedup.finish",
        row_count = deduped.len(),
        duplicates_remaining
    );

    let report = DuplicateReport {
        duplicates_found,
        duplicates_remaining,
        rows_after: deduped.len() as u64,
    };
    (deduped, report)
}
