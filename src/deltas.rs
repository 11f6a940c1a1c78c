//! Daily and hourly ridership deltas from cumulative turnstile counters.
//!
//! Counters are expected to grow monotonically per turnstile, but devices
//! reset and readings arrive out of order. Negative deltas are dropped, and
//! so is anything at or above a per-run quantile of the non-negative deltas.
//! Quantiles use linear interpolation between order statistics at position
//! `q * (n - 1)`.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::merge::MergedRecord;
use crate::schema::TurnstileKey;

pub const DAILY_OUTLIER_QUANTILE: f64 = 0.997;
pub const HOURLY_OUTLIER_QUANTILE: f64 = 0.99;

/// Ends of the 3-hour blocks; hour 0 has its own block.
pub const HOUR_BLOCKS: [u32; 9] = [0, 3, 6, 9, 12, 15, 18, 21, 24];
const HOUR_BLOCK_WIDTH: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaConfig {
    pub daily_quantile: f64,
    pub hourly_quantile: f64,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            daily_quantile: DAILY_OUTLIER_QUANTILE,
            hourly_quantile: HOURLY_OUTLIER_QUANTILE,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DeltaError {
    #[error("invalid outlier quantile {name}={value}; must be in (0, 1]")]
    InvalidQuantile { name: &'static str, value: f64 },
}

/// Ridership between the first reading of one day and the first of the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyDelta {
    pub c_a: String,
    pub unit: String,
    pub scp: String,
    pub station: String,
    pub borough: String,
    pub date: NaiveDate,
    pub entries: i64,
    pub daily_entries: i64,
    pub dow: String,
    pub dow_num: u32,
}

/// Ridership between two consecutive readings of one turnstile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyDelta {
    pub c_a: String,
    pub unit: String,
    pub scp: String,
    pub station: String,
    pub borough: String,
    pub datetime: NaiveDateTime,
    pub entries: i64,
    pub prev_entries: i64,
    pub hourly_entries: i64,
    pub hour: u32,
    pub dow: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaReport {
    pub candidates: u64,
    pub negative_dropped: u64,
    pub outliers_dropped: u64,
    pub kept: u64,
    pub quantile: f64,
    pub cutoff: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SeriesKey {
    turnstile: TurnstileKey,
    borough: String,
}

impl SeriesKey {
    fn of(record: &MergedRecord) -> Self {
        Self {
            turnstile: record.reading.key(),
            borough: record.location.borough.clone(),
        }
    }
}

pub fn validate_config(cfg: &DeltaConfig) -> Result<(), DeltaError> {
    for (name, value) in [
        ("daily_quantile", cfg.daily_quantile),
        ("hourly_quantile", cfg.hourly_quantile),
    ] {
        if !(value > 0.0 && value <= 1.0) {
            return Err(DeltaError::InvalidQuantile { name, value });
        }
    }
    Ok(())
}

/// Maps an hour of day onto the end of its right-closed 3-hour block.
///
/// Hour 0 maps to block 0; `h` in `1..=24` maps to the smallest multiple of 3
/// that is `>= h`. Hours above 24 have no block.
pub fn hour_block(hour: u32) -> Option<u32> {
    match hour {
        0 => Some(0),
        1..=24 => Some(hour.div_ceil(HOUR_BLOCK_WIDTH) * HOUR_BLOCK_WIDTH),
        _ => None,
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Linear-interpolated quantile of `values`; `None` when empty.
pub fn quantile(values: &[i64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let lower_value = sorted[lower] as f64;
    let upper_value = sorted[upper] as f64;
    Some(lower_value + (upper_value - lower_value) * (position - lower as f64))
}

/// Per turnstile and day, the minimum counter, paired with the next day's
/// minimum. The last day of every series has no successor and is skipped,
/// as is any pair whose difference overflows.
/// Deltas are not filtered here.
pub fn daily_delta_candidates(records: &[MergedRecord]) -> Vec<DailyDelta> {
    let mut daily_min: BTreeMap<SeriesKey, BTreeMap<NaiveDate, i64>> = BTreeMap::new();
    for record in records {
        let days = daily_min.entry(SeriesKey::of(record)).or_default();
        let entries = record.reading.entries;
        days.entry(record.reading.datetime.date())
            .and_modify(|min| *min = (*min).min(entries))
            .or_insert(entries);
    }

    let mut out = Vec::new();
    for (key, days) in daily_min {
        let days: Vec<(NaiveDate, i64)> = days.into_iter().collect();
        for pair in days.windows(2) {
            let (date, entries) = pair[0];
            let (_, next_entries) = pair[1];
            let Some(daily_entries) = next_entries.checked_sub(entries) else {
                continue;
            };
            let weekday = date.weekday();
            out.push(DailyDelta {
                c_a: key.turnstile.c_a.clone(),
                unit: key.turnstile.unit.clone(),
                scp: key.turnstile.scp.clone(),
                station: key.turnstile.station.clone(),
                borough: key.borough.clone(),
                date,
                entries,
                daily_entries,
                dow: weekday_name(weekday).to_string(),
                dow_num: weekday.num_days_from_monday(),
            });
        }
    }
    out
}

/// Per turnstile, readings ordered by time paired with the previous one.
/// Readings sharing a timestamp collapse to their minimum counter. The first
/// reading of every series and any overflowing pair are skipped. Deltas are
/// not filtered here.
pub fn hourly_delta_candidates(records: &[MergedRecord]) -> Vec<HourlyDelta> {
    let mut series: BTreeMap<SeriesKey, BTreeMap<NaiveDateTime, i64>> = BTreeMap::new();
    for record in records {
        let readings = series.entry(SeriesKey::of(record)).or_default();
        let entries = record.reading.entries;
        readings
            .entry(record.reading.datetime)
            .and_modify(|min| *min = (*min).min(entries))
            .or_insert(entries);
    }

    let mut out = Vec::new();
    for (key, readings) in series {
        let readings: Vec<(NaiveDateTime, i64)> = readings.into_iter().collect();
        for pair in readings.windows(2) {
            let (_, prev_entries) = pair[0];
            let (datetime, entries) = pair[1];
            let Some(hourly_entries) = entries.checked_sub(prev_entries) else {
                continue;
            };
            out.push(HourlyDelta {
                c_a: key.turnstile.c_a.clone(),
                unit: key.turnstile.unit.clone(),
                scp: key.turnstile.scp.clone(),
                station: key.turnstile.station.clone(),
                borough: key.borough.clone(),
                datetime,
                entries,
                prev_entries,
                hourly_entries,
                hour: datetime.hour(),
                dow: weekday_name(datetime.weekday()).to_string(),
            });
        }
    }
    out
}

pub fn prepare_daily_dataset(
    records: &[MergedRecord],
    cfg: &DeltaConfig,
) -> Result<(Vec<DailyDelta>, DeltaReport), DeltaError> {
    validate_config(cfg)?;
    let candidates = daily_delta_candidates(records);
    let (kept, report) = filter_deltas(candidates, cfg.daily_quantile, |d| d.daily_entries);
    log_report("deltas.daily.finish", &report);
    Ok((kept, report))
}

pub fn prepare_hourly_dataset(
    records: &[MergedRecord],
    cfg: &DeltaConfig,
) -> Result<(Vec<HourlyDelta>, DeltaReport), DeltaError> {
    validate_config(cfg)?;
    let candidates = hourly_delta_candidates(records);
    let (kept, report) = filter_deltas(candidates, cfg.hourly_quantile, |d| d.hourly_entries);
    log_report("deltas.hourly.finish", &report);
    Ok((kept, report))
}

/// Drops negative deltas, then every delta not strictly below the quantile
/// of the remaining ones.
pub fn filter_deltas<T>(
    candidates: Vec<T>,
    q: f64,
    delta: impl Fn(&T) -> i64,
) -> (Vec<T>, DeltaReport) {
    let total = candidates.len() as u64;
    let non_negative: Vec<T> = candidates.into_iter().filter(|c| delta(c) >= 0).collect();
    let negative_dropped = total - non_negative.len() as u64;

    let values: Vec<i64> = non_negative.iter().map(&delta).collect();
    let cutoff = quantile(&values, q);
    let kept: Vec<T> = match cutoff {
        Some(cutoff) => non_negative
            .into_iter()
            .filter(|c| (delta(c) as f64) < cutoff)
            .collect(),
        None => Vec::new(),
    };
    let outliers_dropped = total - negative_dropped - kept.len() as u64;

    let report = DeltaReport {
        candidates: total,
        negative_dropped,
        outliers_dropped,
        kept: kept.len() as u64,
        quantile: q,
        cutoff,
    };
    (kept, report)
}

fn log_report(event: &'static str, report: &DeltaReport) {
    info!(
        component = "deltas",
        event,
        candidates = report.candidates,
        negative_dropped = report.negative_dropped,
        outliers_dropped = report.outliers_dropped,
        kept = report.kept,
        quantile = report.quantile,
        cutoff = ?report.cutoff
    );
}
