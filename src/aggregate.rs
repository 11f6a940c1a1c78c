//! Descriptive rollups over the daily and hourly delta datasets.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::deltas::{hour_block, weekday_name, DailyDelta, HourlyDelta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Borough {
    Manhattan,
    Brooklyn,
    Queens,
    Bronx,
    StatenIsland,
}

impl Borough {
    pub const ALL: [Borough; 5] = [
        Self::Manhattan,
        Self::Brooklyn,
        Self::Queens,
        Self::Bronx,
        Self::StatenIsland,
    ];

    /// Literal used in the station reference `Borough` column.
    pub fn code(self) -> &'static str {
        match self {
            Self::Manhattan => "M",
            Self::Brooklyn => "Bk",
            Self::Queens => "Q",
            Self::Bronx => "Bx",
            Self::StatenIsland => "SI",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Manhattan => "Manhattan",
            Self::Brooklyn => "Brooklyn",
            Self::Queens => "Queens",
            Self::Bronx => "Bronx",
            Self::StatenIsland => "Staten Island",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("unknown borough: {0}")]
    UnknownBorough(String),
}

pub fn parse_borough(input: &str) -> Result<Borough, AggregateError> {
    let trimmed = input.trim();
    Borough::ALL
        .into_iter()
        .find(|b| b.code().eq_ignore_ascii_case(trimmed) || b.name().eq_ignore_ascii_case(trimmed))
        .ok_or_else(|| AggregateError::UnknownBorough(input.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRanking {
    pub station: String,
    pub borough: String,
    pub weeks: u32,
    pub mean_weekly_entries: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayMean {
    pub station: String,
    pub dow: String,
    pub dow_num: u32,
    pub mean_dow_entries: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourBlockEntries {
    pub dow: String,
    pub dow_num: u32,
    pub hour_block: u32,
    pub entries_per_hour_group: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / f64::from(self.count)
        }
    }
}

/// Stations of one borough ranked by the mean of their ISO-week entry sums.
pub fn top_stations_by_borough(
    daily: &[DailyDelta],
    borough: Borough,
    k: usize,
) -> Vec<StationRanking> {
    let mut weekly: BTreeMap<(&str, &str, i32, u32), i64> = BTreeMap::new();
    for delta in daily.iter().filter(|d| d.borough == borough.code()) {
        let week = delta.date.iso_week();
        *weekly
            .entry((delta.station.as_str(), delta.borough.as_str(), week.year(), week.week()))
            .or_default() += delta.daily_entries;
    }

    let mut per_station: BTreeMap<(&str, &str), Mean> = BTreeMap::new();
    for ((station, borough, _, _), sum) in weekly {
        per_station
            .entry((station, borough))
            .or_default()
            .push(sum as f64);
    }

    let mut ranked: Vec<StationRanking> = per_station
        .into_iter()
        .map(|((station, borough), mean)| StationRanking {
            station: station.to_string(),
            borough: borough.to_string(),
            weeks: mean.count,
            mean_weekly_entries: mean.value(),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.mean_weekly_entries
            .total_cmp(&a.mean_weekly_entries)
            .then_with(|| a.station.cmp(&b.station))
    });
    ranked.truncate(k);

    info!(
        component = "aggregate",
        event = "aggregate.top_stations",
        borough = borough.code(),
        k,
        returned = ranked.len()
    );

    ranked
}

/// Mean daily delta per station and weekday, ordered by station then weekday.
pub fn mean_entries_by_weekday(daily: &[DailyDelta]) -> Vec<WeekdayMean> {
    let mut groups: BTreeMap<(&str, u32), (&str, Mean)> = BTreeMap::new();
    for delta in daily {
        groups
            .entry((delta.station.as_str(), delta.dow_num))
            .or_insert((delta.dow.as_str(), Mean::default()))
            .1
            .push(delta.daily_entries as f64);
    }

    groups
        .into_iter()
        .map(|((station, dow_num), (dow, mean))| WeekdayMean {
            station: station.to_string(),
            dow: dow.to_string(),
            dow_num,
            mean_dow_entries: mean.value(),
        })
        .collect()
}

/// For the given stations: mean hourly delta per (weekday, hour), summed per
/// (weekday, 3-hour block).
pub fn entries_per_hour_block(hourly: &[HourlyDelta], stations: &[String]) -> Vec<HourBlockEntries> {
    let wanted: HashSet<&str> = stations.iter().map(String::as_str).collect();

    let mut by_hour: BTreeMap<(u32, u32), Mean> = BTreeMap::new();
    for delta in hourly.iter().filter(|d| wanted.contains(d.station.as_str())) {
        let dow_num = delta.datetime.weekday().num_days_from_monday();
        by_hour
            .entry((dow_num, delta.hour))
            .or_default()
            .push(delta.hourly_entries as f64);
    }

    let mut by_block: BTreeMap<(u32, u32), f64> = BTreeMap::new();
    for ((dow_num, hour), mean) in by_hour {
        let Some(block) = hour_block(hour) else {
            continue;
        };
        *by_block.entry((dow_num, block)).or_default() += mean.value();
    }

    let out: Vec<HourBlockEntries> = by_block
        .into_iter()
        .map(|((dow_num, hour_block), entries)| HourBlockEntries {
            dow: weekday_name(weekday_from_index(dow_num)).to_string(),
            dow_num,
            hour_block,
            entries_per_hour_group: entries,
        })
        .collect();

    info!(
        component = "aggregate",
        event = "aggregate.hour_blocks",
        station_count = wanted.len(),
        rows = out.len()
    );

    out
}

fn weekday_from_index(dow_num: u32) -> Weekday {
    match dow_num {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}
