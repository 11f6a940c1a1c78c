//! Station-name reconciliation between the turnstile and station datasets.
//!
//! Rules are walked in table order:
//! - a pattern rule rewrites every match in the current value, so later rules
//!   see the output of earlier ones
//! - the first exact rule equal to the current value replaces it; no further
//!   exact rule is consulted for that value

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::corrections::{LOCATION_EXACT, LOCATION_PATTERNS, TURNSTILE_EXACT};
use crate::schema::{StationLocation, TurnstileReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Exact,
    Pattern,
}

impl MatchKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Pattern => "pattern",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
pub struct CorrectionRule {
    matcher: Matcher,
    replacement: String,
}

impl CorrectionRule {
    pub fn exact(matcher: &str, replacement: &str) -> Self {
        Self {
            matcher: Matcher::Exact(matcher.to_string()),
            replacement: replacement.to_string(),
        }
    }

    pub fn pattern(pattern: &str, replacement: &str) -> Result<Self, ReconcileError> {
        let regex = Regex::new(pattern).map_err(|err| ReconcileError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            matcher: Matcher::Pattern(regex),
            replacement: replacement.to_string(),
        })
    }

    pub fn kind(&self) -> MatchKind {
        match self.matcher {
            Matcher::Exact(_) => MatchKind::Exact,
            Matcher::Pattern(_) => MatchKind::Pattern,
        }
    }

    pub fn matcher_text(&self) -> &str {
        match &self.matcher {
            Matcher::Exact(text) => text,
            Matcher::Pattern(regex) => regex.as_str(),
        }
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("invalid correction pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Immutable ordered list of name corrections.
#[derive(Debug, Clone)]
pub struct CorrectionTable {
    name: &'static str,
    rules: Vec<CorrectionRule>,
    fingerprint: String,
}

impl CorrectionTable {
    pub fn new(name: &'static str, rules: Vec<CorrectionRule>) -> Self {
        let fingerprint = table_fingerprint(&rules);
        Self {
            name,
            rules,
            fingerprint,
        }
    }

    /// Corrections for the turnstile `station` field.
    pub fn turnstile_names() -> Self {
        let rules = TURNSTILE_EXACT
            .iter()
            .map(|(matcher, replacement)| CorrectionRule::exact(matcher, replacement))
            .collect();
        Self::new("turnstile_names", rules)
    }

    /// Corrections for the station reference `stop_name` field.
    pub fn location_names() -> Result<Self, ReconcileError> {
        let mut rules = Vec::with_capacity(LOCATION_PATTERNS.len() + LOCATION_EXACT.len());
        for (pattern, replacement) in LOCATION_PATTERNS {
            rules.push(CorrectionRule::pattern(pattern, replacement)?);
        }
        for (matcher, replacement) in LOCATION_EXACT {
            rules.push(CorrectionRule::exact(matcher, replacement));
        }
        Ok(Self::new("location_names", rules))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rules(&self) -> &[CorrectionRule] {
        &self.rules
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn apply(&self, value: &str) -> String {
        let mut current = value.to_string();
        let mut exact_applied = false;

        for rule in &self.rules {
            match &rule.matcher {
                Matcher::Pattern(regex) => {
                    if regex.is_match(&current) {
                        current = regex
                            .replace_all(&current, rule.replacement.as_str())
                            .into_owned();
                    }
                }
                Matcher::Exact(text) => {
                    if !exact_applied && current == *text {
                        current = rule.replacement.clone();
                        exact_applied = true;
                    }
                }
            }
        }

        current
    }
}

pub fn reconcile_turnstile_names(
    readings: Vec<TurnstileReading>,
    table: &CorrectionTable,
) -> Vec<TurnstileReading> {
    log_table(table);
    let mut rewritten = 0u64;
    let out: Vec<TurnstileReading> = readings
        .into_iter()
        .map(|mut reading| {
            let station = table.apply(&reading.station);
            if station != reading.station {
                rewritten += 1;
                reading.station = station;
            }
            reading
        })
        .collect();

    info!(
        component = "reconcile",
        event = "reconcile.turnstile.finish",
        row_count = out.len(),
        rewritten
    );
    out
}

pub fn reconcile_station_names(
    stations: Vec<StationLocation>,
    table: &CorrectionTable,
) -> Vec<StationLocation> {
    log_table(table);
    let mut rewritten = 0u64;
    let out: Vec<StationLocation> = stations
        .into_iter()
        .map(|mut station| {
            let stop_name = table.apply(&station.stop_name);
            if stop_name != station.stop_name {
                rewritten += 1;
                station.stop_name = stop_name;
            }
            station
        })
        .collect();

    info!(
        component = "reconcile",
        event = "reconcile.stations.finish",
        row_count = out.len(),
        rewritten
    );
    out
}

fn log_table(table: &CorrectionTable) {
    info!(
        component = "reconcile",
        event = "reconcile.table.loaded",
        table = table.name(),
        rule_count = table.rules().len(),
        fingerprint = table.fingerprint()
    );
}

fn table_fingerprint(rules: &[CorrectionRule]) -> String {
    let mut hasher = Sha256::new();
    for rule in rules {
        hasher.update(rule.kind().as_str());
        hasher.update([0u8]);
        hasher.update(rule.matcher_text());
        hasher.update([0u8]);
        hasher.update(rule.replacement());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}
