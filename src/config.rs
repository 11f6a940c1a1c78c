//! Environment-driven run configuration.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::deltas::DeltaConfig;
use crate::pipeline::PipelineConfig;
use crate::snapshots::{SnapshotConfig, SnapshotError, SnapshotRequest};

pub const DEFAULT_OUTPUT_DIR: &str = "data/output";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0}; pass START END or set it in the environment")]
    MissingVar(&'static str),
    #[error("invalid {name}='{value}'")]
    InvalidVar { name: &'static str, value: String },
    #[error(transparent)]
    Request(#[from] SnapshotError),
}

/// Builds the run configuration. Positional `args` (`START END`) win over
/// `RIDERSHIP_START_DATE` / `RIDERSHIP_END_DATE`.
pub fn pipeline_config_from_env(args: &[String]) -> Result<PipelineConfig, ConfigError> {
    let (start, end) = match args {
        [start, end, ..] => (start.clone(), end.clone()),
        _ => (
            required_var("RIDERSHIP_START_DATE")?,
            required_var("RIDERSHIP_END_DATE")?,
        ),
    };
    let request = SnapshotRequest::parse(&start, &end)?;

    let mut snapshots = SnapshotConfig::default();
    if let Some(root) = non_empty_var("RIDERSHIP_DATA_ROOT") {
        snapshots.data_root = PathBuf::from(root);
    }
    if let Some(url) = non_empty_var("RIDERSHIP_TURNSTILE_BASE_URL") {
        snapshots.turnstile_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(url) = non_empty_var("RIDERSHIP_STATIONS_URL") {
        snapshots.stations_url = url;
    }
    if let Some(raw) = non_empty_var("RIDERSHIP_HTTP_TIMEOUT_MS") {
        snapshots.http_timeout_ms = parse_number("RIDERSHIP_HTTP_TIMEOUT_MS", &raw)?;
    }
    if let Some(raw) = non_empty_var("RIDERSHIP_MAX_RETRIES") {
        snapshots.max_retries = parse_number("RIDERSHIP_MAX_RETRIES", &raw)?;
    }
    if let Some(raw) = non_empty_var("RIDERSHIP_REFRESH_CACHE") {
        snapshots.refresh_cached =
            parse_bool(&raw).ok_or(ConfigError::InvalidVar {
                name: "RIDERSHIP_REFRESH_CACHE",
                value: raw,
            })?;
    }

    Ok(PipelineConfig {
        request,
        snapshots,
        deltas: DeltaConfig::default(),
        output_dir: output_dir_from_env(),
    })
}

/// Directory the pipeline writes to and the report reads from.
pub fn output_dir_from_env() -> PathBuf {
    non_empty_var("RIDERSHIP_OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

pub fn top_k_from_env(default: usize) -> Result<usize, ConfigError> {
    match non_empty_var("RIDERSHIP_TOP_K") {
        Some(raw) => parse_number("RIDERSHIP_TOP_K", &raw),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    non_empty_var(name).ok_or(ConfigError::MissingVar(name))
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidVar {
        name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod test_env {
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    pub(crate) fn with_env_vars<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let _guard = env_lock()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, _)| ((*key).to_string(), env::var(key).ok()))
            .collect();

        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        let output = f();

        for (key, value) in previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        output
    }
}
