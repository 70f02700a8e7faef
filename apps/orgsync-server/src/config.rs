//! Daemon configuration loaded from environment variables.
//!
//! Fail-fast loading with validation: required variables must be present
//! and valid, or startup stops with a clear error message.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable {var}")]
    Missing { var: &'static str },

    /// An environment variable holds an unusable value.
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Runtime settings for the daemon.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Listen host for the REST and webhook surface.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Seconds between two periodic reconciliations.
    pub apply_interval_secs: i64,
    /// Path to the declared-state document (the checked-out reference
    /// repository).
    pub source_path: PathBuf,
    /// Path to the live-state document used by plan/demo runs.
    pub live_path: PathBuf,
    /// Name of the repository holding the declared state.
    pub teams_repo: String,
    /// Instruct the executor to log without touching the remote.
    pub dryrun: bool,
    /// Default log filter; `RUST_LOG` overrides it.
    pub log_filter: String,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = get("ORGSYNC_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse(&get, "ORGSYNC_PORT", 18061)?;
        let apply_interval_secs = parse(&get, "ORGSYNC_APPLY_INTERVAL", 600)?;
        if apply_interval_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "ORGSYNC_APPLY_INTERVAL",
                message: "must be a positive number of seconds".to_string(),
            });
        }

        let source_path = get("ORGSYNC_SOURCE")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing { var: "ORGSYNC_SOURCE" })?;
        let live_path = get("ORGSYNC_LIVE_STATE")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing { var: "ORGSYNC_LIVE_STATE" })?;

        let teams_repo = get("ORGSYNC_TEAMS_REPO").unwrap_or_else(|| "teams".to_string());
        let dryrun = parse_bool(&get, "ORGSYNC_DRYRUN")?;
        let log_filter = get("ORGSYNC_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            host,
            port,
            apply_interval_secs,
            source_path,
            live_path,
            teams_repo,
            dryrun,
            log_filter,
        })
    }
}

fn parse<T: std::str::FromStr>(
    get: impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e| ConfigError::Invalid {
            var,
            message: format!("{e}"),
        }),
    }
}

fn parse_bool(
    get: impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<bool, ConfigError> {
    match get(var).as_deref() {
        None | Some("") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
