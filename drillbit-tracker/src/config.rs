//! Tracker configuration
//!
//! Loaded from an optional TOML file; every field has a default so an
//! empty file (or no file) is valid.

use drillbit_client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TrackerError};
use crate::tracker::{Backoff, PollPolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub tracker: TrackerSettings,
}

/// Task status polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Base delay between status queries, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Status queries per task before it is marked failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffConfig {
    #[default]
    Fixed,
    Exponential {
        #[serde(default = "default_factor")]
        factor: f64,
        #[serde(default = "default_max_interval_ms")]
        max_interval_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Refuse statement creation until every environment component is locked
    #[serde(default = "default_true")]
    pub require_locked_environment: bool,

    /// Fetch summary and account breakdown views alongside task tracking
    #[serde(default = "default_true")]
    pub fetch_views: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            require_locked_environment: true,
            fetch_views: true,
        }
    }
}

// Defaults
fn default_interval_ms() -> u64 { 2000 }
fn default_max_attempts() -> u32 { 100 }
fn default_factor() -> f64 { 2.0 }
fn default_max_interval_ms() -> u64 { 30_000 }
fn default_true() -> bool { true }

impl TrackerConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TrackerError::Config(e.to_string()))
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(TrackerError::Config(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from(&self.poll)
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        let backoff = match config.backoff {
            BackoffConfig::Fixed => Backoff::Fixed,
            BackoffConfig::Exponential {
                factor,
                max_interval_ms,
            } => Backoff::Exponential {
                factor,
                max_interval: Duration::from_millis(max_interval_ms),
            },
        };
        PollPolicy {
            interval: Duration::from_millis(config.interval_ms),
            max_attempts: config.max_attempts,
            backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = TrackerConfig::from_toml("").unwrap();
        assert_eq!(config.poll, PollConfig::default());
        assert!(config.tracker.require_locked_environment);
        assert_eq!(config.client.base_url, "http://localhost:8000");

        let policy = config.poll_policy();
        assert_eq!(policy.interval, Duration::from_millis(2000));
        assert_eq!(policy.max_attempts, 100);
        assert_eq!(policy.backoff, Backoff::Fixed);
    }

    #[test]
    fn test_parse_exponential_backoff() {
        let config = TrackerConfig::from_toml(
            r#"
            [client]
            base_url = "https://drillbit.example"
            timeout_secs = 5

            [poll]
            interval_ms = 500
            max_attempts = 12
            backoff = { exponential = { factor = 1.5, max_interval_ms = 4000 } }

            [tracker]
            fetch_views = false
            "#,
        )
        .unwrap();

        assert_eq!(config.client.base_url, "https://drillbit.example");
        assert_eq!(config.client.timeout_secs, 5);
        assert!(!config.tracker.fetch_views);
        assert!(config.tracker.require_locked_environment);

        let policy = config.poll_policy();
        assert_eq!(policy.max_attempts, 12);
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                factor: 1.5,
                max_interval: Duration::from_millis(4000),
            }
        );
    }

    #[test]
    fn test_fixed_backoff_string() {
        let config = TrackerConfig::from_toml("[poll]\nbackoff = \"fixed\"\n").unwrap();
        assert_eq!(config.poll.backoff, BackoffConfig::Fixed);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        assert!(matches!(
            TrackerConfig::from_toml("[poll]\ninterval_ms = \"soon\"\n"),
            Err(TrackerError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = TrackerConfig::load("/nonexistent/drillbit.toml").unwrap();
        assert_eq!(config.poll.max_attempts, 100);
    }
}
