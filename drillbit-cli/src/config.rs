//! Command-line arguments
//!
//! Every flag can also come from the environment (or a `.env` file).
//! Connection flags override the `[client]` section of the config file.

use clap::{Parser, Subcommand};
use drillbit_client::{Frequency, ObjectId};
use drillbit_tracker::TrackerConfig;
use std::path::PathBuf;

/// Drillbit - generate and track financial statements
#[derive(Parser, Debug, Clone)]
#[command(name = "drillbit")]
#[command(about = "Generate and track Drillbit financial statements")]
pub struct Args {
    /// Base URL of the Drillbit REST API
    #[arg(long, env = "DRILLBIT_URL")]
    pub base_url: Option<String>,

    /// API key, sent as a bearer token
    #[arg(long, env = "DRILLBIT_API_KEY")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "DRILLBIT_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Path to the TOML config file (optional)
    #[arg(long, env = "DRILLBIT_CONFIG", default_value = "drillbit.toml")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create statements for a group and follow their tasks to completion
    Statements {
        #[command(flatten)]
        target: Target,

        /// Reporting frequency (H, D, M, Q, A)
        #[arg(long, short)]
        frequency: Frequency,

        /// Delete existing statements first
        #[arg(long)]
        overwrite: bool,

        /// Lock every environment component before creating
        #[arg(long)]
        lock: bool,
    },

    /// Check whether statements already exist
    Exists {
        #[command(flatten)]
        target: Target,

        #[arg(long, short)]
        frequency: Frequency,
    },

    /// Query the state of one task
    Task {
        task_id: String,
    },

    /// Print the environment × project pairs of a group
    Simulations {
        #[command(flatten)]
        target: Target,
    },
}

/// Environment and project group to work on
#[derive(clap::Args, Debug, Clone)]
pub struct Target {
    /// Environment id
    #[arg(long, short)]
    pub environment: ObjectId,

    /// Project group id
    #[arg(long, short)]
    pub group: ObjectId,
}

impl Args {
    /// Apply connection flags on top of the file config.
    pub fn apply(&self, config: &mut TrackerConfig) {
        if let Some(url) = &self.base_url {
            config.client.base_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config.client.api_key = Some(key.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.client.timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("DRILLBIT_URL must be an http(s) URL, got '{}'", url));
            }
        }
        if self.timeout_secs == Some(0) {
            return Err("DRILLBIT_TIMEOUT_SECS must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statements_command() {
        let args = Args::try_parse_from([
            "drillbit",
            "--base-url",
            "https://api.drillbit.example",
            "statements",
            "-e",
            "3",
            "-g",
            "12",
            "-f",
            "q",
            "--overwrite",
        ])
        .unwrap();

        match args.command {
            Command::Statements {
                target,
                frequency,
                overwrite,
                lock,
            } => {
                assert_eq!(target.environment, 3);
                assert_eq!(target.group, 12);
                assert_eq!(frequency, Frequency::Quarterly);
                assert!(overwrite);
                assert!(!lock);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_frequency_rejected() {
        let result = Args::try_parse_from(["drillbit", "exists", "-e", "1", "-g", "2", "-f", "W"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_file_config() {
        let args = Args::try_parse_from([
            "drillbit",
            "--api-key",
            "secret",
            "--timeout-secs",
            "5",
            "task",
            "abc",
        ])
        .unwrap();
        let mut config = TrackerConfig::default();
        args.apply(&mut config);

        assert_eq!(config.client.api_key.as_deref(), Some("secret"));
        assert_eq!(config.client.timeout_secs, 5);
        assert_eq!(config.client.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let args = Args::try_parse_from(["drillbit", "--base-url", "localhost", "task", "abc"]).unwrap();
        assert!(args.validate().is_err());
    }
}
