//! Configuration management (TOML file + command-line overrides)

use crate::cli::Args;
use crate::csv_log::DEFAULT_LOG_FILE;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sampling: SamplingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub interval_secs: f64,
    pub top_n: usize,
    pub log_file: PathBuf,
    pub disk_path: PathBuf,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            interval_secs: 2.0,
            top_n: 5,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            disk_path: PathBuf::from("/"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "sysmon")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Apply command-line overrides and validate.
    pub fn resolve(&self, args: &Args) -> Result<Settings, ConfigError> {
        let sampling = &self.sampling;
        let interval_secs = args.interval.unwrap_or(sampling.interval_secs);
        if !interval_secs.is_finite() || interval_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "interval must be a positive number of seconds, got {interval_secs}"
            )));
        }
        let top_n = args.top.unwrap_or(sampling.top_n);
        if top_n == 0 {
            return Err(ConfigError::Invalid("top must be at least 1".to_string()));
        }
        Ok(Settings {
            interval: Duration::from_secs_f64(interval_secs),
            top_n,
            log_file: args.log_file.clone().unwrap_or_else(|| sampling.log_file.clone()),
            disk_path: args.disk.clone().unwrap_or_else(|| sampling.disk_path.clone()),
        })
    }
}

/// Effective, validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub interval: Duration,
    pub top_n: usize,
    pub log_file: PathBuf,
    pub disk_path: PathBuf,
}
