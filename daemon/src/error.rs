//! Error types for the sampler.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to read OS counters. Recoverable: the tick is skipped.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("No mounted filesystem found for {path:?}")]
    NoDisk { path: PathBuf },
}

/// Errors from the CSV log.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to open log file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Log file {path:?} has header {found:?}, expected {expected:?}")]
    HeaderMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Write to log file failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log file lock poisoned")]
    Poisoned,
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}
