//! Error types for the runner.

use demflood_dem::DemError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while configuring or running a session.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the config schema.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A configuration value is out of range.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A selection argument could not be parsed.
    #[error("Invalid selection '{input}': {reason}")]
    InvalidSelection {
        /// Text as given on the command line.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Error from the DEM pipeline.
    #[error(transparent)]
    Dem(#[from] DemError),

    /// The report could not be serialized.
    #[error("Failed to write report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
