//! Error types for configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON or has the wrong shape.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required field is missing or empty.
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
}
