//! Configuration errors.

use gateway_core::GatewayError;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File extension is not `.yaml`, `.yml` or `.toml`
    #[error("unsupported config format '{0}'")]
    UnsupportedFormat(String),

    /// A `${VAR}` reference has no value and no fallback
    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    /// The file did not parse
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value failed validation
    #[error("invalid config: {0}")]
    Validation(String),
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}
