//! Configuration error types.

use std::path::PathBuf;

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration content could not be parsed.
    #[error("Failed to parse {format} configuration: {message}")]
    Parse {
        /// Format being parsed
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// File extension is not a supported format.
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// Environment override has an invalid value.
    #[error("Invalid value for {var}: {message}")]
    Env {
        /// Variable name
        var: &'static str,
        /// Reason
        message: String,
    },

    /// Configuration is structurally valid but semantically wrong.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error.
    pub fn parse(format: &'static str, msg: impl ToString) -> Self {
        Self::Parse {
            format,
            message: msg.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
