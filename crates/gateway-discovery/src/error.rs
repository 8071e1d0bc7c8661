//! Discovery error types.

use thiserror::Error;

/// Result type for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Discovery error type
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The initial listing failed
    #[error("Failed to list endpoints of '{service}': {message}")]
    List {
        /// Watched service
        service: String,
        /// Error message
        message: String,
    },

    /// The watch subscription failed
    #[error("Watch on '{service}' failed: {message}")]
    Watch {
        /// Watched service
        service: String,
        /// Error message
        message: String,
    },

    /// The watched resource version is too old and the watch must restart
    #[error("Watch on '{service}' expired")]
    WatchExpired {
        /// Watched service
        service: String,
    },
}

impl DiscoveryError {
    /// Create a list error
    pub fn list(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::List {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a watch error
    pub fn watch(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Watch {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether the error is an expired watch resource
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::WatchExpired { .. })
    }
}
