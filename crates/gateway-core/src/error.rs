//! Error types for the gateway.
//!
//! Resolution misses are not errors: they surface as `None` from the
//! resolver and are turned into a context interruption by the caller.
//! `GatewayError` covers the cases that are genuine faults.

use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// No endpoint could be selected for a routing expression
    #[error("No endpoint available for '{expression}'")]
    NoEndpointAvailable {
        /// The routing expression that failed to resolve
        expression: String,
    },

    /// A named endpoint or group does not exist
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of object ("endpoint", "group")
        kind: &'static str,
        /// Name that was looked up
        name: String,
    },

    /// A processor failed while executing against a context
    #[error("Processor '{processor}' failed: {message}")]
    Processor {
        /// Processor identifier
        processor: String,
        /// Error message
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a no-endpoint-available error
    pub fn no_endpoint(expression: impl Into<String>) -> Self {
        Self::NoEndpointAvailable {
            expression: expression.into(),
        }
    }

    /// Create an endpoint-not-found error
    pub fn endpoint_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "endpoint",
            name: name.into(),
        }
    }

    /// Create a group-not-found error
    pub fn group_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "group",
            name: name.into(),
        }
    }

    /// Create a processor error
    pub fn processor(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processor {
            processor: processor.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NoEndpointAvailable { .. } => 503,
            Self::NotFound { .. } => 404,
            Self::Configuration { .. } | Self::Processor { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Stable machine-readable key for this error
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::NoEndpointAvailable { .. } => "NO_ENDPOINT_AVAILABLE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Processor { .. } => "PROCESSOR_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
