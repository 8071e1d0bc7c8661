//! Structured execution failures.
//!
//! An `ExecutionFailure` is stored in the context's internal attributes when a
//! step interrupts with an error. Error-rendering steps read it back to build
//! the client-visible response.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Structured reason attached to an error interruption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// HTTP status code to return to the client
    pub status_code: u16,

    /// Machine-readable key (e.g. `NO_ENDPOINT_AVAILABLE`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Extra values available to response templates
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,

    /// Content type of `message`, when it is not plain text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl ExecutionFailure {
    /// Create a failure with the given status code
    #[must_use]
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            key: None,
            message: None,
            parameters: HashMap::new(),
            content_type: None,
        }
    }

    /// Set the failure key
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the failure message
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Add a template parameter
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Set the message content type
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Whether the status code is in the 5xx class
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }
}

impl From<&crate::GatewayError> for ExecutionFailure {
    fn from(error: &crate::GatewayError) -> Self {
        Self::new(error.status_code())
            .key(error.key())
            .message(error.to_string())
    }
}
