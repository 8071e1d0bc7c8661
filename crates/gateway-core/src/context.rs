//! Per-request execution context.
//!
//! The context carries the request and response plus two attribute maps:
//! public attributes, visible to policies and templates, and internal
//! attributes, reserved for the framework (resolved endpoint, execution
//! failure, ...).
//!
//! Interruption is a signal, not an error: once a step interrupts the
//! context, the processor chain stops before the next step. An interruption
//! is terminal, so the first one recorded wins.

use crate::failure::ExecutionFailure;
use crate::request::{Request, RequestId, Response};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Well-known attribute keys
pub mod attributes {
    /// Prefix accepted on public attribute keys; stripped on write.
    pub const ATTR_PREFIX: &str = "gateway.attribute.";

    /// Public attribute holding the deployed API id
    pub const ATTR_API: &str = "api";

    /// Public attribute holding the `endpoints` template variable
    pub const ATTR_ENDPOINTS: &str = "endpoints";

    /// Internal attribute holding the `ExecutionFailure` of an error interruption
    pub const ATTR_INTERNAL_EXECUTION_FAILURE: &str = "EXECUTION_FAILURE";

    /// Internal attribute holding the routing expression for the request
    pub const ATTR_INTERNAL_ROUTING_EXPRESSION: &str = "ROUTING_EXPRESSION";

    /// Internal attribute holding the resolved proxy endpoint
    pub const ATTR_INTERNAL_RESOLVED_ENDPOINT: &str = "RESOLVED_ENDPOINT";

    /// Internal attribute holding the materialized proxy request
    pub const ATTR_INTERNAL_PROXY_REQUEST: &str = "PROXY_REQUEST";

    /// Internal attribute holding the listener type that accepted the request
    pub const ATTR_INTERNAL_LISTENER_TYPE: &str = "LISTENER_TYPE";
}

use attributes::{ATTR_INTERNAL_EXECUTION_FAILURE, ATTR_PREFIX};

/// How a context was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// Plain interruption, no payload
    Interrupted,
    /// Interruption carrying an `ExecutionFailure`
    Failed,
}

/// Per-request metrics collected while the request flows through the chain
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Request identifier
    pub request_id: RequestId,
    /// Time the request entered the gateway
    pub timestamp: DateTime<Utc>,
    /// Deployed API serving the request
    pub api_id: Option<String>,
    /// Name of the endpoint the request was routed to
    pub endpoint: Option<String>,
    /// Key of the failure that interrupted the request
    pub error_key: Option<String>,
}

impl Metrics {
    fn for_request(request: &Request) -> Self {
        Self {
            request_id: request.id().clone(),
            timestamp: request.timestamp(),
            api_id: None,
            endpoint: None,
            error_key: None,
        }
    }
}

/// Mutable per-request state shared by every processor of a chain
pub struct ExecutionContext {
    request: Request,
    response: Response,
    attributes: HashMap<String, Value>,
    internal_attributes: HashMap<String, Box<dyn Any + Send + Sync>>,
    interruption: Option<Interruption>,
    metrics: Metrics,
}

impl ExecutionContext {
    /// Create a context for an inbound request
    #[must_use]
    pub fn new(request: Request) -> Self {
        let metrics = Metrics::for_request(&request);
        Self {
            request,
            response: Response::new(),
            attributes: HashMap::new(),
            internal_attributes: HashMap::new(),
            interruption: None,
            metrics,
        }
    }

    /// Inbound request
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable inbound request
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Response being built
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Mutable response
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Request metrics
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Mutable request metrics
    pub fn metrics_mut(&mut self) -> &mut Metrics {
        &mut self.metrics
    }

    // --- public attributes -------------------------------------------------

    /// Set a public attribute. A leading `gateway.attribute.` is stripped.
    pub fn put_attribute(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes
            .insert(strip_prefix(key).to_string(), value.into());
    }

    /// Get a public attribute, with or without the prefix
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(strip_prefix(key))
    }

    /// Remove a public attribute
    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(strip_prefix(key))
    }

    /// All public attributes, keyed without prefix
    #[must_use]
    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    // --- internal attributes -----------------------------------------------

    /// Set an internal attribute, replacing any previous value
    pub fn put_internal_attribute<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.internal_attributes
            .insert(key.to_string(), Box::new(value));
    }

    /// Get an internal attribute.
    ///
    /// Returns `None` when the key is absent or holds a value of another type.
    #[must_use]
    pub fn internal_attribute<T: Any>(&self, key: &str) -> Option<&T> {
        self.internal_attributes
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Whether an internal attribute is set, whatever its type
    #[must_use]
    pub fn has_internal_attribute(&self, key: &str) -> bool {
        self.internal_attributes.contains_key(key)
    }

    /// Remove an internal attribute, returning whether it was present
    pub fn remove_internal_attribute(&mut self, key: &str) -> bool {
        self.internal_attributes.remove(key).is_some()
    }

    /// Keys of all internal attributes
    pub fn internal_attribute_names(&self) -> impl Iterator<Item = &str> {
        self.internal_attributes.keys().map(String::as_str)
    }

    // --- interruption ------------------------------------------------------

    /// Stop processing with no payload
    pub fn interrupt(&mut self) {
        if self.interruption.is_none() {
            debug!(request_id = %self.metrics.request_id, "Execution interrupted");
            self.interruption = Some(Interruption::Interrupted);
        }
    }

    /// Stop processing and record a failure for error rendering
    pub fn interrupt_with(&mut self, failure: ExecutionFailure) {
        if self.interruption.is_some() {
            debug!(
                request_id = %self.metrics.request_id,
                status = failure.status_code,
                "Ignoring failure on an already interrupted execution"
            );
            return;
        }

        debug!(
            request_id = %self.metrics.request_id,
            status = failure.status_code,
            key = failure.key.as_deref().unwrap_or_default(),
            "Execution interrupted with failure"
        );
        self.metrics.error_key = failure.key.clone();
        self.put_internal_attribute(ATTR_INTERNAL_EXECUTION_FAILURE, failure);
        self.interruption = Some(Interruption::Failed);
    }

    /// Whether processing has been interrupted
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interruption.is_some()
    }

    /// The interruption, if any
    #[must_use]
    pub fn interruption(&self) -> Option<Interruption> {
        self.interruption
    }

    /// Failure recorded by `interrupt_with`
    #[must_use]
    pub fn execution_failure(&self) -> Option<&ExecutionFailure> {
        self.internal_attribute(ATTR_INTERNAL_EXECUTION_FAILURE)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("request_id", &self.metrics.request_id)
            .field("attributes", &self.attributes)
            .field(
                "internal_attributes",
                &self.internal_attributes.keys().collect::<Vec<_>>(),
            )
            .field("interruption", &self.interruption)
            .finish_non_exhaustive()
    }
}

fn strip_prefix(key: &str) -> &str {
    key.strip_prefix(ATTR_PREFIX).unwrap_or(key)
}
