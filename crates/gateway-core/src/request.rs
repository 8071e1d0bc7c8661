//! Request types for the gateway.
//!
//! This module defines the inbound request as seen by the routing core, the
//! response being built for it, and the immutable `ProxyRequest` produced once
//! an upstream target has been resolved.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique request identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new random request id
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Multi-valued query parameters.
///
/// Keys are kept sorted; values keep insertion order, so merging two sources
/// yields every value of the first source followed by every value of the
/// second.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParameters {
    inner: BTreeMap<String, Vec<String>>,
}

impl QueryParameters {
    /// Create an empty parameter map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (without the leading `?`).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut params = Self::new();
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            params.add(key.into_owned(), value.into_owned());
        }
        params
    }

    /// Append a value for a key
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.entry(key.into()).or_default().push(value.into());
    }

    /// First value for a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for a key
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.inner.get(key).map_or(&[], Vec::as_slice)
    }

    /// Whether the key is present
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Append every value of `other`, keeping existing values.
    pub fn extend_from(&mut self, other: &Self) {
        for (key, values) in &other.inner {
            self.inner
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    /// Number of distinct keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether there are no parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over keys and their values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Inbound request as consumed by the routing core
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    method: Method,
    path: String,
    raw_query: Option<String>,
    parameters: QueryParameters,
    headers: HeaderMap,
    timestamp: DateTime<Utc>,
}

impl Request {
    /// Create a new builder for `Request`
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Request identifier
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// HTTP method
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, as received
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw, non-decoded query string
    #[must_use]
    pub fn raw_query(&self) -> Option<&str> {
        self.raw_query.as_deref()
    }

    /// Parsed multi-valued query parameters
    #[must_use]
    pub fn parameters(&self) -> &QueryParameters {
        &self.parameters
    }

    /// Request headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Time the request was received
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Builder for `Request`
#[derive(Debug, Default)]
pub struct RequestBuilder {
    id: Option<RequestId>,
    method: Option<Method>,
    path: Option<String>,
    raw_query: Option<String>,
    parameters: QueryParameters,
    headers: HeaderMap,
}

impl RequestBuilder {
    /// Set the request id
    #[must_use]
    pub fn id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the HTTP method
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the request path
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the raw query string; its parameters are parsed and added.
    #[must_use]
    pub fn query(mut self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        self.parameters.extend_from(&QueryParameters::parse(&raw));
        self.raw_query = Some(raw);
        self
    }

    /// Add a single query parameter
    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.add(key, value);
        self
    }

    /// Add a header. Invalid names or values are ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Build the request
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            id: self.id.unwrap_or_else(RequestId::generate),
            method: self.method.unwrap_or(Method::GET),
            path: self.path.unwrap_or_else(|| "/".to_string()),
            raw_query: self.raw_query,
            parameters: self.parameters,
            headers: self.headers,
            timestamp: Utc::now(),
        }
    }
}

/// Response being built for the client
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl Response {
    /// Create an empty `200 OK` response
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Response status
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Set the response status
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Response headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable response headers
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Response body, if any
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Replace the response body
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = Some(body.into());
    }
}

/// Request to send upstream, materialized from a resolved endpoint.
///
/// Once built it is an independent snapshot: later topology changes never
/// alter it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    uri: String,
    method: Method,
    parameters: QueryParameters,
    headers: HeaderMap,
}

impl ProxyRequest {
    /// Create a new proxy request
    #[must_use]
    pub fn new(
        uri: impl Into<String>,
        method: Method,
        parameters: QueryParameters,
        headers: HeaderMap,
    ) -> Self {
        Self {
            uri: uri.into(),
            method,
            parameters,
            headers,
        }
    }

    /// Final upstream URI, without the merged query parameters
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// HTTP method
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Merged query parameters
    #[must_use]
    pub fn parameters(&self) -> &QueryParameters {
        &self.parameters
    }

    /// Headers forwarded upstream
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
