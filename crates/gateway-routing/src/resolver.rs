//! Endpoint resolution.
//!
//! Turns a routing expression into a concrete upstream target. Supported
//! expressions:
//!
//! - `/path`: default group, path appended to the selected endpoint target
//! - `name:suffix`: registered endpoint (returned even when unavailable) or
//!   group (selected through its strategy), suffix appended
//! - `scheme://...`: default group; only the expression's query string is
//!   kept as routing input
//! - `name`: registered reference, or the default group when unknown
//!
//! A query string in the suffix or path joins the resolved parameters after
//! the target's own.
//!
//! A `:` inside a name can be escaped as `\:`. A `name:suffix` expression
//! whose name is not registered resolves to nothing.

use crate::endpoint::Endpoint;
use crate::reference::Reference;
use crate::register::ReferenceRegister;
use gateway_core::{ProxyRequest, QueryParameters, Request};
use std::sync::Arc;
use tracing::debug;

/// Result of a successful resolution.
///
/// Holds the selected endpoint and the final URI; turning it into a
/// `ProxyRequest` only merges in the inbound request's parameters.
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    endpoint: Arc<Endpoint>,
    uri: String,
    parameters: QueryParameters,
}

impl ProxyEndpoint {
    /// Selected endpoint
    #[must_use]
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    /// Final URI, without query string
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Parameters from the endpoint target and the routing expression
    #[must_use]
    pub fn parameters(&self) -> &QueryParameters {
        &self.parameters
    }

    /// Materialize the upstream request.
    ///
    /// Parameters are a union: endpoint target parameters first, then the
    /// routing expression's, then the inbound request's.
    #[must_use]
    pub fn create_proxy_request(&self, request: &Request) -> ProxyRequest {
        let mut parameters = self.parameters.clone();
        parameters.extend_from(request.parameters());
        ProxyRequest::new(
            self.uri.clone(),
            request.method().clone(),
            parameters,
            request.headers().clone(),
        )
    }
}

/// Resolves routing expressions against a register
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    register: Arc<ReferenceRegister>,
}

enum Expression<'a> {
    /// `/path`
    Path,
    /// `scheme://...`
    Absolute,
    /// `name:suffix`
    Named { name: String, suffix: &'a str },
    /// `name` with no separator
    Bare(String),
}

impl EndpointResolver {
    /// Create a resolver over a register
    #[must_use]
    pub fn new(register: Arc<ReferenceRegister>) -> Self {
        Self { register }
    }

    /// Register consulted by this resolver
    #[must_use]
    pub fn register(&self) -> &Arc<ReferenceRegister> {
        &self.register
    }

    /// Resolve a routing expression
    #[must_use]
    pub fn resolve(&self, expression: &str) -> Option<ProxyEndpoint> {
        let resolved = match parse(expression) {
            Expression::Path => self.from_default_group(expression, QueryParameters::new()),
            Expression::Absolute => {
                let parameters = expression
                    .split_once('?')
                    .map(|(_, query)| QueryParameters::parse(query))
                    .unwrap_or_default();
                self.from_default_group("", parameters)
            }
            Expression::Named { name, suffix } => match self.register.lookup(&name) {
                Some(reference) => Self::from_reference(&reference, suffix),
                None => {
                    debug!(name = %name, "Routing expression names an unknown reference");
                    None
                }
            },
            Expression::Bare(name) => match self.register.lookup(&name) {
                Some(reference) => Self::from_reference(&reference, ""),
                None => self.from_default_group("", QueryParameters::new()),
            },
        };

        if resolved.is_none() {
            debug!(expression = %expression, "No endpoint available");
        }
        resolved
    }

    fn from_reference(reference: &Reference, remaining: &str) -> Option<ProxyEndpoint> {
        let endpoint = match reference {
            Reference::Endpoint(endpoint) => Arc::clone(endpoint),
            Reference::Group(group) => group.next()?,
        };
        Some(build(endpoint, remaining, QueryParameters::new()))
    }

    fn from_default_group(
        &self,
        remaining: &str,
        parameters: QueryParameters,
    ) -> Option<ProxyEndpoint> {
        let endpoint = self.register.default_group()?.next()?;
        Some(build(endpoint, remaining, parameters))
    }
}

fn parse(expression: &str) -> Expression<'_> {
    if expression.starts_with('/') {
        return Expression::Path;
    }

    match find_separator(expression) {
        Some(index) => {
            let suffix = &expression[index + 1..];
            if suffix.starts_with("//") {
                Expression::Absolute
            } else {
                Expression::Named {
                    name: unescape(&expression[..index]),
                    suffix,
                }
            }
        }
        None => Expression::Bare(unescape(expression)),
    }
}

/// Byte index of the first `:` not preceded by a backslash
fn find_separator(expression: &str) -> Option<usize> {
    let bytes = expression.as_bytes();
    bytes
        .iter()
        .enumerate()
        .find(|&(i, &b)| b == b':' && (i == 0 || bytes[i - 1] != b'\\'))
        .map(|(i, _)| i)
}

fn unescape(name: &str) -> String {
    name.replace("\\:", ":")
}

fn build(endpoint: Arc<Endpoint>, remaining: &str, extra: QueryParameters) -> ProxyEndpoint {
    let (base, query) = match endpoint.target().split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (endpoint.target(), None),
    };

    let (path, suffix_query) = match remaining.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (remaining, None),
    };

    let uri = if path.is_empty() {
        base.to_string()
    } else if base.ends_with('/') && path.starts_with('/') {
        format!("{base}{}", &path[1..])
    } else {
        format!("{base}{path}")
    };

    let mut parameters = query.map(QueryParameters::parse).unwrap_or_default();
    parameters.extend_from(&extra);
    if let Some(suffix_query) = suffix_query {
        parameters.extend_from(&QueryParameters::parse(suffix_query));
    }

    ProxyEndpoint {
        endpoint,
        uri,
        parameters,
    }
}
