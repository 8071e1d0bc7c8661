//! Named references held by the register.

use crate::endpoint::Endpoint;
use crate::group::EndpointGroup;
use std::sync::Arc;

/// A name that a routing expression can target
#[derive(Debug, Clone)]
pub enum Reference {
    /// A single endpoint, returned as-is when named
    Endpoint(Arc<Endpoint>),
    /// A group, resolved through its selection strategy
    Group(Arc<EndpointGroup>),
}

impl Reference {
    /// Registered name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Endpoint(endpoint) => endpoint.name(),
            Self::Group(group) => group.name(),
        }
    }

    /// Kind label, used in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Endpoint(_) => "endpoint",
            Self::Group(_) => "group",
        }
    }

    /// Endpoint held by this reference, if any
    #[must_use]
    pub fn as_endpoint(&self) -> Option<&Arc<Endpoint>> {
        match self {
            Self::Endpoint(endpoint) => Some(endpoint),
            Self::Group(_) => None,
        }
    }

    /// Group held by this reference, if any
    #[must_use]
    pub fn as_group(&self) -> Option<&Arc<EndpointGroup>> {
        match self {
            Self::Group(group) => Some(group),
            Self::Endpoint(_) => None,
        }
    }
}

impl From<Arc<Endpoint>> for Reference {
    fn from(endpoint: Arc<Endpoint>) -> Self {
        Self::Endpoint(endpoint)
    }
}

impl From<Arc<EndpointGroup>> for Reference {
    fn from(group: Arc<EndpointGroup>) -> Self {
        Self::Group(group)
    }
}
