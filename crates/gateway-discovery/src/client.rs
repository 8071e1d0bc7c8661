//! Discovery client abstraction.
//!
//! A client offers a one-shot listing and a live watch of the addresses
//! backing a service. Implementations wrap a concrete registry (Kubernetes
//! endpoints, Consul, ...); the reconciler only sees this trait.

use crate::error::DiscoveryError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use gateway_config::GroupDiscoveryDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One address advertised for a service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// IP address or host name
    pub address: String,
    /// Advertised port
    pub port: u16,
    /// Whether the address is ready to receive traffic
    #[serde(default = "default_ready")]
    pub ready: bool,
}

impl ServiceEndpoint {
    /// A ready address
    #[must_use]
    pub fn ready(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ready: true,
        }
    }

    /// An address that is not ready yet
    #[must_use]
    pub fn not_ready(address: impl Into<String>, port: u16) -> Self {
        Self {
            ready: false,
            ..Self::ready(address, port)
        }
    }
}

fn default_ready() -> bool {
    true
}

/// Which service to list or watch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceSelector {
    /// Service name
    pub service: String,
    /// Namespace, if the registry has them
    pub namespace: Option<String>,
    /// Label selector
    pub labels: BTreeMap<String, String>,
}

impl ServiceSelector {
    /// Selector for a service in the default namespace
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            namespace: None,
            labels: BTreeMap::new(),
        }
    }

    /// Set the namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Build from a group's discovery settings; the group namespace wins over
    /// the gateway-wide override
    #[must_use]
    pub fn from_definition(definition: &GroupDiscoveryDefinition, namespace: Option<&str>) -> Self {
        Self {
            service: definition.service.clone(),
            namespace: definition
                .namespace
                .clone()
                .or_else(|| namespace.map(ToString::to_string)),
            labels: definition.labels.clone(),
        }
    }
}

/// A change reported by a watch.
///
/// `Added` and `Modified` carry the full address set of the service after
/// the change; `Deleted` carries only the addresses that went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The service appeared
    Added(Vec<ServiceEndpoint>),
    /// The service's addresses changed
    Modified(Vec<ServiceEndpoint>),
    /// Addresses went away
    Deleted(Vec<ServiceEndpoint>),
    /// Progress marker with no membership change
    Bookmark,
}

/// Stream of watch events
pub type WatchStream = BoxStream<'static, Result<WatchEvent, DiscoveryError>>;

/// Source of service addresses
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// List the current addresses once
    async fn list_once(&self, selector: &ServiceSelector)
        -> Result<Vec<ServiceEndpoint>, DiscoveryError>;

    /// Subscribe to address changes
    async fn watch(&self, selector: &ServiceSelector) -> Result<WatchStream, DiscoveryError>;
}
