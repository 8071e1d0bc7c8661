//! Deployed API definitions.
//!
//! An API definition declares named endpoint groups, each holding named
//! endpoints with a configured target URI. At most one group per API is
//! flagged as the default group.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use validator::Validate;

/// Load-balancing strategy of an endpoint group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancerType {
    /// Rotate over enabled members
    #[default]
    RoundRobin,
    /// Rotate over enabled members proportionally to their weight
    WeightedRoundRobin,
    /// Pick a random enabled member
    Random,
}

/// A deployed API
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiDefinition {
    /// API identifier
    #[validate(length(min = 1, message = "api id cannot be empty"))]
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Endpoint groups
    #[serde(default)]
    #[validate(nested)]
    pub groups: Vec<EndpointGroupDefinition>,
}

impl ApiDefinition {
    /// Create an API definition with no groups
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            groups: Vec::new(),
        }
    }

    /// Add a group
    #[must_use]
    pub fn with_group(mut self, group: EndpointGroupDefinition) -> Self {
        self.groups.push(group);
        self
    }

    /// The group flagged default, if any
    #[must_use]
    pub fn default_group(&self) -> Option<&EndpointGroupDefinition> {
        self.groups.iter().find(|g| g.default)
    }

    /// Cross-field checks that derive-based validation cannot express
    pub fn validate_topology(&self) -> ConfigResult<()> {
        let defaults = self.groups.iter().filter(|g| g.default).count();
        if defaults > 1 {
            return Err(ConfigError::validation(format!(
                "api '{}' declares {defaults} default groups, at most one is allowed",
                self.id
            )));
        }

        let mut group_names = HashSet::new();
        for group in &self.groups {
            if !group_names.insert(group.name.as_str()) {
                return Err(ConfigError::validation(format!(
                    "api '{}' declares group '{}' more than once",
                    self.id, group.name
                )));
            }

            let mut endpoint_names = HashSet::new();
            for endpoint in &group.endpoints {
                if !endpoint_names.insert(endpoint.name.as_str()) {
                    return Err(ConfigError::validation(format!(
                        "group '{}' declares endpoint '{}' more than once",
                        group.name, endpoint.name
                    )));
                }
            }

            if let Some(discovery) = &group.discovery {
                if discovery.service.trim().is_empty() {
                    return Err(ConfigError::validation(format!(
                        "group '{}' enables discovery without a service name",
                        group.name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A named set of endpoints behind a load-balancing strategy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EndpointGroupDefinition {
    /// Group name
    #[validate(length(min = 1, message = "group name cannot be empty"))]
    pub name: String,

    /// Whether this is the API's default group
    #[serde(default)]
    pub default: bool,

    /// Load-balancing strategy
    #[serde(default)]
    pub load_balancer: LoadBalancerType,

    /// Statically configured endpoints
    #[serde(default)]
    #[validate(nested)]
    pub endpoints: Vec<EndpointDefinition>,

    /// Service discovery for this group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<GroupDiscoveryDefinition>,
}

impl EndpointGroupDefinition {
    /// Create a group with no endpoints
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: false,
            load_balancer: LoadBalancerType::default(),
            endpoints: Vec::new(),
            discovery: None,
        }
    }

    /// Flag as default group
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    /// Set the load-balancing strategy
    #[must_use]
    pub fn with_load_balancer(mut self, load_balancer: LoadBalancerType) -> Self {
        self.load_balancer = load_balancer;
        self
    }

    /// Add an endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: EndpointDefinition) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Enable discovery
    #[must_use]
    pub fn with_discovery(mut self, discovery: GroupDiscoveryDefinition) -> Self {
        self.discovery = Some(discovery);
        self
    }
}

/// A single upstream endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EndpointDefinition {
    /// Endpoint name, unique within its group
    #[validate(length(min = 1, message = "endpoint name cannot be empty"))]
    pub name: String,

    /// Target URI, possibly carrying query parameters
    #[validate(length(min = 1, message = "endpoint target cannot be empty"))]
    pub target: String,

    /// Weight for weighted strategies
    #[serde(default = "default_weight")]
    #[validate(range(min = 1, message = "weight must be at least 1"))]
    pub weight: u32,

    /// Backup endpoints are only selected when no primary endpoint is enabled
    #[serde(default)]
    pub backup: bool,

    /// Tenants this endpoint is deployed for; empty means every tenant
    #[serde(default)]
    pub tenants: Vec<String>,
}

impl EndpointDefinition {
    /// Create an endpoint definition
    #[must_use]
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            weight: default_weight(),
            backup: false,
            tenants: Vec::new(),
        }
    }

    /// Set the weight
    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Mark as backup
    #[must_use]
    pub fn as_backup(mut self) -> Self {
        self.backup = true;
        self
    }

    /// Restrict to tenants
    #[must_use]
    pub fn with_tenants(mut self, tenants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tenants = tenants.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this endpoint should be deployed on a gateway with `tenant`
    #[must_use]
    pub fn is_deployable_for(&self, tenant: Option<&str>) -> bool {
        match tenant {
            None => true,
            Some(tenant) => self.tenants.is_empty() || self.tenants.iter().any(|t| t == tenant),
        }
    }
}

/// Discovery settings of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDiscoveryDefinition {
    /// Discovered service name
    pub service: String,

    /// Namespace; falls back to the gateway-wide override
    #[serde(default)]
    pub namespace: Option<String>,

    /// Scheme used to build discovered targets
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Label selector
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl GroupDiscoveryDefinition {
    /// Create discovery settings for a service
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            namespace: None,
            scheme: default_scheme(),
            labels: BTreeMap::new(),
        }
    }
}

fn default_weight() -> u32 {
    1
}

fn default_scheme() -> String {
    "http".to_string()
}
