//! Upstream endpoints.

use gateway_config::EndpointDefinition;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single upstream target inside a group.
///
/// The availability flag is the only mutable state; everything else is fixed
/// at construction, so replacing an endpoint means building a new one.
pub struct Endpoint {
    name: String,
    target: String,
    weight: u32,
    backup: bool,
    tenants: Vec<String>,
    /// Name of the owning group; empty until the endpoint joins a group
    group: String,
    available: AtomicBool,
}

impl Endpoint {
    /// Create an available endpoint
    #[must_use]
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            weight: 1,
            backup: false,
            tenants: Vec::new(),
            group: String::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Build an endpoint from its definition
    #[must_use]
    pub fn from_definition(definition: &EndpointDefinition) -> Self {
        Self::new(&definition.name, &definition.target)
            .with_weight(definition.weight)
            .with_backup(definition.backup)
            .with_tenants(definition.tenants.iter().cloned())
    }

    /// Set the weight (clamped to at least 1)
    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight.max(1);
        self
    }

    /// Set the backup flag
    #[must_use]
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Set the tenants
    #[must_use]
    pub fn with_tenants(mut self, tenants: impl IntoIterator<Item = String>) -> Self {
        self.tenants = tenants.into_iter().collect();
        self
    }

    pub(crate) fn in_group(mut self, group: &str) -> Self {
        self.group = group.to_string();
        self
    }

    /// Endpoint name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured target URI, possibly with a query string
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Weight used by weighted strategies
    #[must_use]
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Whether this is a backup endpoint
    #[must_use]
    pub fn is_backup(&self) -> bool {
        self.backup
    }

    /// Tenants this endpoint is scoped to
    #[must_use]
    pub fn tenants(&self) -> &[String] {
        &self.tenants
    }

    /// Name of the owning group
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Whether group selection may pick this endpoint
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Set availability, returning the previous value
    pub fn set_available(&self, available: bool) -> bool {
        self.available.swap(available, Ordering::AcqRel)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("group", &self.group)
            .field("weight", &self.weight)
            .field("backup", &self.backup)
            .field("available", &self.is_available())
            .finish()
    }
}
