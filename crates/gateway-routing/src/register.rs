//! Reference register.
//!
//! Maps names to endpoint or group references for one deployed API. Reads
//! and writes may run concurrently from the request path and from discovery
//! reconciliation; there is no ordering guarantee across names.

use crate::group::EndpointGroup;
use crate::reference::Reference;
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Concurrent name to reference map
#[derive(Debug, Default)]
pub struct ReferenceRegister {
    references: DashMap<String, Reference>,
    default_group: ArcSwapOption<EndpointGroup>,
}

impl ReferenceRegister {
    /// Create an empty register
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reference under its name, replacing any previous one
    pub fn add(&self, reference: impl Into<Reference>) -> Option<Reference> {
        let reference = reference.into();
        let name = reference.name().to_string();
        debug!(name = %name, kind = reference.kind(), "Registering reference");
        self.references.insert(name, reference)
    }

    /// Unregister a name.
    ///
    /// Removing the default group also clears the default.
    pub fn remove(&self, name: &str) -> Option<Reference> {
        let (_, removed) = self.references.remove(name)?;
        if let Reference::Group(group) = &removed {
            let current = self.default_group.load_full();
            if current.is_some_and(|d| Arc::ptr_eq(&d, group)) {
                self.default_group.store(None);
            }
        }
        debug!(name = %name, kind = removed.kind(), "Unregistered reference");
        Some(removed)
    }

    /// Look a name up
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Reference> {
        self.references.get(name).map(|entry| entry.value().clone())
    }

    /// Whether a name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.references.contains_key(name)
    }

    /// Snapshot of every registered reference
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        self.references.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of registered names
    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Remove every reference and the default group
    pub fn clear(&self) {
        self.references.clear();
        self.default_group.store(None);
    }

    /// The group used when a routing expression names nothing resolvable
    #[must_use]
    pub fn default_group(&self) -> Option<Arc<EndpointGroup>> {
        self.default_group.load_full()
    }

    /// Register `group` and flag it as the default group
    pub fn set_default_group(&self, group: Arc<EndpointGroup>) {
        self.add(Arc::clone(&group));
        debug!(group = %group.name(), "Default group set");
        self.default_group.store(Some(group));
    }
}
