//! Load-balanced endpoint groups.
//!
//! Membership is a copy-on-write snapshot: writers publish a whole new member
//! list, so a concurrent `next()` always sees either the old list or the new
//! one, never a partial update.

use crate::endpoint::Endpoint;
use crate::strategy::{LoadBalancingStrategy, StrategyFactory};
use arc_swap::ArcSwap;
use gateway_config::LoadBalancerType;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A named set of endpoints behind a selection strategy
pub struct EndpointGroup {
    name: String,
    strategy: Box<dyn LoadBalancingStrategy>,
    members: ArcSwap<Vec<Arc<Endpoint>>>,
}

impl EndpointGroup {
    /// Create an empty group
    #[must_use]
    pub fn new(name: impl Into<String>, load_balancer: LoadBalancerType) -> Self {
        Self::with_strategy(name, StrategyFactory::create(load_balancer))
    }

    /// Create an empty group with a custom strategy
    #[must_use]
    pub fn with_strategy(
        name: impl Into<String>,
        strategy: Box<dyn LoadBalancingStrategy>,
    ) -> Self {
        Self {
            name: name.into(),
            strategy,
            members: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Group name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strategy name
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        self.strategy.name()
    }

    /// Select the next available endpoint.
    ///
    /// Backup endpoints are only considered when no primary endpoint is
    /// available.
    pub fn next(&self) -> Option<Arc<Endpoint>> {
        let members = self.members.load();

        let primaries: Vec<Arc<Endpoint>> = members
            .iter()
            .filter(|e| !e.is_backup() && e.is_available())
            .cloned()
            .collect();
        if !primaries.is_empty() {
            return self.strategy.select(&primaries);
        }

        let backups: Vec<Arc<Endpoint>> = members
            .iter()
            .filter(|e| e.is_backup() && e.is_available())
            .cloned()
            .collect();
        self.strategy.select(&backups)
    }

    /// Insert an endpoint, or replace the member with the same name in place
    pub fn upsert(&self, endpoint: Endpoint) -> Arc<Endpoint> {
        let endpoint = Arc::new(endpoint.in_group(&self.name));
        self.members.rcu(|current| {
            let mut members = Vec::clone(current);
            match members.iter().position(|e| e.name() == endpoint.name()) {
                Some(index) => members[index] = Arc::clone(&endpoint),
                None => members.push(Arc::clone(&endpoint)),
            }
            members
        });
        debug!(group = %self.name, endpoint = %endpoint.name(), "Endpoint upserted");
        endpoint
    }

    /// Remove a member by name
    pub fn remove(&self, name: &str) -> Option<Arc<Endpoint>> {
        let removed = self.get(name)?;
        self.members.rcu(|current| {
            current
                .iter()
                .filter(|e| e.name() != name)
                .cloned()
                .collect::<Vec<_>>()
        });
        debug!(group = %self.name, endpoint = %name, "Endpoint removed");
        Some(removed)
    }

    /// Make a member selectable again; returns false if no such member
    pub fn enable(&self, name: &str) -> bool {
        self.set_available(name, true)
    }

    /// Exclude a member from selection; returns false if no such member
    pub fn disable(&self, name: &str) -> bool {
        self.set_available(name, false)
    }

    fn set_available(&self, name: &str, available: bool) -> bool {
        match self.get(name) {
            Some(endpoint) => {
                if endpoint.set_available(available) != available {
                    debug!(
                        group = %self.name,
                        endpoint = %name,
                        available,
                        "Endpoint availability changed"
                    );
                }
                true
            }
            None => false,
        }
    }

    /// Member by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.members.load().iter().find(|e| e.name() == name).cloned()
    }

    /// Snapshot of all members, in insertion order
    #[must_use]
    pub fn endpoints(&self) -> Arc<Vec<Arc<Endpoint>>> {
        self.members.load_full()
    }

    /// Number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.load().len()
    }

    /// Whether the group has no members
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.load().is_empty()
    }
}

impl fmt::Debug for EndpointGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointGroup")
            .field("name", &self.name)
            .field("strategy", &self.strategy.name())
            .field("members", &self.members.load().len())
            .finish()
    }
}
