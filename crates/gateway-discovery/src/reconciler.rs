//! Membership reconciliation.
//!
//! Applies discovery snapshots and watch events to one endpoint group. The
//! reconciler only ever touches endpoints it created itself (those in its
//! known set), so statically configured endpoints are left alone.
//!
//! Rules:
//! - an empty snapshot or an add/modify event with no ready address never
//!   removes anything
//! - a delete event removes exactly the addresses it names
//! - removal disables the endpoint at once and removes it after the drain
//!   delay

use crate::client::{ServiceEndpoint, WatchEvent};
use crate::drain::DrainScheduler;
use crate::identity::EndpointIdentity;
use gateway_config::GroupDiscoveryDefinition;
use gateway_routing::{Endpoint, EndpointManager};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How discovered addresses map to endpoints of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBinding {
    /// Target group
    pub group: String,
    /// Scheme of built targets
    pub scheme: String,
    /// Fixed port overriding the advertised one
    pub port: Option<u16>,
}

impl GroupBinding {
    /// Bind discovered addresses to `group` over plain http
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            scheme: "http".to_string(),
            port: None,
        }
    }

    /// Build from a group's discovery settings
    #[must_use]
    pub fn from_definition(
        group: impl Into<String>,
        definition: &GroupDiscoveryDefinition,
        port: Option<u16>,
    ) -> Self {
        Self {
            group: group.into(),
            scheme: definition.scheme.clone(),
            port,
        }
    }

    /// Set the fixed port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    fn identity(&self, endpoint: &ServiceEndpoint) -> EndpointIdentity {
        EndpointIdentity::derive(
            &self.group,
            &self.scheme,
            &endpoint.address,
            self.port_of(endpoint),
        )
    }

    fn port_of(&self, endpoint: &ServiceEndpoint) -> u16 {
        self.port.unwrap_or(endpoint.port)
    }

    fn target(&self, endpoint: &ServiceEndpoint) -> String {
        format!("{}://{}:{}", self.scheme, endpoint.address, self.port_of(endpoint))
    }
}

/// Keeps one group in sync with a discovery source
#[derive(Debug)]
pub struct MembershipReconciler {
    binding: GroupBinding,
    manager: Arc<EndpointManager>,
    drains: DrainScheduler,
    known: BTreeSet<EndpointIdentity>,
}

impl MembershipReconciler {
    /// Create a reconciler with an empty known set
    #[must_use]
    pub fn new(
        binding: GroupBinding,
        manager: Arc<EndpointManager>,
        drain_delay: Duration,
    ) -> Self {
        Self {
            binding,
            manager,
            drains: DrainScheduler::new(drain_delay),
            known: BTreeSet::new(),
        }
    }

    /// Group binding
    #[must_use]
    pub fn binding(&self) -> &GroupBinding {
        &self.binding
    }

    /// Identities currently believed live
    #[must_use]
    pub fn known(&self) -> &BTreeSet<EndpointIdentity> {
        &self.known
    }

    /// Pending drains
    #[must_use]
    pub fn drains(&self) -> &DrainScheduler {
        &self.drains
    }

    /// Apply the initial listing
    pub fn apply_snapshot(&mut self, endpoints: &[ServiceEndpoint]) {
        let current = self.upsert_ready(endpoints);
        if current.is_empty() {
            debug!(group = %self.binding.group, "Empty discovery snapshot ignored");
            return;
        }
        info!(group = %self.binding.group, endpoints = current.len(), "Discovery snapshot applied");
        self.reconcile(current);
    }

    /// Apply a watch event
    pub fn apply_event(&mut self, event: &WatchEvent) {
        match event {
            WatchEvent::Added(endpoints) | WatchEvent::Modified(endpoints) => {
                let current = self.upsert_ready(endpoints);
                if current.is_empty() {
                    debug!(
                        group = %self.binding.group,
                        "Discovery event without ready address, removals skipped"
                    );
                    return;
                }
                self.reconcile(current);
            }
            WatchEvent::Deleted(endpoints) => {
                let deleted: BTreeSet<_> =
                    endpoints.iter().map(|e| self.binding.identity(e)).collect();
                let current = self.known.difference(&deleted).cloned().collect();
                self.reconcile(current);
            }
            WatchEvent::Bookmark => {}
        }
    }

    /// Abandon pending removals
    pub fn stop(&mut self) {
        self.drains.cancel_all();
    }

    fn upsert_ready(&self, endpoints: &[ServiceEndpoint]) -> BTreeSet<EndpointIdentity> {
        let mut current = BTreeSet::new();
        for endpoint in endpoints.iter().filter(|e| e.ready) {
            let identity = self.binding.identity(endpoint);
            if current.contains(&identity) {
                continue;
            }

            self.drains.cancel(&identity);
            let discovered = Endpoint::new(identity.as_str(), self.binding.target(endpoint));
            match self.manager.add_or_update_endpoint(&self.binding.group, discovered) {
                Ok(_) => {
                    current.insert(identity);
                }
                Err(error) => {
                    warn!(
                        group = %self.binding.group,
                        endpoint = %identity,
                        error = %error,
                        "Failed to register discovered endpoint"
                    );
                }
            }
        }
        current
    }

    fn reconcile(&mut self, mut current: BTreeSet<EndpointIdentity>) {
        let removed: Vec<_> = self.known.difference(&current).cloned().collect();
        for identity in removed {
            if self.manager.endpoint(identity.as_str()).is_none() {
                debug!(
                    group = %self.binding.group,
                    endpoint = %identity,
                    "Removed endpoint already gone"
                );
                continue;
            }
            if !self.manager.disable(identity.as_str()) {
                // Still known, so the next reconciliation retries it.
                warn!(
                    group = %self.binding.group,
                    endpoint = %identity,
                    "Failed to disable removed endpoint"
                );
                current.insert(identity);
                continue;
            }

            let manager = Arc::clone(&self.manager);
            let group = self.binding.group.clone();
            let name = identity.to_string();
            self.drains.schedule(identity.clone(), move || {
                match manager.remove_endpoint(&name) {
                    Ok(_) => info!(group = %group, endpoint = %name, "Drained endpoint removed"),
                    Err(error) => warn!(
                        group = %group,
                        endpoint = %name,
                        error = %error,
                        "Failed to remove drained endpoint"
                    ),
                }
            });
        }
        self.known = current;
    }
}

impl Drop for MembershipReconciler {
    fn drop(&mut self) {
        self.stop();
    }
}
