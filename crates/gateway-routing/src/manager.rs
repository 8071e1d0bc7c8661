//! Endpoint manager.
//!
//! Deploys an API definition into a reference register and owns the
//! endpoint lifecycle afterwards: discovery adds, updates and removes
//! endpoints through the manager so that the groups and the register stay
//! consistent. Changes are published on a broadcast channel.

use crate::endpoint::Endpoint;
use crate::group::EndpointGroup;
use crate::reference::Reference;
use crate::register::ReferenceRegister;
use crate::resolver::EndpointResolver;
use dashmap::DashMap;
use gateway_config::ApiDefinition;
use gateway_core::attributes::{ATTR_API, ATTR_ENDPOINTS};
use gateway_core::{ExecutionContext, GatewayError, GatewayResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 256;

/// Endpoint lifecycle event
#[derive(Debug, Clone)]
pub enum EndpointEvent {
    /// A new endpoint joined a group
    Added(Arc<Endpoint>),
    /// An endpoint was replaced by a new definition
    Updated(Arc<Endpoint>),
    /// An endpoint left its group
    Removed(Arc<Endpoint>),
}

impl EndpointEvent {
    /// Endpoint concerned by the event
    #[must_use]
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        match self {
            Self::Added(endpoint) | Self::Updated(endpoint) | Self::Removed(endpoint) => endpoint,
        }
    }
}

/// Owns the endpoints and groups of one deployed API
pub struct EndpointManager {
    api_id: String,
    tenant: Option<String>,
    register: Arc<ReferenceRegister>,
    groups: DashMap<String, Arc<EndpointGroup>>,
    events: broadcast::Sender<EndpointEvent>,
}

impl EndpointManager {
    /// Create a manager with an empty register
    #[must_use]
    pub fn new(api_id: impl Into<String>, tenant: Option<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api_id: api_id.into(),
            tenant,
            register: Arc::new(ReferenceRegister::new()),
            groups: DashMap::new(),
            events,
        }
    }

    /// Deployed API id
    #[must_use]
    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    /// Register shared with resolvers
    #[must_use]
    pub fn register(&self) -> &Arc<ReferenceRegister> {
        &self.register
    }

    /// Resolver over this manager's register
    #[must_use]
    pub fn resolver(&self) -> EndpointResolver {
        EndpointResolver::new(Arc::clone(&self.register))
    }

    /// Subscribe to endpoint lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<EndpointEvent> {
        self.events.subscribe()
    }

    /// Deploy every group and endpoint of `api`.
    ///
    /// Endpoints scoped to tenants other than the gateway's are skipped.
    pub fn start(&self, api: &ApiDefinition) -> GatewayResult<()> {
        if api.id != self.api_id {
            return Err(GatewayError::configuration(format!(
                "manager for api '{}' cannot deploy api '{}'",
                self.api_id, api.id
            )));
        }

        for definition in &api.groups {
            let group = Arc::new(EndpointGroup::new(&definition.name, definition.load_balancer));
            self.groups.insert(definition.name.clone(), Arc::clone(&group));
            if definition.default {
                self.register.set_default_group(Arc::clone(&group));
            } else {
                self.register.add(Arc::clone(&group));
            }

            for endpoint in &definition.endpoints {
                if !endpoint.is_deployable_for(self.tenant.as_deref()) {
                    debug!(
                        api = %self.api_id,
                        group = %definition.name,
                        endpoint = %endpoint.name,
                        tenant = ?self.tenant,
                        "Endpoint not deployed for this tenant"
                    );
                    continue;
                }
                self.add_or_update_endpoint(&definition.name, Endpoint::from_definition(endpoint))?;
            }
        }

        info!(
            api = %self.api_id,
            groups = self.groups.len(),
            references = self.register.len(),
            "API endpoints deployed"
        );
        Ok(())
    }

    /// Undeploy: clear the register and forget every group
    pub fn stop(&self) {
        self.register.clear();
        self.groups.clear();
        info!(api = %self.api_id, "API endpoints undeployed");
    }

    /// Group by name
    #[must_use]
    pub fn group(&self, name: &str) -> Option<Arc<EndpointGroup>> {
        self.groups.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Endpoint by name, as registered
    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.register
            .lookup(name)
            .and_then(|reference| reference.as_endpoint().cloned())
    }

    /// Insert or replace an endpoint in `group` and register it
    pub fn add_or_update_endpoint(
        &self,
        group: &str,
        endpoint: Endpoint,
    ) -> GatewayResult<Arc<Endpoint>> {
        let target = self
            .group(group)
            .ok_or_else(|| GatewayError::group_not_found(group))?;

        let existed = target.get(endpoint.name()).is_some();
        let endpoint = target.upsert(endpoint);
        self.register.add(Arc::clone(&endpoint));

        debug!(
            api = %self.api_id,
            group = %group,
            endpoint = %endpoint.name(),
            existed,
            "Endpoint upserted"
        );
        let event = if existed {
            EndpointEvent::Updated(Arc::clone(&endpoint))
        } else {
            EndpointEvent::Added(Arc::clone(&endpoint))
        };
        let _ = self.events.send(event);
        Ok(endpoint)
    }

    /// Remove an endpoint from its group and from the register
    pub fn remove_endpoint(&self, name: &str) -> GatewayResult<Arc<Endpoint>> {
        let endpoint = self
            .endpoint(name)
            .ok_or_else(|| GatewayError::endpoint_not_found(name))?;

        if let Some(group) = self.group(endpoint.group()) {
            group.remove(name);
        }
        self.register.remove(name);

        debug!(api = %self.api_id, group = %endpoint.group(), endpoint = %name, "Endpoint removed");
        let _ = self.events.send(EndpointEvent::Removed(Arc::clone(&endpoint)));
        Ok(endpoint)
    }

    /// Exclude an endpoint from group selection; false if unknown
    pub fn disable(&self, name: &str) -> bool {
        self.endpoint(name)
            .and_then(|endpoint| self.group(endpoint.group()))
            .is_some_and(|group| group.disable(name))
    }

    /// Make an endpoint selectable again; false if unknown
    pub fn enable(&self, name: &str) -> bool {
        self.endpoint(name)
            .and_then(|endpoint| self.group(endpoint.group()))
            .is_some_and(|group| group.enable(name))
    }

    /// The `endpoints` template variable: every group and endpoint name
    /// mapped to its routing expression prefix `"<name>:"`.
    #[must_use]
    pub fn template_variables(&self) -> BTreeMap<String, String> {
        self.register
            .references()
            .iter()
            .map(Reference::name)
            .map(|name| (name.to_string(), format!("{name}:")))
            .collect()
    }

    /// Expose the API id and the `endpoints` variable as public attributes
    pub fn populate(&self, ctx: &mut ExecutionContext) {
        ctx.put_attribute(ATTR_API, self.api_id.clone());
        let endpoints: serde_json::Map<String, serde_json::Value> = self
            .template_variables()
            .into_iter()
            .map(|(name, prefix)| (name, serde_json::Value::String(prefix)))
            .collect();
        ctx.put_attribute(ATTR_ENDPOINTS, endpoints);
        ctx.metrics_mut().api_id = Some(self.api_id.clone());
    }
}

impl std::fmt::Debug for EndpointManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointManager")
            .field("api_id", &self.api_id)
            .field("tenant", &self.tenant)
            .field("groups", &self.groups.len())
            .field("references", &self.register.len())
            .finish()
    }
}
