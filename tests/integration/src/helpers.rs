//! Test helper utilities for integration tests

use gateway_config::{ApiDefinition, DiscoveryConfig};
use gateway_discovery::{DiscoveryService, EndpointIdentity, InMemoryDiscoveryClient};
use gateway_routing::EndpointManager;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Deploy `api` on a gateway without tenant
pub fn deploy(api: &ApiDefinition) -> Arc<EndpointManager> {
    deploy_for_tenant(api, None)
}

/// Deploy `api` on a gateway serving `tenant`
pub fn deploy_for_tenant(api: &ApiDefinition, tenant: Option<&str>) -> Arc<EndpointManager> {
    let manager = EndpointManager::new(&api.id, tenant.map(str::to_string));
    manager.start(api).expect("Failed to deploy api");
    Arc::new(manager)
}

/// A deployed API watched through an in-memory discovery source
pub struct DiscoveryHarness {
    /// Discovery source driven by the test
    pub client: Arc<InMemoryDiscoveryClient>,
    /// Endpoint manager of the deployed API
    pub manager: Arc<EndpointManager>,
    /// Watch service
    pub service: DiscoveryService,
}

impl DiscoveryHarness {
    /// Deploy `api` and start its discovery watches.
    ///
    /// `seed` is what the initial listing returns.
    pub async fn start(
        api: &ApiDefinition,
        seed: Vec<gateway_discovery::ServiceEndpoint>,
        drain_delay: Duration,
    ) -> Self {
        let client = Arc::new(InMemoryDiscoveryClient::new());
        for group in &api.groups {
            if let Some(discovery) = &group.discovery {
                client.set_endpoints(&discovery.service, seed.clone());
            }
        }

        let manager = deploy(api);
        let service = DiscoveryService::new(
            client.clone(),
            DiscoveryConfig::default().with_drain_delay(drain_delay),
        );
        let watched = service.watch_api(&manager, api);

        let harness = Self {
            client,
            manager,
            service,
        };
        harness.wait_until(|h| h.client.watch_calls() == watched).await;
        harness
    }

    /// Identity the reconciler gives to `address:80` in `group`
    pub fn identity(group: &str, address: &str) -> EndpointIdentity {
        EndpointIdentity::derive(group, "http", address, 80)
    }

    /// Yield to background tasks until `condition` holds
    pub async fn wait_until(&self, condition: impl Fn(&Self) -> bool) {
        for _ in 0..200 {
            if condition(self) {
                return;
            }
            tokio::task::yield_now().await;
        }
        assert!(condition(self), "condition not reached");
    }

    /// Let background tasks drain their queues
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
}
