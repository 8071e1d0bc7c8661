//! # APIM Gateway
//!
//! Routing core of the API gateway: deploys API definitions into endpoint
//! registers, resolves routing expressions to upstream targets, and keeps
//! discovery-backed groups in sync.
//!
//! ## Usage
//!
//! ```bash
//! # Start with config/gateway.yaml (or defaults if missing)
//! apim-gateway
//!
//! # Start with a custom config file
//! GATEWAY_CONFIG=/path/to/gateway.toml apim-gateway
//!
//! # Start with environment overrides
//! GATEWAY_DRAIN_DELAY_MS=2000 GATEWAY_TENANT=eu apim-gateway
//! ```

use anyhow::Context;
use gateway_config::{load_config, GatewayConfig};
use gateway_core::{Processor, ProcessorChain, ProcessorHook};
use gateway_discovery::{DiscoveryService, InMemoryDiscoveryClient};
use gateway_routing::{DynamicRoutingProcessor, EndpointManager};
use gateway_telemetry::{init_tracing, shutdown_tracing, GatewayMetrics, TracingConfig, TracingHook};
use std::sync::Arc;
use tracing::{error, info};

/// Chain running before the upstream call
const BEFORE_API_EXECUTION: &str = "before-api-execution";

/// A deployed API and the chain serving it
struct Deployment {
    manager: Arc<EndpointManager>,
    chain: ProcessorChain,
}

/// Application entry point
#[tokio::main]
async fn main() {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let provider = match init_tracing(&TracingConfig::from_logging(&config.logging)) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            None
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "Starting APIM gateway");

    if let Err(e) = run(config).await {
        error!(error = %e, "Application failed");
        shutdown_tracing(provider);
        std::process::exit(1);
    }

    shutdown_tracing(provider);
}

/// Main application logic
async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let metrics = Arc::new(GatewayMetrics::new().context("failed to register metrics")?);
    let hook: Arc<dyn ProcessorHook> =
        Arc::new(TracingHook::new().with_metrics(Arc::clone(&metrics)));

    let discovery = DiscoveryService::new(
        Arc::new(InMemoryDiscoveryClient::new()),
        config.discovery.clone(),
    );

    let mut deployments = Vec::with_capacity(config.apis.len());
    for api in &config.apis {
        let manager = Arc::new(EndpointManager::new(&api.id, config.tenant.clone()));
        manager
            .start(api)
            .with_context(|| format!("failed to deploy api '{}'", api.id))?;

        let watched = discovery.watch_api(&manager, api);

        let chain = routing_chain(&manager, Arc::clone(&hook));

        info!(
            api = %api.id,
            chain = %chain.id(),
            processors = chain.len(),
            discovery_groups = watched,
            endpoints = ?manager.template_variables(),
            "API deployed"
        );
        deployments.push(Deployment { manager, chain });
    }

    info!(apis = deployments.len(), "Gateway ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    discovery.stop();
    for deployment in &deployments {
        deployment.manager.stop();
        info!(api = %deployment.manager.api_id(), chain = %deployment.chain.id(), "API undeployed");
    }

    match metrics.gather() {
        Ok(exposition) => info!(metrics = %exposition, "Final metrics"),
        Err(e) => error!(error = %e, "Failed to gather metrics"),
    }

    Ok(())
}

/// Chain resolving each request of an API to its upstream endpoint
fn routing_chain(manager: &EndpointManager, hook: Arc<dyn ProcessorHook>) -> ProcessorChain {
    let routing: Arc<dyn Processor> = Arc::new(DynamicRoutingProcessor::new(manager.resolver()));
    ProcessorChain::new(BEFORE_API_EXECUTION, [routing]).with_hooks([hook])
}
