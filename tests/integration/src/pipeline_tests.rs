//! Processor chain integration tests
//!
//! The dynamic routing processor running inside a chain with other steps,
//! hooks and the telemetry hook.

use crate::fixtures::*;
use crate::helpers::*;
use async_trait::async_trait;
use gateway_core::{
    attributes, ChainOutcome, ExecutionContext, ExecutionFailure, GatewayError, GatewayResult,
    Interruption, Processor, ProcessorChain, ProcessorFactory, ProcessorHook, ProxyRequest,
};
use gateway_routing::{DynamicRoutingProcessor, EndpointManager, ProxyEndpoint};
use gateway_telemetry::{GatewayMetrics, TracingHook};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

const CHAIN: &str = "before-api-execution";

/// Copies the `x-route` header into the routing expression
struct RouteFromHeader;

#[async_trait]
impl Processor for RouteFromHeader {
    fn id(&self) -> &str {
        "policy-route-from-header"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> GatewayResult<()> {
        let route = ctx
            .request()
            .headers()
            .get("x-route")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(route) = route {
            ctx.put_internal_attribute(attributes::ATTR_INTERNAL_ROUTING_EXPRESSION, route);
        }
        Ok(())
    }
}

/// Records that it ran
struct Marker(&'static str);

#[async_trait]
impl Processor for Marker {
    fn id(&self) -> &str {
        self.0
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> GatewayResult<()> {
        ctx.put_attribute(self.0, true);
        Ok(())
    }
}

/// Fails with a fault
struct Broken;

#[async_trait]
impl Processor for Broken {
    fn id(&self) -> &str {
        "broken"
    }

    async fn execute(&self, _ctx: &mut ExecutionContext) -> GatewayResult<()> {
        Err(GatewayError::processor("broken", "boom"))
    }
}

/// Records hook calls as `kind:processor`
#[derive(Default)]
struct RecordingHook {
    calls: Mutex<Vec<String>>,
}

impl RecordingHook {
    fn record(&self, kind: &str, processor_id: &str) {
        self.calls.lock().unwrap().push(format!("{kind}:{processor_id}"));
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessorHook for RecordingHook {
    fn id(&self) -> &str {
        "hook-recording"
    }

    fn pre(&self, _chain_id: &str, processor_id: &str, _ctx: &ExecutionContext) {
        self.record("pre", processor_id);
    }

    fn post(&self, _chain_id: &str, processor_id: &str, _ctx: &ExecutionContext) {
        self.record("post", processor_id);
    }

    fn error(
        &self,
        _chain_id: &str,
        processor_id: &str,
        _ctx: &ExecutionContext,
        _error: &GatewayError,
    ) {
        self.record("error", processor_id);
    }

    fn interrupted(&self, _chain_id: &str, processor_id: &str, _ctx: &ExecutionContext) {
        self.record("interrupted", processor_id);
    }
}

fn routing(manager: &EndpointManager) -> Arc<dyn Processor> {
    Arc::new(DynamicRoutingProcessor::new(manager.resolver()))
}

fn chain(manager: &EndpointManager, hook: Arc<RecordingHook>) -> ProcessorChain {
    ProcessorChain::new(
        CHAIN,
        [
            Arc::new(RouteFromHeader) as Arc<dyn Processor>,
            routing(manager),
            Arc::new(Marker("after-routing")),
        ],
    )
    .with_hooks([hook as Arc<dyn ProcessorHook>])
}

#[tokio::test]
async fn test_routing_expression_from_policy() {
    init_tracing();
    let manager = deploy(&simple_api());
    let hook = Arc::new(RecordingHook::default());
    let chain = chain(&manager, Arc::clone(&hook));

    let mut ctx = ExecutionContext::new(
        gateway_core::Request::builder()
            .path("/ignored")
            .header("x-route", "local:/orders")
            .query("page=2")
            .build(),
    );
    assert_eq!(chain.execute(&mut ctx).await, ChainOutcome::Completed);

    let proxy = ctx
        .internal_attribute::<ProxyRequest>(attributes::ATTR_INTERNAL_PROXY_REQUEST)
        .unwrap();
    assert_eq!(proxy.uri(), "http://host:8080/test/orders");
    assert_eq!(proxy.parameters().get("page"), Some("2"));

    let resolved = ctx
        .internal_attribute::<ProxyEndpoint>(attributes::ATTR_INTERNAL_RESOLVED_ENDPOINT)
        .unwrap();
    assert_eq!(resolved.endpoint().name(), "local");
    assert_eq!(ctx.metrics().endpoint.as_deref(), Some("local"));
    assert_eq!(ctx.attribute("after-routing"), Some(&serde_json::json!(true)));
    assert_eq!(hook.calls().len(), 6);
}

#[tokio::test]
async fn test_unresolved_expression_interrupts_chain() {
    let manager = deploy(&simple_api());
    let hook = Arc::new(RecordingHook::default());
    let chain = chain(&manager, Arc::clone(&hook));

    let mut ctx = ExecutionContext::new(
        gateway_core::Request::builder()
            .header("x-route", "missing:/orders")
            .build(),
    );
    assert_eq!(chain.execute(&mut ctx).await, ChainOutcome::Interrupted);

    assert_eq!(ctx.interruption(), Some(Interruption::Failed));
    let failure = ctx
        .internal_attribute::<ExecutionFailure>(attributes::ATTR_INTERNAL_EXECUTION_FAILURE)
        .unwrap();
    assert_eq!(failure.status_code, 503);
    assert_eq!(failure.key.as_deref(), Some("NO_ENDPOINT_AVAILABLE"));
    assert!(!ctx.has_internal_attribute(attributes::ATTR_INTERNAL_PROXY_REQUEST));
    assert!(ctx.attribute("after-routing").is_none());

    assert_eq!(
        hook.calls(),
        vec![
            "pre:policy-route-from-header",
            "post:policy-route-from-header",
            "pre:processor-dynamic-routing",
            "post:processor-dynamic-routing",
            "interrupted:processor-dynamic-routing",
        ]
    );
}

#[tokio::test]
async fn test_processor_fault_becomes_failure() {
    let manager = deploy(&simple_api());
    let hook = Arc::new(RecordingHook::default());
    let chain = ProcessorChain::new(
        CHAIN,
        [Arc::new(Broken) as Arc<dyn Processor>, routing(&manager)],
    )
    .with_hooks([Arc::clone(&hook) as Arc<dyn ProcessorHook>]);

    let mut ctx = context_for("/orders");
    assert_eq!(chain.execute(&mut ctx).await, ChainOutcome::Interrupted);

    let failure = ctx.execution_failure().unwrap();
    assert_eq!(failure.status_code, 500);
    assert_eq!(failure.key.as_deref(), Some("PROCESSOR_ERROR"));
    assert!(!ctx.has_internal_attribute(attributes::ATTR_INTERNAL_RESOLVED_ENDPOINT));
    assert_eq!(
        hook.calls(),
        vec!["pre:broken", "error:broken", "interrupted:broken"]
    );
}

#[tokio::test]
async fn test_factories_returning_nothing_are_skipped() {
    let manager = deploy(&simple_api());
    let resolver = manager.resolver();
    let factories: Vec<Box<dyn ProcessorFactory>> = vec![
        Box::new(|| -> Option<Arc<dyn Processor>> { None }),
        Box::new(move || {
            Some(Arc::new(DynamicRoutingProcessor::new(resolver.clone())) as Arc<dyn Processor>)
        }),
        Box::new(|| -> Option<Arc<dyn Processor>> { None }),
    ];

    let chain = ProcessorChain::from_factories(CHAIN, &factories);
    assert_eq!(chain.processor_ids().collect::<Vec<_>>(), vec!["processor-dynamic-routing"]);

    let mut ctx = context_for("/orders");
    assert_eq!(chain.execute(&mut ctx).await, ChainOutcome::Completed);
    assert!(ctx.has_internal_attribute(attributes::ATTR_INTERNAL_PROXY_REQUEST));
}

#[tokio::test]
async fn test_interrupted_context_skips_next_chain() {
    let manager = deploy(&simple_api());
    let hook = Arc::new(RecordingHook::default());
    let chain = chain(&manager, Arc::clone(&hook));

    let mut ctx = context_for("/orders");
    ctx.interrupt();
    assert_eq!(chain.execute(&mut ctx).await, ChainOutcome::Interrupted);
    assert!(hook.calls().is_empty());
    assert!(ctx.execution_failure().is_none());
}

#[tokio::test]
async fn test_tracing_hook_counts_steps() {
    let manager = deploy(&simple_api());
    let metrics = Arc::new(GatewayMetrics::new().unwrap());
    let hook: Arc<dyn ProcessorHook> =
        Arc::new(TracingHook::new().with_metrics(Arc::clone(&metrics)));
    let chain = ProcessorChain::new(CHAIN, [routing(&manager)]).with_hooks([hook]);

    let mut ok = context_for("/orders");
    chain.execute(&mut ok).await;
    let mut missing = context_for("/orders");
    missing.put_internal_attribute(
        attributes::ATTR_INTERNAL_ROUTING_EXPRESSION,
        "missing:/orders".to_string(),
    );
    chain.execute(&mut missing).await;

    assert_eq!(metrics.executions(CHAIN, DynamicRoutingProcessor::ID), 2);
    assert_eq!(metrics.interruptions(CHAIN), 1);
    assert!(metrics.gather().unwrap().contains("gateway_chain_interruptions_total"));
}

#[tokio::test]
async fn test_populate_then_route() {
    let manager = deploy(&simple_api());
    let mut ctx = context_for("/orders");
    manager.populate(&mut ctx);

    let prefix = ctx.attribute(attributes::ATTR_ENDPOINTS).unwrap()["local"]
        .as_str()
        .unwrap()
        .to_string();
    ctx.put_internal_attribute(
        attributes::ATTR_INTERNAL_ROUTING_EXPRESSION,
        format!("{prefix}/items"),
    );

    let chain = ProcessorChain::new(CHAIN, [routing(&manager)]);
    assert_eq!(chain.execute(&mut ctx).await, ChainOutcome::Completed);
    let proxy = ctx
        .internal_attribute::<ProxyRequest>(attributes::ATTR_INTERNAL_PROXY_REQUEST)
        .unwrap();
    assert_eq!(proxy.uri(), "http://host:8080/test/items");
}
