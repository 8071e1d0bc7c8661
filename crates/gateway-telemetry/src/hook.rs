//! Processor hook emitting tracing events and metrics.
//!
//! The chain already runs each processor inside an `info_span!("processor")`;
//! this hook adds the events within that span and feeds the Prometheus
//! counters when metrics are attached.

use crate::metrics::GatewayMetrics;
use gateway_core::{ExecutionContext, GatewayError, ProcessorHook};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Logs every processor step and optionally counts it
#[derive(Debug, Clone, Default)]
pub struct TracingHook {
    metrics: Option<Arc<GatewayMetrics>>,
}

impl TracingHook {
    /// Hook identifier
    pub const ID: &'static str = "hook-tracing";

    /// Create a hook that only logs
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also record into `metrics`
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl ProcessorHook for TracingHook {
    fn id(&self) -> &str {
        Self::ID
    }

    fn pre(&self, chain_id: &str, processor_id: &str, ctx: &ExecutionContext) {
        trace!(
            chain = %chain_id,
            processor = %processor_id,
            request_id = %ctx.request().id(),
            "Processor starting"
        );
    }

    fn post(&self, chain_id: &str, processor_id: &str, ctx: &ExecutionContext) {
        debug!(
            chain = %chain_id,
            processor = %processor_id,
            request_id = %ctx.request().id(),
            "Processor completed"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_execution(chain_id, processor_id);
        }
    }

    fn error(
        &self,
        chain_id: &str,
        processor_id: &str,
        ctx: &ExecutionContext,
        error: &GatewayError,
    ) {
        warn!(
            chain = %chain_id,
            processor = %processor_id,
            request_id = %ctx.request().id(),
            error = %error,
            "Processor failed"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_execution(chain_id, processor_id);
            metrics.record_error(chain_id, processor_id);
        }
    }

    fn interrupted(&self, chain_id: &str, processor_id: &str, ctx: &ExecutionContext) {
        debug!(
            chain = %chain_id,
            processor = %processor_id,
            request_id = %ctx.request().id(),
            failure = ?ctx.execution_failure().and_then(|f| f.key.as_deref()),
            "Chain interrupted"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_interruption(chain_id);
        }
    }
}
