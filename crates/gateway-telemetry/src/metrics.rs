//! Prometheus metrics.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Metrics error
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A collector could not be created or registered
    #[error("Failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),
    /// Exposition output is not valid UTF-8
    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

/// Gateway metric collectors, registered in their own registry
#[derive(Debug, Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    processor_executions: IntCounterVec,
    processor_errors: IntCounterVec,
    chain_interruptions: IntCounterVec,
}

impl GatewayMetrics {
    /// Create and register every collector
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let processor_executions = IntCounterVec::new(
            Opts::new(
                "gateway_processor_executions_total",
                "Processors executed, by chain and processor",
            ),
            &["chain", "processor"],
        )?;
        let processor_errors = IntCounterVec::new(
            Opts::new(
                "gateway_processor_errors_total",
                "Processors that returned an error, by chain and processor",
            ),
            &["chain", "processor"],
        )?;
        let chain_interruptions = IntCounterVec::new(
            Opts::new(
                "gateway_chain_interruptions_total",
                "Chains stopped by an interruption, by chain",
            ),
            &["chain"],
        )?;

        registry.register(Box::new(processor_executions.clone()))?;
        registry.register(Box::new(processor_errors.clone()))?;
        registry.register(Box::new(chain_interruptions.clone()))?;

        Ok(Self {
            registry,
            processor_executions,
            processor_errors,
            chain_interruptions,
        })
    }

    /// Count a processor execution
    pub fn record_execution(&self, chain: &str, processor: &str) {
        self.processor_executions
            .with_label_values(&[chain, processor])
            .inc();
    }

    /// Count a processor error
    pub fn record_error(&self, chain: &str, processor: &str) {
        self.processor_errors
            .with_label_values(&[chain, processor])
            .inc();
    }

    /// Count a chain interruption
    pub fn record_interruption(&self, chain: &str) {
        self.chain_interruptions.with_label_values(&[chain]).inc();
    }

    /// Executions recorded for a chain step
    #[must_use]
    pub fn executions(&self, chain: &str, processor: &str) -> u64 {
        self.processor_executions
            .with_label_values(&[chain, processor])
            .get()
    }

    /// Interruptions recorded for a chain
    #[must_use]
    pub fn interruptions(&self, chain: &str) -> u64 {
        self.chain_interruptions.with_label_values(&[chain]).get()
    }

    /// Underlying registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every metric in the text exposition format
    pub fn gather(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }
}
