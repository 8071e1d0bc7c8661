//! # Gateway Telemetry
//!
//! Observability for the APIM gateway.
//!
//! This crate provides:
//! - Tracing subscriber setup with optional OpenTelemetry export
//! - A processor hook that logs and counts every chain step
//! - Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod hook;
pub mod metrics;
pub mod tracing_setup;

// Re-export main types
pub use hook::TracingHook;
pub use metrics::{GatewayMetrics, MetricsError};
pub use tracing_setup::{init_tracing, shutdown_tracing, TracingConfig, TracingError};
