//! Tracing setup with optional OpenTelemetry export.
//!
//! Log output goes through a `fmt` layer (human-readable or JSON lines)
//! filtered by `RUST_LOG`, falling back to the configured level. When
//! OpenTelemetry is enabled, spans are also handed to an SDK tracer provider.

use gateway_config::LoggingConfig;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{
    trace::{Config, RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::collections::HashMap;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Log level or `EnvFilter` directive, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON lines
    pub json: bool,
    /// Export spans through OpenTelemetry
    pub opentelemetry: bool,
    /// Sampling rate (0.0 - 1.0)
    pub sampling_rate: f64,
    /// Additional resource attributes
    pub attributes: HashMap<String, String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "apim-gateway".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            json: false,
            opentelemetry: false,
            sampling_rate: 1.0,
            attributes: HashMap::new(),
        }
    }
}

impl TracingConfig {
    /// Create a configuration for a service
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Build from the gateway's logging section
    #[must_use]
    pub fn from_logging(logging: &LoggingConfig) -> Self {
        Self {
            log_level: logging.level.clone(),
            json: logging.json,
            opentelemetry: logging.opentelemetry,
            ..Default::default()
        }
    }

    /// Set the log level
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Emit JSON lines
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Enable OpenTelemetry export
    #[must_use]
    pub fn with_opentelemetry(mut self, enabled: bool) -> Self {
        self.opentelemetry = enabled;
        self
    }

    /// Set the sampling rate
    #[must_use]
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Add a resource attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    fn sampler(&self) -> Sampler {
        if self.sampling_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.sampling_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.sampling_rate)
        }
    }
}

/// Initialize the global subscriber.
///
/// Returns the tracer provider when OpenTelemetry is enabled; pass it to
/// `shutdown_tracing` on exit.
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init_tracing(config: &TracingConfig) -> Result<Option<TracerProvider>, TracingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let provider = config.opentelemetry.then(|| build_provider(config));
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .with(otel_layer)
        .try_init()
        .map_err(|e| TracingError::Init(e.to_string()))?;

    info!(
        service = %config.service_name,
        json = config.json,
        opentelemetry = config.opentelemetry,
        "Tracing initialized"
    );

    Ok(provider)
}

fn build_provider(config: &TracingConfig) -> TracerProvider {
    let mut attributes = vec![
        opentelemetry::KeyValue::new("service.name", config.service_name.clone()),
        opentelemetry::KeyValue::new("service.version", config.service_version.clone()),
    ];
    attributes.extend(
        config
            .attributes
            .iter()
            .map(|(k, v)| opentelemetry::KeyValue::new(k.clone(), v.clone())),
    );

    let tracer_config = Config::default()
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(Resource::new(attributes));

    TracerProvider::builder().with_config(tracer_config).build()
}

/// Shutdown tracing and flush remaining spans
pub fn shutdown_tracing(provider: Option<TracerProvider>) {
    if let Some(provider) = provider {
        for result in provider.force_flush() {
            if let Err(error) = result {
                tracing::warn!(error = %error, "Failed to flush spans");
            }
        }
        drop(provider);
        info!("Tracing shutdown complete");
    }
}

/// Tracing initialization error
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Failed to initialize tracing
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}
