//! Top-level gateway configuration.

use crate::definition::ApiDefinition;
use crate::error::ConfigResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Tenant of this gateway; endpoints scoped to other tenants are not deployed
    #[serde(default)]
    pub tenant: Option<String>,

    /// Logging configuration
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,

    /// Discovery configuration
    #[serde(default)]
    #[validate(nested)]
    pub discovery: DiscoveryConfig,

    /// APIs to deploy
    #[serde(default)]
    #[validate(nested)]
    pub apis: Vec<ApiDefinition>,
}

impl GatewayConfig {
    /// Run derive-based and cross-field validation
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.validate()?;
        for api in &self.apis {
            api.validate_topology()?;
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1))]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Export spans through OpenTelemetry
    #[serde(default)]
    pub opentelemetry: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            opentelemetry: false,
        }
    }
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DiscoveryConfig {
    /// Delay between disabling a removed endpoint and removing it, in milliseconds
    #[serde(default = "default_drain_delay_ms")]
    pub drain_delay_ms: u64,

    /// Fixed port used for discovered endpoints instead of the advertised one
    #[serde(default)]
    pub port: Option<u16>,

    /// Namespace override applied to groups that do not set one
    #[serde(default)]
    pub namespace: Option<String>,

    /// Capacity of each group's event channel
    #[serde(default = "default_channel_capacity")]
    #[validate(range(min = 1))]
    pub channel_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            drain_delay_ms: default_drain_delay_ms(),
            port: None,
            namespace: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl DiscoveryConfig {
    /// Drain delay as a `Duration`
    #[must_use]
    pub fn drain_delay(&self) -> Duration {
        Duration::from_millis(self.drain_delay_ms)
    }

    /// Set the drain delay
    #[must_use]
    pub fn with_drain_delay(mut self, delay: Duration) -> Self {
        self.drain_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the fixed port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the namespace override
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_drain_delay_ms() -> u64 {
    10_000
}

fn default_channel_capacity() -> usize {
    64
}
