//! # Gateway Config
//!
//! Configuration for the APIM gateway.
//!
//! Configuration is read from a YAML, TOML or JSON file, then overridden by
//! `GATEWAY_*` environment variables, then validated. It covers:
//! - Logging settings
//! - Discovery settings (drain delay, fixed port, namespace)
//! - Deployed API definitions (endpoint groups and endpoints)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod definition;
pub mod error;
pub mod loader;

pub use config::{DiscoveryConfig, GatewayConfig, LoggingConfig};
pub use definition::{
    ApiDefinition, EndpointDefinition, EndpointGroupDefinition, GroupDiscoveryDefinition,
    LoadBalancerType,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, load_config, load_from_path, parse_str, ConfigFormat};
