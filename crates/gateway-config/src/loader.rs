//! Configuration loading.
//!
//! Order of precedence: file, then `GATEWAY_*` environment variables. The
//! result is validated before being returned.

use crate::config::GatewayConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable holding the configuration file path
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// Path used when `GATEWAY_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.yaml";

const ENV_DRAIN_DELAY_MS: &str = "GATEWAY_DRAIN_DELAY_MS";
const ENV_DISCOVERY_PORT: &str = "GATEWAY_DISCOVERY_PORT";
const ENV_DISCOVERY_NAMESPACE: &str = "GATEWAY_DISCOVERY_NAMESPACE";
const ENV_TENANT: &str = "GATEWAY_TENANT";
const ENV_LOG_LEVEL: &str = "GATEWAY_LOG_LEVEL";

/// Supported configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML
    Yaml,
    /// TOML
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Load configuration from `GATEWAY_CONFIG` (or the default path).
///
/// A missing file at the default path yields the default configuration; a
/// missing file at an explicitly configured path is an error.
pub async fn load_config() -> ConfigResult<GatewayConfig> {
    let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    let path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = if explicit.is_none() && !tokio::fs::try_exists(&path).await.unwrap_or(false)
    {
        debug!(path = %path.display(), "No configuration file, using defaults");
        GatewayConfig::default()
    } else {
        read_file(&path).await?
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate_all()?;

    info!(
        path = %path.display(),
        apis = config.apis.len(),
        drain_delay_ms = config.discovery.drain_delay_ms,
        "Configuration loaded"
    );
    Ok(config)
}

/// Load and validate configuration from a file, without environment overrides
pub async fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
    let config = read_file(path.as_ref()).await?;
    config.validate_all()?;
    Ok(config)
}

async fn read_file(path: &Path) -> ConfigResult<GatewayConfig> {
    let format = ConfigFormat::from_path(path)?;
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_str(&content, format)
}

/// Parse configuration content
pub fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<GatewayConfig> {
    match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| ConfigError::parse("yaml", e))
        }
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::parse("toml", e)),
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::parse("json", e))
        }
    }
}

/// Apply `GATEWAY_*` overrides read through `lookup`
pub fn apply_env_overrides(
    config: &mut GatewayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigResult<()> {
    if let Some(value) = lookup(ENV_DRAIN_DELAY_MS) {
        config.discovery.drain_delay_ms = value.trim().parse().map_err(|e| ConfigError::Env {
            var: ENV_DRAIN_DELAY_MS,
            message: format!("{e}"),
        })?;
    }

    if let Some(value) = lookup(ENV_DISCOVERY_PORT) {
        let port = value.trim().parse().map_err(|e| ConfigError::Env {
            var: ENV_DISCOVERY_PORT,
            message: format!("{e}"),
        })?;
        config.discovery.port = Some(port);
    }

    if let Some(value) = lookup(ENV_DISCOVERY_NAMESPACE) {
        config.discovery.namespace = Some(value);
    }

    if let Some(value) = lookup(ENV_TENANT) {
        config.tenant = Some(value);
    }

    if let Some(value) = lookup(ENV_LOG_LEVEL) {
        config.logging.level = value;
    }

    Ok(())
}
