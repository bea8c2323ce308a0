//! Configuration loading.
//!
//! Files are parsed according to their extension, normalized, overlaid with
//! `GATEWAY_*` environment variables and validated before being handed out.

use crate::error::{ConfigError, ConfigResult};
use crate::model::GatewayConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// TOML (`.toml`)
    Toml,
    /// JSON (`.json`)
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Loads and validates [`GatewayConfig`] values.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env_overrides: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader without a file; yields defaults plus environment overrides.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: None,
            env_overrides: true,
        }
    }

    /// Read configuration from `path`.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Enable or disable `GATEWAY_*` overrides.
    #[must_use]
    pub fn with_env_overrides(mut self, enabled: bool) -> Self {
        self.env_overrides = enabled;
        self
    }

    /// Configured file path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load, normalize, override and validate.
    pub async fn load(&self) -> ConfigResult<GatewayConfig> {
        let mut config = match &self.path {
            Some(path) => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ConfigError::Io {
                        path: path.clone(),
                        source,
                    })?;
                debug!(path = %path.display(), bytes = content.len(), "Read configuration file");
                Self::parse(&content, ConfigFormat::from_path(path)?, path)?
            }
            None => GatewayConfig::default(),
        };

        if self.env_overrides {
            apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
        }

        config.normalize();
        config.validate_all()?;

        info!(
            schemes = config.schemes.len(),
            routes = config.routes.len(),
            environment = %config.environment,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse `content` in the given format. `origin` is used in error messages.
    pub fn parse(content: &str, format: ConfigFormat, origin: &Path) -> ConfigResult<GatewayConfig> {
        let parse_error = |message: String| ConfigError::Parse {
            path: origin.to_path_buf(),
            message,
        };
        match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        }
    }
}

/// Overlay `GATEWAY_HOST`, `GATEWAY_PORT`, `GATEWAY_LOG_LEVEL`,
/// `GATEWAY_LOG_FORMAT` and `GATEWAY_ENVIRONMENT` onto `config`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("GATEWAY_PORT") {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: "GATEWAY_PORT".to_string(),
            message: format!("not a port number: {port}"),
        })?;
    }
    if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = lookup("GATEWAY_LOG_FORMAT") {
        config.logging.format = format.to_ascii_lowercase();
    }
    if let Some(environment) = lookup("GATEWAY_ENVIRONMENT") {
        config.environment = environment;
    }
    Ok(())
}
