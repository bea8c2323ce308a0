//! # Gateway Config
//!
//! Configuration management for the API gateway.
//!
//! This crate provides:
//! - The serde configuration model (server, logging, upstream, CORS, schemes, routes)
//! - Loading from YAML, TOML or JSON files with environment overrides
//! - Field validation and cross-reference checks
//! - File watching for route hot reload

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod model;
pub mod watcher;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, ConfigFormat, ConfigLoader, CONFIG_PATH_ENV};
pub use model::{
    AuthConfig, CorsConfig, GatewayConfig, KeyConfig, KeyKind, LoggingSettings, RouteConfig,
    SchemeConfig, ServerConfig, UpstreamConfig, UpstreamTarget,
};
pub use watcher::ConfigWatcher;
