//! # Gateway Telemetry
//!
//! Observability for the API gateway.
//!
//! This crate provides:
//! - Structured logging setup (JSON, pretty or compact)
//! - Prometheus metrics for requests, authentication and upstream calls

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

// Re-export main types
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use metrics::Metrics;
