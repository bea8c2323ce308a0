//! # Gateway Proxy
//!
//! Downstream dispatch for the API gateway.
//!
//! This crate provides:
//! - The [`Dispatcher`] seam used by the request pipeline
//! - [`ProxyDispatcher`], a pooled HTTP/1.1 reverse proxy with streaming bodies
//! - Hop-by-hop header removal and `X-Forwarded-*` headers
//! - Per-target bulkheads and mapping of transport failures to gateway errors

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatcher;
pub mod error;
pub mod headers;

// Re-export main types
pub use dispatcher::{Dispatcher, ProxyConfig, ProxyDispatcher, UpstreamResponse};
pub use error::DispatchError;
