//! # Gateway Server
//!
//! HTTP server and request-admission pipeline for the API gateway.
//!
//! This crate provides:
//! - The per-request [`GatewayPipeline`] state machine
//! - Error serialization with authentication challenge headers
//! - Axum router with admin endpoints and a proxy fallback
//! - Request id, in-flight tracking and optional CORS middleware
//! - Graceful shutdown handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use error::{ApiError, AuthFailure, ServerError};
pub use pipeline::GatewayPipeline;
pub use routes::create_router;
pub use server::Server;
pub use shutdown::{
    shutdown_signal, RequestGuard, ShutdownConfig, ShutdownCoordinator, ShutdownPhase,
};
pub use state::{AppState, AppStateBuilder};
