//! Route definitions for the gateway.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware, state::AppState};

/// Create the main router.
///
/// Admin endpoints live under the configured admin prefix; every other
/// request falls through to the pipeline.
pub fn create_router(state: AppState) -> Router {
    let prefix = state.config.server.admin_path().to_string();
    let cors = state.config.cors.as_ref().map(middleware::cors_layer);

    let router = Router::new()
        .nest(&prefix, admin_routes())
        .fallback(handlers::proxy)
        // Apply middleware
        .layer(axum::middleware::from_fn_with_state(
            state.shutdown.clone(),
            middleware::in_flight_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http());

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

/// Admin/management routes
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::status))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
}
