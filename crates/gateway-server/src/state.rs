//! Shared application state.

use crate::error::ServerError;
use crate::pipeline::GatewayPipeline;
use crate::shutdown::{ShutdownConfig, ShutdownCoordinator};
use gateway_config::GatewayConfig;
use gateway_proxy::{Dispatcher, ProxyConfig, ProxyDispatcher};
use gateway_routing::SharedRouteTable;
use gateway_security::{Authenticator, SchemeSelector, SchemeSet};
use gateway_telemetry::Metrics;
use std::sync::Arc;
use std::time::Instant;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration
    pub config: Arc<GatewayConfig>,
    /// Request pipeline
    pub pipeline: Arc<GatewayPipeline>,
    /// Live route table
    pub routes: Arc<SharedRouteTable>,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
    /// Shutdown coordination
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Process start
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("pipeline", &self.pipeline)
            .field("shutdown_phase", &self.shutdown.current_phase())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Start building state
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// Seconds since the state was built
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Builder for [`AppState`]
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<GatewayConfig>,
    routes: Option<Arc<SharedRouteTable>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    metrics: Option<Arc<Metrics>>,
    shutdown: Option<Arc<ShutdownCoordinator>>,
}

impl AppStateBuilder {
    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the route table
    #[must_use]
    pub fn routes(mut self, routes: Arc<SharedRouteTable>) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Set the authenticator
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Set the dispatcher
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the metrics registry
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the shutdown coordinator
    #[must_use]
    pub fn shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Build the state.
    ///
    /// Unset parts fall back to an empty route table, an authenticator with
    /// no schemes, a proxy dispatcher from the upstream settings and fresh
    /// metrics.
    ///
    /// # Errors
    /// Returns error if metrics cannot be registered
    pub fn build(self) -> Result<AppState, ServerError> {
        let config = self.config.unwrap_or_default();

        let routes = self.routes.unwrap_or_default();
        let authenticator = self.authenticator.unwrap_or_else(|| {
            Arc::new(SchemeSelector::new(Arc::new(SchemeSet::default())))
        });
        let dispatcher = self.dispatcher.unwrap_or_else(|| {
            Arc::new(ProxyDispatcher::new(ProxyConfig::from(&config.upstream)))
        });
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(Metrics::new().map_err(|e| ServerError::State(e.to_string()))?),
        };
        let shutdown = self.shutdown.unwrap_or_else(|| {
            Arc::new(ShutdownCoordinator::new(
                ShutdownConfig::default().with_graceful_timeout(config.server.shutdown_timeout),
            ))
        });

        let pipeline = GatewayPipeline::new(
            routes.clone(),
            authenticator,
            dispatcher,
            metrics.clone(),
        );

        Ok(AppState {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            routes,
            metrics,
            shutdown,
            started_at: Instant::now(),
        })
    }
}
