//! HTTP listener and lifecycle.

use crate::error::ServerError;
use crate::routes::create_router;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use gateway_config::ServerConfig;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Gateway HTTP server
#[derive(Debug)]
pub struct Server {
    bind_address: String,
    state: AppState,
}

impl Server {
    /// Create a server for `state` listening on the configured address.
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            bind_address: config.bind_address(),
            state,
        }
    }

    /// Shared state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Bind and serve until SIGINT or SIGTERM.
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound or the accept loop fails
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.bind_address)
            .await
            .map_err(|e| ServerError::bind(&self.bind_address, e))?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `signal` resolves, then
    /// drain in-flight requests for at most the graceful timeout.
    ///
    /// # Errors
    /// Returns error if the accept loop fails
    pub async fn serve<S>(self, listener: TcpListener, signal: S) -> Result<(), ServerError>
    where
        S: Future<Output = String> + Send + 'static,
    {
        let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        let coordinator = self.state.shutdown.clone();
        let graceful_timeout = coordinator.config().graceful_timeout;

        {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let reason = signal.await;
                coordinator.trigger_shutdown(&reason).await;
            });
        }

        info!(
            address = %addr,
            environment = %self.state.config.environment,
            routes = self.state.routes.load().len(),
            "Gateway listening"
        );

        let router = create_router(self.state);
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(coordinator.shutdown_started())
        .into_future();

        let deadline = async {
            coordinator.shutdown_started().await;
            tokio::time::sleep(graceful_timeout).await;
        };

        tokio::select! {
            result = server => result.map_err(ServerError::Serve)?,
            () = deadline => {
                warn!("Connections still open after graceful timeout, closing");
            }
        }

        info!("Gateway stopped");
        Ok(())
    }
}
