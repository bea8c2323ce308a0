//! Test helper utilities for integration tests

use gateway_config::GatewayConfig;
use gateway_routing::{RouteTable, SharedRouteTable};
use gateway_security::{SchemeSelector, SchemeSet};
use gateway_server::{AppState, Server};
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// A port nothing is listening on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let port = listener.local_addr().expect("Failed to get local addr").port();
    drop(listener);
    port
}

/// Gateway running on an ephemeral port
pub struct TestServer {
    /// The server address
    pub addr: SocketAddr,
    /// HTTP client for making requests
    pub client: Client,
    /// Base URL for the server
    pub base_url: String,
    /// Shared state of the running gateway
    pub state: AppState,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Build the gateway from `config` the way the binary does and serve it.
    pub async fn start(config: GatewayConfig) -> Self {
        init_tracing();

        let schemes = SchemeSet::from_config(&config.schemes).expect("schemes build");
        let routes = RouteTable::from_config(&config.routes).expect("routes build");
        let state = AppState::builder()
            .routes(Arc::new(SharedRouteTable::new(routes)))
            .authenticator(Arc::new(SchemeSelector::new(Arc::new(schemes))))
            .config(config.clone())
            .build()
            .expect("state builds");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = Server::new(&config.server, state.clone());
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = shutdown_rx.await;
                    "test teardown".to_string()
                })
                .await
                .expect("Server error");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create client");

        Self {
            addr,
            client,
            base_url: format!("http://{addr}"),
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Get the full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Make a request with an optional bearer token
    pub async fn send(&self, method: reqwest::Method, path: &str, bearer: Option<&str>) -> Response {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder.send().await.expect("Request failed")
    }

    /// Make a GET request with a bearer token
    pub async fn get_with_token(&self, path: &str, token: &str) -> Response {
        self.send(reqwest::Method::GET, path, Some(token)).await
    }

    /// Parse response body as JSON
    pub async fn json_body(response: Response) -> Value {
        response.json().await.expect("Failed to parse JSON")
    }

    /// Signal shutdown and wait for the server task to finish.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("Server did not stop in time")
                .expect("Server task panicked");
        }
    }

    /// Signal shutdown without waiting
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Assert that a response has the expected status code
pub fn assert_status(response: &Response, expected: u16) {
    assert_eq!(
        response.status().as_u16(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert the generic error body
pub async fn assert_error_message(response: Response, message: &str) {
    let body = TestServer::json_body(response).await;
    assert_eq!(body, serde_json::json!({ "message": message }));
}

/// Generate a random request ID
pub fn random_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().to_string().replace('-', ""))
}
