//! Forwarding requests to downstream targets.
//!
//! The [`ProxyDispatcher`] owns one pooled HTTP/1.1 client shared by every
//! route plus one bulkhead per downstream authority. Request and response
//! bodies are streamed; nothing is buffered.

use crate::error::DispatchError;
use crate::headers::{prepare_request_headers, strip_hop_by_hop};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use dashmap::DashMap;
use gateway_config::UpstreamConfig;
use gateway_core::GatewayRequest;
use gateway_resilience::{Bulkhead, BulkheadConfig, BulkheadStats};
use gateway_routing::RouteMatch;
use http::{Request, Response, Uri, Version};
use http_body_util::BodyExt;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Response relayed from a downstream target.
pub type UpstreamResponse = Response<Body>;

/// Forwards a routed request downstream.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Forward `request` according to `route` and return the streamed response.
    async fn forward(
        &self,
        route: &RouteMatch,
        request: GatewayRequest<Body>,
    ) -> Result<UpstreamResponse, DispatchError>;
}

/// Outbound client settings.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Default wait for the response head; routes may override
    pub timeout: Duration,
    /// Idle pooled connection lifetime
    pub pool_idle_timeout: Duration,
    /// Idle pooled connections kept per host
    pub pool_max_idle_per_host: usize,
    /// Per-target concurrency limits
    pub bulkhead: BulkheadConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::from(&UpstreamConfig::default())
    }
}

impl From<&UpstreamConfig> for ProxyConfig {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            timeout: config.timeout,
            pool_idle_timeout: config.pool_idle_timeout,
            pool_max_idle_per_host: config.pool_max_idle_per_host,
            bulkhead: BulkheadConfig {
                max_concurrent: config.max_concurrent,
                queue_size: config.queue_size,
                queue_timeout: config.queue_timeout,
            },
        }
    }
}

/// Pooled reverse-proxy dispatcher.
#[derive(Debug)]
pub struct ProxyDispatcher {
    client: Client<HttpConnector, Body>,
    config: ProxyConfig,
    bulkheads: DashMap<String, Arc<Bulkhead>>,
}

impl ProxyDispatcher {
    /// Create a dispatcher with its own connection pool.
    pub fn new(config: ProxyConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);

        Self {
            client,
            config,
            bulkheads: DashMap::new(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Bulkhead statistics for a downstream authority, once it has been called.
    pub fn bulkhead_stats(&self, authority: &str) -> Option<BulkheadStats> {
        self.bulkheads.get(authority).map(|b| b.stats())
    }

    fn bulkhead(&self, authority: &str) -> Arc<Bulkhead> {
        if let Some(existing) = self.bulkheads.get(authority) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.bulkheads
                .entry(authority.to_string())
                .or_insert_with(|| {
                    Arc::new(Bulkhead::new(authority, self.config.bulkhead.clone()))
                })
                .value(),
        )
    }
}

impl Default for ProxyDispatcher {
    fn default() -> Self {
        Self::new(ProxyConfig::default())
    }
}

#[async_trait]
impl Dispatcher for ProxyDispatcher {
    async fn forward(
        &self,
        route: &RouteMatch,
        request: GatewayRequest<Body>,
    ) -> Result<UpstreamResponse, DispatchError> {
        let rule = route.rule();
        let authority = rule.target().authority();
        let timeout = rule.timeout().unwrap_or(self.config.timeout);

        let GatewayRequest {
            mut parts,
            body,
            context,
        } = request;

        let path_and_query = route.downstream_path_and_query(&parts.uri);
        let uri: Uri = format!("http://{authority}{path_and_query}")
            .parse()
            .map_err(|e: http::uri::InvalidUri| DispatchError::bad_gateway(&authority, e))?;

        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        prepare_request_headers(&mut parts.headers, &authority, client_ip, &context.request_id)
            .map_err(|e| DispatchError::bad_gateway(&authority, e))?;
        parts.uri = uri;
        parts.version = Version::HTTP_11;

        let permit = self
            .bulkhead(&authority)
            .acquire()
            .await
            .map_err(|source| DispatchError::Overloaded {
                target: authority.clone(),
                source,
            })?;

        debug!(
            route = rule.id(),
            upstream = %authority,
            uri = %parts.uri,
            "Forwarding request"
        );

        let started = Instant::now();
        let outbound = Request::from_parts(parts, body);
        let response = match tokio::time::timeout(timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_connect() => {
                warn!(route = rule.id(), upstream = %authority, error = %e, "Upstream unavailable");
                return Err(DispatchError::UpstreamUnavailable {
                    target: authority,
                    source: Box::new(e),
                });
            }
            Ok(Err(e)) => {
                warn!(route = rule.id(), upstream = %authority, error = %e, "Upstream transport error");
                return Err(DispatchError::bad_gateway(authority, e));
            }
            Err(_) => {
                warn!(
                    route = rule.id(),
                    upstream = %authority,
                    timeout_ms = timeout.as_millis(),
                    "Upstream timed out"
                );
                return Err(DispatchError::UpstreamTimeout {
                    target: authority,
                    timeout,
                });
            }
        };

        debug!(
            route = rule.id(),
            upstream = %authority,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis(),
            "Upstream responded"
        );

        let (mut parts, incoming) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        // The bulkhead slot stays taken until the body is finished or dropped.
        let body = incoming.map_frame(move |frame| {
            let _held = &permit;
            frame
        });

        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
