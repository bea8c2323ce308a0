//! Prometheus metrics.
//!
//! Each [`Metrics`] owns its registry so independent gateways (and tests)
//! never collide on metric names.

use prometheus::{
    histogram_opts, opts, Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder,
};
use std::time::Duration;

/// Upstream latency buckets in seconds.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Gateway metrics
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    auth_failures_total: IntCounterVec,
    upstream_errors_total: IntCounterVec,
    upstream_duration_seconds: HistogramVec,
}

impl Metrics {
    /// Create and register the gateway metrics.
    ///
    /// # Errors
    /// Returns error if a metric cannot be registered
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            opts!("gateway_requests_total", "Requests handled by the gateway"),
            &["route", "method", "status"],
        )?;
        let auth_failures_total = IntCounterVec::new(
            opts!(
                "gateway_auth_failures_total",
                "Rejected authentication attempts by deciding failure kind"
            ),
            &["kind"],
        )?;
        let upstream_errors_total = IntCounterVec::new(
            opts!(
                "gateway_upstream_errors_total",
                "Failed downstream calls by error kind"
            ),
            &["kind"],
        )?;
        let upstream_duration_seconds = HistogramVec::new(
            histogram_opts!(
                "gateway_upstream_duration_seconds",
                "Time until the downstream response head",
                LATENCY_BUCKETS.to_vec()
            ),
            &["route"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(auth_failures_total.clone()))?;
        registry.register(Box::new(upstream_errors_total.clone()))?;
        registry.register(Box::new(upstream_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            auth_failures_total,
            upstream_errors_total,
            upstream_duration_seconds,
        })
    }

    /// Count a finished request.
    pub fn record_request(&self, route: &str, method: &str, status: u16) {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[route, method, status.as_str()])
            .inc();
    }

    /// Count a rejected authentication.
    pub fn record_auth_failure(&self, kind: &str) {
        self.auth_failures_total.with_label_values(&[kind]).inc();
    }

    /// Count a failed downstream call.
    pub fn record_upstream_error(&self, kind: &str) {
        self.upstream_errors_total.with_label_values(&[kind]).inc();
    }

    /// Observe the time until a downstream response head.
    pub fn observe_upstream(&self, route: &str, elapsed: Duration) {
        self.upstream_duration_seconds
            .with_label_values(&[route])
            .observe(elapsed.as_secs_f64());
    }

    /// Registry backing these metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode every metric in the Prometheus text format.
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
