//! Per-request admission pipeline.
//!
//! A request moves through `ReceivedRequest -> RouteResolved -> Authenticated
//! -> Dispatched -> ResponseSent`, or short-circuits to `CorsPreflight` or
//! `Errored`. Every failure leaves as exactly one error response and the
//! downstream service is never called for a rejected request.

use crate::error::ApiError;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use gateway_core::{GatewayError, GatewayRequest, PipelineStage, Principal, RequestId};
use gateway_proxy::Dispatcher;
use gateway_routing::{AuthRequirement, RouteMatch, SharedRouteTable};
use gateway_security::{AuthPolicy, Authenticator};
use gateway_telemetry::Metrics;
use std::sync::Arc;
use tracing::{debug, field, info_span, warn, Instrument};

/// Route label used when no route matched.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Request pipeline shared by every connection.
pub struct GatewayPipeline {
    routes: Arc<SharedRouteTable>,
    authenticator: Arc<dyn Authenticator>,
    dispatcher: Arc<dyn Dispatcher>,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for GatewayPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayPipeline")
            .field("routes", &self.routes.load().len())
            .finish_non_exhaustive()
    }
}

impl GatewayPipeline {
    /// Create a pipeline.
    pub fn new(
        routes: Arc<SharedRouteTable>,
        authenticator: Arc<dyn Authenticator>,
        dispatcher: Arc<dyn Dispatcher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            routes,
            authenticator,
            dispatcher,
            metrics,
        }
    }

    /// Route table in use
    pub fn routes(&self) -> &Arc<SharedRouteTable> {
        &self.routes
    }

    /// Run `request` through the pipeline and produce exactly one response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| {
                RequestId::from_header_or_generate(
                    request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok()),
                )
            });

        let span = info_span!(
            "gateway_request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            route = field::Empty,
        );

        let method = request.method().clone();
        let request = GatewayRequest::new(request, request_id);

        async move {
            let mut route_id = None;
            let response = match self.run(request, &mut route_id).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(
                        kind = err.kind().as_str(),
                        status = err.status_code().as_u16(),
                        error = %err,
                        "Request rejected"
                    );
                    ApiError::from(err).into_response()
                }
            };

            self.metrics.record_request(
                route_id.as_deref().unwrap_or(UNMATCHED_ROUTE),
                method.as_str(),
                response.status().as_u16(),
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        mut request: GatewayRequest<Body>,
        route_id: &mut Option<String>,
    ) -> Result<Response, GatewayError> {
        if request.is_cors_preflight() {
            request.context.advance(PipelineStage::CorsPreflight)?;
            debug!("Answering CORS preflight");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }

        let route = match self.routes.load().resolve(request.path(), request.method()) {
            Ok(route) => route,
            Err(e) => {
                request.context.fail();
                return Err(e.into());
            }
        };

        let id = route.rule().id().to_string();
        tracing::Span::current().record("route", id.as_str());
        request.context.route_id = Some(id.clone());
        *route_id = Some(id);
        request.context.advance(PipelineStage::RouteResolved)?;

        let principal = match self.authenticate(&route, &request) {
            Ok(principal) => principal,
            Err(e) => {
                request.context.fail();
                return Err(e);
            }
        };

        let rule = route.rule();
        if !principal_has_scopes(&principal, rule.required_scopes()) {
            request.context.fail();
            return Err(GatewayError::Forbidden {
                route: rule.id().to_string(),
            });
        }

        debug!(
            subject = principal.subject().unwrap_or("anonymous"),
            scheme = principal.scheme.as_deref().unwrap_or("none"),
            "Request admitted"
        );
        request.context.principal = Some(principal);
        request.context.advance(PipelineStage::Authenticated)?;
        request.context.advance(PipelineStage::Dispatched)?;

        let mut context = request.context.clone();
        let started = std::time::Instant::now();
        match self.dispatcher.forward(&route, request).await {
            Ok(response) => {
                self.metrics.observe_upstream(rule.id(), started.elapsed());
                context.advance(PipelineStage::ResponseSent)?;
                Ok(response)
            }
            Err(e) => {
                context.fail();
                self.metrics.record_upstream_error(e.kind_label());
                warn!(
                    target_authority = e.target(),
                    kind = e.kind_label(),
                    error = %e,
                    "Downstream call failed"
                );
                Err(e.into())
            }
        }
    }

    fn authenticate(
        &self,
        route: &RouteMatch,
        request: &GatewayRequest<Body>,
    ) -> Result<Principal, GatewayError> {
        let rule = route.rule();
        let policy = match rule.auth() {
            AuthRequirement::None => return Ok(Principal::anonymous()),
            AuthRequirement::AnyScheme => AuthPolicy::any(),
            AuthRequirement::Schemes(names) => AuthPolicy::named(names),
        }
        .with_anonymous(rule.allow_anonymous());

        self.authenticator
            .authenticate(&policy, request.bearer_token(), Utc::now())
            .map_err(|e| {
                warn!(kind = e.kind_label(), "Authentication failed");
                self.metrics.record_auth_failure(e.kind_label());
                e.into()
            })
    }
}

/// Anonymous principals hold no scopes, so any scope requirement rejects them.
fn principal_has_scopes(principal: &Principal, required: &[String]) -> bool {
    if required.is_empty() {
        return true;
    }
    !principal.is_anonymous() && principal.claims.has_any_scope(required)
}
