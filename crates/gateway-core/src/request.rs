//! The per-request unit of work.
//!
//! A [`GatewayRequest`] owns the inbound request head, its body stream and a
//! [`RequestContext`] scratch area that pipeline stages populate as the
//! request moves through the admission state machine.

use crate::claims::Principal;
use crate::error::GatewayError;
use crate::types::RequestId;
use http::{HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// State of a request inside the admission pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Request accepted by the listener.
    ReceivedRequest,
    /// CORS preflight answered without authentication (terminal).
    CorsPreflight,
    /// A route rule was selected.
    RouteResolved,
    /// A principal (possibly anonymous) was established.
    Authenticated,
    /// Request forwarded to the downstream target.
    Dispatched,
    /// Upstream response handed back to the client (terminal).
    ResponseSent,
    /// A stage failed; an error response is produced (terminal).
    Errored,
}

impl PipelineStage {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::CorsPreflight | Self::ResponseSent | Self::Errored)
    }

    /// Whether `next` directly follows this stage.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Errored {
            return true;
        }
        matches!(
            (self, next),
            (Self::ReceivedRequest, Self::CorsPreflight)
                | (Self::ReceivedRequest, Self::RouteResolved)
                | (Self::RouteResolved, Self::Authenticated)
                | (Self::Authenticated, Self::Dispatched)
                | (Self::Dispatched, Self::ResponseSent)
        )
    }

    /// Label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReceivedRequest => "received_request",
            Self::CorsPreflight => "cors_preflight",
            Self::RouteResolved => "route_resolved",
            Self::Authenticated => "authenticated",
            Self::Dispatched => "dispatched",
            Self::ResponseSent => "response_sent",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable scratch area populated by the pipeline stages.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id
    pub request_id: RequestId,
    /// Current stage
    pub stage: PipelineStage,
    /// Id of the resolved route
    pub route_id: Option<String>,
    /// Established principal
    pub principal: Option<Principal>,
    /// When the request was received
    pub received_at: Instant,
}

impl RequestContext {
    /// Fresh context in [`PipelineStage::ReceivedRequest`].
    #[must_use]
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            stage: PipelineStage::ReceivedRequest,
            route_id: None,
            principal: None,
            received_at: Instant::now(),
        }
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn advance(&mut self, next: PipelineStage) -> Result<(), GatewayError> {
        if !self.stage.can_transition_to(next) {
            return Err(GatewayError::internal(format!(
                "invalid pipeline transition {} -> {}",
                self.stage, next
            )));
        }
        tracing::trace!(
            request_id = %self.request_id,
            from = %self.stage,
            to = %next,
            "Pipeline transition"
        );
        self.stage = next;
        Ok(())
    }

    /// Record a failure. Always succeeds from a non-terminal stage.
    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = PipelineStage::Errored;
        }
    }
}

/// Inbound request travelling through the pipeline.
#[derive(Debug)]
pub struct GatewayRequest<B> {
    /// Request head
    pub parts: http::request::Parts,
    /// Body stream, forwarded untouched
    pub body: B,
    /// Pipeline scratch
    pub context: RequestContext,
}

impl<B> GatewayRequest<B> {
    /// Wrap an `http::Request`.
    pub fn new(request: http::Request<B>, request_id: RequestId) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            body,
            context: RequestContext::new(request_id),
        }
    }

    /// Request method
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Request URI
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Request path
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Token from an `Authorization: Bearer <token>` header.
    ///
    /// Any other authorization scheme counts as absent credentials.
    pub fn bearer_token(&self) -> Option<&str> {
        bearer_token(&self.parts.headers)
    }

    /// Whether this is a CORS preflight request.
    pub fn is_cors_preflight(&self) -> bool {
        self.parts.method == Method::OPTIONS
            && self.parts.headers.contains_key(http::header::ORIGIN)
            && self
                .parts
                .headers
                .contains_key(http::header::ACCESS_CONTROL_REQUEST_METHOD)
    }

    /// Reassemble an `http::Request`, dropping the context.
    pub fn into_http(self) -> http::Request<B> {
        http::Request::from_parts(self.parts, self.body)
    }
}

/// Extract a bearer token from headers.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
