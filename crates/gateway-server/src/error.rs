//! Error serialization.
//!
//! Every pipeline failure leaves the gateway as exactly one response with a
//! JSON body `{ "message": ... }`. Only the public message is serialized;
//! internal causes stay in the logs.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{GatewayError, GatewayErrorKind};
use gateway_security::AuthError;
use serde::Serialize;

/// Header signalling that the deciding authentication failure was expiry.
pub const TOKEN_EXPIRED_HEADER: &str = "token-expired";

/// Deciding authentication failure, attached to 401 responses as a response
/// extension for in-process observers. Never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailure(pub AuthError);

/// Error body
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: &'static str,
}

/// API error returned to clients
#[derive(Debug)]
pub struct ApiError(GatewayError);

impl ApiError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self(GatewayError::internal(message))
    }

    /// Error kind
    pub fn kind(&self) -> GatewayErrorKind {
        self.0.kind()
    }

    /// HTTP status
    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    /// Underlying gateway error
    pub fn inner(&self) -> &GatewayError {
        &self.0
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let mut response = (
            kind.status_code(),
            Json(ErrorBody {
                message: kind.public_message(),
            }),
        )
            .into_response();

        match &self.0 {
            GatewayError::AuthenticationFailed {
                token_expired,
                cause,
            } => {
                let challenge = if cause.is_some() {
                    "Bearer error=\"invalid_token\""
                } else {
                    "Bearer"
                };
                let headers = response.headers_mut();
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
                if *token_expired {
                    headers.insert(TOKEN_EXPIRED_HEADER, HeaderValue::from_static("true"));
                }
                if let Some(kind) = cause.as_deref().and_then(|c| c.downcast_ref::<AuthError>()) {
                    response.extensions_mut().insert(AuthFailure(*kind));
                }
            }
            GatewayError::MethodNotAllowed { allowed, .. } if !allowed.is_empty() => {
                let allow = allowed
                    .iter()
                    .map(http::Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
            }
            _ => {}
        }

        response
    }
}

/// Server startup or runtime error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Could not bind the listener
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address
        addr: String,
        /// I/O error
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    /// Listener address unavailable
    #[error("Listener address unavailable: {0}")]
    LocalAddr(#[source] std::io::Error),

    /// Application state could not be assembled
    #[error("Invalid server state: {0}")]
    State(String),
}

impl ServerError {
    /// Bind error for `addr`
    pub fn bind(addr: impl ToString, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.to_string(),
            source,
        }
    }
}
