//! Gateway error taxonomy.
//!
//! Every stage of the admission pipeline fails with a [`GatewayError`]. Each
//! variant maps to exactly one HTTP status and one public message; the
//! detailed cause is kept for logging and never serialized to clients.

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Boxed error used as the optional cause of a [`GatewayError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Coarse classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    /// No scheme accepted the presented credentials (or none were presented).
    AuthenticationFailed,
    /// The principal is authenticated but lacks a scope required by the route.
    Forbidden,
    /// No route pattern matched the request path.
    NoRouteMatched,
    /// A route matched the path but not the request method.
    MethodNotAllowed,
    /// The downstream target refused or could not accept a connection.
    UpstreamUnavailable,
    /// The downstream target did not answer in time.
    UpstreamTimeout,
    /// Any other transport fault while talking to the downstream target.
    BadGateway,
    /// The outbound bulkhead for the target is exhausted.
    Overloaded,
    /// Unexpected failure inside the gateway.
    Internal,
}

impl GatewayErrorKind {
    /// HTTP status emitted for this kind.
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NoRouteMatched => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::UpstreamUnavailable | Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the public `{ "message": ... }` error body.
    #[must_use]
    pub fn public_message(self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "Authentication failed.",
            Self::Forbidden => "Forbidden.",
            Self::NoRouteMatched => "No route matched.",
            Self::MethodNotAllowed => "Method not allowed.",
            Self::UpstreamUnavailable => "Upstream service unavailable.",
            Self::UpstreamTimeout => "Upstream service timed out.",
            Self::BadGateway => "Bad gateway.",
            Self::Overloaded => "Gateway overloaded.",
            Self::Internal => "Internal server error.",
        }
    }

    /// Stable label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::Forbidden => "forbidden",
            Self::NoRouteMatched => "no_route_matched",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::BadGateway => "bad_gateway",
            Self::Overloaded => "overloaded",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of any pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Authentication failed for every eligible scheme.
    #[error("Authentication failed")]
    AuthenticationFailed {
        /// The deciding failure was an expired token.
        token_expired: bool,
        /// Internal cause, never sent to clients.
        #[source]
        cause: Option<BoxError>,
    },

    /// Authenticated principal lacks a required scope.
    #[error("Principal lacks a scope required by route {route}")]
    Forbidden {
        /// Route identifier
        route: String,
    },

    /// No route matched the path.
    #[error("No route matched path {path}")]
    NoRouteMatched {
        /// Inbound path
        path: String,
    },

    /// Route matched but the method is not allowed.
    #[error("Method {method} not allowed")]
    MethodNotAllowed {
        /// Inbound method
        method: Method,
        /// Methods accepted by the matching routes
        allowed: Vec<Method>,
    },

    /// Downstream refused or failed the connection.
    #[error("Upstream {target} unavailable")]
    UpstreamUnavailable {
        /// Downstream authority
        target: String,
        /// Transport error
        #[source]
        cause: Option<BoxError>,
    },

    /// Downstream did not respond in time.
    #[error("Upstream {target} timed out after {timeout:?}")]
    UpstreamTimeout {
        /// Downstream authority
        target: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// Other transport fault.
    #[error("Bad gateway while calling {target}")]
    BadGateway {
        /// Downstream authority
        target: String,
        /// Transport error
        #[source]
        cause: Option<BoxError>,
    },

    /// Outbound bulkhead exhausted.
    #[error("Gateway overloaded for upstream {target}")]
    Overloaded {
        /// Downstream authority
        target: String,
    },

    /// Internal error.
    #[error("Internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an authentication failure.
    pub fn authentication_failed(token_expired: bool, cause: Option<BoxError>) -> Self {
        Self::AuthenticationFailed {
            token_expired,
            cause,
        }
    }

    /// Classification of this error.
    #[must_use]
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::AuthenticationFailed { .. } => GatewayErrorKind::AuthenticationFailed,
            Self::Forbidden { .. } => GatewayErrorKind::Forbidden,
            Self::NoRouteMatched { .. } => GatewayErrorKind::NoRouteMatched,
            Self::MethodNotAllowed { .. } => GatewayErrorKind::MethodNotAllowed,
            Self::UpstreamUnavailable { .. } => GatewayErrorKind::UpstreamUnavailable,
            Self::UpstreamTimeout { .. } => GatewayErrorKind::UpstreamTimeout,
            Self::BadGateway { .. } => GatewayErrorKind::BadGateway,
            Self::Overloaded { .. } => GatewayErrorKind::Overloaded,
            Self::Internal(_) => GatewayErrorKind::Internal,
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Whether the response must carry the token-expired signal.
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed {
                token_expired: true,
                ..
            }
        )
    }

    /// Methods to advertise in an `Allow` header, if any.
    #[must_use]
    pub fn allowed_methods(&self) -> Option<&[Method]> {
        match self {
            Self::MethodNotAllowed { allowed, .. } => Some(allowed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GatewayError::authentication_failed(false, None).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::NoRouteMatched {
                path: "/x".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::MethodNotAllowed {
                method: Method::DELETE,
                allowed: vec![Method::GET],
            }
            .status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            GatewayError::UpstreamUnavailable {
                target: "svc:80".to_string(),
                cause: None
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::UpstreamTimeout {
                target: "svc:80".to_string(),
                timeout: Duration::from_secs(1)
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::BadGateway {
                target: "svc:80".to_string(),
                cause: None
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Overloaded {
                target: "svc:80".to_string()
            }
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_expired_flag() {
        assert!(GatewayError::authentication_failed(true, None).is_token_expired());
        assert!(!GatewayError::authentication_failed(false, None).is_token_expired());
        assert!(!GatewayError::Forbidden {
            route: "r".to_string()
        }
        .is_token_expired());
    }

    #[test]
    fn test_public_messages_do_not_carry_detail() {
        let err = GatewayError::NoRouteMatched {
            path: "/secret/internal/path".to_string(),
        };
        assert_eq!(err.kind().public_message(), "No route matched.");
        assert!(err.to_string().contains("/secret/internal/path"));
    }

    #[test]
    fn test_source_is_preserved() {
        let cause: BoxError = "connection refused".into();
        let err = GatewayError::UpstreamUnavailable {
            target: "svc:80".to_string(),
            cause: Some(cause),
        };
        let source = err.source().expect("source present");
        assert_eq!(source.to_string(), "connection refused");
    }

    #[test]
    fn test_allowed_methods() {
        let err = GatewayError::MethodNotAllowed {
            method: Method::DELETE,
            allowed: vec![Method::GET, Method::POST],
        };
        assert_eq!(err.allowed_methods(), Some(&[Method::GET, Method::POST][..]));
        assert_eq!(GatewayError::internal("x").allowed_methods(), None);
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&GatewayErrorKind::UpstreamTimeout).unwrap(),
            "\"upstream_timeout\""
        );
        assert_eq!(GatewayErrorKind::MethodNotAllowed.to_string(), "method_not_allowed");
    }
}
