//! Routing error types.

use gateway_core::GatewayError;
use http::Method;

/// Resolution failure for one request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// No pattern matched the path.
    #[error("No route matched path {path}")]
    NoRouteMatched {
        /// Inbound path
        path: String,
    },

    /// Patterns matched but none allows the method.
    #[error("Method {method} not allowed for path {path}")]
    MethodNotAllowed {
        /// Inbound path
        path: String,
        /// Inbound method
        method: Method,
        /// Union of methods allowed by the matching routes
        allowed: Vec<Method>,
    },
}

impl From<RouteError> for GatewayError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::NoRouteMatched { path } => GatewayError::NoRouteMatched { path },
            RouteError::MethodNotAllowed {
                method, allowed, ..
            } => GatewayError::MethodNotAllowed { method, allowed },
        }
    }
}

/// Route table construction failure, fatal at startup and rejected on reload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteBuildError {
    /// The path pattern is invalid.
    #[error("Route {route}: invalid pattern {pattern}: {message}")]
    InvalidPattern {
        /// Route id
        route: String,
        /// Offending pattern
        pattern: String,
        /// Reason
        message: String,
    },

    /// The downstream path template is invalid.
    #[error("Route {route}: invalid downstream path {template}: {message}")]
    InvalidTemplate {
        /// Route id
        route: String,
        /// Offending template
        template: String,
        /// Reason
        message: String,
    },

    /// A method name is not a valid HTTP token.
    #[error("Route {route}: invalid method {method}")]
    InvalidMethod {
        /// Route id
        route: String,
        /// Offending method
        method: String,
    },

    /// Two routes share an id.
    #[error("Duplicate route id: {0}")]
    DuplicateId(String),

    /// A route names a scheme the running gateway does not have.
    #[error("Route {route}: unknown scheme {scheme}")]
    UnknownScheme {
        /// Route id
        route: String,
        /// Offending scheme name
        scheme: String,
    },
}
