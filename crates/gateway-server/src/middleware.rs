//! HTTP middleware.

use crate::shutdown::{RequestGuard, ShutdownCoordinator};
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use gateway_config::CorsConfig;
use gateway_core::RequestId;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};
use tracing::warn;

/// Request id header, accepted inbound and echoed on every response
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Attach a [`RequestId`] extension, reusing a valid inbound id.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::from_header_or_generate(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Track in-flight requests and refuse new ones once shutdown has started.
pub async fn in_flight_middleware(
    State(shutdown): State<Arc<ShutdownCoordinator>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(_guard) = RequestGuard::new(shutdown) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "message": "Gateway is shutting down." })),
        )
            .into_response();
    };
    next.run(request).await
}

/// Build a CORS layer from configuration.
///
/// `*` entries allow anything. With credentials enabled, wildcards mirror the
/// request instead since browsers reject a literal `*` there.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let credentials = config.allow_credentials;
    let mut layer = CorsLayer::new().allow_credentials(credentials);

    layer = if is_wildcard(&config.allowed_origins) {
        if credentials {
            layer.allow_origin(AllowOrigin::mirror_request())
        } else {
            layer.allow_origin(Any)
        }
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    };

    layer = if is_wildcard(&config.allowed_methods) {
        if credentials {
            layer.allow_methods(AllowMethods::mirror_request())
        } else {
            layer.allow_methods(Any)
        }
    } else {
        let methods: Vec<Method> = config
            .allowed_methods
            .iter()
            .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
            .collect();
        layer.allow_methods(methods)
    };

    layer = if is_wildcard(&config.allowed_headers) {
        if credentials {
            layer.allow_headers(AllowHeaders::mirror_request())
        } else {
            layer.allow_headers(Any)
        }
    } else {
        layer.allow_headers(header_names(&config.allowed_headers))
    };

    layer = if is_wildcard(&config.expose_headers) && !credentials {
        layer.expose_headers(ExposeHeaders::any())
    } else {
        let names: Vec<String> = config
            .expose_headers
            .iter()
            .filter(|h| h.as_str() != "*")
            .cloned()
            .collect();
        layer.expose_headers(header_names(&names))
    };

    if let Some(max_age) = config.max_age {
        layer = layer.max_age(max_age);
    }
    layer
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

fn header_names(values: &[String]) -> Vec<HeaderName> {
    values
        .iter()
        .filter_map(|name| match HeaderName::from_bytes(name.as_bytes()) {
            Ok(header) => Some(header),
            Err(_) => {
                warn!(header = %name, "Ignoring invalid CORS header name");
                None
            }
        })
        .collect()
}
