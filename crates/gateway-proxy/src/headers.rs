//! Header rewriting for forwarded requests and relayed responses.

use gateway_core::RequestId;
use http::header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use std::net::IpAddr;

/// Connection-scoped headers never forwarded in either direction.
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// `X-Forwarded-For`
pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
/// `X-Forwarded-Host`
pub static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
/// `X-Forwarded-Proto`
pub static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
/// `X-Request-Id`
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in named.iter().map(String::as_str).chain(HOP_BY_HOP) {
        headers.remove(name);
    }
}

/// Rewrite inbound request headers for the downstream call.
///
/// `Authorization` is left untouched.
pub fn prepare_request_headers(
    headers: &mut HeaderMap,
    authority: &str,
    client_ip: Option<IpAddr>,
    request_id: &RequestId,
) -> Result<(), InvalidHeaderValue> {
    strip_hop_by_hop(headers);

    if let Some(original_host) = headers.remove(header::HOST) {
        if !headers.contains_key(&X_FORWARDED_HOST) {
            headers.insert(X_FORWARDED_HOST.clone(), original_host);
        }
    }
    headers.insert(header::HOST, HeaderValue::from_str(authority)?);

    if let Some(ip) = client_ip {
        let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}, {ip}"),
            _ => ip.to_string(),
        };
        headers.insert(X_FORWARDED_FOR.clone(), HeaderValue::from_str(&value)?);
    }

    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO.clone(), HeaderValue::from_static("http"));
    }

    headers.insert(
        X_REQUEST_ID.clone(),
        HeaderValue::from_str(request_id.as_str())?,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_id() -> RequestId {
        RequestId::parse("req-1").unwrap()
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, X-Custom-Hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-custom-hop", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn test_prepare_request_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("api.example.com"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::TE, HeaderValue::from_static("trailers"));

        prepare_request_headers(
            &mut headers,
            "order-service:8080",
            Some("10.0.0.7".parse().unwrap()),
            &request_id(),
        )
        .unwrap();

        assert_eq!(headers[header::HOST], "order-service:8080");
        assert_eq!(headers[&X_FORWARDED_HOST], "api.example.com");
        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.7");
        assert_eq!(headers[&X_FORWARDED_PROTO], "http");
        assert_eq!(headers[&X_REQUEST_ID], "req-1");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
        assert!(!headers.contains_key(header::TE));
    }

    #[test]
    fn test_forwarded_for_is_appended() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR.clone(), HeaderValue::from_static("203.0.113.5"));
        headers.insert(X_FORWARDED_PROTO.clone(), HeaderValue::from_static("https"));

        prepare_request_headers(
            &mut headers,
            "svc:80",
            Some("10.0.0.7".parse().unwrap()),
            &request_id(),
        )
        .unwrap();

        assert_eq!(headers[&X_FORWARDED_FOR], "203.0.113.5, 10.0.0.7");
        assert_eq!(headers[&X_FORWARDED_PROTO], "https");
    }
}
