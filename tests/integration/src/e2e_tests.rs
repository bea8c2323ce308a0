//! End-to-end integration tests
//!
//! A real gateway listener in front of a mock downstream service, driven by
//! an HTTP client.

use crate::fixtures::*;
use crate::helpers::*;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_gateway(upstream: &MockServer) -> TestServer {
    let dead = closed_port().await;
    TestServer::start(parse_config(&gateway_yaml(upstream.address().port(), dead))).await
}

/// E2E test: valid token, path rewrite and streamed response
#[tokio::test]
async fn test_e2e_authenticated_dispatch() {
    let upstream = MockServer::start().await;
    let token = client_token();
    Mock::given(method("GET"))
        .and(path("/orders/42"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-order", "42")
                .set_body_json(serde_json::json!({ "id": 42, "status": "shipped" })),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let gateway = start_gateway(&upstream).await;
    let response = gateway.get_with_token("/api/orders/42", &token).await;

    assert_status(&response, 200);
    assert_eq!(response.headers()["x-order"], "42");
    assert!(response.headers().contains_key("x-request-id"));
    let body = TestServer::json_body(response).await;
    assert_eq!(body["status"], "shipped");
}

/// E2E test: caller request id is forwarded and echoed
#[tokio::test]
async fn test_e2e_request_id_propagation() {
    let upstream = MockServer::start().await;
    let request_id = random_request_id();
    Mock::given(method("GET"))
        .and(path("/api/catalog"))
        .and(header("x-request-id", request_id.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;

    let gateway = start_gateway(&upstream).await;
    let response = gateway
        .client
        .get(gateway.url("/api/catalog"))
        .header("x-request-id", request_id.as_str())
        .send()
        .await
        .unwrap();

    assert_status(&response, 200);
    assert_eq!(response.headers()["x-request-id"], request_id.as_str());
}

/// E2E test: unknown path never reaches the downstream service
#[tokio::test]
async fn test_e2e_no_route() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let gateway = start_gateway(&upstream).await;
    let response = gateway.get_with_token("/api/unknown", &client_token()).await;

    assert_status(&response, 404);
    assert_error_message(response, "No route matched.").await;
}

/// E2E test: expired token is rejected with the Token-Expired header
#[tokio::test]
async fn test_e2e_expired_token() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let gateway = start_gateway(&upstream).await;
    let response = gateway
        .get_with_token("/api/orders/42", &expired_client_token())
        .await;

    assert_status(&response, 401);
    assert_eq!(response.headers()["token-expired"], "true");
    assert_error_message(response, "Authentication failed.").await;
}

/// E2E test: missing token on a protected route
#[tokio::test]
async fn test_e2e_missing_token() {
    let upstream = MockServer::start().await;
    let gateway = start_gateway(&upstream).await;

    let response = gateway.get("/api/orders/42").await;

    assert_status(&response, 401);
    assert!(response.headers().get("token-expired").is_none());
    assert_eq!(response.headers()["www-authenticate"], "Bearer");
}

/// E2E test: method outside the route's list
#[tokio::test]
async fn test_e2e_method_not_allowed() {
    let upstream = MockServer::start().await;
    let gateway = start_gateway(&upstream).await;

    let response = gateway
        .send(reqwest::Method::DELETE, "/api/orders/42", Some(&client_token()))
        .await;

    assert_status(&response, 405);
    assert_eq!(response.headers()["allow"], "GET, POST");
}

/// E2E test: authenticated principal without the required scope
#[tokio::test]
async fn test_e2e_forbidden_without_scope() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let gateway = start_gateway(&upstream).await;
    let response = gateway
        .get_with_token("/api/admin/users", &client_token_with_scope("orders:read"))
        .await;

    assert_status(&response, 403);
    assert_error_message(response, "Forbidden.").await;
}

/// E2E test: required scope present, base path prepended downstream
#[tokio::test]
async fn test_e2e_scope_and_base_path() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/internal/api/admin/users"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;

    let gateway = start_gateway(&upstream).await;
    let response = gateway
        .get_with_token(
            "/api/admin/users",
            &client_token_with_scope("orders:read orders:admin"),
        )
        .await;

    assert_status(&response, 200);
}

/// E2E test: anonymous access where the route allows it
#[tokio::test]
async fn test_e2e_anonymous_route() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_string("catalog"))
        .expect(1)
        .mount(&upstream)
        .await;

    let gateway = start_gateway(&upstream).await;
    let response = gateway.get("/api/catalog").await;

    assert_status(&response, 200);
    assert_eq!(response.text().await.unwrap(), "catalog");
}

/// E2E test: downstream refusing connections
#[tokio::test]
async fn test_e2e_upstream_unavailable() {
    let upstream = MockServer::start().await;
    let gateway = start_gateway(&upstream).await;

    let response = gateway.get("/api/dead").await;

    assert_status(&response, 502);
    assert_error_message(response, "Upstream service unavailable.").await;
}

/// E2E test: downstream slower than the route timeout
#[tokio::test]
async fn test_e2e_upstream_timeout() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&upstream)
        .await;

    let gateway = start_gateway(&upstream).await;
    let response = gateway.get("/api/slow").await;

    assert_status(&response, 504);
    assert_error_message(response, "Upstream service timed out.").await;
}

/// E2E test: downstream error statuses pass through untouched
#[tokio::test]
async fn test_e2e_downstream_error_passthrough() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/7"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(serde_json::json!({ "error": "invalid order" })),
        )
        .mount(&upstream)
        .await;

    let gateway = start_gateway(&upstream).await;
    let response = gateway
        .send(reqwest::Method::POST, "/api/orders/7", Some(&client_token()))
        .await;

    assert_status(&response, 422);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["error"], "invalid order");
}

/// E2E test: admin endpoints are served by the gateway itself
#[tokio::test]
async fn test_e2e_admin_endpoints() {
    let upstream = MockServer::start().await;
    let gateway = start_gateway(&upstream).await;

    assert_status(&gateway.get("/_gateway/live").await, 200);
    assert_status(&gateway.get("/_gateway/ready").await, 200);

    let status = gateway.get("/_gateway").await;
    assert_status(&status, 200);
    assert_eq!(
        status.text().await.unwrap(),
        "Gateway started successfully. Environment - integration"
    );

    let _ = gateway.get("/api/unknown").await;
    let metrics = gateway.get("/_gateway/metrics").await;
    assert_status(&metrics, 200);
    let text = metrics.text().await.unwrap();
    assert!(text.contains("gateway_requests_total"));
    assert!(text.contains("route=\"unmatched\""));
}

/// E2E test: shutdown flips readiness and the server stops
#[tokio::test]
async fn test_e2e_graceful_shutdown() {
    let upstream = MockServer::start().await;
    let gateway = start_gateway(&upstream).await;
    let coordinator = gateway.state.shutdown.clone();

    assert!(!coordinator.is_shutting_down());
    gateway.stop().await;
    assert!(coordinator.is_shutting_down());
}
