//! Multi-scheme authentication through the full gateway.

use crate::fixtures::*;
use crate::helpers::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gateway_with_ok_upstream() -> (MockServer, TestServer) {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;
    let dead = closed_port().await;
    let gateway =
        TestServer::start(parse_config(&gateway_yaml(upstream.address().port(), dead))).await;
    (upstream, gateway)
}

#[tokio::test]
async fn test_partner_token_accepted_by_second_scheme() {
    let (_upstream, gateway) = gateway_with_ok_upstream().await;

    // The first scheme rejects on issuer; the partner scheme accepts.
    let response = gateway.get_with_token("/api/orders/1", &partner_token()).await;
    assert_status(&response, 200);

    let response = gateway.get_with_token("/partner/orders", &partner_token()).await;
    assert_status(&response, 200);
}

#[tokio::test]
async fn test_route_restricted_to_named_scheme() {
    let (_upstream, gateway) = gateway_with_ok_upstream().await;

    let response = gateway.get_with_token("/partner/orders", &client_token()).await;
    assert_status(&response, 401);
    assert!(response.headers().get("token-expired").is_none());
}

#[tokio::test]
async fn test_failure_kinds_share_one_response() {
    let (_upstream, gateway) = gateway_with_ok_upstream().await;

    let wrong_issuer = sign(&claims("https://evil.example.com", AUDIENCE, 600), CLIENT_SECRET);
    let wrong_audience = sign(&claims(ISSUER, "other-api", 600), CLIENT_SECRET);
    let wrong_key = sign(
        &claims(ISSUER, AUDIENCE, 600),
        "some-other-secret-some-other-000",
    );

    for token in [wrong_issuer, wrong_audience, wrong_key, "garbage".to_string()] {
        let response = gateway.get_with_token("/api/orders/1", &token).await;
        assert_status(&response, 401);
        assert!(response.headers().get("token-expired").is_none());
        assert_error_message(response, "Authentication failed.").await;
    }
}

#[tokio::test]
async fn test_expiry_within_clock_skew_is_accepted() {
    let (_upstream, gateway) = gateway_with_ok_upstream().await;

    // Expired 10s ago; the first-party scheme tolerates 60s.
    let token = sign(&claims(ISSUER, AUDIENCE, -10), CLIENT_SECRET);
    let response = gateway.get_with_token("/api/orders/1", &token).await;
    assert_status(&response, 200);
}

#[tokio::test]
async fn test_token_without_expiration_rejected() {
    let (_upstream, gateway) = gateway_with_ok_upstream().await;

    let token = sign(
        &json!({ "sub": "user-1", "iss": ISSUER, "aud": AUDIENCE }),
        CLIENT_SECRET,
    );
    let response = gateway.get_with_token("/api/orders/1", &token).await;
    assert_status(&response, 401);
}

#[tokio::test]
async fn test_non_bearer_authorization_counts_as_missing() {
    let (_upstream, gateway) = gateway_with_ok_upstream().await;

    let response = gateway
        .client
        .get(gateway.url("/api/orders/1"))
        .header("authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await
        .unwrap();
    assert_status(&response, 401);
    assert_eq!(response.headers()["www-authenticate"], "Bearer");
}

#[tokio::test]
async fn test_anonymous_route_rejects_invalid_token() {
    let (_upstream, gateway) = gateway_with_ok_upstream().await;

    let response = gateway.get_with_token("/api/catalog", &expired_client_token()).await;
    assert_status(&response, 401);
    assert_eq!(response.headers()["token-expired"], "true");
}
