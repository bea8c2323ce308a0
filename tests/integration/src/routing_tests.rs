//! Routing integration tests
//!
//! Route tables loaded from files and swapped on a running gateway.

use crate::fixtures::*;
use crate::helpers::*;
use gateway_config::ConfigLoader;
use gateway_routing::RouteBuildError;
use gateway_security::SchemeSet;
use std::io::Write;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_config_file_round_trip() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/catalog"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    let dead = closed_port().await;
    file.write_all(gateway_yaml(upstream.address().port(), dead).as_bytes())
        .unwrap();

    let config = ConfigLoader::new()
        .with_path(file.path())
        .with_env_overrides(false)
        .load()
        .await
        .unwrap();
    assert_eq!(config.routes.len(), 6);

    let gateway = TestServer::start(config).await;
    assert_status(&gateway.get("/api/catalog").await, 200);
}

#[tokio::test]
async fn test_reload_swaps_routes_on_running_gateway() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;
    let port = upstream.address().port();
    let dead = closed_port().await;
    let gateway = TestServer::start(parse_config(&gateway_yaml(port, dead))).await;

    assert_status(&gateway.get("/v2/catalog").await, 404);

    let mut next = parse_config(&gateway_yaml(port, dead));
    let mut route = next
        .routes
        .iter()
        .find(|r| r.id.as_deref() == Some("catalog"))
        .cloned()
        .unwrap();
    route.id = Some("catalog-v2".to_string());
    route.path = "/v2/catalog".to_string();
    next.routes.push(route);

    gateway.state.routes.reload(&next.routes).unwrap();

    assert_status(&gateway.get("/v2/catalog").await, 200);
    assert_status(&gateway.get("/api/catalog").await, 200);
}

#[tokio::test]
async fn test_rejected_reload_keeps_previous_table() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;
    let port = upstream.address().port();
    let dead = closed_port().await;
    let gateway = TestServer::start(parse_config(&gateway_yaml(port, dead))).await;

    let mut broken = parse_config(&gateway_yaml(port, dead));
    broken.routes[0].path = "/api/{unterminated".to_string();

    assert!(gateway.state.routes.reload(&broken.routes).is_err());
    assert_status(&gateway.get("/api/catalog").await, 200);
}

#[tokio::test]
async fn test_literal_segment_beats_parameter() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_string("summary"))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string("order"))
        .mount(&upstream)
        .await;

    let port = upstream.address().port();
    let dead = closed_port().await;
    let mut config = parse_config(&gateway_yaml(port, dead));
    let mut summary = config.routes[0].clone();
    summary.id = Some("orders-summary".to_string());
    summary.path = "/api/orders/summary".to_string();
    summary.downstream_path = Some("/orders/summary".to_string());
    summary.auth = None;
    config.routes.push(summary);

    let gateway = TestServer::start(config).await;

    let response = gateway.get("/api/orders/summary").await;
    assert_status(&response, 200);
    assert_eq!(response.text().await.unwrap(), "summary");

    let response = gateway.get_with_token("/api/orders/42", &client_token()).await;
    assert_eq!(response.text().await.unwrap(), "order");
}

#[tokio::test]
async fn test_reload_naming_unloaded_scheme_is_rejected() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;
    let port = upstream.address().port();
    let dead = closed_port().await;
    let config = parse_config(&gateway_yaml(port, dead));
    let running = SchemeSet::from_config(&config.schemes).unwrap();
    let gateway = TestServer::start(config).await;

    // Renamed in both the scheme list and the route, so the file itself is valid.
    let renamed = gateway_yaml(port, dead).replace("partnerKey", "partnerKeyV2");
    let next = parse_config(&renamed);

    let err = gateway
        .state
        .routes
        .reload_checked(&next.routes, |name| running.get(name).is_some())
        .unwrap_err();
    assert!(matches!(err, RouteBuildError::UnknownScheme { ref scheme, .. } if scheme == "partnerKeyV2"));

    let response = gateway.get_with_token("/partner/orders", &partner_token()).await;
    assert_status(&response, 200);
}
