//! Test fixtures: gateway configurations and signed tokens.

use chrono::Utc;
use gateway_config::{ConfigFormat, ConfigLoader, GatewayConfig};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::path::Path;

/// Issuer shared by the first-party schemes
pub const ISSUER: &str = "https://auth.example.com";
/// Audience of the first-party schemes
pub const AUDIENCE: &str = "orders-api";
/// Secret of the `clientSecretKey` scheme
pub const CLIENT_SECRET: &str = "client-secret-client-secret-0000";
/// Issuer of the partner scheme
pub const PARTNER_ISSUER: &str = "https://partners.example.com";
/// Audience of the partner scheme
pub const PARTNER_AUDIENCE: &str = "partner-api";
/// Secret of the `partnerKey` scheme
pub const PARTNER_SECRET: &str = "partner-secret-partner-secret-00";

/// Gateway configuration (YAML) forwarding to `upstream_port` and, for the
/// `dead` route, to `dead_port` where nothing listens.
pub fn gateway_yaml(upstream_port: u16, dead_port: u16) -> String {
    format!(
        r#"
environment: integration
server:
  host: 127.0.0.1
  port: 8080
  shutdown_timeout: 1s
logging:
  level: warn
  format: compact
upstream:
  timeout: 2s
  max_concurrent: 16
  queue_size: 8
schemes:
  - name: clientSecretKey
    issuer: {ISSUER}
    audiences: [{AUDIENCE}]
    clock_skew: 60s
    keys:
      - type: secret
        value: {CLIENT_SECRET}
  - name: partnerKey
    issuer: {PARTNER_ISSUER}
    audience: {PARTNER_AUDIENCE}
    keys:
      - type: secret
        value: {PARTNER_SECRET}
routes:
  - id: orders
    path: /api/orders/{{id}}
    methods: [GET, POST]
    downstream_path: /orders/{{id}}
    upstream: {{ host: 127.0.0.1, port: {upstream_port} }}
    auth: {{}}
  - id: partner-orders
    path: /partner/orders
    upstream: {{ host: 127.0.0.1, port: {upstream_port} }}
    auth:
      schemes: [partnerKey]
  - id: admin
    path: /api/admin/{{*rest}}
    upstream: {{ host: 127.0.0.1, port: {upstream_port}, base_path: /internal }}
    auth:
      scopes: ["orders:admin"]
  - id: catalog
    path: /api/catalog
    upstream: {{ host: 127.0.0.1, port: {upstream_port} }}
    auth:
      allow_anonymous: true
  - id: slow
    path: /api/slow
    timeout: 200ms
    upstream: {{ host: 127.0.0.1, port: {upstream_port} }}
  - id: dead
    path: /api/dead
    upstream: {{ host: 127.0.0.1, port: {dead_port} }}
"#
    )
}

/// Parse, normalize and validate a YAML configuration.
pub fn parse_config(yaml: &str) -> GatewayConfig {
    let mut config = ConfigLoader::parse(yaml, ConfigFormat::Yaml, Path::new("inline.yaml"))
        .expect("fixture config parses");
    config.normalize();
    config.validate_all().expect("fixture config is valid");
    config
}

/// Claims valid for `exp_offset` seconds from now.
pub fn claims(iss: &str, aud: &str, exp_offset: i64) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "user-1",
        "iss": iss,
        "aud": aud,
        "iat": now - 30,
        "exp": now + exp_offset,
    })
}

/// HS256 token over `claims`.
pub fn sign(claims: &Value, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("token signs")
}

/// Valid first-party token.
pub fn client_token() -> String {
    sign(&claims(ISSUER, AUDIENCE, 600), CLIENT_SECRET)
}

/// First-party token granting `scope`.
pub fn client_token_with_scope(scope: &str) -> String {
    let mut claims = claims(ISSUER, AUDIENCE, 600);
    claims["scope"] = json!(scope);
    sign(&claims, CLIENT_SECRET)
}

/// First-party token that expired an hour ago, well past the clock skew.
pub fn expired_client_token() -> String {
    sign(&claims(ISSUER, AUDIENCE, -3600), CLIENT_SECRET)
}

/// Valid partner token.
pub fn partner_token() -> String {
    sign(
        &claims(PARTNER_ISSUER, PARTNER_AUDIENCE, 600),
        PARTNER_SECRET,
    )
}
