//! Configuration model.
//!
//! The whole gateway is described by one [`GatewayConfig`] value. It is
//! deserialized from a file, normalized, then validated field by field
//! (`validator` derive) and across sections ([`GatewayConfig::validate_all`]).

use crate::error::{ConfigError, ConfigResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::{ExposeSecret, SecretString, SecretVec};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// JWS algorithms a scheme may be narrowed to.
pub const SUPPORTED_ALGORITHMS: &[&str] = &[
    "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256",
    "ES384",
];

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Deployment environment name (reported by the status endpoint)
    #[serde(default = "default_environment")]
    #[validate(length(min = 1, message = "environment must not be empty"))]
    pub environment: String,

    /// Listener settings
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    /// Logging settings
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingSettings,

    /// Outbound client settings
    #[serde(default)]
    #[validate(nested)]
    pub upstream: UpstreamConfig,

    /// CORS policy; no layer is installed when absent
    #[serde(default)]
    pub cors: Option<CorsConfig>,

    /// Token schemes, in the order they are tried
    #[serde(default)]
    #[validate(nested)]
    pub schemes: Vec<SchemeConfig>,

    /// Route rules, in declaration order
    #[serde(default)]
    #[validate(nested)]
    pub routes: Vec<RouteConfig>,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            logging: LoggingSettings::default(),
            upstream: UpstreamConfig::default(),
            cors: None,
            schemes: Vec::new(),
            routes: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Fill in derived defaults: route ids (`route-<index>`) and upper-case methods.
    pub fn normalize(&mut self) {
        for (index, route) in self.routes.iter_mut().enumerate() {
            if route.id.as_deref().map_or(true, str::is_empty) {
                route.id = Some(format!("route-{index}"));
            }
            for method in &mut route.methods {
                *method = method.trim().to_ascii_uppercase();
            }
        }
    }

    /// Run field validation plus cross-reference checks.
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.validate()?;

        if !self.server.admin_path().starts_with('/') {
            return Err(ConfigError::validation(format!(
                "server.admin_prefix must start with '/' and not be the root: {}",
                self.server.admin_prefix
            )));
        }

        let mut scheme_names = HashSet::new();
        for scheme in &self.schemes {
            if !scheme_names.insert(scheme.name.as_str()) {
                return Err(ConfigError::validation(format!(
                    "duplicate scheme name: {}",
                    scheme.name
                )));
            }
            scheme.check()?;
        }

        let mut route_ids = HashSet::new();
        for (index, route) in self.routes.iter().enumerate() {
            let id = route.id_or_default(index);
            if !route_ids.insert(id.clone()) {
                return Err(ConfigError::validation(format!("duplicate route id: {id}")));
            }
            route.check(&id, &scheme_names)?;
        }

        Ok(())
    }

    /// Names of all configured schemes, in declaration order.
    pub fn scheme_names(&self) -> Vec<&str> {
        self.schemes.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    #[validate(length(min = 1, message = "server.host must not be empty"))]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    #[validate(range(min = 1, message = "server.port must not be 0"))]
    pub port: u16,

    /// Prefix of the gateway's own admin endpoints
    #[serde(default = "default_admin_prefix")]
    pub admin_prefix: String,

    /// Maximum time to drain in-flight requests on shutdown
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_admin_prefix() -> String {
    "/_gateway".to_string()
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_prefix: default_admin_prefix(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Admin prefix without trailing slashes, as mounted on the router.
    pub fn admin_path(&self) -> &str {
        self.admin_prefix.trim_end_matches('/')
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`)
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1))]
    pub level: String,

    /// Output format: `json`, `pretty` or `compact`
    #[serde(default = "default_log_format")]
    #[validate(custom(function = "validate_log_format"))]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn validate_log_format(format: &str) -> Result<(), ValidationError> {
    match format {
        "json" | "pretty" | "compact" => Ok(()),
        _ => Err(ValidationError::new("log_format")
            .with_message("logging.format must be json, pretty or compact".into())),
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Outbound client and bulkhead settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpstreamConfig {
    /// TCP connect timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Default time to wait for the downstream response head
    #[serde(default = "default_upstream_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// How long idle pooled connections are kept
    #[serde(default = "default_pool_idle_timeout", with = "humantime_serde")]
    pub pool_idle_timeout: Duration,

    /// Maximum idle pooled connections per downstream host
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,

    /// Maximum concurrent calls per downstream target
    #[serde(default = "default_max_concurrent")]
    #[validate(range(min = 1, message = "upstream.max_concurrent must be at least 1"))]
    pub max_concurrent: usize,

    /// Calls allowed to wait for a slot per downstream target
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Maximum time a call waits for a slot
    #[serde(default = "default_queue_timeout", with = "humantime_serde")]
    pub queue_timeout: Duration,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_upstream_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_pool_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_pool_max_idle() -> usize {
    32
}

fn default_max_concurrent() -> usize {
    256
}

fn default_queue_size() -> usize {
    128
}

fn default_queue_timeout() -> Duration {
    Duration::from_secs(1)
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            timeout: default_upstream_timeout(),
            pool_idle_timeout: default_pool_idle_timeout(),
            pool_max_idle_per_host: default_pool_max_idle(),
            max_concurrent: default_max_concurrent(),
            queue_size: default_queue_size(),
            queue_timeout: default_queue_timeout(),
        }
    }
}

/// CORS policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any
    #[serde(default = "wildcard")]
    pub allowed_origins: Vec<String>,

    /// Allowed methods; `*` allows any
    #[serde(default = "wildcard")]
    pub allowed_methods: Vec<String>,

    /// Allowed request headers; `*` allows any
    #[serde(default = "wildcard")]
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to scripts
    #[serde(default = "default_expose_headers")]
    pub expose_headers: Vec<String>,

    /// Whether credentials are allowed
    #[serde(default)]
    pub allow_credentials: bool,

    /// Preflight cache duration
    #[serde(default, with = "humantime_serde")]
    pub max_age: Option<Duration>,
}

fn wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_expose_headers() -> Vec<String> {
    vec!["token-expired".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: wildcard(),
            allowed_methods: wildcard(),
            allowed_headers: wildcard(),
            expose_headers: default_expose_headers(),
            allow_credentials: false,
            max_age: None,
        }
    }
}

/// A named token validation scheme.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SchemeConfig {
    /// Unique scheme name
    #[validate(length(min = 1, message = "scheme name must not be empty"))]
    pub name: String,

    /// Expected `iss`
    #[validate(length(min = 1, message = "scheme issuer must not be empty"))]
    pub issuer: String,

    /// Accepted `aud` values; a single string is accepted too
    #[serde(alias = "audience", deserialize_with = "one_or_many")]
    #[validate(length(min = 1, message = "scheme needs at least one audience"))]
    pub audiences: Vec<String>,

    /// Clock skew tolerance
    #[serde(default = "default_clock_skew", with = "humantime_serde")]
    pub clock_skew: Duration,

    /// Reject tokens without `exp`
    #[serde(default = "default_true")]
    pub require_expiration: bool,

    /// Narrow the accepted algorithms; empty accepts every algorithm of the key family
    #[serde(default)]
    pub algorithms: Vec<String>,

    /// Signing keys
    #[serde(default)]
    pub keys: Vec<KeyConfig>,
}

fn default_clock_skew() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}

impl SchemeConfig {
    fn check(&self) -> ConfigResult<()> {
        if self.keys.is_empty() {
            return Err(ConfigError::validation(format!(
                "scheme {} has no signing keys",
                self.name
            )));
        }
        for key in &self.keys {
            key.check().map_err(|e| {
                ConfigError::validation(format!("scheme {}: {e}", self.name))
            })?;
        }
        for alg in &self.algorithms {
            if !SUPPORTED_ALGORITHMS.contains(&alg.as_str()) {
                return Err(ConfigError::validation(format!(
                    "scheme {}: unsupported algorithm {alg}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Kind of signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// HMAC shared secret
    Secret,
    /// RSA public key (PEM)
    RsaPem,
    /// EC public key (PEM)
    EcPem,
}

/// One signing key. Exactly one source must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyConfig {
    /// Key kind
    #[serde(rename = "type")]
    pub kind: KeyKind,

    /// Optional key id matched against the token header `kid`
    #[serde(default)]
    pub kid: Option<String>,

    /// Inline value (secret or PEM text)
    #[serde(default)]
    pub value: Option<SecretString>,

    /// Environment variable holding the value
    #[serde(default)]
    pub env: Option<String>,

    /// Base64 encoded secret
    #[serde(default)]
    pub base64: Option<SecretString>,

    /// File holding the PEM
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl KeyConfig {
    /// Inline HMAC secret.
    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            kind: KeyKind::Secret,
            kid: None,
            value: Some(SecretString::new(value.into())),
            env: None,
            base64: None,
            path: None,
        }
    }

    /// Inline PEM of the given kind.
    pub fn pem(kind: KeyKind, pem: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(SecretString::new(pem.into())),
            ..Self::secret(String::new())
        }
    }

    /// Set the key id.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    fn check(&self) -> ConfigResult<()> {
        let sources = [
            self.value.is_some(),
            self.env.is_some(),
            self.base64.is_some(),
            self.path.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if sources != 1 {
            return Err(ConfigError::key_material(
                "exactly one of value, env, base64 or path must be set",
            ));
        }
        match self.kind {
            KeyKind::Secret if self.path.is_some() => Err(ConfigError::key_material(
                "secret keys are read from value, env or base64",
            )),
            KeyKind::RsaPem | KeyKind::EcPem if self.base64.is_some() => Err(
                ConfigError::key_material("PEM keys are read from value, env or path"),
            ),
            _ => Ok(()),
        }
    }

    /// Resolve the raw key bytes from the configured source.
    pub fn material(&self) -> ConfigResult<SecretVec<u8>> {
        self.check()?;
        let bytes = if let Some(value) = &self.value {
            value.expose_secret().as_bytes().to_vec()
        } else if let Some(var) = &self.env {
            std::env::var(var)
                .map_err(|_| {
                    ConfigError::key_material(format!("environment variable {var} is not set"))
                })?
                .into_bytes()
        } else if let Some(encoded) = &self.base64 {
            STANDARD
                .decode(encoded.expose_secret().trim())
                .map_err(|e| ConfigError::key_material(format!("invalid base64 secret: {e}")))?
        } else if let Some(path) = &self.path {
            std::fs::read(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?
        } else {
            Vec::new()
        };

        if bytes.is_empty() {
            return Err(ConfigError::key_material("key material is empty"));
        }
        Ok(SecretVec::new(bytes))
    }
}

/// A route rule.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RouteConfig {
    /// Unique id; defaults to `route-<index>`
    #[serde(default)]
    pub id: Option<String>,

    /// Inbound path pattern (`/literal`, `{param}`, `{*rest}`)
    #[validate(length(min = 1, message = "route path must not be empty"))]
    pub path: String,

    /// Allowed methods; empty allows every method
    #[serde(default)]
    pub methods: Vec<String>,

    /// Downstream target
    #[validate(nested)]
    pub upstream: UpstreamTarget,

    /// Downstream path template with `{param}` placeholders
    #[serde(default)]
    pub downstream_path: Option<String>,

    /// Authentication requirement; absent means anonymous access
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Tie-breaker between equally specific patterns (higher wins)
    #[serde(default)]
    pub priority: i32,

    /// Per-route upstream timeout
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Match literal segments case-sensitively
    #[serde(default)]
    pub case_sensitive: bool,
}

impl RouteConfig {
    /// Configured id or the positional default.
    pub fn id_or_default(&self, index: usize) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("route-{index}"),
        }
    }

    fn check(&self, id: &str, schemes: &HashSet<&str>) -> ConfigResult<()> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::validation(format!(
                "route {id}: path must start with '/'"
            )));
        }
        if let Some(template) = &self.downstream_path {
            if !template.starts_with('/') {
                return Err(ConfigError::validation(format!(
                    "route {id}: downstream_path must start with '/'"
                )));
            }
        }
        for method in &self.methods {
            http::Method::from_bytes(method.as_bytes()).map_err(|_| {
                ConfigError::validation(format!("route {id}: invalid method {method}"))
            })?;
        }
        if let Some(auth) = &self.auth {
            for scheme in &auth.schemes {
                if !schemes.contains(scheme.as_str()) {
                    return Err(ConfigError::validation(format!(
                        "route {id}: unknown scheme {scheme}"
                    )));
                }
            }
            if schemes.is_empty() {
                return Err(ConfigError::validation(format!(
                    "route {id}: requires authentication but no schemes are configured"
                )));
            }
        }
        Ok(())
    }
}

/// Downstream target of a route.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpstreamTarget {
    /// Host name or address
    #[validate(length(min = 1, message = "upstream host must not be empty"))]
    pub host: String,

    /// Port
    #[validate(range(min = 1, message = "upstream port must not be 0"))]
    pub port: u16,

    /// Path prefix prepended to every forwarded path
    #[serde(default)]
    #[validate(custom(function = "validate_base_path"))]
    pub base_path: String,
}

fn validate_base_path(base_path: &str) -> Result<(), ValidationError> {
    if base_path.is_empty() || base_path.starts_with('/') {
        Ok(())
    } else {
        Err(ValidationError::new("base_path")
            .with_message("upstream base_path must be empty or start with '/'".into()))
    }
}

/// Route authentication requirement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Eligible schemes; empty means any configured scheme
    #[serde(default)]
    pub schemes: Vec<String>,

    /// The principal must hold at least one of these scopes
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Let requests without credentials through as anonymous
    #[serde(default)]
    pub allow_anonymous: bool,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}
