//! Route rules.

use crate::error::RouteBuildError;
use crate::pattern::{PathParams, PathPattern, PathTemplate};
use gateway_config::{RouteConfig, UpstreamTarget};
use http::Method;
use std::time::Duration;

/// Authentication a route demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequirement {
    /// No authentication; presented tokens are forwarded unvalidated.
    None,
    /// Any configured scheme.
    AnyScheme,
    /// Only the named schemes.
    Schemes(Vec<String>),
}

impl AuthRequirement {
    /// Whether authentication runs for this route.
    pub fn is_required(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Downstream service a route forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    /// Host name or address
    pub host: String,
    /// Port
    pub port: u16,
    /// Path prefix, empty or starting with `/`
    pub base_path: String,
}

impl RouteTarget {
    /// Target without a base path.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            base_path: String::new(),
        }
    }

    /// Set the base path.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// `host:port`
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Prefix `path` with the base path.
    pub fn join(&self, path: &str) -> String {
        let base = self.base_path.trim_end_matches('/');
        if base.is_empty() {
            path.to_string()
        } else if path == "/" {
            base.to_string()
        } else {
            format!("{base}{path}")
        }
    }
}

impl From<&UpstreamTarget> for RouteTarget {
    fn from(target: &UpstreamTarget) -> Self {
        Self {
            host: target.host.clone(),
            port: target.port,
            base_path: target.base_path.clone(),
        }
    }
}

/// One entry of the route table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    id: String,
    pattern: PathPattern,
    methods: Vec<Method>,
    target: RouteTarget,
    downstream: Option<PathTemplate>,
    auth: AuthRequirement,
    allow_anonymous: bool,
    required_scopes: Vec<String>,
    priority: i32,
    timeout: Option<Duration>,
}

impl RouteRule {
    /// Rule that allows every method and requires no authentication.
    pub fn new(
        id: impl Into<String>,
        pattern: &str,
        target: RouteTarget,
    ) -> Result<Self, RouteBuildError> {
        let id = id.into();
        let pattern = compile_pattern(&id, pattern, false)?;
        Ok(Self {
            id,
            pattern,
            methods: Vec::new(),
            target,
            downstream: None,
            auth: AuthRequirement::None,
            allow_anonymous: false,
            required_scopes: Vec::new(),
            priority: 0,
            timeout: None,
        })
    }

    /// Restrict methods; empty allows all.
    #[must_use]
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Set the authentication requirement.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthRequirement) -> Self {
        self.auth = auth;
        self
    }

    /// Let requests without credentials through as anonymous.
    #[must_use]
    pub fn with_anonymous(mut self, allow: bool) -> Self {
        self.allow_anonymous = allow;
        self
    }

    /// Require at least one of `scopes`.
    #[must_use]
    pub fn with_required_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the tie-breaking priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the per-route upstream timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the downstream path template.
    pub fn with_downstream_path(mut self, template: &str) -> Result<Self, RouteBuildError> {
        self.downstream = Some(compile_template(&self.id, template, &self.pattern)?);
        Ok(self)
    }

    /// Build from configuration; `index` supplies the default id.
    pub fn from_config(config: &RouteConfig, index: usize) -> Result<Self, RouteBuildError> {
        let id = config.id_or_default(index);
        let pattern = compile_pattern(&id, &config.path, config.case_sensitive)?;

        let methods = config
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).map_err(|_| {
                    RouteBuildError::InvalidMethod {
                        route: id.clone(),
                        method: m.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let downstream = config
            .downstream_path
            .as_deref()
            .map(|t| compile_template(&id, t, &pattern))
            .transpose()?;

        let (auth, allow_anonymous, required_scopes) = match &config.auth {
            None => (AuthRequirement::None, false, Vec::new()),
            Some(auth) => (
                if auth.schemes.is_empty() {
                    AuthRequirement::AnyScheme
                } else {
                    AuthRequirement::Schemes(auth.schemes.clone())
                },
                auth.allow_anonymous,
                auth.scopes.clone(),
            ),
        };

        Ok(Self {
            id,
            pattern,
            methods,
            target: RouteTarget::from(&config.upstream),
            downstream,
            auth,
            allow_anonymous,
            required_scopes,
            priority: config.priority,
            timeout: config.timeout,
        })
    }

    /// Route id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Inbound pattern
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Allowed methods; empty allows all
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Downstream target
    pub fn target(&self) -> &RouteTarget {
        &self.target
    }

    /// Authentication requirement
    pub fn auth(&self) -> &AuthRequirement {
        &self.auth
    }

    /// Whether requests without credentials pass as anonymous
    pub fn allow_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    /// Scopes of which the principal must hold one
    pub fn required_scopes(&self) -> &[String] {
        &self.required_scopes
    }

    /// Tie-breaking priority
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Per-route upstream timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether `method` is allowed.
    pub fn allows_method(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Downstream path (without query) for an inbound path and its captures.
    pub fn downstream_path(&self, inbound_path: &str, params: &PathParams) -> String {
        let path = match &self.downstream {
            Some(template) => template.render(params),
            None => inbound_path.to_string(),
        };
        self.target.join(&path)
    }
}

fn compile_pattern(id: &str, pattern: &str, case_sensitive: bool) -> Result<PathPattern, RouteBuildError> {
    PathPattern::parse(pattern, case_sensitive).map_err(|message| RouteBuildError::InvalidPattern {
        route: id.to_string(),
        pattern: pattern.to_string(),
        message,
    })
}

fn compile_template(
    id: &str,
    template: &str,
    pattern: &PathPattern,
) -> Result<PathTemplate, RouteBuildError> {
    PathTemplate::parse(template, pattern.param_names()).map_err(|message| {
        RouteBuildError::InvalidTemplate {
            route: id.to_string(),
            template: template.to_string(),
            message,
        }
    })
}
