//! Route table and resolution.
//!
//! Rules are ranked once at construction, highest first:
//! 1. number of literal segments
//! 2. fixed-length patterns over catch-alls
//! 3. configured priority
//! 4. declaration order
//!
//! Resolution walks that order and picks the first rule whose pattern
//! matches and whose methods include the request method.

use crate::error::{RouteBuildError, RouteError};
use crate::pattern::PathParams;
use crate::rules::{AuthRequirement, RouteRule};
use gateway_config::RouteConfig;
use http::{Method, Uri};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Immutable, ranked set of route rules.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<Arc<RouteRule>>,
    ranked: Vec<usize>,
}

impl RouteTable {
    /// Build from rules in declaration order.
    pub fn new(rules: Vec<RouteRule>) -> Result<Self, RouteBuildError> {
        let mut ids = HashSet::new();
        for rule in &rules {
            if !ids.insert(rule.id().to_string()) {
                return Err(RouteBuildError::DuplicateId(rule.id().to_string()));
            }
        }

        let mut ranked: Vec<usize> = (0..rules.len()).collect();
        ranked.sort_by_key(|&i| {
            let rule = &rules[i];
            (
                Reverse(rule.pattern().literal_count()),
                rule.pattern().has_catch_all(),
                Reverse(rule.priority()),
                i,
            )
        });

        Ok(Self {
            rules: rules.into_iter().map(Arc::new).collect(),
            ranked,
        })
    }

    /// Build from configuration.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, RouteBuildError> {
        let rules = configs
            .iter()
            .enumerate()
            .map(|(index, config)| RouteRule::from_config(config, index))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rules)
    }

    /// Check that every scheme named by a route satisfies `known`.
    pub fn check_schemes(&self, known: impl Fn(&str) -> bool) -> Result<(), RouteBuildError> {
        for rule in &self.rules {
            if let AuthRequirement::Schemes(names) = rule.auth() {
                if let Some(missing) = names.iter().find(|name| !known(name)) {
                    return Err(RouteBuildError::UnknownScheme {
                        route: rule.id().to_string(),
                        scheme: missing.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve `path` and `method` to exactly one rule.
    pub fn resolve(&self, path: &str, method: &Method) -> Result<RouteMatch, RouteError> {
        let mut allowed: Vec<Method> = Vec::new();
        let mut path_matched = false;

        for &index in &self.ranked {
            let rule = &self.rules[index];
            let Some(params) = rule.pattern().matches(path) else {
                continue;
            };
            path_matched = true;
            if rule.allows_method(method) {
                debug!(route = rule.id(), path, method = %method, "Route resolved");
                return Ok(RouteMatch {
                    rule: Arc::clone(rule),
                    params,
                });
            }
            for m in rule.methods() {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }

        if path_matched {
            Err(RouteError::MethodNotAllowed {
                path: path.to_string(),
                method: method.clone(),
                allowed,
            })
        } else {
            Err(RouteError::NoRouteMatched {
                path: path.to_string(),
            })
        }
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = &Arc<RouteRule>> {
        self.rules.iter()
    }

    /// Look up a rule by id.
    pub fn get(&self, id: &str) -> Option<&Arc<RouteRule>> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// A resolved route plus the parameters captured from the path.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    rule: Arc<RouteRule>,
    params: PathParams,
}

impl RouteMatch {
    /// Selected rule
    pub fn rule(&self) -> &Arc<RouteRule> {
        &self.rule
    }

    /// Captured parameters
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Downstream path and query for the inbound `uri`.
    pub fn downstream_path_and_query(&self, uri: &Uri) -> String {
        let path = self.rule.downstream_path(uri.path(), &self.params);
        match uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path,
        }
    }
}
