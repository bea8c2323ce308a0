//! Verified token claims and the request principal.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Claim that may be a single string or an array of strings (e.g. `aud`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    /// Single value
    Single(String),
    /// Multiple values
    Multiple(Vec<String>),
}

impl ClaimValue {
    /// Check if the claim contains a value
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(s) => s == value,
            Self::Multiple(v) => v.iter().any(|s| s == value),
        }
    }

    /// Iterate over all values
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Self::Single(s) => std::slice::from_ref(s),
            Self::Multiple(v) => v,
        };
        slice.iter().map(String::as_str)
    }

    /// Get all values as a vector
    pub fn as_vec(&self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }
}

/// Registered and custom claims of a verified token.
///
/// Numeric dates are seconds since the Unix epoch; fractional values are
/// accepted and truncated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<ClaimValue>,
    /// Issued at
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,
    /// Not before
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<i64>,
    /// Expiration
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,
    /// Every other claim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Scopes granted by the token, read from `scope`, `scp` or `scopes`.
    ///
    /// String values are split on whitespace; arrays contribute their string
    /// elements.
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = Vec::new();
        for key in ["scope", "scp", "scopes"] {
            let found: Vec<&str> = match self.extra.get(key) {
                Some(Value::String(s)) => s.split_whitespace().collect(),
                Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
                _ => continue,
            };
            for scope in found {
                if !scopes.iter().any(|s| s == scope) {
                    scopes.push(scope.to_string());
                }
            }
        }
        scopes
    }

    /// Whether the token grants at least one of `required`.
    ///
    /// An empty requirement is always satisfied.
    pub fn has_any_scope(&self, required: &[String]) -> bool {
        if required.is_empty() {
            return true;
        }
        let granted = self.scopes();
        required.iter().any(|r| granted.contains(r))
    }

    /// Look up a custom claim.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumericDate {
    Int(i64),
    Float(f64),
}

fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<NumericDate>::deserialize(deserializer)?.map(|date| match date {
            NumericDate::Int(v) => v,
            NumericDate::Float(v) => v.trunc() as i64,
        }),
    )
}

/// Identity attached to a request after authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Principal {
    /// Name of the scheme that accepted the token; `None` for anonymous.
    pub scheme: Option<String>,
    /// Verified claims; empty for anonymous.
    pub claims: Claims,
}

impl Principal {
    /// Anonymous principal with no scheme and empty claims.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Principal accepted by `scheme`.
    pub fn authenticated(scheme: impl Into<String>, claims: Claims) -> Self {
        Self {
            scheme: Some(scheme.into()),
            claims,
        }
    }

    /// Whether this is the anonymous principal.
    pub fn is_anonymous(&self) -> bool {
        self.scheme.is_none()
    }

    /// Subject claim, if any.
    pub fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claim_value_single_and_multiple() {
        let single: ClaimValue = serde_json::from_value(json!("api")).unwrap();
        assert!(single.contains("api"));
        assert!(!single.contains("web"));

        let multi: ClaimValue = serde_json::from_value(json!(["api", "web"])).unwrap();
        assert!(multi.contains("web"));
        assert_eq!(multi.as_vec(), vec!["api".to_string(), "web".to_string()]);
    }

    #[test]
    fn test_claims_numeric_dates() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "user-1",
            "iat": 1_700_000_000,
            "exp": 1_700_000_600.75,
            "tenant": "acme"
        }))
        .unwrap();
        assert_eq!(claims.iat, Some(1_700_000_000));
        assert_eq!(claims.exp, Some(1_700_000_600));
        assert_eq!(claims.nbf, None);
        assert_eq!(claims.get("tenant"), Some(&json!("acme")));
    }

    #[test]
    fn test_claims_rejects_non_numeric_date() {
        let result: Result<Claims, _> = serde_json::from_value(json!({ "exp": "tomorrow" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_scopes_from_all_sources() {
        let claims: Claims = serde_json::from_value(json!({
            "scope": "orders:read orders:write",
            "scp": ["admin"],
        }))
        .unwrap();
        let scopes = claims.scopes();
        assert_eq!(scopes, vec!["orders:read", "orders:write", "admin"]);
        assert!(claims.has_any_scope(&["admin".to_string()]));
        assert!(!claims.has_any_scope(&["billing".to_string()]));
        assert!(claims.has_any_scope(&[]));
    }

    #[test]
    fn test_scopes_deduplicated_across_sources() {
        let claims: Claims = serde_json::from_value(json!({
            "scope": "orders:read admin orders:read",
            "scp": ["admin", "billing"],
            "scopes": "orders:read",
        }))
        .unwrap();
        assert_eq!(claims.scopes(), vec!["orders:read", "admin", "billing"]);
    }

    #[test]
    fn test_principal_anonymous() {
        let anon = Principal::anonymous();
        assert!(anon.is_anonymous());
        assert_eq!(anon.subject(), None);
        assert!(anon.claims.extra.is_empty());

        let claims = Claims {
            sub: Some("user-1".to_string()),
            ..Claims::default()
        };
        let principal = Principal::authenticated("partners", claims);
        assert!(!principal.is_anonymous());
        assert_eq!(principal.subject(), Some("user-1"));
        assert_eq!(principal.scheme.as_deref(), Some("partners"));
    }
}
