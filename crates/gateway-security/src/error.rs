//! Security error types.
//!
//! [`AuthError`] is the precise, internal reason a single scheme rejected a
//! token. [`AggregateAuthError`] is what leaves the selector: it exposes only
//! a generic failure plus whether the deciding reason was expiry.

use gateway_config::ConfigError;
use gateway_core::GatewayError;

/// Result type for scheme construction.
pub type Result<T> = std::result::Result<T, SchemeError>;

/// Why one scheme rejected one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum AuthError {
    /// Not a structurally valid signed JWT.
    #[error("Malformed token")]
    Malformed,

    /// No configured key verified the signature.
    #[error("Invalid signature")]
    BadSignature,

    /// `iss` missing or different from the scheme issuer.
    #[error("Issuer mismatch")]
    IssuerMismatch,

    /// `aud` missing or disjoint from the scheme audiences.
    #[error("Audience mismatch")]
    AudienceMismatch,

    /// `exp` plus clock skew is in the past.
    #[error("Token expired")]
    Expired,

    /// `nbf`/`iat` minus clock skew is in the future.
    #[error("Token not yet valid")]
    NotYetValid,

    /// No `exp` while the scheme requires one.
    #[error("Token has no expiration")]
    MissingExpiration,
}

impl AuthError {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::AudienceMismatch => "audience_mismatch",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::MissingExpiration => "missing_expiration",
        }
    }

    /// Whether a scheme key verified the signature before this failure.
    #[must_use]
    pub fn passed_signature(self) -> bool {
        !matches!(self, Self::Malformed | Self::BadSignature)
    }
}

/// Failure of every eligible scheme.
///
/// `Display` is deliberately generic; the last individual failure is only
/// reachable through [`AggregateAuthError::last_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Authentication failed")]
pub struct AggregateAuthError {
    last: Option<AuthError>,
}

impl AggregateAuthError {
    /// No credentials were presented.
    #[must_use]
    pub fn missing_credentials() -> Self {
        Self { last: None }
    }

    /// The deciding scheme failed with `kind`.
    #[must_use]
    pub fn from_last(kind: AuthError) -> Self {
        Self { last: Some(kind) }
    }

    /// Internal reason of the deciding scheme: the last one whose key verified
    /// the signature, else the last one tried. `None` when no token was
    /// presented or no scheme was eligible.
    #[must_use]
    pub fn last_failure(&self) -> Option<AuthError> {
        self.last
    }

    /// Whether the deciding failure was expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.last == Some(AuthError::Expired)
    }

    /// Whether a token was presented at all.
    #[must_use]
    pub fn had_credentials(&self) -> bool {
        self.last.is_some()
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        self.last.map_or("missing_credentials", AuthError::as_str)
    }
}

impl From<AggregateAuthError> for GatewayError {
    fn from(err: AggregateAuthError) -> Self {
        GatewayError::authentication_failed(
            err.is_expired(),
            err.last.map(|kind| Box::new(kind) as gateway_core::BoxError),
        )
    }
}

/// Scheme construction error, fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum SchemeError {
    /// Key material could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Key material could not be parsed.
    #[error("Scheme {scheme}: invalid key: {message}")]
    InvalidKey {
        /// Scheme name
        scheme: String,
        /// Reason
        message: String,
    },

    /// A key cannot be used with any of the configured algorithms.
    #[error("Scheme {scheme}: no configured algorithm is usable with a {family} key")]
    IncompatibleAlgorithm {
        /// Scheme name
        scheme: String,
        /// Key family
        family: &'static str,
    },

    /// Two schemes share a name.
    #[error("Duplicate scheme name: {0}")]
    Duplicate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_display_is_generic() {
        let expired = AggregateAuthError::from_last(AuthError::Expired);
        let bad_sig = AggregateAuthError::from_last(AuthError::BadSignature);
        let missing = AggregateAuthError::missing_credentials();
        assert_eq!(expired.to_string(), bad_sig.to_string());
        assert_eq!(expired.to_string(), missing.to_string());
        assert_eq!(expired.to_string(), "Authentication failed");
    }

    #[test]
    fn test_aggregate_expired_flag() {
        assert!(AggregateAuthError::from_last(AuthError::Expired).is_expired());
        assert!(!AggregateAuthError::from_last(AuthError::NotYetValid).is_expired());
        assert!(!AggregateAuthError::from_last(AuthError::MissingExpiration).is_expired());
        assert!(!AggregateAuthError::missing_credentials().is_expired());
    }

    #[test]
    fn test_into_gateway_error() {
        let err: GatewayError = AggregateAuthError::from_last(AuthError::Expired).into();
        assert!(err.is_token_expired());
        assert_eq!(err.status_code().as_u16(), 401);

        let err: GatewayError = AggregateAuthError::missing_credentials().into();
        assert!(!err.is_token_expired());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(
            AggregateAuthError::missing_credentials().kind_label(),
            "missing_credentials"
        );
        assert_eq!(
            AggregateAuthError::from_last(AuthError::AudienceMismatch).kind_label(),
            "audience_mismatch"
        );
    }
}
