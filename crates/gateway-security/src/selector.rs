//! Multi-scheme authentication.
//!
//! The selector decodes a bearer token once, then tries every eligible scheme
//! in declaration order and returns the first success. When all schemes fail
//! only an [`AggregateAuthError`] leaves this module.

use crate::error::{AggregateAuthError, AuthError};
use crate::scheme::{Scheme, SchemeSet};
use crate::token::DecodedToken;
use crate::validator::TokenValidator;
use chrono::{DateTime, Utc};
use gateway_core::Principal;
use std::sync::Arc;
use tracing::debug;

/// Which schemes a route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeFilter<'a> {
    /// Every configured scheme.
    Any,
    /// Only the named schemes, still tried in declaration order.
    Named(&'a [String]),
}

impl SchemeFilter<'_> {
    /// Whether `scheme` is eligible.
    pub fn allows(&self, scheme: &Scheme) -> bool {
        match self {
            Self::Any => true,
            Self::Named(names) => names.iter().any(|n| n == scheme.name()),
        }
    }
}

/// Per-route authentication policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy<'a> {
    /// Eligible schemes
    pub schemes: SchemeFilter<'a>,
    /// Requests without credentials pass as anonymous
    pub allow_anonymous: bool,
}

impl<'a> AuthPolicy<'a> {
    /// Policy accepting any scheme and requiring credentials.
    #[must_use]
    pub fn any() -> Self {
        Self {
            schemes: SchemeFilter::Any,
            allow_anonymous: false,
        }
    }

    /// Policy accepting only the named schemes.
    #[must_use]
    pub fn named(names: &'a [String]) -> Self {
        Self {
            schemes: SchemeFilter::Named(names),
            allow_anonymous: false,
        }
    }

    /// Allow requests without credentials.
    #[must_use]
    pub fn with_anonymous(mut self, allow: bool) -> Self {
        self.allow_anonymous = allow;
        self
    }
}

/// Strategy that turns an optional bearer token into a principal.
pub trait Authenticator: Send + Sync {
    /// Authenticate `token` under `policy` at instant `now`.
    fn authenticate(
        &self,
        policy: &AuthPolicy<'_>,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Principal, AggregateAuthError>;
}

/// First-match-wins selector over a [`SchemeSet`].
#[derive(Debug, Clone)]
pub struct SchemeSelector {
    schemes: Arc<SchemeSet>,
    validator: TokenValidator,
}

impl SchemeSelector {
    /// Create a selector over `schemes`.
    pub fn new(schemes: Arc<SchemeSet>) -> Self {
        Self {
            schemes,
            validator: TokenValidator::new(),
        }
    }

    /// Underlying schemes.
    pub fn schemes(&self) -> &SchemeSet {
        &self.schemes
    }

    fn try_schemes(
        &self,
        filter: SchemeFilter<'_>,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<Principal, AggregateAuthError> {
        let token = DecodedToken::parse(raw).map_err(|kind| {
            debug!(kind = kind.as_str(), "Bearer token rejected before scheme selection");
            AggregateAuthError::from_last(kind)
        })?;

        // A failure past the signature gate outranks signature failures.
        let mut verified: Option<AuthError> = None;
        let mut unverified: Option<AuthError> = None;
        for scheme in self.schemes.iter().filter(|s| filter.allows(s)) {
            match self.validator.validate_decoded(scheme, &token, now) {
                Ok(claims) => {
                    debug!(scheme = scheme.name(), subject = ?claims.sub, "Token accepted");
                    return Ok(Principal::authenticated(scheme.name(), claims));
                }
                Err(kind) => {
                    debug!(scheme = scheme.name(), kind = kind.as_str(), "Scheme rejected token");
                    if kind.passed_signature() {
                        verified = Some(kind);
                    } else {
                        unverified = Some(kind);
                    }
                }
            }
        }

        Err(verified
            .or(unverified)
            .map_or_else(AggregateAuthError::missing_credentials, AggregateAuthError::from_last))
    }
}

impl Authenticator for SchemeSelector {
    fn authenticate(
        &self,
        policy: &AuthPolicy<'_>,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Principal, AggregateAuthError> {
        match token {
            Some(raw) => self.try_schemes(policy.schemes, raw, now),
            None if policy.allow_anonymous => Ok(Principal::anonymous()),
            None => Err(AggregateAuthError::missing_credentials()),
        }
    }
}
