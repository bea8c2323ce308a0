//! Single-scheme token validation.
//!
//! Validation is a fixed sequence of hard gates:
//! 1. structural decode
//! 2. signature against the scheme keys
//! 3. issuer
//! 4. audience
//! 5. lifetime (expiration, then not-before/issued-at), with clock skew
//!
//! The first failing gate decides the [`AuthError`]. Validation is pure: the
//! same inputs always give the same outcome.

use crate::error::AuthError;
use crate::scheme::Scheme;
use crate::token::DecodedToken;
use chrono::{DateTime, Utc};
use gateway_core::Claims;

/// Validates tokens against one [`Scheme`] at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenValidator;

impl TokenValidator {
    /// Create a validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode and validate `raw` against `scheme` at instant `now`.
    pub fn validate(
        &self,
        scheme: &Scheme,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let token = DecodedToken::parse(raw)?;
        self.validate_decoded(scheme, &token, now)
    }

    /// Validate an already decoded token against `scheme`.
    pub fn validate_decoded(
        &self,
        scheme: &Scheme,
        token: &DecodedToken<'_>,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        verify_signature(scheme, token)?;

        let claims = token.claims();
        check_issuer(scheme, claims)?;
        check_audience(scheme, claims)?;
        check_lifetime(scheme, claims, now)?;

        Ok(claims.clone())
    }
}

fn verify_signature(scheme: &Scheme, token: &DecodedToken<'_>) -> Result<(), AuthError> {
    let header = token.header();
    let message = token.signing_input().as_bytes();
    let verified = scheme
        .candidate_keys(header.kid.as_deref())
        .any(|key| key.verify(message, token.signature(), header.alg));
    if verified {
        Ok(())
    } else {
        Err(AuthError::BadSignature)
    }
}

fn check_issuer(scheme: &Scheme, claims: &Claims) -> Result<(), AuthError> {
    match claims.iss.as_deref() {
        Some(iss) if iss == scheme.issuer() => Ok(()),
        _ => Err(AuthError::IssuerMismatch),
    }
}

fn check_audience(scheme: &Scheme, claims: &Claims) -> Result<(), AuthError> {
    let matched = claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.iter().any(|a| scheme.audiences().iter().any(|e| e == a)));
    if matched {
        Ok(())
    } else {
        Err(AuthError::AudienceMismatch)
    }
}

fn check_lifetime(scheme: &Scheme, claims: &Claims, now: DateTime<Utc>) -> Result<(), AuthError> {
    let now = now.timestamp();
    let skew = i64::try_from(scheme.clock_skew().as_secs()).unwrap_or(i64::MAX);

    match claims.exp {
        Some(exp) if now > exp.saturating_add(skew) => return Err(AuthError::Expired),
        None if scheme.require_expiration() => return Err(AuthError::MissingExpiration),
        _ => {}
    }

    let not_before = match (claims.nbf, claims.iat) {
        (Some(nbf), Some(iat)) => Some(nbf.max(iat)),
        (nbf, iat) => nbf.or(iat),
    };
    if let Some(not_before) = not_before {
        if now < not_before.saturating_sub(skew) {
            return Err(AuthError::NotYetValid);
        }
    }

    Ok(())
}
