//! Structural decoding of compact JWS tokens.

use crate::error::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use gateway_core::Claims;
use jsonwebtoken::Header;

/// A token split into its parts, not yet verified.
#[derive(Debug, Clone)]
pub struct DecodedToken<'a> {
    header: Header,
    claims: Claims,
    signing_input: &'a str,
    signature: &'a str,
}

impl<'a> DecodedToken<'a> {
    /// Decode `raw`: three base64url segments, a JOSE header with a known
    /// algorithm, a JSON object payload and a non-empty signature.
    pub fn parse(raw: &'a str) -> Result<Self, AuthError> {
        let raw = raw.trim();
        let (signing_input, signature) = raw.rsplit_once('.').ok_or(AuthError::Malformed)?;
        let (header_b64, payload_b64) = signing_input
            .split_once('.')
            .ok_or(AuthError::Malformed)?;
        if payload_b64.contains('.') || signature.is_empty() {
            return Err(AuthError::Malformed);
        }

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| AuthError::Malformed)?;
        let header: Header =
            serde_json::from_slice(&header_bytes).map_err(|_| AuthError::Malformed)?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::Malformed)?;

        URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::Malformed)?;

        Ok(Self {
            header,
            claims,
            signing_input,
            signature,
        })
    }

    /// JOSE header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Unverified claims
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// `header.payload`, the bytes the signature covers
    pub fn signing_input(&self) -> &'a str {
        self.signing_input
    }

    /// base64url signature segment
    pub fn signature(&self) -> &'a str {
        self.signature
    }
}
