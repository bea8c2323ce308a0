//! Token schemes and their signing keys.
//!
//! A [`Scheme`] is immutable once built. Each [`SigningKey`] belongs to a key
//! family and is only ever used with algorithms of that family.

use crate::error::{Result, SchemeError};
use gateway_config::{KeyConfig, KeyKind, SchemeConfig};
use jsonwebtoken::{Algorithm, DecodingKey};
use secrecy::ExposeSecret;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default clock skew tolerance.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Family of a signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// HMAC shared secret
    Hmac,
    /// RSA public key (PKCS#1 v1.5 and PSS)
    Rsa,
    /// Elliptic curve public key
    Ec,
}

impl KeyFamily {
    /// Algorithms usable with keys of this family.
    #[must_use]
    pub fn algorithms(self) -> &'static [Algorithm] {
        match self {
            Self::Hmac => &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512],
            Self::Rsa => &[
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            Self::Ec => &[Algorithm::ES256, Algorithm::ES384],
        }
    }

    /// Label used in errors.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hmac => "hmac",
            Self::Rsa => "rsa",
            Self::Ec => "ec",
        }
    }
}

impl From<KeyKind> for KeyFamily {
    fn from(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Secret => Self::Hmac,
            KeyKind::RsaPem => Self::Rsa,
            KeyKind::EcPem => Self::Ec,
        }
    }
}

/// A verification key.
#[derive(Clone)]
pub struct SigningKey {
    kid: Option<String>,
    family: KeyFamily,
    algorithms: Vec<Algorithm>,
    key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    fn new(family: KeyFamily, key: DecodingKey) -> Self {
        Self {
            kid: None,
            family,
            algorithms: family.algorithms().to_vec(),
            key,
        }
    }

    /// HMAC key from raw secret bytes.
    #[must_use]
    pub fn hmac(secret: &[u8]) -> Self {
        Self::new(KeyFamily::Hmac, DecodingKey::from_secret(secret))
    }

    /// RSA public key from PEM.
    pub fn rsa_pem(pem: &[u8]) -> std::result::Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self::new(KeyFamily::Rsa, DecodingKey::from_rsa_pem(pem)?))
    }

    /// EC public key from PEM.
    pub fn ec_pem(pem: &[u8]) -> std::result::Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self::new(KeyFamily::Ec, DecodingKey::from_ec_pem(pem)?))
    }

    /// Set the key id.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Narrow the accepted algorithms to those of `allowed` that fit the
    /// key family. An empty `allowed` keeps the whole family.
    #[must_use]
    pub fn with_algorithms(mut self, allowed: &[Algorithm]) -> Self {
        if !allowed.is_empty() {
            self.algorithms = self
                .family
                .algorithms()
                .iter()
                .copied()
                .filter(|alg| allowed.contains(alg))
                .collect();
        }
        self
    }

    /// Build from configuration, resolving the key material.
    pub fn from_config(scheme: &str, config: &KeyConfig, allowed: &[Algorithm]) -> Result<Self> {
        let material = config.material()?;
        let bytes = material.expose_secret();
        let invalid = |e: jsonwebtoken::errors::Error| SchemeError::InvalidKey {
            scheme: scheme.to_string(),
            message: e.to_string(),
        };
        let key = match config.kind {
            KeyKind::Secret => Self::hmac(bytes),
            KeyKind::RsaPem => Self::rsa_pem(bytes).map_err(invalid)?,
            KeyKind::EcPem => Self::ec_pem(bytes).map_err(invalid)?,
        };
        let key = match &config.kid {
            Some(kid) => key.with_kid(kid.clone()),
            None => key,
        };
        let key = key.with_algorithms(allowed);
        if key.algorithms.is_empty() {
            return Err(SchemeError::IncompatibleAlgorithm {
                scheme: scheme.to_string(),
                family: key.family.as_str(),
            });
        }
        Ok(key)
    }

    /// Key id, if any.
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Key family.
    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// Whether this key may verify `alg`.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }

    /// Verify `signature` (base64url) over `message` with `alg`.
    ///
    /// Algorithms outside the key's accepted set never verify.
    pub fn verify(&self, message: &[u8], signature: &str, alg: Algorithm) -> bool {
        self.accepts(alg)
            && jsonwebtoken::crypto::verify(signature, message, &self.key, alg).unwrap_or(false)
    }
}

/// A named, independently configured validation policy.
#[derive(Debug, Clone)]
pub struct Scheme {
    name: String,
    issuer: String,
    audiences: Vec<String>,
    clock_skew: Duration,
    require_expiration: bool,
    keys: Vec<SigningKey>,
}

impl Scheme {
    /// Scheme with default skew, required expiration and no keys.
    pub fn new(
        name: impl Into<String>,
        issuer: impl Into<String>,
        audiences: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            issuer: issuer.into(),
            audiences: audiences.into_iter().map(Into::into).collect(),
            clock_skew: DEFAULT_CLOCK_SKEW,
            require_expiration: true,
            keys: Vec::new(),
        }
    }

    /// Add a signing key.
    #[must_use]
    pub fn with_key(mut self, key: SigningKey) -> Self {
        self.keys.push(key);
        self
    }

    /// Set the clock skew tolerance.
    #[must_use]
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Set whether `exp` is mandatory.
    #[must_use]
    pub fn with_require_expiration(mut self, required: bool) -> Self {
        self.require_expiration = required;
        self
    }

    /// Build from configuration.
    pub fn from_config(config: &SchemeConfig) -> Result<Self> {
        let allowed = config
            .algorithms
            .iter()
            .map(|name| {
                Algorithm::from_str(name).map_err(|e| SchemeError::InvalidKey {
                    scheme: config.name.clone(),
                    message: format!("unknown algorithm {name}: {e}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let keys = config
            .keys
            .iter()
            .map(|key| SigningKey::from_config(&config.name, key, &allowed))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            issuer: config.issuer.clone(),
            audiences: config.audiences.clone(),
            clock_skew: config.clock_skew,
            require_expiration: config.require_expiration,
            keys,
        })
    }

    /// Scheme name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Expected issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Accepted audiences
    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    /// Clock skew tolerance
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Whether `exp` is mandatory
    pub fn require_expiration(&self) -> bool {
        self.require_expiration
    }

    /// Keys to try for a token header `kid`: the keys carrying that id when
    /// any do, otherwise every key.
    pub fn candidate_keys<'a>(&'a self, kid: Option<&'a str>) -> impl Iterator<Item = &'a SigningKey> {
        let matches_kid = kid.is_some() && self.keys.iter().any(|k| k.kid() == kid);
        self.keys
            .iter()
            .filter(move |k| !matches_kid || k.kid() == kid)
    }
}

/// Ordered set of schemes with unique names.
#[derive(Debug, Clone, Default)]
pub struct SchemeSet {
    schemes: Vec<Scheme>,
}

impl SchemeSet {
    /// Build from schemes in declaration order.
    pub fn new(schemes: Vec<Scheme>) -> Result<Self> {
        let mut seen = HashSet::new();
        for scheme in &schemes {
            if !seen.insert(scheme.name.as_str()) {
                return Err(SchemeError::Duplicate(scheme.name.clone()));
            }
        }
        Ok(Self { schemes })
    }

    /// Build from configuration.
    pub fn from_config(configs: &[SchemeConfig]) -> Result<Self> {
        let schemes = configs
            .iter()
            .map(Scheme::from_config)
            .collect::<Result<Vec<_>>>()?;
        Self::new(schemes)
    }

    /// Schemes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Scheme> {
        self.schemes.iter()
    }

    /// Look up by name.
    pub fn get(&self, name: &str) -> Option<&Scheme> {
        self.schemes.iter().find(|s| s.name == name)
    }

    /// Number of schemes.
    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}
