//! # Gateway Security
//!
//! Bearer token validation for the API gateway.
//!
//! ## Features
//!
//! - **Schemes**: independently configured issuer/audience/key policies
//! - **Key families**: HMAC secrets, RSA and EC public keys, selected by `kid`
//! - **Validation**: signature, issuer, audience and lifetime gates with clock skew
//! - **Selection**: first-match-wins across schemes with a coarse aggregate failure
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use gateway_security::{AuthPolicy, Authenticator, Scheme, SchemeSelector, SchemeSet, SigningKey};
//!
//! let scheme = Scheme::new("clientSecretKey", "https://auth.example.com", ["orders-api"])
//!     .with_key(SigningKey::hmac(b"0123456789abcdef0123456789abcdef"));
//! let selector = SchemeSelector::new(Arc::new(SchemeSet::new(vec![scheme]).unwrap()));
//! let outcome = selector.authenticate(&AuthPolicy::any(), Some("eyJ..."), Utc::now());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod scheme;
pub mod selector;
pub mod token;
pub mod validator;

pub use error::{AggregateAuthError, AuthError, Result, SchemeError};
pub use scheme::{KeyFamily, Scheme, SchemeSet, SigningKey};
pub use selector::{AuthPolicy, Authenticator, SchemeFilter, SchemeSelector};
pub use token::DecodedToken;
pub use validator::TokenValidator;
