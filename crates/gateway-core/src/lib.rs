//! # Gateway Core
//!
//! Core types and error handling shared by every stage of the API gateway
//! admission pipeline.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - The gateway error taxonomy and its HTTP mapping
//! - Verified token claims and the request principal
//! - The per-request unit of work and its scratch context
//! - Validated domain types (newtypes)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod error;
pub mod request;
pub mod types;

// Re-export commonly used types
pub use claims::{ClaimValue, Claims, Principal};
pub use error::{BoxError, GatewayError, GatewayErrorKind, GatewayResult};
pub use request::{bearer_token, GatewayRequest, PipelineStage, RequestContext};
pub use types::RequestId;
