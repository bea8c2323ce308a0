//! # Gateway Routing
//!
//! Path-based routing for the API gateway.
//!
//! This crate provides:
//! - Path patterns with named and catch-all parameters
//! - Route rules with method sets, auth requirements and downstream targets
//! - Deterministic, specificity-ranked resolution with 404/405 distinction
//! - Downstream path rewriting
//! - An atomically swappable table for hot reload

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod pattern;
pub mod rules;
pub mod shared;
pub mod table;

// Re-export main types
pub use error::{RouteBuildError, RouteError};
pub use pattern::{PathParams, PathPattern, PathTemplate};
pub use rules::{AuthRequirement, RouteRule, RouteTarget};
pub use shared::SharedRouteTable;
pub use table::{RouteMatch, RouteTable};
