//! Integration tests for the API gateway
//!
//! This crate provides integration tests covering:
//! - End-to-end admission and dispatch through a real listener
//! - Multi-scheme token validation
//! - Route tables loaded from files and reloaded at runtime

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;

#[cfg(test)]
mod auth_tests;
#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod routing_tests;
