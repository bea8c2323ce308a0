//! # Gateway Resilience
//!
//! Resilience patterns for the API gateway:
//! - Bulkhead pattern bounding outbound concurrency per downstream target,
//!   with a bounded wait queue and queue timeout

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bulkhead;

// Re-export main types
pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadError, BulkheadPermit, BulkheadStats};
