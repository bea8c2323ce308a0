//! Dispatch errors.

use gateway_core::{BoxError, GatewayError};
use gateway_resilience::BulkheadError;
use std::time::Duration;

/// Failure forwarding a request downstream.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Connection refused or failed to establish.
    #[error("Upstream {target} unavailable: {source}")]
    UpstreamUnavailable {
        /// Downstream authority
        target: String,
        /// Transport error
        #[source]
        source: BoxError,
    },

    /// No response head within the timeout.
    #[error("Upstream {target} timed out after {timeout:?}")]
    UpstreamTimeout {
        /// Downstream authority
        target: String,
        /// Applied timeout
        timeout: Duration,
    },

    /// Any other transport fault.
    #[error("Bad gateway calling {target}: {source}")]
    BadGateway {
        /// Downstream authority
        target: String,
        /// Transport error
        #[source]
        source: BoxError,
    },

    /// Outbound bulkhead exhausted.
    #[error("Upstream {target} overloaded: {source}")]
    Overloaded {
        /// Downstream authority
        target: String,
        /// Bulkhead rejection
        #[source]
        source: BulkheadError,
    },
}

impl DispatchError {
    /// Create a bad gateway error
    pub fn bad_gateway(target: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::BadGateway {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Downstream authority involved
    pub fn target(&self) -> &str {
        match self {
            Self::UpstreamUnavailable { target, .. }
            | Self::UpstreamTimeout { target, .. }
            | Self::BadGateway { target, .. }
            | Self::Overloaded { target, .. } => target,
        }
    }

    /// Label used for metrics and logs
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::BadGateway { .. } => "bad_gateway",
            Self::Overloaded { .. } => "overloaded",
        }
    }
}

impl From<DispatchError> for GatewayError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UpstreamUnavailable { target, source } => Self::UpstreamUnavailable {
                target,
                cause: Some(source),
            },
            DispatchError::UpstreamTimeout { target, timeout } => {
                Self::UpstreamTimeout { target, timeout }
            }
            DispatchError::BadGateway { target, source } => Self::BadGateway {
                target,
                cause: Some(source),
            },
            DispatchError::Overloaded { target, .. } => Self::Overloaded { target },
        }
    }
}
