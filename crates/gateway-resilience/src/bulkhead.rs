//! Bulkhead pattern for resource isolation.
//!
//! Limits concurrent calls to one downstream target. Up to `max_concurrent`
//! calls run at once; up to `queue_size` more may wait, each for at most
//! `queue_timeout`. Anything beyond that is rejected immediately.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Bulkhead configuration
#[derive(Debug, Clone)]
pub struct BulkheadConfig {
    /// Maximum concurrent calls
    pub max_concurrent: usize,
    /// Calls allowed to wait when max concurrent is reached
    pub queue_size: usize,
    /// Maximum wait for a slot
    pub queue_timeout: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 256,
            queue_size: 128,
            queue_timeout: Duration::from_secs(1),
        }
    }
}

/// Why a permit could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    /// Every slot is busy and the wait queue is full.
    #[error("Bulkhead {0} full")]
    Full(String),

    /// Waited longer than the queue timeout.
    #[error("Bulkhead {bulkhead} queue timeout after {timeout:?}")]
    QueueTimeout {
        /// Bulkhead id
        bulkhead: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// The bulkhead was closed.
    #[error("Bulkhead {0} closed")]
    Closed(String),
}

/// Bulkhead for limiting concurrent calls
#[derive(Debug)]
pub struct Bulkhead {
    /// Identifier (the downstream authority)
    id: String,
    /// Configuration
    config: BulkheadConfig,
    /// Admission tickets: running plus queued calls
    admission: Arc<Semaphore>,
    /// Execution slots
    slots: Arc<Semaphore>,
}

impl Bulkhead {
    /// Create a new bulkhead
    #[must_use]
    pub fn new(id: impl Into<String>, config: BulkheadConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            id: id.into(),
            admission: Arc::new(Semaphore::new(max_concurrent + config.queue_size)),
            slots: Arc::new(Semaphore::new(max_concurrent)),
            config: BulkheadConfig {
                max_concurrent,
                ..config
            },
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(id: impl Into<String>) -> Self {
        Self::new(id, BulkheadConfig::default())
    }

    /// Get the bulkhead ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Acquire a permit, waiting in the queue if needed.
    ///
    /// # Errors
    /// Returns error if the queue is full or the queue timeout is reached
    pub async fn acquire(&self) -> Result<BulkheadPermit, BulkheadError> {
        let ticket = Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|_| {
                warn!(bulkhead = %self.id, "Bulkhead full, rejecting call");
                BulkheadError::Full(self.id.clone())
            })?;

        if self.slots.available_permits() == 0 {
            debug!(
                bulkhead = %self.id,
                max_concurrent = self.config.max_concurrent,
                "Call queued in bulkhead"
            );
        }

        match tokio::time::timeout(
            self.config.queue_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(slot)) => {
                debug!(
                    bulkhead = %self.id,
                    active = self.active_requests(),
                    "Bulkhead permit acquired"
                );
                Ok(BulkheadPermit {
                    _slot: slot,
                    _ticket: ticket,
                    bulkhead_id: self.id.clone(),
                })
            }
            Ok(Err(_)) => Err(BulkheadError::Closed(self.id.clone())),
            Err(_) => {
                warn!(
                    bulkhead = %self.id,
                    timeout_ms = self.config.queue_timeout.as_millis(),
                    "Bulkhead queue timeout"
                );
                Err(BulkheadError::QueueTimeout {
                    bulkhead: self.id.clone(),
                    timeout: self.config.queue_timeout,
                })
            }
        }
    }

    /// Try to acquire a permit without waiting
    ///
    /// # Errors
    /// Returns error if no slot is free
    pub fn try_acquire(&self) -> Result<BulkheadPermit, BulkheadError> {
        let ticket = Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|_| BulkheadError::Full(self.id.clone()))?;
        let slot = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| BulkheadError::Full(self.id.clone()))?;
        Ok(BulkheadPermit {
            _slot: slot,
            _ticket: ticket,
            bulkhead_id: self.id.clone(),
        })
    }

    /// Number of calls currently running
    #[must_use]
    pub fn active_requests(&self) -> usize {
        self.config
            .max_concurrent
            .saturating_sub(self.slots.available_permits())
    }

    /// Number of calls waiting for a slot
    #[must_use]
    pub fn queued_requests(&self) -> usize {
        let admitted = (self.config.max_concurrent + self.config.queue_size)
            .saturating_sub(self.admission.available_permits());
        admitted.saturating_sub(self.active_requests())
    }

    /// Check if every slot is busy
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.slots.available_permits() == 0
    }

    /// Get current statistics
    #[must_use]
    pub fn stats(&self) -> BulkheadStats {
        BulkheadStats {
            active_requests: self.active_requests(),
            queued_requests: self.queued_requests(),
            max_concurrent: self.config.max_concurrent,
            queue_size: self.config.queue_size,
        }
    }
}

/// A permit from a bulkhead
///
/// The slot is released when the permit is dropped.
#[derive(Debug)]
pub struct BulkheadPermit {
    _slot: OwnedSemaphorePermit,
    _ticket: OwnedSemaphorePermit,
    bulkhead_id: String,
}

impl BulkheadPermit {
    /// Get the bulkhead ID this permit belongs to
    #[must_use]
    pub fn bulkhead_id(&self) -> &str {
        &self.bulkhead_id
    }
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        debug!(bulkhead = %self.bulkhead_id, "Bulkhead permit released");
    }
}

/// Bulkhead statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadStats {
    /// Calls running
    pub active_requests: usize,
    /// Calls waiting
    pub queued_requests: usize,
    /// Maximum concurrent calls
    pub max_concurrent: usize,
    /// Queue size
    pub queue_size: usize,
}

impl BulkheadStats {
    /// Calculate utilization percentage
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max_concurrent == 0 {
            0.0
        } else {
            self.active_requests as f64 / self.max_concurrent as f64 * 100.0
        }
    }

    /// Check if calls are being queued
    #[must_use]
    pub fn is_queueing(&self) -> bool {
        self.queued_requests > 0
    }
}
