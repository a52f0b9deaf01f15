//! Cancellation
//!
//! A cloneable token carrying a cancel flag and an optional deadline.
//! Components check it before every backend round trip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{BridgeError, Result};

/// Cooperative cancellation signal shared between a caller and an operation
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that expires `timeout` from now
    ///
    /// A timeout beyond what the clock can represent means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Cancel every operation holding a clone of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// `Err(Cancelled)` once the token is cancelled or past its deadline
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        Ok(())
    }
}
