//! Cooperative cancellation for background partition work
//!
//! Workers poll the token between partitions. Cancellation is never
//! preemptive: a partition that has started always finishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to stop at its next check
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Re-arm the token once every worker observing it has been joined
    pub fn clear(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}
