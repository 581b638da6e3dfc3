//! Cooperative cancellation for reparse requests.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use treediff::Interrupt;

/// Shared cancellation flag. Clones observe the same flag, so another thread
/// can cancel a reparse running on the editing thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clear the flag so the token can be reused for the next request.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

impl Interrupt for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
}

/// Interrupt that fires on the poll after `n` polls have passed.
#[derive(Debug)]
pub struct CancelAfter {
    remaining: Cell<usize>,
}

impl CancelAfter {
    /// Allow `polls` polls before reporting cancellation.
    pub fn new(polls: usize) -> Self {
        Self {
            remaining: Cell::new(polls),
        }
    }
}

impl Interrupt for CancelAfter {
    fn is_cancelled(&self) -> bool {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return true;
        }
        self.remaining.set(remaining - 1);
        false
    }
}
