//! Cooperative cancellation.

use core::fmt;

/// Polled by the engine once per children enumeration.
pub trait Interrupt {
    /// Whether the running diff should stop.
    fn is_cancelled(&self) -> bool;
}

/// An interrupt that never fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl Interrupt for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Signal returned when an [`Interrupt`] fired mid-diff.
///
/// Nothing emitted before the signal should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "diff cancelled")
    }
}

impl core::error::Error for Cancelled {}
