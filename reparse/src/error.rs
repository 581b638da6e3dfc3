use facet::Facet;
use treediff::Cancelled;

/// Errors that can occur during an incremental reparse.
///
/// A failed incremental attempt is never an error; it falls back to a larger
/// region and ultimately to a full reparse.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ReparseError {
    /// reparse was cancelled before anything was committed
    Cancelled,

    /// new text is {actual} bytes long but the edit implies {expected}
    TextLengthMismatch { expected: usize, actual: usize },

    /// changed range {start}..{end} is outside the old text of {len} bytes
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    /// full reparse covered {actual} bytes of a {expected} byte text
    InconsistentReparse { expected: usize, actual: usize },
}

impl From<Cancelled> for ReparseError {
    fn from(_: Cancelled) -> Self {
        ReparseError::Cancelled
    }
}
