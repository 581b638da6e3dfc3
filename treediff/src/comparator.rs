//! Shallow node comparison.

use core::fmt;

/// Three-valued answer to "are these two nodes equal?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreeState {
    /// Content-identical, descendants included. No recursion needed.
    Yes,
    /// Guaranteed different.
    No,
    /// Cannot tell without looking at the children.
    Unsure,
}

impl fmt::Display for ThreeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreeState::Yes => write!(f, "yes"),
            ThreeState::No => write!(f, "no"),
            ThreeState::Unsure => write!(f, "unsure"),
        }
    }
}

/// Compares an old-side handle with a new-side handle without walking subtrees.
///
/// `types_equal` is the fast reject. `deep_equal` is only consulted for nodes
/// whose types match, and may answer [`ThreeState::Unsure`] to make the engine
/// recurse.
pub trait ShallowNodeComparator<O, N> {
    /// Whether both nodes have the same element type. Must be cheap.
    fn types_equal(&self, old: O, new: N) -> bool;

    /// Structural hash comparison. Only called when both nodes have no children.
    fn hash_codes_equal(&self, old: O, new: N) -> bool;

    /// Whether the nodes are equal including their descendants.
    fn deep_equal(&self, old: O, new: N) -> ThreeState;
}
