//! Consumers of the edit script.

use core::fmt;

use crate::debug;

/// Receives the edit script while the engine runs.
///
/// Operations arrive in the order of a left-to-right scan of each child list.
/// Insert positions refer to the child list as it looks after all previously
/// received operations have been applied, so consumers must replay them in the
/// order they were received.
pub trait DiffTreeChangeBuilder<O, N> {
    /// `old` is replaced by `new` in place.
    fn node_replaced(&mut self, old: O, new: N);

    /// `old_child` is removed from `parent`.
    fn node_deleted(&mut self, parent: O, old_child: O);

    /// `new_child` is inserted into `parent` at `position`.
    fn node_inserted(&mut self, parent: O, new_child: N, position: usize);
}

/// Builder that discards everything. Used for probing runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBuilder;

impl<O, N> DiffTreeChangeBuilder<O, N> for NoopBuilder {
    fn node_replaced(&mut self, _old: O, _new: N) {}

    fn node_deleted(&mut self, _parent: O, _old_child: O) {}

    fn node_inserted(&mut self, _parent: O, _new_child: N, _position: usize) {}
}

/// One entry of a recorded edit script.
#[derive(Clone, PartialEq, Eq)]
pub enum EditOp<O, N> {
    /// Replace an old node with a new one.
    Replace {
        /// The node being replaced
        old: O,
        /// Its replacement
        new: N,
    },

    /// Remove a child.
    Delete {
        /// Parent in the old tree
        parent: O,
        /// The removed child
        node: O,
    },

    /// Insert a child.
    Insert {
        /// Parent in the old tree
        parent: O,
        /// The inserted node, from the new tree
        node: N,
        /// Index in the parent's current child list
        position: usize,
    },
}

impl<O: fmt::Debug, N: fmt::Debug> fmt::Display for EditOp<O, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOp::Replace { old, new } => write!(f, "Replace({old:?} → {new:?})"),
            EditOp::Delete { parent, node } => write!(f, "Delete({node:?} from {parent:?})"),
            EditOp::Insert {
                parent,
                node,
                position,
            } => write!(f, "Insert({node:?} @{position} under {parent:?})"),
        }
    }
}

impl<O: fmt::Debug, N: fmt::Debug> fmt::Debug for EditOp<O, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A builder that records every operation, in order.
#[derive(Clone)]
pub struct EditScript<O, N> {
    ops: Vec<EditOp<O, N>>,
}

impl<O, N> Default for EditScript<O, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O, N> EditScript<O, N> {
    /// Create an empty script.
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Recorded operations in emission order.
    pub fn ops(&self) -> &[EditOp<O, N>] {
        &self.ops
    }

    /// Number of recorded operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Take the recorded operations.
    pub fn into_inner(self) -> Vec<EditOp<O, N>> {
        self.ops
    }
}

impl<O: fmt::Debug, N: fmt::Debug> fmt::Debug for EditScript<O, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.ops).finish()
    }
}

impl<O: fmt::Debug, N: fmt::Debug> DiffTreeChangeBuilder<O, N> for EditScript<O, N> {
    fn node_replaced(&mut self, old: O, new: N) {
        let op = EditOp::Replace { old, new };
        debug!(%op, "emit");
        self.ops.push(op);
    }

    fn node_deleted(&mut self, parent: O, old_child: O) {
        let op = EditOp::Delete {
            parent,
            node: old_child,
        };
        debug!(%op, "emit");
        self.ops.push(op);
    }

    fn node_inserted(&mut self, parent: O, new_child: N, position: usize) {
        let op = EditOp::Insert {
            parent,
            node: new_child,
            position,
        };
        debug!(%op, "emit");
        self.ops.push(op);
    }
}
