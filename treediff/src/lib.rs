//! # treediff
//!
//! Shallow-compare tree diffing for incremental reparsing.
//!
//! Given an old tree and a freshly built new tree for (part of) the same text,
//! [`DiffTree`] produces an ordered script of replace, insert and delete
//! operations that turns the old tree into the new one while keeping as many
//! old nodes as possible. Nodes that survive keep their identity, which is the
//! whole point: anything hanging off an old node (caches, references held by
//! other components) stays valid.
//!
//! ## Algorithm Overview
//!
//! The engine is a single top-down pass:
//!
//! 1. **Shallow compare**: every pair of nodes is classified by a
//!    [`ShallowNodeComparator`] as equal, different, same-type-only or "needs
//!    a look at the children".
//! 2. **End matching**: the longest equal suffix and prefix of two child lists
//!    are skipped without emitting anything.
//! 3. **Middle merge**: the remaining range is resolved left to right with a
//!    three-element lookahead, emitting inserts, deletes and replacements and
//!    recursing into same-type pairs.
//!
//! Trees are never walked directly. A [`TreeStructure`] hands out copyable
//! handles and fills per-depth buffers owned by the engine.
//!
//! ## Usage
//!
//! ```
//! use treediff::{DiffTree, EditScript, SimpleComparator, SimpleTree};
//!
//! let mut old = SimpleTree::new("block");
//! old.add_leaf(old.root, "ident", "foo");
//! old.add_leaf(old.root, "ident", "bar");
//!
//! let mut new = SimpleTree::new("block");
//! new.add_leaf(new.root, "ident", "foo");
//! new.add_leaf(new.root, "ident", "baz");
//!
//! let old_text = old.full_text();
//! let mut script = EditScript::new();
//! let outcome = DiffTree::new(&mut old, &mut new, &SimpleComparator, &old_text)
//!     .diff(&mut script)
//!     .unwrap();
//!
//! assert!(!outcome.equal);
//! assert_eq!(script.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

/// Edit script consumers
pub mod builder;
/// Node comparison
pub mod comparator;
mod diff_tree;
/// Cooperative cancellation
pub mod interrupt;
/// Ready-made labelled tree
pub mod simple;
/// Tree access
pub mod structure;

pub use builder::{DiffTreeChangeBuilder, EditOp, EditScript, NoopBuilder};
pub use comparator::{ShallowNodeComparator, ThreeState};
pub use diff_tree::{
    CHANGE_PARENT_VERSUS_CHILDREN_THRESHOLD, DEFAULT_MAX_DEPTH, DiffConfig, DiffOutcome, DiffTree,
    LOOKAHEAD_WINDOW, diff,
};
pub use interrupt::{Cancelled, Interrupt, NeverCancel};
pub use simple::{SimpleComparator, SimpleNode, SimpleTree};
pub use structure::{ChildBuf, TreeStructure};
