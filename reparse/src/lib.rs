//! Incremental reparsing for arena syntax trees.
//!
//! reparse provides:
//! - **Syntax trees**: [`SyntaxTree`], an indextree arena of tokens, nodes and
//!   lazily parsed regions built from [`Green`] parser output
//! - **Reparse policy**: [`BlockSupport`] picks the smallest region that can be
//!   parsed again after an edit, falling back to a full reparse
//! - **Merging**: the new region is diffed against the old one with
//!   [`treediff`] so untouched nodes keep their identity
//! - **Transactions**: [`DiffLog`] records the edit script and commits it in
//!   one go, notifying a [`TreeChangeListener`] around every mutation
//!
//! # Example
//!
//! ```rust
//! use reparse::demo::DemoLanguage;
//! use reparse::{BlockSupport, CancellationToken, ReparseKind, SyntaxTree};
//!
//! let language = DemoLanguage::default();
//! let mut tree = SyntaxTree::parse(&language, "x = 1; { y = 2; }");
//! let block = tree.children(tree.root()).nth(2).unwrap();
//!
//! let token = CancellationToken::new();
//! let outcome = BlockSupport::new(&language)
//!     .reparse_text(&mut tree, "x = 1; { y = 2; z; }", &token)
//!     .unwrap();
//!
//! assert_eq!(outcome.kind, ReparseKind::Subtree);
//! assert_eq!(outcome.reparsed, Some(block));
//! assert_eq!(tree.text(tree.root()), "x = 1; { y = 2; z; }");
//! ```

#[macro_use]
mod tracing_macros;

mod block_support;
mod cancel;
pub mod demo;
mod diff_log;
mod error;
mod green;
mod kind;
mod language;
mod structure;
mod text;
mod tree;

pub use indextree;
pub use treediff;

pub use block_support::{
    BlockSupport, ReparseCandidate, ReparseConfig, ReparseKind, ReparseOutcome, ReparseState,
};
pub use cancel::{CancelAfter, CancellationToken};
pub use diff_log::{
    ChangeEvent, ChangeKind, DiffLog, LogEntry, Notification, RecordingListener, TreeChange,
    TreeChangeListener,
};
pub use error::ReparseError;
pub use green::Green;
pub use kind::{KindInfo, LanguageId, Reparseable, SyntaxKind};
pub use language::Language;
pub use structure::{SyntaxComparator, SyntaxTreeStructure, TreeNode};
pub use text::{TextEdit, TextRange, changed_range};
pub use tree::{NodeContent, NodeData, SyntaxTree};
