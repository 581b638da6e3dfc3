//! Element types and their reparse capabilities.

use core::fmt;

/// Element type tag of a syntax node. Meaning is assigned by a [`Language`](crate::Language).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyntaxKind(pub u16);

impl fmt::Debug for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind{}", self.0)
    }
}

/// Identifies a language; embedded fragments carry a different id than the
/// document they live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LanguageId(pub u16);

/// Granularity at which a node type can be parsed again on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Reparseable {
    /// Only as part of its parent.
    #[default]
    No,
    /// A token that can be re-lexed from its new text.
    Leaf,
    /// A subtree that can be parsed standalone from its new text.
    Subtree,
}

/// What a language knows about one element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindInfo {
    /// Name used in tree dumps
    pub name: &'static str,
    /// Language the element belongs to
    pub language: LanguageId,
    /// Incremental reparse granularity
    pub reparseable: Reparseable,
    /// Whether this type marks a syntax error
    pub error: bool,
}

impl KindInfo {
    /// A plain element of `language` that is neither reparseable nor an error.
    pub const fn plain(name: &'static str, language: LanguageId) -> Self {
        Self {
            name,
            language,
            reparseable: Reparseable::No,
            error: false,
        }
    }

    /// Set the reparse granularity.
    pub const fn reparseable(mut self, reparseable: Reparseable) -> Self {
        self.reparseable = reparseable;
        self
    }

    /// Mark as an error element.
    pub const fn error(mut self) -> Self {
        self.error = true;
        self
    }
}
