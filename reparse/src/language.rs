//! The parser side of incremental reparsing.

use crate::green::Green;
use crate::kind::{KindInfo, LanguageId, Reparseable, SyntaxKind};

/// A language that can build and partially rebuild syntax trees.
///
/// Every partial parse may fail by returning `None`; the caller then tries a
/// larger region, and ultimately the whole file.
pub trait Language {
    /// Language of the documents this parser handles.
    fn base_language(&self) -> LanguageId;

    /// Static facts about an element type.
    fn kind_info(&self, kind: SyntaxKind) -> KindInfo;

    /// Parse a whole document. Must not fail; errors become error nodes.
    fn parse(&self, text: &str) -> Green;

    /// Lex `text` as a single token of `kind`.
    fn reparse_leaf(&self, kind: SyntaxKind, text: &str) -> Option<Green>;

    /// Parse `text` standalone as a subtree rooted at `kind`.
    fn parse_subtree(&self, kind: SyntaxKind, text: &str) -> Option<Green>;

    /// Parse the children of a lazy node of `kind` covering `text`.
    fn expand_lazy(&self, kind: SyntaxKind, text: &str) -> Option<Vec<Green>>;

    /// Whether token `left` directly followed by token `right` lexes back into
    /// the same two tokens. Asked for both neighbours of a relexed token,
    /// since the neighbours themselves are not lexed again.
    fn tokens_stay_apart(&self, left: (SyntaxKind, &str), right: (SyntaxKind, &str)) -> bool {
        let _ = (left, right);
        true
    }

    /// Incremental reparse granularity of `kind`.
    fn reparseable(&self, kind: SyntaxKind) -> Reparseable {
        self.kind_info(kind).reparseable
    }

    /// Whether `kind` marks a syntax error.
    fn is_error(&self, kind: SyntaxKind) -> bool {
        self.kind_info(kind).error
    }

    /// Display name of `kind`.
    fn kind_name(&self, kind: SyntaxKind) -> &'static str {
        self.kind_info(kind).name
    }
}
