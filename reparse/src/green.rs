//! Owned trees as produced by parsers, before they are placed in an arena.

use compact_str::CompactString;

use crate::kind::SyntaxKind;

/// Parser output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Green {
    /// A token with its text.
    Token {
        /// Element type
        kind: SyntaxKind,
        /// Token text
        text: CompactString,
    },
    /// An inner node.
    Node {
        /// Element type
        kind: SyntaxKind,
        /// Children in document order
        children: Vec<Green>,
    },
    /// A node whose children are parsed only when first needed.
    Lazy {
        /// Element type
        kind: SyntaxKind,
        /// Unparsed text of the whole node
        text: CompactString,
    },
}

impl Green {
    /// A token.
    pub fn token(kind: SyntaxKind, text: &str) -> Self {
        Green::Token {
            kind,
            text: CompactString::from(text),
        }
    }

    /// An inner node.
    pub fn node(kind: SyntaxKind, children: Vec<Green>) -> Self {
        Green::Node { kind, children }
    }

    /// A lazily expanded node.
    pub fn lazy(kind: SyntaxKind, text: &str) -> Self {
        Green::Lazy {
            kind,
            text: CompactString::from(text),
        }
    }

    /// Element type.
    pub fn kind(&self) -> SyntaxKind {
        match self {
            Green::Token { kind, .. } | Green::Node { kind, .. } | Green::Lazy { kind, .. } => {
                *kind
            }
        }
    }

    /// Children of an inner node; empty for tokens and lazy nodes.
    pub fn children(&self) -> &[Green] {
        match self {
            Green::Node { children, .. } => children,
            Green::Token { .. } | Green::Lazy { .. } => &[],
        }
    }

    /// Length of the covered text in bytes.
    pub fn text_len(&self) -> usize {
        match self {
            Green::Token { text, .. } | Green::Lazy { text, .. } => text.len(),
            Green::Node { children, .. } => children.iter().map(Green::text_len).sum(),
        }
    }

    /// Append the covered text to `out`.
    pub fn write_text(&self, out: &mut String) {
        match self {
            Green::Token { text, .. } | Green::Lazy { text, .. } => out.push_str(text),
            Green::Node { children, .. } => {
                for child in children {
                    child.write_text(out);
                }
            }
        }
    }

    /// The covered text.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.text_len());
        self.write_text(&mut out);
        out
    }
}
