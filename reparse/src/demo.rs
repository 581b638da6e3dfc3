//! A small block-structured language used by tests, benches and examples.
//!
//! ```text
//! file      = item*
//! item      = block | statement | WHITESPACE | COMMENT
//! block     = "{" item* "}"
//! statement = (token | embedded)+ ";"
//! embedded  = "`" FOREIGN_TEXT? "`"
//! ```
//!
//! A statement without `;` and a block without `}` become ERROR nodes, a
//! stray `}` becomes an ERROR token. Embedded fragments belong to a second,
//! foreign language.

use crate::green::Green;
use crate::kind::{KindInfo, LanguageId, Reparseable, SyntaxKind};
use crate::language::Language;

/// The demo language itself.
pub const DEMO: LanguageId = LanguageId(1);
/// Language of the text between backticks.
pub const FOREIGN: LanguageId = LanguageId(2);

pub const FILE: SyntaxKind = SyntaxKind(0);
pub const BLOCK: SyntaxKind = SyntaxKind(1);
pub const STATEMENT: SyntaxKind = SyntaxKind(2);
pub const ERROR: SyntaxKind = SyntaxKind(3);
pub const EMBEDDED: SyntaxKind = SyntaxKind(4);
pub const IDENT: SyntaxKind = SyntaxKind(10);
pub const NUMBER: SyntaxKind = SyntaxKind(11);
pub const STRING: SyntaxKind = SyntaxKind(12);
pub const WHITESPACE: SyntaxKind = SyntaxKind(13);
pub const COMMENT: SyntaxKind = SyntaxKind(14);
pub const EQ: SyntaxKind = SyntaxKind(15);
pub const SEMI: SyntaxKind = SyntaxKind(16);
pub const LBRACE: SyntaxKind = SyntaxKind(17);
pub const RBRACE: SyntaxKind = SyntaxKind(18);
pub const BACKTICK: SyntaxKind = SyntaxKind(19);
pub const FOREIGN_TEXT: SyntaxKind = SyntaxKind(20);

fn kind_info(kind: SyntaxKind) -> KindInfo {
    let demo = |name| KindInfo::plain(name, DEMO);
    match kind {
        FILE => demo("FILE"),
        BLOCK => demo("BLOCK").reparseable(Reparseable::Subtree),
        STATEMENT => demo("STATEMENT"),
        ERROR => demo("ERROR").error(),
        EMBEDDED => KindInfo::plain("EMBEDDED", FOREIGN).reparseable(Reparseable::Subtree),
        IDENT => demo("IDENT").reparseable(Reparseable::Leaf),
        NUMBER => demo("NUMBER").reparseable(Reparseable::Leaf),
        STRING => demo("STRING").reparseable(Reparseable::Leaf),
        WHITESPACE => demo("WHITESPACE").reparseable(Reparseable::Leaf),
        COMMENT => demo("COMMENT").reparseable(Reparseable::Leaf),
        EQ => demo("EQ"),
        SEMI => demo("SEMI"),
        LBRACE => demo("LBRACE"),
        RBRACE => demo("RBRACE"),
        BACKTICK => demo("BACKTICK"),
        FOREIGN_TEXT => KindInfo::plain("FOREIGN_TEXT", FOREIGN),
        _ => demo("UNKNOWN"),
    }
}

/// Parser for the demo language.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoLanguage {
    /// Produce blocks as lazy nodes, parsed on first access.
    pub lazy_blocks: bool,
    /// Refuse every leaf and subtree reparse, so only full parses succeed.
    pub fail_subtrees: bool,
}

#[derive(Debug, Clone, Copy)]
struct Lexeme {
    kind: SyntaxKind,
    start: usize,
    end: usize,
}

fn prefix_len(text: &str, pred: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(text.len(), |(i, _)| i)
}

fn lex(text: &str) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    let mut pos = 0;
    while let Some(c) = text[pos..].chars().next() {
        let rest = &text[pos..];
        let (kind, len) = match c {
            '`' => match rest[1..].find('`') {
                Some(close) => {
                    lexemes.push(Lexeme {
                        kind: BACKTICK,
                        start: pos,
                        end: pos + 1,
                    });
                    if close > 0 {
                        lexemes.push(Lexeme {
                            kind: FOREIGN_TEXT,
                            start: pos + 1,
                            end: pos + 1 + close,
                        });
                    }
                    (BACKTICK, close + 2)
                }
                None => (ERROR, rest.len()),
            },
            '"' => match rest[1..].find('"') {
                Some(close) => (STRING, close + 2),
                None => (ERROR, rest.len()),
            },
            '#' => (COMMENT, rest.find('\n').unwrap_or(rest.len())),
            '=' => (EQ, 1),
            ';' => (SEMI, 1),
            '{' => (LBRACE, 1),
            '}' => (RBRACE, 1),
            c if c.is_whitespace() => (WHITESPACE, prefix_len(rest, char::is_whitespace)),
            c if c.is_ascii_alphabetic() || c == '_' => (
                IDENT,
                prefix_len(rest, |c| c.is_ascii_alphanumeric() || c == '_'),
            ),
            c if c.is_ascii_digit() => (NUMBER, prefix_len(rest, |c| c.is_ascii_digit())),
            other => (ERROR, other.len_utf8()),
        };
        // The closing backtick is the last byte of the matched fragment.
        let start = if kind == BACKTICK { pos + len - 1 } else { pos };
        lexemes.push(Lexeme {
            kind,
            start,
            end: pos + len,
        });
        pos += len;
    }
    lexemes
}

struct Parser<'s> {
    text: &'s str,
    lexemes: Vec<Lexeme>,
    pos: usize,
    lazy_blocks: bool,
}

impl<'s> Parser<'s> {
    fn new(text: &'s str, lazy_blocks: bool) -> Self {
        Self {
            text,
            lexemes: lex(text),
            pos: 0,
            lazy_blocks,
        }
    }

    fn peek(&self) -> Option<Lexeme> {
        self.lexemes.get(self.pos).copied()
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        self.peek().is_some_and(|l| l.kind == kind)
    }

    fn at_end(&self) -> bool {
        self.pos == self.lexemes.len()
    }

    fn bump_as(&mut self, kind: SyntaxKind) -> Green {
        let lexeme = self.lexemes[self.pos];
        self.pos += 1;
        Green::token(kind, &self.text[lexeme.start..lexeme.end])
    }

    fn bump(&mut self) -> Green {
        let kind = self.lexemes[self.pos].kind;
        self.bump_as(kind)
    }

    fn items(&mut self, in_block: bool) -> Vec<Green> {
        let mut items = Vec::new();
        while let Some(lexeme) = self.peek() {
            match lexeme.kind {
                WHITESPACE | COMMENT => items.push(self.bump()),
                LBRACE => items.push(self.block(true)),
                RBRACE if in_block => break,
                RBRACE => items.push(self.bump_as(ERROR)),
                _ => items.push(self.statement()),
            }
        }
        items
    }

    fn block(&mut self, allow_lazy: bool) -> Green {
        let start = self.lexemes[self.pos].start;
        let mut children = vec![self.bump()];
        children.extend(self.items(true));
        let kind = if self.at(RBRACE) {
            children.push(self.bump());
            BLOCK
        } else {
            ERROR
        };
        if allow_lazy && self.lazy_blocks && kind == BLOCK {
            let end = self.lexemes[self.pos - 1].end;
            return Green::lazy(BLOCK, &self.text[start..end]);
        }
        Green::node(kind, children)
    }

    fn statement(&mut self) -> Green {
        let mut children = Vec::new();
        while let Some(lexeme) = self.peek() {
            match lexeme.kind {
                SEMI => {
                    children.push(self.bump());
                    return Green::node(STATEMENT, children);
                }
                LBRACE | RBRACE => break,
                WHITESPACE | COMMENT if !self.statement_continues() => break,
                BACKTICK => children.push(self.embedded()),
                _ => children.push(self.bump()),
            }
        }
        Green::node(ERROR, children)
    }

    /// Trivia belongs to the statement only when more of it follows.
    fn statement_continues(&self) -> bool {
        self.lexemes[self.pos..]
            .iter()
            .find(|l| !matches!(l.kind, WHITESPACE | COMMENT))
            .is_some_and(|l| !matches!(l.kind, LBRACE | RBRACE))
    }

    fn embedded(&mut self) -> Green {
        let mut children = vec![self.bump()];
        if self.at(FOREIGN_TEXT) {
            children.push(self.bump());
        }
        if self.at(BACKTICK) {
            children.push(self.bump());
        }
        Green::node(EMBEDDED, children)
    }
}

impl Language for DemoLanguage {
    fn base_language(&self) -> LanguageId {
        DEMO
    }

    fn kind_info(&self, kind: SyntaxKind) -> KindInfo {
        kind_info(kind)
    }

    fn parse(&self, text: &str) -> Green {
        let mut parser = Parser::new(text, self.lazy_blocks);
        Green::node(FILE, parser.items(false))
    }

    fn reparse_leaf(&self, kind: SyntaxKind, text: &str) -> Option<Green> {
        if self.fail_subtrees {
            return None;
        }
        match lex(text).as_slice() {
            [only] if only.kind == kind && only.end == text.len() => Some(Green::token(kind, text)),
            _ => None,
        }
    }

    fn tokens_stay_apart(&self, left: (SyntaxKind, &str), right: (SyntaxKind, &str)) -> bool {
        // A comment runs up to the next newline.
        left.0 != COMMENT || right.1.starts_with('\n')
    }

    fn parse_subtree(&self, kind: SyntaxKind, text: &str) -> Option<Green> {
        if self.fail_subtrees {
            return None;
        }
        let mut parser = Parser::new(text, self.lazy_blocks);
        let green = match (kind, parser.peek()?.kind) {
            (BLOCK, LBRACE) => parser.block(false),
            (EMBEDDED, BACKTICK) => parser.embedded(),
            _ => return None,
        };
        (parser.at_end() && green.kind() == kind).then_some(green)
    }

    fn expand_lazy(&self, kind: SyntaxKind, text: &str) -> Option<Vec<Green>> {
        let mut parser = Parser::new(text, self.lazy_blocks);
        if kind != BLOCK || !parser.at(LBRACE) {
            return None;
        }
        match parser.block(false) {
            Green::Node { kind: BLOCK, children } if parser.at_end() => Some(children),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SyntaxTree;
    use facet_testhelpers::test;

    fn dump(text: &str) -> String {
        let language = DemoLanguage::default();
        SyntaxTree::parse(&language, text).dump(&language)
    }

    #[test]
    fn test_parse_shape() {
        let expected = "\
FILE@0..9
  STATEMENT@0..2
    IDENT@0..1 \"a\"
    SEMI@1..2 \";\"
  WHITESPACE@2..3 \" \"
  BLOCK@3..9
    LBRACE@3..4 \"{\"
    WHITESPACE@4..5 \" \"
    STATEMENT@5..7
      IDENT@5..6 \"b\"
      SEMI@6..7 \";\"
    WHITESPACE@7..8 \" \"
    RBRACE@8..9 \"}\"
";
        assert_eq!(dump("a; { b; }"), expected);
    }

    #[test]
    fn test_errors_are_nodes() {
        let dumped = dump("a = 1 } { b");
        assert!(dumped.contains("ERROR@0..5\n"), "{dumped}");
        assert!(dumped.contains("ERROR@6..7 \"}\""), "{dumped}");
        assert!(dumped.contains("ERROR@8..11\n"), "{dumped}");
    }

    #[test]
    fn test_embedded_fragment() {
        let dumped = dump("x = `raw text`;");
        assert!(dumped.contains("EMBEDDED@4..14"), "{dumped}");
        assert!(dumped.contains("FOREIGN_TEXT@5..13 \"raw text\""), "{dumped}");

        let unterminated = dump("x = `raw");
        assert!(unterminated.contains("ERROR@4..8 \"`raw\""), "{unterminated}");
    }

    #[test]
    fn test_parse_preserves_text() {
        let language = DemoLanguage::default();
        for text in [
            "",
            "  ",
            "a; # note\n{ b = \"s\"; { c; } }",
            "}}}{{{",
            "ü = 1; `ß`; \"open",
            "x = `a` `b`;",
        ] {
            let tree = SyntaxTree::parse(&language, text);
            assert_eq!(tree.text(tree.root()), text);
            tree.check_consistency().unwrap();
        }
    }

    #[test]
    fn test_leaf_reparse() {
        let language = DemoLanguage::default();
        assert_eq!(
            language.reparse_leaf(IDENT, "foo_1"),
            Some(Green::token(IDENT, "foo_1"))
        );
        assert_eq!(language.reparse_leaf(IDENT, "foo bar"), None);
        assert_eq!(language.reparse_leaf(NUMBER, "1a"), None);
        assert_eq!(language.reparse_leaf(IDENT, "12"), None);
        assert_eq!(language.reparse_leaf(WHITESPACE, ""), None);
        assert_eq!(language.reparse_leaf(COMMENT, "# a\n"), None);
    }

    #[test]
    fn test_comment_needs_a_newline_after_it() {
        let language = DemoLanguage::default();
        assert!(language.tokens_stay_apart((COMMENT, "# a"), (WHITESPACE, "\n  ")));
        assert!(!language.tokens_stay_apart((COMMENT, "# a"), (WHITESPACE, " ")));
        assert!(language.tokens_stay_apart((WHITESPACE, " "), (COMMENT, "# a")));
        assert!(language.tokens_stay_apart((IDENT, "a"), (SEMI, ";")));
    }

    #[test]
    fn test_subtree_reparse_requires_a_closed_block() {
        let language = DemoLanguage::default();
        let block = language.parse_subtree(BLOCK, "{ a; { b; } }").unwrap();
        assert_eq!(block.kind(), BLOCK);
        assert_eq!(block.text(), "{ a; { b; } }");

        assert_eq!(language.parse_subtree(BLOCK, "{ a; } }"), None);
        assert_eq!(language.parse_subtree(BLOCK, "{ a; # }"), None);
        assert_eq!(language.parse_subtree(BLOCK, "a; { }"), None);
        assert_eq!(language.parse_subtree(STATEMENT, "a;"), None);
        assert!(language.parse_subtree(EMBEDDED, "`x`").is_some());

        let failing = DemoLanguage {
            fail_subtrees: true,
            ..DemoLanguage::default()
        };
        assert_eq!(failing.parse_subtree(BLOCK, "{ a; }"), None);
        assert_eq!(failing.reparse_leaf(IDENT, "a"), None);
    }

    #[test]
    fn test_lazy_blocks() {
        let language = DemoLanguage {
            lazy_blocks: true,
            ..DemoLanguage::default()
        };
        let green = language.parse("a; { b; { c; } }");
        assert_eq!(green.children()[2], Green::lazy(BLOCK, "{ b; { c; } }"));

        let children = language.expand_lazy(BLOCK, "{ b; { c; } }").unwrap();
        assert_eq!(children.len(), 7);
        assert!(matches!(children[4], Green::Lazy { kind: BLOCK, .. }));
        assert_eq!(language.expand_lazy(BLOCK, "{ b; "), None);
    }
}
