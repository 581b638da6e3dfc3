//! Deciding how much of a tree to rebuild after a text edit.
//!
//! A reparse walks through these states:
//!
//! ```text
//! ProbeLeaf -> ProbeAncestorWalk -> ReparseLeaf | ReparseSubtree | FullReparse -> Merge -> Committed
//! ```
//!
//! The tokens bounding the edit are tried first, then every reparseable
//! ancestor of the edit from the innermost outwards. The first region that
//! parses standalone is diffed against its old subtree and only the
//! differences are committed. When nothing works, the whole text is parsed
//! and swapped in as one change.

use facet::Facet;
use indextree::NodeId;
use smallvec::SmallVec;
use treediff::{DiffConfig, DiffTree, Interrupt};

use crate::diff_log::{ChangeEvent, DiffLog};
use crate::error::ReparseError;
use crate::green::Green;
use crate::kind::{KindInfo, Reparseable, SyntaxKind};
use crate::language::Language;
use crate::structure::{SyntaxComparator, SyntaxTreeStructure};
use crate::text::{TextRange, changed_range};
use crate::tree::SyntaxTree;

/// Reparse settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReparseConfig {
    /// Settings of the merge diff
    pub diff: DiffConfig,

    /// Reject a reparsed region whose text length differs from the text it was
    /// parsed from, instead of logging and keeping it. Also makes a full
    /// reparse with that defect an error.
    pub strict_reparse_length: bool,

    /// Check the whole tree after every commit and panic if it is broken.
    pub verify_after_commit: bool,
}

/// Steps of one reparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum ReparseState {
    /// Trying the tokens at the edges of the change.
    ProbeLeaf,
    /// Trying reparseable ancestors of the change.
    ProbeAncestorWalk,
    /// Re-lexing one token.
    ReparseLeaf,
    /// Parsing one subtree standalone.
    ReparseSubtree,
    /// Parsing the whole text.
    FullReparse,
    /// Computing the edit script.
    Merge,
    /// Edit script applied to the tree.
    Committed,
}

/// How an edit ended up being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum ReparseKind {
    /// The text did not change.
    Unchanged,
    /// One token was re-lexed.
    Leaf,
    /// One subtree was parsed again.
    Subtree,
    /// The whole text was parsed again.
    Full,
}

/// Result of a successful reparse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparseOutcome {
    /// Granularity that succeeded
    pub kind: ReparseKind,
    /// Node now covering the reparsed region
    pub reparsed: Option<NodeId>,
    /// Changes committed to the tree
    pub event: ChangeEvent,
    /// States passed through, in order
    pub states: Vec<ReparseState>,
}

/// A node whose new text can be parsed on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReparseCandidate {
    /// Node of the old tree
    pub node: NodeId,
    /// [`Reparseable::Leaf`] or [`Reparseable::Subtree`]
    pub granularity: Reparseable,
}

type States = SmallVec<[ReparseState; 8]>;

fn enter(states: &mut States, state: ReparseState) {
    trace!(?state, "reparse state");
    states.push(state);
}

/// Incremental reparse driver for one language.
pub struct BlockSupport<'l> {
    language: &'l dyn Language,
    config: ReparseConfig,
}

impl<'l> BlockSupport<'l> {
    /// Driver with the default configuration.
    pub fn new(language: &'l dyn Language) -> Self {
        Self::with_config(language, ReparseConfig::default())
    }

    /// Driver with a custom configuration.
    pub fn with_config(language: &'l dyn Language, config: ReparseConfig) -> Self {
        Self { language, config }
    }

    /// Active configuration.
    pub fn config(&self) -> &ReparseConfig {
        &self.config
    }

    /// Bring `tree` in line with `new_text`, deriving the changed range by
    /// comparing it with the current text of the tree.
    pub fn reparse_text(
        &self,
        tree: &mut SyntaxTree,
        new_text: &str,
        interrupt: &dyn Interrupt,
    ) -> Result<ReparseOutcome, ReparseError> {
        let old_text = tree.text(tree.root());
        match changed_range(&old_text, new_text) {
            Some(edit) => self.reparse(tree, edit.range, edit.delta(), new_text, interrupt),
            None => Ok(unchanged()),
        }
    }

    /// Bring `tree` in line with `new_text` after `changed` (a range of the
    /// old text) was replaced, changing the length by `length_shift`.
    ///
    /// On `Err` the tree is left as it was; lazy nodes may have been expanded,
    /// which does not change its text.
    pub fn reparse(
        &self,
        tree: &mut SyntaxTree,
        changed: TextRange,
        length_shift: isize,
        new_text: &str,
        interrupt: &dyn Interrupt,
    ) -> Result<ReparseOutcome, ReparseError> {
        let root = tree.root();
        let old_len = tree.text_len(root);
        if changed.start > changed.end || changed.end > old_len {
            error!(
                %changed,
                old_len,
                file_text = %tree.text(root),
                "changed range does not fit the tree"
            );
            return Err(ReparseError::RangeOutOfBounds {
                start: changed.start,
                end: changed.end,
                len: old_len,
            });
        }
        let expected = old_len.checked_add_signed(length_shift);
        if expected != Some(new_text.len()) {
            error!(
                ?expected,
                actual = new_text.len(),
                file_text = %new_text,
                "new text does not match the edit"
            );
            return Err(ReparseError::TextLengthMismatch {
                expected: expected.unwrap_or(0),
                actual: new_text.len(),
            });
        }
        if interrupt.is_cancelled() {
            return Err(ReparseError::Cancelled);
        }
        if changed.is_empty() && length_shift == 0 {
            return Ok(unchanged());
        }

        debug!(%changed, length_shift, "reparse");
        let mut states = States::new();

        if tree.depth_limit_exceeded() {
            debug!("tree hit the diff depth limit before, rebuilding it whole");
        } else {
            let old_text = tree.text(root);

            enter(&mut states, ReparseState::ProbeLeaf);
            for candidate in self.leaf_candidates(tree, changed) {
                if interrupt.is_cancelled() {
                    return Err(ReparseError::Cancelled);
                }
                if let Some(outcome) = self.try_candidate(
                    tree,
                    &old_text,
                    candidate,
                    length_shift,
                    new_text,
                    interrupt,
                    &mut states,
                )? {
                    return Ok(outcome);
                }
            }

            enter(&mut states, ReparseState::ProbeAncestorWalk);
            for candidate in self.ancestor_candidates(tree, changed, length_shift) {
                if interrupt.is_cancelled() {
                    return Err(ReparseError::Cancelled);
                }
                if let Some(outcome) = self.try_candidate(
                    tree,
                    &old_text,
                    candidate,
                    length_shift,
                    new_text,
                    interrupt,
                    &mut states,
                )? {
                    return Ok(outcome);
                }
            }
        }

        self.full_reparse(tree, new_text, interrupt, states)
    }

    /// First region that would be tried for an edit of `changed`, without
    /// parsing anything. `None` means only a full reparse applies.
    pub fn find_reparseable_root(
        &self,
        tree: &SyntaxTree,
        changed: TextRange,
        length_shift: isize,
    ) -> Option<ReparseCandidate> {
        if tree.depth_limit_exceeded() || changed.end > tree.text_len(tree.root()) {
            return None;
        }
        self.leaf_candidates(tree, changed)
            .into_iter()
            .find(|c| self.eligible(tree, c.node, self.language.kind_info(tree.kind(c.node)), length_shift))
            .or_else(|| {
                self.ancestor_candidates(tree, changed, length_shift)
                    .into_iter()
                    .next()
            })
    }

    fn is_leaf_reparseable(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        tree.is_token(node) && self.language.reparseable(tree.kind(node)) == Reparseable::Leaf
    }

    /// The token ending exactly at the end of the change, then the token
    /// starting exactly at its start.
    fn leaf_candidates(&self, tree: &SyntaxTree, changed: TextRange) -> SmallVec<[ReparseCandidate; 2]> {
        let mut candidates = SmallVec::new();
        let leaf = |node| ReparseCandidate {
            node,
            granularity: Reparseable::Leaf,
        };

        if let Some(end_leaf) = changed.end.checked_sub(1).and_then(|o| tree.find_leaf_at(o)) {
            let range = tree.text_range(end_leaf);
            if range.end == changed.end
                && range.start <= changed.start
                && self.is_leaf_reparseable(tree, end_leaf)
            {
                candidates.push(leaf(end_leaf));
            }
        }
        if let Some(start_leaf) = tree.find_leaf_at(changed.start) {
            let range = tree.text_range(start_leaf);
            if range.start == changed.start
                && range.end >= changed.end
                && self.is_leaf_reparseable(tree, start_leaf)
                && !candidates.iter().any(|c: &ReparseCandidate| c.node == start_leaf)
            {
                candidates.push(leaf(start_leaf));
            }
        }
        candidates
    }

    /// Reparseable nodes from the common ancestor of the tokens around the
    /// change up to, but excluding, the root.
    fn ancestor_candidates(
        &self,
        tree: &SyntaxTree,
        changed: TextRange,
        length_shift: isize,
    ) -> Vec<ReparseCandidate> {
        let before = tree.find_leaf_at(changed.start.saturating_sub(1));
        let after = tree
            .find_leaf_at(changed.end)
            .or_else(|| changed.end.checked_sub(1).and_then(|o| tree.find_leaf_at(o)));
        let start = match (before, after) {
            (Some(a), Some(b)) => tree.common_ancestor(a, b),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => return Vec::new(),
        };

        let root = tree.root();
        let mut candidates = Vec::new();
        for node in tree.ancestors(start).take_while(|&n| n != root) {
            let info = self.language.kind_info(tree.kind(node));
            let granularity = match info.reparseable {
                Reparseable::Subtree => Reparseable::Subtree,
                Reparseable::Leaf if tree.is_token(node) => Reparseable::Leaf,
                Reparseable::Leaf | Reparseable::No => continue,
            };
            if !self.eligible(tree, node, info, length_shift) {
                trace!(kind = info.name, "ancestor not eligible");
                continue;
            }
            candidates.push(ReparseCandidate { node, granularity });
        }
        candidates
    }

    fn eligible(&self, tree: &SyntaxTree, node: NodeId, info: KindInfo, length_shift: isize) -> bool {
        let new_len = tree.text_len(node).checked_add_signed(length_shift);
        if !new_len.is_some_and(|len| len > 0) {
            return false;
        }
        let base = self.language.base_language();
        info.language == base
            || info.reparseable == Reparseable::Leaf
            || !tree
                .descendants(node)
                .skip(1)
                .any(|d| self.language.kind_info(tree.kind(d)).language != base)
    }

    #[allow(clippy::too_many_arguments)]
    fn try_candidate(
        &self,
        tree: &mut SyntaxTree,
        old_text: &str,
        candidate: ReparseCandidate,
        length_shift: isize,
        new_text: &str,
        interrupt: &dyn Interrupt,
        states: &mut States,
    ) -> Result<Option<ReparseOutcome>, ReparseError> {
        let kind = tree.kind(candidate.node);
        let Some(new_range) = tree.text_range(candidate.node).shift_end(length_shift) else {
            return Ok(None);
        };
        let Some(text) = new_text.get(new_range.start..new_range.end).filter(|t| !t.is_empty())
        else {
            trace!(%new_range, "candidate range is empty or splits a character");
            return Ok(None);
        };

        let green = if candidate.granularity == Reparseable::Leaf {
            enter(states, ReparseState::ReparseLeaf);
            self.language.reparse_leaf(kind, text)
        } else {
            enter(states, ReparseState::ReparseSubtree);
            self.language.parse_subtree(kind, text)
        };
        let Some(green) = green else {
            debug!(kind = self.language.kind_name(kind), "candidate did not parse");
            return Ok(None);
        };
        if !self.validate(&green, kind, text) {
            return Ok(None);
        }
        if candidate.granularity == Reparseable::Leaf
            && !self.neighbours_stay_apart(tree, candidate.node, kind, text)
        {
            debug!(kind = self.language.kind_name(kind), "relexed token would merge with a neighbour");
            return Ok(None);
        }

        let reparse_kind = match candidate.granularity {
            Reparseable::Leaf => ReparseKind::Leaf,
            _ => ReparseKind::Subtree,
        };
        self.merge(tree, old_text, candidate, reparse_kind, &green, interrupt, states)
            .map(Some)
    }

    fn validate(&self, green: &Green, kind: SyntaxKind, text: &str) -> bool {
        if green.kind() != kind {
            debug!("reparsed root has a different kind");
            return false;
        }
        if self.error_at_boundary(green) {
            debug!("reparsed region has an error at its boundary");
            return false;
        }
        let actual = green.text_len();
        if actual != text.len() {
            if self.config.strict_reparse_length {
                error!(
                    expected = text.len(),
                    actual,
                    node_text = %text,
                    "reparsed region length differs from its text, rejecting it"
                );
                return false;
            }
            error!(
                expected = text.len(),
                actual,
                node_text = %text,
                "reparsed region length differs from its text, keeping it"
            );
        }
        true
    }

    /// Whether the tokens before and after `node` still lex apart from it once
    /// it holds `text`.
    fn neighbours_stay_apart(&self, tree: &SyntaxTree, node: NodeId, kind: SyntaxKind, text: &str) -> bool {
        let range = tree.text_range(node);
        let before = range.start.checked_sub(1).and_then(|o| tree.find_leaf_at(o));
        let after = tree.find_leaf_at(range.end);
        before.is_none_or(|b| {
            self.language
                .tokens_stay_apart((tree.kind(b), &tree.text(b)), (kind, text))
        }) && after.is_none_or(|a| {
            self.language
                .tokens_stay_apart((kind, text), (tree.kind(a), &tree.text(a)))
        })
    }

    /// Whether an error node lies on the first-child or last-child chain.
    fn error_at_boundary(&self, green: &Green) -> bool {
        let chain_has_error = |pick: fn(&[Green]) -> Option<&Green>| {
            let mut node = Some(green);
            while let Some(current) = node {
                if self.language.is_error(current.kind()) {
                    return true;
                }
                node = pick(current.children());
            }
            false
        };
        chain_has_error(<[Green]>::first) || chain_has_error(<[Green]>::last)
    }

    #[allow(clippy::too_many_arguments)]
    fn merge(
        &self,
        tree: &mut SyntaxTree,
        old_text: &str,
        candidate: ReparseCandidate,
        kind: ReparseKind,
        green: &Green,
        interrupt: &dyn Interrupt,
        states: &mut States,
    ) -> Result<ReparseOutcome, ReparseError> {
        enter(states, ReparseState::Merge);
        let mut replacement = SyntaxTree::from_green(green);
        let replacement_text = green.text();
        let replacement_root = replacement.root();

        let mut log = DiffLog::new(tree.root());
        let outcome = {
            let mut old_side = SyntaxTreeStructure::new(tree, candidate.node, self.language);
            let mut new_side =
                SyntaxTreeStructure::new(&mut replacement, replacement_root, self.language);
            let comparator = SyntaxComparator::new(old_text, &replacement_text);
            DiffTree::new(&mut old_side, &mut new_side, &comparator, old_text)
                .with_config(self.config.diff.clone())
                .with_interrupt(interrupt)
                .diff(&mut log)?
        };
        if outcome.depth_limit_exceeded {
            warn!("merge hit the diff depth limit, later edits rebuild the whole tree");
            tree.mark_depth_limit_exceeded();
        }

        let event = log.commit(tree, &replacement);
        self.verify(tree);
        enter(states, ReparseState::Committed);

        let reparsed = event
            .changes
            .iter()
            .find(|change| change.old_child == Some(candidate.node))
            .and_then(|change| change.new_child)
            .unwrap_or(candidate.node);
        debug!(?kind, changes = event.len(), "incremental reparse committed");
        Ok(ReparseOutcome {
            kind,
            reparsed: Some(reparsed),
            event,
            states: states.to_vec(),
        })
    }

    fn full_reparse(
        &self,
        tree: &mut SyntaxTree,
        new_text: &str,
        interrupt: &dyn Interrupt,
        mut states: States,
    ) -> Result<ReparseOutcome, ReparseError> {
        enter(&mut states, ReparseState::FullReparse);
        let green = self.language.parse(new_text);
        let actual = green.text_len();
        if actual != new_text.len() {
            if self.config.strict_reparse_length {
                error!(expected = new_text.len(), actual, "full parse does not cover the text");
                return Err(ReparseError::InconsistentReparse {
                    expected: new_text.len(),
                    actual,
                });
            }
            error!(
                expected = new_text.len(),
                actual,
                "full parse does not cover the text, keeping it"
            );
        }
        if interrupt.is_cancelled() {
            return Err(ReparseError::Cancelled);
        }

        enter(&mut states, ReparseState::Merge);
        let replacement = SyntaxTree::from_green(&green);
        let mut log = DiffLog::new(tree.root());
        log.replace_root(replacement.root());
        let event = log.commit(tree, &replacement);
        self.verify(tree);
        enter(&mut states, ReparseState::Committed);

        debug!("full reparse committed");
        Ok(ReparseOutcome {
            kind: ReparseKind::Full,
            reparsed: Some(tree.root()),
            event,
            states: states.to_vec(),
        })
    }

    fn verify(&self, tree: &SyntaxTree) {
        if !self.config.verify_after_commit {
            return;
        }
        if let Err(problem) = tree.check_consistency() {
            error!(%problem, file_text = %tree.text(tree.root()), "tree broken after commit");
            panic!("syntax tree inconsistent after commit: {problem}");
        }
    }
}

fn unchanged() -> ReparseOutcome {
    ReparseOutcome {
        kind: ReparseKind::Unchanged,
        reparsed: None,
        event: ChangeEvent::default(),
        states: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::{CancelAfter, CancellationToken};
    use crate::demo::{self, DemoLanguage};
    use facet_testhelpers::test;
    use treediff::NeverCancel;

    fn fresh(language: &DemoLanguage, text: &str) -> String {
        SyntaxTree::parse(language, text).dump(language)
    }

    #[test]
    fn test_unchanged_text_does_nothing() {
        let language = DemoLanguage::default();
        let mut tree = SyntaxTree::parse(&language, "a; { b; }");
        let outcome = BlockSupport::new(&language)
            .reparse_text(&mut tree, "a; { b; }", &NeverCancel)
            .unwrap();
        assert_eq!(outcome.kind, ReparseKind::Unchanged);
        assert!(outcome.event.is_empty());
        assert!(outcome.states.is_empty());
    }

    #[test]
    fn test_identifier_edit_relexes_one_token() {
        let language = DemoLanguage::default();
        let mut tree = SyntaxTree::parse(&language, "a = 1; { foo; }");
        let new_text = "a = 1; { fooo; }";
        let outcome = BlockSupport::new(&language)
            .reparse_text(&mut tree, new_text, &NeverCancel)
            .unwrap();

        assert_eq!(outcome.kind, ReparseKind::Leaf);
        assert_eq!(
            outcome.states,
            vec![
                ReparseState::ProbeLeaf,
                ReparseState::ReparseLeaf,
                ReparseState::Merge,
                ReparseState::Committed,
            ]
        );
        let reparsed = outcome.reparsed.unwrap();
        assert_eq!(tree.kind(reparsed), demo::IDENT);
        assert_eq!(tree.text(reparsed), "fooo");
        assert_eq!(tree.dump(&language), fresh(&language, new_text));
    }

    #[test]
    fn test_new_statement_reparses_enclosing_block() {
        let language = DemoLanguage::default();
        let mut tree = SyntaxTree::parse(&language, "x; { a; }");
        let root = tree.root();
        let x_statement = tree.children(root).next().unwrap();
        let block = tree.children(root).nth(2).unwrap();
        let a_statement = tree.children(block).nth(2).unwrap();

        let new_text = "x; { a; b; }";
        let outcome = BlockSupport::new(&language)
            .reparse_text(&mut tree, new_text, &NeverCancel)
            .unwrap();

        assert_eq!(outcome.kind, ReparseKind::Subtree);
        assert_eq!(outcome.reparsed, Some(block));
        assert_eq!(
            outcome.states,
            vec![
                ReparseState::ProbeLeaf,
                ReparseState::ReparseLeaf,
                ReparseState::ProbeAncestorWalk,
                ReparseState::ReparseSubtree,
                ReparseState::Merge,
                ReparseState::Committed,
            ]
        );
        // Two inserts, everything else kept its identity.
        assert_eq!(outcome.event.len(), 2);
        assert_eq!(tree.children(root).next(), Some(x_statement));
        assert_eq!(tree.children(block).nth(2), Some(a_statement));
        assert_eq!(tree.dump(&language), fresh(&language, new_text));
    }

    #[test]
    fn test_edit_across_blocks_falls_back_to_full_reparse() {
        let language = DemoLanguage::default();
        let mut tree = SyntaxTree::parse(&language, "{ a; } { b; }");
        let new_text = "{ a; b; }";
        let outcome = BlockSupport::new(&language)
            .reparse_text(&mut tree, new_text, &NeverCancel)
            .unwrap();

        assert_eq!(outcome.kind, ReparseKind::Full);
        assert_eq!(outcome.reparsed, Some(tree.root()));
        assert_eq!(outcome.event.len(), 1);
        assert_eq!(
            outcome.states.last(),
            Some(&ReparseState::Committed)
        );
        assert!(outcome.states.contains(&ReparseState::FullReparse));
        assert_eq!(tree.dump(&language), fresh(&language, new_text));
    }

    #[test]
    fn test_failing_language_still_converges() {
        let language = DemoLanguage {
            fail_subtrees: true,
            ..DemoLanguage::default()
        };
        let mut tree = SyntaxTree::parse(&language, "a = 1; { foo; }");
        let new_text = "a = 1; { fooo; }";
        let outcome = BlockSupport::new(&language)
            .reparse_text(&mut tree, new_text, &NeverCancel)
            .unwrap();
        assert_eq!(outcome.kind, ReparseKind::Full);
        assert_eq!(tree.dump(&language), fresh(&language, new_text));
    }

    #[test]
    fn test_embedded_fragment_defers_to_host_block() {
        let language = DemoLanguage::default();
        let mut tree = SyntaxTree::parse(&language, "{ x = `ab`; }");
        let block = tree.children(tree.root()).next().unwrap();
        let new_text = "{ x = `abc`; }";

        let support = BlockSupport::new(&language);
        let candidate = support
            .find_reparseable_root(&tree, TextRange::new(9, 9), 1)
            .unwrap();
        assert_eq!(candidate.node, block);
        assert_eq!(candidate.granularity, Reparseable::Subtree);

        let outcome = support
            .reparse_text(&mut tree, new_text, &NeverCancel)
            .unwrap();
        assert_eq!(outcome.kind, ReparseKind::Subtree);
        assert_eq!(outcome.reparsed, Some(block));
        assert_eq!(tree.dump(&language), fresh(&language, new_text));
    }

    #[test]
    fn test_find_reparseable_root_prefers_the_token() {
        let language = DemoLanguage::default();
        let tree = SyntaxTree::parse(&language, "a = 1; { foo; }");
        let support = BlockSupport::new(&language);

        let candidate = support
            .find_reparseable_root(&tree, TextRange::new(12, 12), 1)
            .unwrap();
        assert_eq!(tree.text(candidate.node), "foo");
        assert_eq!(candidate.granularity, Reparseable::Leaf);

        // The `=` sits directly under the file.
        assert_eq!(
            support.find_reparseable_root(&tree, TextRange::new(2, 3), 0),
            None
        );
    }

    #[test]
    fn test_depth_limit_forces_full_reparse_until_cleared() {
        let language = DemoLanguage::default();
        let config = ReparseConfig {
            diff: DiffConfig {
                max_depth: 0,
                ..DiffConfig::default()
            },
            ..ReparseConfig::default()
        };
        let support = BlockSupport::with_config(&language, config);
        let mut tree = SyntaxTree::parse(&language, "{ { a; } }");

        let outcome = support
            .reparse_text(&mut tree, "{ { a b; } }", &NeverCancel)
            .unwrap();
        assert_eq!(outcome.kind, ReparseKind::Subtree);
        assert!(tree.depth_limit_exceeded());
        assert_eq!(tree.dump(&language), fresh(&language, "{ { a b; } }"));

        let outcome = support
            .reparse_text(&mut tree, "{ { a bc; } }", &NeverCancel)
            .unwrap();
        assert_eq!(outcome.kind, ReparseKind::Full);
        assert_eq!(
            outcome.states,
            vec![
                ReparseState::FullReparse,
                ReparseState::Merge,
                ReparseState::Committed,
            ]
        );

        tree.clear_depth_limit();
        let outcome = support
            .reparse_text(&mut tree, "{ { a bcd; } }", &NeverCancel)
            .unwrap();
        assert_eq!(outcome.kind, ReparseKind::Leaf);
        assert_eq!(tree.dump(&language), fresh(&language, "{ { a bcd; } }"));
    }

    #[test]
    fn test_cancelled_before_start_leaves_tree_untouched() {
        let language = DemoLanguage::default();
        let mut tree = SyntaxTree::parse(&language, "x; { a; }");
        let before = tree.dump(&language);
        let token = CancellationToken::new();
        token.cancel();

        let result = BlockSupport::new(&language).reparse_text(&mut tree, "x; { a; b; }", &token);
        assert_eq!(result, Err(ReparseError::Cancelled));
        assert_eq!(tree.dump(&language), before);
    }

    #[test]
    fn test_cancelled_mid_diff_leaves_tree_untouched() {
        let language = DemoLanguage::default();
        for polls in [1, 2, 3, 4] {
            let mut tree = SyntaxTree::parse(&language, "x; { a; }");
            let before = tree.dump(&language);
            let result = BlockSupport::new(&language).reparse_text(
                &mut tree,
                "x; { a; b; }",
                &CancelAfter::new(polls),
            );
            assert_eq!(result, Err(ReparseError::Cancelled), "polls = {polls}");
            assert_eq!(tree.dump(&language), before);
        }
    }

    #[test]
    fn test_precondition_errors() {
        let language = DemoLanguage::default();
        let mut tree = SyntaxTree::parse(&language, "a;");
        let support = BlockSupport::new(&language);

        assert_eq!(
            support.reparse(&mut tree, TextRange::new(1, 5), 0, "a;", &NeverCancel),
            Err(ReparseError::RangeOutOfBounds {
                start: 1,
                end: 5,
                len: 2
            })
        );
        assert_eq!(
            support.reparse(&mut tree, TextRange::new(0, 1), 1, "b;", &NeverCancel),
            Err(ReparseError::TextLengthMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            support
                .reparse(&mut tree, TextRange::new(1, 1), 0, "a;", &NeverCancel)
                .unwrap()
                .kind,
            ReparseKind::Unchanged
        );
    }

    #[test]
    fn test_edit_inside_lazy_block() {
        let language = DemoLanguage {
            lazy_blocks: true,
            ..DemoLanguage::default()
        };
        let mut tree = SyntaxTree::parse(&language, "a; { b; { c; } }");
        let new_text = "a; { b; { c; d; } }";
        let outcome = BlockSupport::new(&language)
            .reparse_text(&mut tree, new_text, &NeverCancel)
            .unwrap();
        assert_ne!(outcome.kind, ReparseKind::Full);
        assert_eq!(tree.text(tree.root()), new_text);

        let mut expected = SyntaxTree::parse(&language, new_text);
        expected.expand_all(&language);
        tree.expand_all(&language);
        assert_eq!(tree.dump(&language), expected.dump(&language));
    }

    #[test]
    fn test_whitespace_edit_after_comment_is_not_relexed_alone() {
        let language = DemoLanguage::default();
        let config = ReparseConfig {
            verify_after_commit: true,
            ..ReparseConfig::default()
        };
        let support = BlockSupport::with_config(&language, config);

        let mut tree = SyntaxTree::parse(&language, "# c\n x;");
        let outcome = support.reparse_text(&mut tree, "# c x;", &NeverCancel).unwrap();
        assert_ne!(outcome.kind, ReparseKind::Leaf);
        assert_eq!(tree.dump(&language), fresh(&language, "# c x;"));

        let mut tree = SyntaxTree::parse(&language, "a; { # c\n  b;\n}");
        let block = tree.children(tree.root()).nth(2).unwrap();
        let outcome = support
            .reparse_text(&mut tree, "a; { # c b;\n}", &NeverCancel)
            .unwrap();
        assert_eq!(outcome.kind, ReparseKind::Subtree);
        assert_eq!(outcome.reparsed, Some(block));
        assert_eq!(tree.dump(&language), fresh(&language, "a; { # c b;\n}"));
    }

    /// Demo language with lazy blocks that never manage to expand.
    struct Unexpandable(DemoLanguage);

    impl Language for Unexpandable {
        fn base_language(&self) -> crate::kind::LanguageId {
            self.0.base_language()
        }

        fn kind_info(&self, kind: SyntaxKind) -> KindInfo {
            self.0.kind_info(kind)
        }

        fn parse(&self, text: &str) -> Green {
            self.0.parse(text)
        }

        fn reparse_leaf(&self, kind: SyntaxKind, text: &str) -> Option<Green> {
            self.0.reparse_leaf(kind, text)
        }

        fn parse_subtree(&self, kind: SyntaxKind, text: &str) -> Option<Green> {
            self.0.parse_subtree(kind, text)
        }

        fn expand_lazy(&self, _kind: SyntaxKind, _text: &str) -> Option<Vec<Green>> {
            None
        }
    }

    #[test]
    fn test_failed_lazy_expansion_replaces_the_block() {
        let language = Unexpandable(DemoLanguage {
            lazy_blocks: true,
            ..DemoLanguage::default()
        });
        let mut tree = SyntaxTree::parse(&language, "x; { a; }");
        let block = tree.children(tree.root()).nth(2).unwrap();
        assert!(tree.is_lazy(block));

        let new_text = "x; { a; b; }";
        let outcome = BlockSupport::new(&language)
            .reparse_text(&mut tree, new_text, &NeverCancel)
            .unwrap();

        assert_eq!(outcome.kind, ReparseKind::Subtree);
        assert_eq!(outcome.event.len(), 1);
        assert_eq!(outcome.event.changes[0].kind, crate::diff_log::ChangeKind::Replaced);
        assert!(!tree.is_live(block));
        assert_eq!(tree.text(tree.root()), new_text);
        tree.check_consistency().unwrap();
        assert_eq!(tree.dump(&language), fresh(&DemoLanguage::default(), new_text));
    }

    #[test]
    fn test_verify_after_commit_accepts_good_trees() {
        let language = DemoLanguage::default();
        let config = ReparseConfig {
            verify_after_commit: true,
            ..ReparseConfig::default()
        };
        let support = BlockSupport::with_config(&language, config);
        let mut tree = SyntaxTree::parse(&language, "a; { b; }");
        for text in ["a; { b; c; }", "a; { b; c }", "ab; { b; c; }", "{"] {
            support.reparse_text(&mut tree, text, &NeverCancel).unwrap();
            assert_eq!(tree.dump(&language), fresh(&language, text));
        }
    }
}
