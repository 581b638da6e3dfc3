//! The shallow-compare tree diff.
//!
//! Two trees are aligned one level at a time. At each level the engine matches
//! the longest common suffix and prefix of the two child lists, then walks the
//! unmatched middle with a small lookahead window, deciding for every step
//! whether to recurse, replace, insert or delete. Recursion only happens into
//! pairs of nodes whose types match.
//!
//! The result is streamed into a [`DiffTreeChangeBuilder`]. Nothing is ever
//! emitted while the engine is only confirming equality ("probing"), so a
//! builder sees exactly the edits of the real pass.

use core::mem;

use crate::builder::{DiffTreeChangeBuilder, NoopBuilder};
use crate::comparator::{ShallowNodeComparator, ThreeState};
use crate::interrupt::{Cancelled, Interrupt, NeverCancel};
use crate::structure::{ChildBuf, TreeStructure};
use crate::{debug, trace};

/// Child count difference above which a node is replaced wholesale instead of
/// aligning its children.
pub const CHANGE_PARENT_VERSUS_CHILDREN_THRESHOLD: usize = 20;

/// Number of children looked at on each side when resolving the middle range.
pub const LOOKAHEAD_WINDOW: usize = 3;

/// Default recursion depth after which a subtree is replaced wholesale.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

static NEVER_CANCEL: NeverCancel = NeverCancel;

/// Tuning knobs for [`DiffTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffConfig {
    /// Replace a node instead of aligning its children when the child counts
    /// differ by more than this.
    pub size_divergence_threshold: usize,

    /// Replace a subtree instead of descending when the recursion gets deeper
    /// than this. Reported through [`DiffOutcome::depth_limit_exceeded`].
    pub max_depth: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            size_divergence_threshold: CHANGE_PARENT_VERSUS_CHILDREN_THRESHOLD,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// What a real diff pass observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    /// Both trees were equal; nothing was emitted.
    pub equal: bool,
    /// Some subtree was replaced because of [`DiffConfig::max_depth`].
    pub depth_limit_exceeded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareResult {
    Equal,
    NotEqual,
    DrillDownNeeded,
    TypeOnly,
}

impl CompareResult {
    /// Equal or needs recursion; the strong forms of "looks equal".
    fn is_match(self) -> bool {
        matches!(self, CompareResult::Equal | CompareResult::DrillDownNeeded)
    }
}

/// One diff session between an old and a new tree.
///
/// The session owns its per-depth child buffers; it is not meant to be shared
/// and is consumed by [`diff`](Self::diff) or [`probe`](Self::probe).
pub struct DiffTree<'a, OS: TreeStructure, NS: TreeStructure, C> {
    old: &'a mut OS,
    new: &'a mut NS,
    comparator: &'a C,
    config: DiffConfig,
    interrupt: &'a dyn Interrupt,
    old_buffers: Vec<ChildBuf<OS::Node>>,
    new_buffers: Vec<ChildBuf<NS::Node>>,
    old_text: &'a str,
    new_text: String,
    old_tree_start: usize,
    new_tree_start: usize,
    depth_limit_exceeded: bool,
}

impl<'a, OS, NS, C> DiffTree<'a, OS, NS, C>
where
    OS: TreeStructure,
    NS: TreeStructure,
    C: ShallowNodeComparator<OS::Node, NS::Node>,
{
    /// Set up a session.
    ///
    /// `old_text` is the text the old structure's offsets index into, usually
    /// the full text of the document the old tree belongs to.
    pub fn new(old: &'a mut OS, new: &'a mut NS, comparator: &'a C, old_text: &'a str) -> Self {
        Self {
            old,
            new,
            comparator,
            config: DiffConfig::default(),
            interrupt: &NEVER_CANCEL,
            old_buffers: Vec::new(),
            new_buffers: Vec::new(),
            old_text,
            new_text: String::new(),
            old_tree_start: 0,
            new_tree_start: 0,
            depth_limit_exceeded: false,
        }
    }

    /// Use a non-default configuration.
    pub fn with_config(mut self, config: DiffConfig) -> Self {
        self.config = config;
        self
    }

    /// Poll `interrupt` once per children enumeration.
    pub fn with_interrupt(mut self, interrupt: &'a dyn Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Diff the two roots, streaming edits into `builder`.
    pub fn diff<B>(mut self, builder: &mut B) -> Result<DiffOutcome, Cancelled>
    where
        B: DiffTreeChangeBuilder<OS::Node, NS::Node>,
    {
        let (old_root, new_root) = self.prepare();
        let equal = if self.comparator.types_equal(old_root, new_root) {
            self.build(old_root, new_root, 0, Some(builder))? == CompareResult::Equal
        } else {
            debug!("root types differ, replacing root");
            builder.node_replaced(old_root, new_root);
            false
        };
        debug!(
            equal,
            depth_limit_exceeded = self.depth_limit_exceeded,
            "diff complete"
        );
        Ok(DiffOutcome {
            equal,
            depth_limit_exceeded: self.depth_limit_exceeded,
        })
    }

    /// Only decide whether the trees are equal. Nothing is emitted.
    pub fn probe(mut self) -> Result<bool, Cancelled> {
        let (old_root, new_root) = self.prepare();
        if !self.comparator.types_equal(old_root, new_root) {
            return Ok(false);
        }
        let result = self.build(old_root, new_root, 0, None::<&mut NoopBuilder>)?;
        Ok(result == CompareResult::Equal)
    }

    fn prepare(&mut self) -> (OS::Node, NS::Node) {
        let old_root = self.old.root();
        let new_root = self.new.root();

        self.old_tree_start = self.old.start_offset(old_root);
        let old_tree_end = self.old.end_offset(old_root);
        let old_text: &'a str = self.old_text;
        self.old_text = match old_text.get(self.old_tree_start..old_tree_end) {
            Some(text) => text,
            None => {
                debug!(
                    start = self.old_tree_start,
                    end = old_tree_end,
                    text_len = old_text.len(),
                    "old root range does not fit old text, text matching disabled"
                );
                ""
            }
        };

        self.new_tree_start = self.new.start_offset(new_root);
        self.new_text = self.new.text(new_root);
        (old_root, new_root)
    }

    fn build<B>(
        &mut self,
        old_node: OS::Node,
        new_node: NS::Node,
        level: usize,
        builder: Option<&mut B>,
    ) -> Result<CompareResult, Cancelled>
    where
        B: DiffTreeChangeBuilder<OS::Node, NS::Node>,
    {
        if self.interrupt.is_cancelled() {
            debug!(level, "diff interrupted");
            return Err(Cancelled);
        }

        if level > self.config.max_depth {
            if let Some(builder) = builder {
                debug!(level, "depth limit exceeded, replacing subtree");
                self.depth_limit_exceeded = true;
                builder.node_replaced(old_node, new_node);
            }
            return Ok(CompareResult::NotEqual);
        }

        let expanded = (
            self.old.ensure_expanded(old_node),
            self.new.ensure_expanded(new_node),
        );
        let (Some(old_node), Some(new_node)) = expanded else {
            if let Some(builder) = builder {
                debug!(level, "node could not be expanded, replacing it");
                builder.node_replaced(old_node, new_node);
            }
            return Ok(CompareResult::NotEqual);
        };

        if level >= self.old_buffers.len() {
            self.old_buffers.resize_with(level + 1, ChildBuf::new);
            self.new_buffers.resize_with(level + 1, ChildBuf::new);
        }

        // Take the buffers out for the duration of this level; deeper levels
        // use their own slots.
        let mut old_children = mem::take(&mut self.old_buffers[level]);
        let mut new_children = mem::take(&mut self.new_buffers[level]);
        let old_count = self.old.children(old_node, &mut old_children);
        let new_count = self.new.children(new_node, &mut new_children);

        let result = self.do_build(
            old_node,
            new_node,
            &old_children[..old_count],
            &new_children[..new_count],
            level,
            builder,
        );

        self.old.dispose_children(&mut old_children, old_count);
        self.new.dispose_children(&mut new_children, new_count);
        self.old_buffers[level] = old_children;
        self.new_buffers[level] = new_children;

        result
    }

    fn do_build<B>(
        &mut self,
        old_node: OS::Node,
        new_node: NS::Node,
        old_children: &[OS::Node],
        new_children: &[NS::Node],
        level: usize,
        builder: Option<&mut B>,
    ) -> Result<CompareResult, Cancelled>
    where
        B: DiffTreeChangeBuilder<OS::Node, NS::Node>,
    {
        let old_size = old_children.len();
        let new_size = new_children.len();

        if old_size.abs_diff(new_size) > self.config.size_divergence_threshold {
            if let Some(builder) = builder {
                debug!(
                    level,
                    old_size, new_size, "child counts diverge, replacing parent"
                );
                builder.node_replaced(old_node, new_node);
            }
            return Ok(CompareResult::NotEqual);
        }

        if old_size == 0 && new_size == 0 {
            if !self.comparator.hash_codes_equal(old_node, new_node)
                || !self.comparator.types_equal(old_node, new_node)
            {
                if let Some(builder) = builder {
                    builder.node_replaced(old_node, new_node);
                }
                return Ok(CompareResult::NotEqual);
            }
            return Ok(CompareResult::Equal);
        }

        let min_size = old_size.min(new_size);
        let suffix_length = self.match_suffix(old_children, new_children, level, min_size)?;
        // With equal sizes the element right before the suffix was already
        // compared (unsuccessfully) by the suffix scan.
        let max_prefix_length = min_size
            - suffix_length
            - usize::from(old_size == new_size && suffix_length < min_size);
        let prefix_length =
            self.match_prefix(old_children, new_children, level, max_prefix_length)?;

        trace!(
            level,
            old_size, new_size, prefix_length, suffix_length, "matched ends"
        );

        if old_size == new_size && suffix_length + prefix_length == old_size {
            return Ok(CompareResult::Equal);
        }

        let Some(builder) = builder else {
            return Ok(CompareResult::NotEqual);
        };

        self.merge_middle(
            old_node,
            old_children,
            new_children,
            prefix_length,
            suffix_length,
            level,
            builder,
        )?;
        Ok(CompareResult::NotEqual)
    }

    fn match_prefix(
        &mut self,
        old_children: &[OS::Node],
        new_children: &[NS::Node],
        level: usize,
        max_length: usize,
    ) -> Result<usize, Cancelled> {
        let mut length = 0;
        while length < max_length {
            if self.match_pair(old_children[length], new_children[length], level)?
                != CompareResult::Equal
            {
                break;
            }
            length += 1;
        }
        Ok(length)
    }

    fn match_suffix(
        &mut self,
        old_children: &[OS::Node],
        new_children: &[NS::Node],
        level: usize,
        max_length: usize,
    ) -> Result<usize, Cancelled> {
        let mut length = 0;
        while length < max_length {
            let old_child = old_children[old_children.len() - 1 - length];
            let new_child = new_children[new_children.len() - 1 - length];
            if self.match_pair(old_child, new_child, level)? != CompareResult::Equal {
                break;
            }
            length += 1;
        }
        Ok(length)
    }

    /// Compare two children for the prefix/suffix scans. Recursion is a pure
    /// equality check and only happens when the node texts are identical.
    fn match_pair(
        &mut self,
        old_child: OS::Node,
        new_child: NS::Node,
        level: usize,
    ) -> Result<CompareResult, Cancelled> {
        let mut result = self.looks_equal(Some(old_child), Some(new_child));
        if result == CompareResult::DrillDownNeeded {
            result = if self.text_match(old_child, new_child) {
                self.build(old_child, new_child, level + 1, None::<&mut NoopBuilder>)?
            } else {
                CompareResult::NotEqual
            };
            debug_assert_ne!(result, CompareResult::DrillDownNeeded);
        }
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_middle<B>(
        &mut self,
        parent: OS::Node,
        old_children: &[OS::Node],
        new_children: &[NS::Node],
        prefix_length: usize,
        mut suffix_length: usize,
        level: usize,
        builder: &mut B,
    ) -> Result<(), Cancelled>
    where
        B: DiffTreeChangeBuilder<OS::Node, NS::Node>,
    {
        let mut old_index = prefix_length;
        let mut new_index = prefix_length;

        loop {
            let old_end = old_children.len() - suffix_length;
            let new_end = new_children.len() - suffix_length;

            if old_index >= old_end && new_index >= new_end {
                break;
            }
            if old_index >= old_end {
                builder.node_inserted(parent, new_children[new_index], new_index);
                new_index += 1;
                continue;
            }
            if new_index >= new_end {
                builder.node_deleted(parent, old_children[old_index]);
                old_index += 1;
                continue;
            }

            let old_window = window(old_children, old_index, old_end);
            let new_window = window(new_children, new_index, new_end);
            let (old1, old2, old3) = (old_children[old_index], old_window[1], old_window[2]);
            let (new1, new2, new3) = (new_children[new_index], new_window[1], new_window[2]);

            let c11 = self.looks_equal(Some(old1), Some(new1));
            if c11.is_match() {
                if c11 == CompareResult::DrillDownNeeded {
                    self.build(old1, new1, level + 1, Some(&mut *builder))?;
                }
                old_index += 1;
                new_index += 1;
                continue;
            }

            if c11 == CompareResult::TypeOnly {
                if self.looks_equal(old2, Some(new1)).is_match() {
                    builder.node_deleted(parent, old1);
                    old_index += 1;
                    continue;
                }
                if self.looks_equal(Some(old1), new2).is_match() {
                    builder.node_inserted(parent, new1, new_index);
                    new_index += 1;
                    continue;
                }
                self.build(old1, new1, level + 1, Some(&mut *builder))?;
                old_index += 1;
                new_index += 1;
                continue;
            }

            if self.looks_equal(Some(old1), new2) != CompareResult::NotEqual {
                builder.node_inserted(parent, new1, new_index);
                new_index += 1;
                continue;
            }
            if self.looks_equal(old2, Some(new1)) != CompareResult::NotEqual {
                builder.node_deleted(parent, old1);
                old_index += 1;
                continue;
            }
            // Two-step lookahead catches "new node plus trailing whitespace".
            if let Some(new2) = new2
                && self.looks_equal(Some(old1), new3) != CompareResult::NotEqual
            {
                builder.node_inserted(parent, new1, new_index);
                builder.node_inserted(parent, new2, new_index + 1);
                new_index += 2;
                continue;
            }
            if let Some(old2) = old2
                && self.looks_equal(old3, Some(new1)) != CompareResult::NotEqual
            {
                builder.node_deleted(parent, old1);
                builder.node_deleted(parent, old2);
                old_index += 2;
                continue;
            }

            // Last resort: the tail of the middle range may still line up.
            if old_end - old_index > 1 && new_end - new_index > 1 {
                let old_last = old_children[old_end - 1];
                let new_last = new_children[new_end - 1];
                let c = self.looks_equal(Some(old_last), Some(new_last));
                if c != CompareResult::NotEqual {
                    if c != CompareResult::Equal {
                        self.build(old_last, new_last, level + 1, Some(&mut *builder))?;
                    }
                    suffix_length += 1;
                    continue;
                }
            }

            builder.node_replaced(old1, new1);
            old_index += 1;
            new_index += 1;
        }
        Ok(())
    }

    fn looks_equal(&self, old: Option<OS::Node>, new: Option<NS::Node>) -> CompareResult {
        let (Some(old), Some(new)) = (old, new) else {
            return CompareResult::NotEqual;
        };
        if !self.comparator.types_equal(old, new) {
            return CompareResult::NotEqual;
        }
        match self.comparator.deep_equal(old, new) {
            ThreeState::Yes => CompareResult::Equal,
            ThreeState::Unsure => CompareResult::DrillDownNeeded,
            ThreeState::No => CompareResult::TypeOnly,
        }
    }

    /// Drill down only when the node texts match; once they do, recursion
    /// confirms the match all the way down.
    fn text_match(&self, old: OS::Node, new: NS::Node) -> bool {
        let old_range = relative(
            self.old.start_offset(old),
            self.old.end_offset(old),
            self.old_tree_start,
        );
        let new_range = relative(
            self.new.start_offset(new),
            self.new.end_offset(new),
            self.new_tree_start,
        );
        let (Some((old_start, old_end)), Some((new_start, new_end))) = (old_range, new_range) else {
            return false;
        };
        match (
            self.old_text.get(old_start..old_end),
            self.new_text.get(new_start..new_end),
        ) {
            (Some(old_text), Some(new_text)) => old_text == new_text,
            _ => false,
        }
    }
}

fn relative(start: usize, end: usize, base: usize) -> Option<(usize, usize)> {
    Some((start.checked_sub(base)?, end.checked_sub(base)?))
}

/// Up to [`LOOKAHEAD_WINDOW`] children starting at `index`, clipped at `end`.
fn window<N: Copy>(children: &[N], index: usize, end: usize) -> [Option<N>; LOOKAHEAD_WINDOW] {
    core::array::from_fn(|offset| {
        let i = index + offset;
        (i < end).then(|| children[i])
    })
}

/// Diff `old` against `new` with the default configuration.
///
/// # Example
///
/// ```
/// use treediff::{EditOp, EditScript, SimpleComparator, SimpleTree, diff};
///
/// let mut old = SimpleTree::new("list");
/// old.add_leaf(old.root, "item", "a");
/// old.add_leaf(old.root, "item", "c");
///
/// let mut new = SimpleTree::new("list");
/// new.add_leaf(new.root, "item", "a");
/// new.add_leaf(new.root, "item", "b");
/// new.add_leaf(new.root, "item", "c");
///
/// let old_text = old.full_text();
/// let mut script = EditScript::new();
/// diff(&mut old, &mut new, &SimpleComparator, &mut script, &old_text).unwrap();
///
/// assert_eq!(script.len(), 1);
/// assert!(matches!(script.ops()[0], EditOp::Insert { position: 1, .. }));
/// ```
pub fn diff<OS, NS, C, B>(
    old: &mut OS,
    new: &mut NS,
    comparator: &C,
    builder: &mut B,
    old_text: &str,
) -> Result<DiffOutcome, Cancelled>
where
    OS: TreeStructure,
    NS: TreeStructure,
    C: ShallowNodeComparator<OS::Node, NS::Node>,
    B: DiffTreeChangeBuilder<OS::Node, NS::Node>,
{
    DiffTree::new(old, new, comparator, old_text).diff(builder)
}
