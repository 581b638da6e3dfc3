//! A small labelled tree implementing [`TreeStructure`].
//!
//! Useful for examples, tests and callers that want to diff plain data without
//! bringing their own tree type.

use core::fmt;
use core::hash::{Hash, Hasher};

use indextree::{Arena, NodeId};
use rapidhash::RapidHasher;

use crate::builder::EditOp;
use crate::comparator::{ShallowNodeComparator, ThreeState};
use crate::structure::{ChildBuf, TreeStructure};

/// Payload stored in the arena for every node.
#[derive(Debug, Clone)]
pub struct SimpleData<L> {
    /// Node label, compared by [`SimpleComparator::types_equal`]
    pub label: L,
    /// Text for leaves, `None` for inner nodes
    pub text: Option<String>,
    hash: Option<u64>,
}

/// Handle into a [`SimpleTree`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimpleNode<L> {
    /// Arena id
    pub id: NodeId,
    /// Label copied from the node
    pub label: L,
    hash: Option<u64>,
}

impl<L: fmt::Display> fmt::Debug for SimpleNode<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, usize::from(self.id))
    }
}

/// Labelled tree whose leaves carry text.
///
/// The text of an inner node is the concatenation of its children's text.
#[derive(Debug, Clone)]
pub struct SimpleTree<L> {
    /// Node storage
    pub arena: Arena<SimpleData<L>>,
    /// Root node
    pub root: NodeId,
}

fn leaf_hash(text: &str) -> u64 {
    let mut hasher = RapidHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}

impl<L: Copy + Eq> SimpleTree<L> {
    /// Create a tree with an inner root node.
    pub fn new(label: L) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(SimpleData {
            label,
            text: None,
            hash: None,
        });
        Self { arena, root }
    }

    /// Append an inner node under `parent`.
    pub fn add_node(&mut self, parent: NodeId, label: L) -> NodeId {
        let id = self.arena.new_node(SimpleData {
            label,
            text: None,
            hash: None,
        });
        parent.append(id, &mut self.arena);
        id
    }

    /// Append a leaf under `parent`.
    pub fn add_leaf(&mut self, parent: NodeId, label: L, text: &str) -> NodeId {
        let id = self.arena.new_node(SimpleData {
            label,
            text: Some(text.to_owned()),
            hash: Some(leaf_hash(text)),
        });
        parent.append(id, &mut self.arena);
        id
    }

    /// Handle for an arena id.
    pub fn handle(&self, id: NodeId) -> SimpleNode<L> {
        let data = self.arena[id].get();
        SimpleNode {
            id,
            label: data.label,
            hash: data.hash,
        }
    }

    /// Length of the text spanned by `id`.
    pub fn text_len(&self, id: NodeId) -> usize {
        match &self.arena[id].get().text {
            Some(text) => text.len(),
            None => id.children(&self.arena).map(|c| self.text_len(c)).sum(),
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.arena[id].get().text {
            Some(text) => out.push_str(text),
            None => {
                for child in id.children(&self.arena) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Text of the whole tree.
    pub fn full_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(self.root, &mut out);
        out
    }

    fn start_of(&self, id: NodeId) -> usize {
        let mut offset = 0;
        let mut current = id;
        while let Some(parent) = self.arena[current].parent() {
            offset += parent
                .children(&self.arena)
                .take_while(|&c| c != current)
                .map(|c| self.text_len(c))
                .sum::<usize>();
            current = parent;
        }
        offset
    }

    /// Deep-copy the subtree at `id` in `source` into this arena, detached.
    fn copy_from(&mut self, source: &SimpleTree<L>, id: NodeId) -> NodeId {
        let data = source.arena[id].get().clone();
        let copy = self.arena.new_node(data);
        for child in id.children(&source.arena) {
            let child_copy = self.copy_from(source, child);
            copy.append(child_copy, &mut self.arena);
        }
        copy
    }

    /// Replay an edit script produced by diffing `self` against `source`.
    ///
    /// Operations are applied strictly in order; insert positions index the
    /// child list as it is at that moment.
    pub fn apply(&mut self, source: &SimpleTree<L>, ops: &[EditOp<SimpleNode<L>, SimpleNode<L>>]) {
        for op in ops {
            match *op {
                EditOp::Replace { old, new } => {
                    let copy = self.copy_from(source, new.id);
                    if old.id == self.root {
                        self.root = copy;
                    } else {
                        old.id.insert_before(copy, &mut self.arena);
                    }
                    old.id.remove_subtree(&mut self.arena);
                }
                EditOp::Delete { node, .. } => {
                    node.id.remove_subtree(&mut self.arena);
                }
                EditOp::Insert {
                    parent,
                    node,
                    position,
                } => {
                    let copy = self.copy_from(source, node.id);
                    match parent.id.children(&self.arena).nth(position) {
                        Some(anchor) => anchor.insert_before(copy, &mut self.arena),
                        None => parent.id.append(copy, &mut self.arena),
                    }
                }
            }
        }
    }
}

impl<L: Copy + Eq> TreeStructure for SimpleTree<L> {
    type Node = SimpleNode<L>;

    fn root(&self) -> Self::Node {
        self.handle(self.root)
    }

    fn children(&self, node: Self::Node, buf: &mut ChildBuf<Self::Node>) -> usize {
        buf.extend(node.id.children(&self.arena).map(|c| self.handle(c)));
        buf.len()
    }

    fn start_offset(&self, node: Self::Node) -> usize {
        self.start_of(node.id)
    }

    fn end_offset(&self, node: Self::Node) -> usize {
        self.start_of(node.id) + self.text_len(node.id)
    }

    fn text(&self, node: Self::Node) -> String {
        let mut out = String::new();
        self.collect_text(node.id, &mut out);
        out
    }
}

/// Comparator for [`SimpleTree`] handles: labels are types, leaves compare by
/// text hash, inner nodes always need a look at their children.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleComparator;

impl<L: Copy + Eq> ShallowNodeComparator<SimpleNode<L>, SimpleNode<L>> for SimpleComparator {
    fn types_equal(&self, old: SimpleNode<L>, new: SimpleNode<L>) -> bool {
        old.label == new.label
    }

    fn hash_codes_equal(&self, old: SimpleNode<L>, new: SimpleNode<L>) -> bool {
        old.hash == new.hash
    }

    fn deep_equal(&self, old: SimpleNode<L>, new: SimpleNode<L>) -> ThreeState {
        match (old.hash, new.hash) {
            (Some(a), Some(b)) if a == b => ThreeState::Yes,
            (None, None) => ThreeState::Unsure,
            _ => ThreeState::No,
        }
    }
}
