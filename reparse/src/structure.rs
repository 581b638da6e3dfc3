//! [`SyntaxTree`] seen by the diff engine.

use core::fmt;

use indextree::NodeId;
use treediff::{ChildBuf, ShallowNodeComparator, ThreeState, TreeStructure};

use crate::kind::SyntaxKind;
use crate::language::Language;
use crate::tree::{NodeContent, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Shape {
    Token,
    Node,
    Lazy,
}

/// Flyweight handle to a node of a [`SyntaxTree`].
///
/// Carries everything the comparator needs, so comparisons never touch the
/// tree while the engine holds it mutably for lazy expansion.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeNode {
    /// Arena id
    pub id: NodeId,
    /// Element type
    pub kind: SyntaxKind,
    /// Absolute start offset
    pub start: usize,
    /// Absolute end offset
    pub end: usize,
    hash: Option<u64>,
    shape: Shape,
}

impl TreeNode {
    /// Whether this handle points at a token.
    pub fn is_token(&self) -> bool {
        self.shape == Shape::Token
    }
}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}#{}@{}..{}",
            self.kind,
            usize::from(self.id),
            self.start,
            self.end
        )
    }
}

/// Adapter exposing one subtree of a [`SyntaxTree`] as a [`TreeStructure`].
pub struct SyntaxTreeStructure<'t> {
    tree: &'t mut SyntaxTree,
    root: TreeNode,
    language: &'t dyn Language,
}

impl<'t> SyntaxTreeStructure<'t> {
    /// View the subtree at `root`. Offsets stay absolute within `tree`.
    pub fn new(tree: &'t mut SyntaxTree, root: NodeId, language: &'t dyn Language) -> Self {
        let start = tree.start_offset(root);
        let root = handle(tree, root, start);
        Self {
            tree,
            root,
            language,
        }
    }
}

fn handle(tree: &SyntaxTree, id: NodeId, start: usize) -> TreeNode {
    let data = tree.get(id);
    let (hash, shape) = match &data.content {
        NodeContent::Token { hash, .. } => (Some(*hash), Shape::Token),
        NodeContent::Lazy { hash, .. } => (Some(*hash), Shape::Lazy),
        NodeContent::Node { .. } => (None, Shape::Node),
    };
    TreeNode {
        id,
        kind: data.kind,
        start,
        end: start + tree.text_len(id),
        hash,
        shape,
    }
}

impl TreeStructure for SyntaxTreeStructure<'_> {
    type Node = TreeNode;

    fn root(&self) -> TreeNode {
        self.root
    }

    fn ensure_expanded(&mut self, node: TreeNode) -> Option<TreeNode> {
        if node.shape != Shape::Lazy {
            return Some(node);
        }
        self.tree
            .expand(node.id, self.language)
            .then(|| handle(self.tree, node.id, node.start))
    }

    fn children(&self, node: TreeNode, buf: &mut ChildBuf<TreeNode>) -> usize {
        let mut offset = node.start;
        for child in self.tree.children(node.id) {
            let child = handle(self.tree, child, offset);
            offset = child.end;
            buf.push(child);
        }
        buf.len()
    }

    fn start_offset(&self, node: TreeNode) -> usize {
        node.start
    }

    fn end_offset(&self, node: TreeNode) -> usize {
        node.end
    }

    fn text(&self, node: TreeNode) -> String {
        self.tree.text(node.id)
    }
}

/// Compares [`TreeNode`]s of two trees by kind, shape and text.
///
/// `old_text` and `new_text` are the texts the two structures' offsets index
/// into.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxComparator<'a> {
    old_text: &'a str,
    new_text: &'a str,
}

impl<'a> SyntaxComparator<'a> {
    /// Create a comparator over the two backing texts.
    pub fn new(old_text: &'a str, new_text: &'a str) -> Self {
        Self { old_text, new_text }
    }

    fn same_text(&self, old: TreeNode, new: TreeNode) -> bool {
        match (
            self.old_text.get(old.start..old.end),
            self.new_text.get(new.start..new.end),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl ShallowNodeComparator<TreeNode, TreeNode> for SyntaxComparator<'_> {
    fn types_equal(&self, old: TreeNode, new: TreeNode) -> bool {
        old.kind == new.kind && old.is_token() == new.is_token()
    }

    fn hash_codes_equal(&self, old: TreeNode, new: TreeNode) -> bool {
        match (old.hash, new.hash) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b && self.same_text(old, new),
            _ => false,
        }
    }

    fn deep_equal(&self, old: TreeNode, new: TreeNode) -> ThreeState {
        match (old.shape, new.shape) {
            (Shape::Token, Shape::Token) => {
                if self.hash_codes_equal(old, new) {
                    ThreeState::Yes
                } else {
                    ThreeState::No
                }
            }
            (Shape::Lazy, Shape::Lazy) if self.hash_codes_equal(old, new) => ThreeState::Yes,
            _ => ThreeState::Unsure,
        }
    }
}
