//! Arena-backed syntax trees.
//!
//! Tokens own their text; inner nodes only cache their length. A node's text
//! is the concatenation of its children's text, so offsets are derived by
//! summing sibling lengths on the way up to the root. Every structural
//! mutation drops the cached lengths of the mutated node and its ancestors.

use core::cell::Cell;
use core::fmt::{self, Write as _};
use core::hash::{Hash, Hasher};

use compact_str::CompactString;
use indextree::{Arena, NodeId};
use rapidhash::RapidHasher;
use smallvec::SmallVec;

use crate::diff_log::TreeChangeListener;
use crate::green::Green;
use crate::kind::SyntaxKind;
use crate::language::Language;
use crate::text::TextRange;

/// What a node holds besides its kind.
#[derive(Debug, Clone)]
pub enum NodeContent {
    /// A token with its text and a hash of kind plus text.
    Token {
        /// Token text
        text: CompactString,
        /// Hash of kind and text
        hash: u64,
    },
    /// An inner node. The length is cached on first use.
    Node {
        /// Cached text length, `None` when dirty
        len: Cell<Option<usize>>,
    },
    /// A node whose children have not been parsed yet.
    Lazy {
        /// Unparsed text
        text: CompactString,
        /// Hash of kind and text
        hash: u64,
    },
}

/// Arena payload.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Element type
    pub kind: SyntaxKind,
    /// Token text, lazy text or length cache
    pub content: NodeContent,
}

pub(crate) fn text_hash(kind: SyntaxKind, text: &str) -> u64 {
    let mut hasher = RapidHasher::default();
    kind.0.hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}

fn alloc(arena: &mut Arena<NodeData>, green: &Green) -> NodeId {
    match green {
        Green::Token { kind, text } => arena.new_node(NodeData {
            kind: *kind,
            content: NodeContent::Token {
                hash: text_hash(*kind, text),
                text: text.clone(),
            },
        }),
        Green::Lazy { kind, text } => arena.new_node(NodeData {
            kind: *kind,
            content: NodeContent::Lazy {
                hash: text_hash(*kind, text),
                text: text.clone(),
            },
        }),
        Green::Node { kind, children } => {
            let id = arena.new_node(NodeData {
                kind: *kind,
                content: NodeContent::Node {
                    len: Cell::new(None),
                },
            });
            for child in children {
                let child_id = alloc(arena, child);
                id.append(child_id, arena);
            }
            id
        }
    }
}

/// A mutable syntax tree for one document.
pub struct SyntaxTree {
    arena: Arena<NodeData>,
    root: NodeId,
    depth_limit_exceeded: bool,
    listener: Option<Box<dyn TreeChangeListener>>,
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("root", &self.root)
            .field("nodes", &self.arena.len())
            .field("depth_limit_exceeded", &self.depth_limit_exceeded)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl SyntaxTree {
    /// Place a parser result in a fresh arena.
    pub fn from_green(green: &Green) -> Self {
        let mut arena = Arena::new();
        let root = alloc(&mut arena, green);
        Self {
            arena,
            root,
            depth_limit_exceeded: false,
            listener: None,
        }
    }

    /// Parse `text` from scratch.
    pub fn parse(language: &dyn Language, text: &str) -> Self {
        Self::from_green(&language.parse(text))
    }

    /// Root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Node payload.
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Element type of `id`.
    pub fn kind(&self, id: NodeId) -> SyntaxKind {
        self.get(id).kind
    }

    /// Parent of `id`, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Children of `id` in document order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Number of children of `id`.
    pub fn child_count(&self, id: NodeId) -> usize {
        id.children(&self.arena).count()
    }

    /// `id` followed by its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.ancestors(&self.arena)
    }

    /// `id` followed by all nodes below it, in document order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    /// Whether `id` is a token.
    pub fn is_token(&self, id: NodeId) -> bool {
        matches!(self.get(id).content, NodeContent::Token { .. })
    }

    /// Whether `id` is a lazy node that was not expanded yet.
    pub fn is_lazy(&self, id: NodeId) -> bool {
        matches!(self.get(id).content, NodeContent::Lazy { .. })
    }

    /// Length of the text covered by `id`.
    pub fn text_len(&self, id: NodeId) -> usize {
        match &self.get(id).content {
            NodeContent::Token { text, .. } | NodeContent::Lazy { text, .. } => text.len(),
            NodeContent::Node { len } => {
                if let Some(len) = len.get() {
                    return len;
                }
                let computed = id.children(&self.arena).map(|c| self.text_len(c)).sum();
                len.set(Some(computed));
                computed
            }
        }
    }

    /// Absolute start offset of `id`.
    pub fn start_offset(&self, id: NodeId) -> usize {
        let mut offset = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            offset += current
                .preceding_siblings(&self.arena)
                .skip(1)
                .map(|sibling| self.text_len(sibling))
                .sum::<usize>();
            current = parent;
        }
        offset
    }

    /// Absolute range of `id`.
    pub fn text_range(&self, id: NodeId) -> TextRange {
        let start = self.start_offset(id);
        TextRange::new(start, start + self.text_len(id))
    }

    /// Append the text covered by `id` to `out`.
    pub fn write_text(&self, id: NodeId, out: &mut String) {
        match &self.get(id).content {
            NodeContent::Token { text, .. } | NodeContent::Lazy { text, .. } => out.push_str(text),
            NodeContent::Node { .. } => {
                for child in id.children(&self.arena) {
                    self.write_text(child, out);
                }
            }
        }
    }

    /// Text covered by `id`.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::with_capacity(self.text_len(id));
        self.write_text(id, &mut out);
        out
    }

    /// Token or unexpanded lazy node containing the byte at `offset`.
    ///
    /// Returns `None` at or past the end of the text.
    pub fn find_leaf_at(&self, offset: usize) -> Option<NodeId> {
        if offset >= self.text_len(self.root) {
            return None;
        }
        let mut current = self.root;
        let mut start = 0;
        while matches!(self.get(current).content, NodeContent::Node { .. }) {
            let mut next = None;
            for child in current.children(&self.arena) {
                let len = self.text_len(child);
                if offset < start + len {
                    next = Some(child);
                    break;
                }
                start += len;
            }
            current = next?;
        }
        Some(current)
    }

    /// Deepest node that has both `a` and `b` in its subtree.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let chain: SmallVec<[NodeId; 32]> = a.ancestors(&self.arena).collect();
        b.ancestors(&self.arena)
            .find(|node| chain.contains(node))
            .unwrap_or(self.root)
    }

    /// Whether a previous merge on this tree hit the diff depth limit. While
    /// set, every reparse rebuilds the whole tree.
    pub fn depth_limit_exceeded(&self) -> bool {
        self.depth_limit_exceeded
    }

    /// Allow incremental reparsing again after the depth limit was hit.
    pub fn clear_depth_limit(&mut self) {
        self.depth_limit_exceeded = false;
    }

    pub(crate) fn mark_depth_limit_exceeded(&mut self) {
        self.depth_limit_exceeded = true;
    }

    /// Make this a live tree: every committed change is announced to `listener`.
    pub fn attach_listener(&mut self, listener: Box<dyn TreeChangeListener>) {
        self.listener = Some(listener);
    }

    /// Stop announcing changes; returns the listener that was attached.
    pub fn detach_listener(&mut self) -> Option<Box<dyn TreeChangeListener>> {
        self.listener.take()
    }

    /// Whether a listener is attached.
    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    pub(crate) fn listener_mut(&mut self) -> Option<&mut (dyn TreeChangeListener + 'static)> {
        self.listener.as_deref_mut()
    }

    /// Parse the children of a lazy node. Returns `false` when the language
    /// could not expand it; the node then stays lazy.
    ///
    /// Expansion never changes the text of the tree.
    pub fn expand(&mut self, id: NodeId, language: &dyn Language) -> bool {
        let data = self.get(id);
        let kind = data.kind;
        let NodeContent::Lazy { text, .. } = &data.content else {
            return true;
        };
        let text = text.clone();

        let Some(children) = language.expand_lazy(kind, &text) else {
            debug!(kind = ?kind, "lazy expansion failed");
            return false;
        };
        let len: usize = children.iter().map(Green::text_len).sum();
        if len != text.len() {
            error!(
                kind = ?kind,
                expected = text.len(),
                actual = len,
                node_text = %text,
                "lazy expansion changed the node length"
            );
            return false;
        }

        for child in &children {
            let child_id = alloc(&mut self.arena, child);
            id.append(child_id, &mut self.arena);
        }
        self.arena[id].get_mut().content = NodeContent::Node {
            len: Cell::new(Some(len)),
        };
        true
    }

    /// Expand every lazy node, including those revealed by expansion.
    pub fn expand_all(&mut self, language: &dyn Language) {
        loop {
            let lazy: Vec<NodeId> = self
                .root
                .descendants(&self.arena)
                .filter(|&id| self.is_lazy(id))
                .collect();
            let mut progressed = false;
            for id in lazy {
                progressed |= self.expand(id, language);
            }
            if !progressed {
                break;
            }
        }
    }

    /// Drop the cached lengths of `id` and all its ancestors.
    pub(crate) fn invalidate(&self, id: NodeId) {
        for node in id.ancestors(&self.arena) {
            if let NodeContent::Node { len } = &self.get(node).content {
                len.set(None);
            }
        }
    }

    /// Deep-copy `id` from `source` into this arena, detached.
    pub(crate) fn copy_subtree_from(&mut self, source: &SyntaxTree, id: NodeId) -> NodeId {
        let copy = self.arena.new_node(source.get(id).clone());
        for child in id.children(&source.arena) {
            let child_copy = self.copy_subtree_from(source, child);
            copy.append(child_copy, &mut self.arena);
        }
        copy
    }

    /// Put the detached node `new` where `old` is and drop `old`.
    pub(crate) fn replace_node(&mut self, old: NodeId, new: NodeId) {
        let parent = self.parent(old);
        old.insert_before(new, &mut self.arena);
        old.remove_subtree(&mut self.arena);
        if let Some(parent) = parent {
            self.invalidate(parent);
        }
    }

    /// Drop all children of `parent` and adopt the detached `children`.
    pub(crate) fn replace_children(&mut self, parent: NodeId, kind: SyntaxKind, children: &[NodeId]) {
        let old: Vec<NodeId> = parent.children(&self.arena).collect();
        for child in old {
            child.remove_subtree(&mut self.arena);
        }
        for &child in children {
            parent.append(child, &mut self.arena);
        }
        let data = self.arena[parent].get_mut();
        data.kind = kind;
        data.content = NodeContent::Node {
            len: Cell::new(None),
        };
        self.invalidate(parent);
    }

    /// Insert the detached `child` so that it becomes child number `position`.
    ///
    /// Returns `false` when `position` is past the end of the child list.
    pub(crate) fn insert_child_at(&mut self, parent: NodeId, child: NodeId, position: usize) -> bool {
        match parent.children(&self.arena).nth(position) {
            Some(anchor) => anchor.insert_before(child, &mut self.arena),
            None if position == self.child_count(parent) => parent.append(child, &mut self.arena),
            None => return false,
        }
        self.invalidate(parent);
        true
    }

    /// Remove `child` from `parent`. Returns `false` when it is not a child of `parent`.
    pub(crate) fn delete_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if child.is_removed(&self.arena) || self.parent(child) != Some(parent) {
            return false;
        }
        child.remove_subtree(&mut self.arena);
        self.invalidate(parent);
        true
    }

    /// Whether `id` is still part of this arena.
    pub fn is_live(&self, id: NodeId) -> bool {
        !id.is_removed(&self.arena)
    }

    /// Indented rendering of the whole tree, one node per line.
    pub fn dump(&self, language: &dyn Language) -> String {
        let mut out = String::new();
        self.dump_node(&mut out, language, self.root, 0, 0);
        out
    }

    fn dump_node(&self, out: &mut String, language: &dyn Language, id: NodeId, start: usize, depth: usize) {
        let data = self.get(id);
        let end = start + self.text_len(id);
        let name = language.kind_name(data.kind);
        let indent = "  ".repeat(depth);
        // Writing into a String cannot fail.
        let _ = match &data.content {
            NodeContent::Token { text, .. } => writeln!(out, "{indent}{name}@{start}..{end} {text:?}"),
            NodeContent::Lazy { text, .. } => writeln!(out, "{indent}{name}@{start}..{end} lazy {text:?}"),
            NodeContent::Node { .. } => writeln!(out, "{indent}{name}@{start}..{end}"),
        };
        let mut offset = start;
        for child in id.children(&self.arena) {
            self.dump_node(out, language, child, offset, depth + 1);
            offset += self.text_len(child);
        }
    }

    /// Check parent links and cached lengths of the whole tree.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.parent(self.root).is_some() {
            return Err(format!("root {:?} has a parent", self.root));
        }
        self.check_node(self.root).map(|_| ())
    }

    fn check_node(&self, id: NodeId) -> Result<usize, String> {
        match &self.get(id).content {
            NodeContent::Token { text, .. } | NodeContent::Lazy { text, .. } => {
                if id.children(&self.arena).next().is_some() {
                    return Err(format!("leaf {id:?} has children"));
                }
                Ok(text.len())
            }
            NodeContent::Node { len } => {
                let mut sum = 0;
                for child in id.children(&self.arena) {
                    if self.parent(child) != Some(id) {
                        return Err(format!("{child:?} does not point back to parent {id:?}"));
                    }
                    sum += self.check_node(child)?;
                }
                match len.get() {
                    Some(cached) if cached != sum => Err(format!(
                        "{id:?} caches length {cached} but its children cover {sum}"
                    )),
                    _ => Ok(sum),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{self, DemoLanguage};
    use facet_testhelpers::test;

    fn parse(text: &str) -> (SyntaxTree, DemoLanguage) {
        let language = DemoLanguage::default();
        (SyntaxTree::parse(&language, text), language)
    }

    #[test]
    fn test_text_and_offsets() {
        let (tree, _) = parse("a = 1; { b; }");
        assert_eq!(tree.text(tree.root()), "a = 1; { b; }");
        assert_eq!(tree.text_len(tree.root()), 13);

        let leaf = tree.find_leaf_at(9).unwrap();
        assert_eq!(tree.kind(leaf), demo::IDENT);
        assert_eq!(tree.text(leaf), "b");
        assert_eq!(tree.text_range(leaf), TextRange::new(9, 10));
        assert_eq!(tree.find_leaf_at(13), None);
    }

    #[test]
    fn test_debug_reports_arena_size() {
        let (tree, _) = parse("a;");
        let debug = format!("{tree:?}");
        assert!(debug.contains("nodes: 4"), "{debug}");
        assert!(debug.contains("listener: false"), "{debug}");
    }

    #[test]
    fn test_common_ancestor() {
        let (tree, _) = parse("x; { y; z; }");
        let y = tree.find_leaf_at(5).unwrap();
        let z = tree.find_leaf_at(8).unwrap();
        let ancestor = tree.common_ancestor(y, z);
        assert_eq!(tree.kind(ancestor), demo::BLOCK);

        let x = tree.find_leaf_at(0).unwrap();
        assert_eq!(tree.common_ancestor(x, z), tree.root());
        assert_eq!(tree.common_ancestor(y, y), y);
    }

    #[test]
    fn test_mutation_invalidates_cached_lengths() {
        let (mut tree, language) = parse("a; { b; }");
        let b = tree.find_leaf_at(5).unwrap();
        let statement = tree.parent(b).unwrap();
        assert_eq!(tree.text_len(tree.root()), 9);

        let replacement = SyntaxTree::from_green(&Green::token(demo::IDENT, "longer"));
        let copy = tree.copy_subtree_from(&replacement, replacement.root());
        tree.replace_node(b, copy);

        assert_eq!(tree.text(tree.root()), "a; { longer; }");
        assert_eq!(tree.text_len(tree.root()), 14);
        assert_eq!(tree.text_len(statement), 7);
        tree.check_consistency().unwrap();
        assert!(!tree.is_live(b));
        assert!(tree.dump(&language).contains("IDENT@5..11 \"longer\""));
    }

    #[test]
    fn test_lazy_expansion_preserves_text() {
        let language = DemoLanguage {
            lazy_blocks: true,
            ..DemoLanguage::default()
        };
        let mut tree = SyntaxTree::parse(&language, "a; { b; { c; } }");
        let block = tree.find_leaf_at(3).unwrap();
        assert!(tree.is_lazy(block));
        assert_eq!(tree.child_count(block), 0);

        assert!(tree.expand(block, &language));
        assert!(!tree.is_lazy(block));
        assert_eq!(tree.text(block), "{ b; { c; } }");
        assert!(tree.child_count(block) > 0);

        tree.expand_all(&language);
        let fresh = SyntaxTree::parse(&DemoLanguage::default(), "a; { b; { c; } }");
        assert_eq!(tree.dump(&language), fresh.dump(&language));
        tree.check_consistency().unwrap();
    }

    #[test]
    fn test_consistency_check_catches_stale_cache() {
        let (tree, _) = parse("a; b;");
        let statement = tree.children(tree.root()).next().unwrap();
        tree.text_len(tree.root());
        if let NodeContent::Node { len } = &tree.get(statement).content {
            len.set(Some(99));
        }
        assert!(tree.check_consistency().is_err());
    }
}
