//! Buffered edit scripts and their transactional commit.
//!
//! The diff engine streams its edits into a [`DiffLog`]. Nothing touches the
//! live tree until [`DiffLog::commit`], which replays the entries strictly in
//! the order they were recorded. Insert positions are child indices into the
//! list as it looks at that moment, so reordering entries changes the result.

use core::cell::RefCell;
use std::rc::Rc;

use facet::Facet;
use indextree::NodeId;
use treediff::DiffTreeChangeBuilder;

use crate::structure::TreeNode;
use crate::tree::SyntaxTree;

/// One buffered edit. `old`/`parent`/`node` ids of deletes live in the target
/// tree; ids of inserted and replacing nodes live in the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntry {
    /// Swap `old` for a copy of `new`.
    Replace {
        /// Node of the target tree
        old: NodeId,
        /// Node of the source tree
        new: NodeId,
    },
    /// Swap all children of `parent` for copies of the children of `new`, in
    /// one step.
    ReplaceChildren {
        /// Node of the target tree, keeps its identity
        parent: NodeId,
        /// Node of the source tree
        new: NodeId,
    },
    /// Remove `node` from `parent`.
    Delete {
        /// Node of the target tree
        parent: NodeId,
        /// Child being removed
        node: NodeId,
    },
    /// Insert a copy of `node` as child number `position` of `parent`.
    Insert {
        /// Node of the target tree
        parent: NodeId,
        /// Node of the source tree
        node: NodeId,
        /// Index into the child list at replay time
        position: usize,
    },
}

/// What happened to a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum ChangeKind {
    /// One child was swapped for another.
    Replaced,
    /// All children were swapped at once.
    ChildrenReplaced,
    /// A child was removed.
    Removed,
    /// A child was added.
    Added,
}

/// Payload of change notifications, scoped to the affected parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeChange {
    /// What happened
    pub kind: ChangeKind,
    /// Parent whose child list changes
    pub parent: NodeId,
    /// Child going away, if any
    pub old_child: Option<NodeId>,
    /// Child coming in (already allocated in the target arena), if any
    pub new_child: Option<NodeId>,
}

/// Everything one commit did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Changes in the order they were applied
    pub changes: Vec<TreeChange>,
}

impl ChangeEvent {
    /// Whether the commit changed nothing.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of applied changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// Observer of a live tree. Every committed change is bracketed by one
/// `before_change` and one `after_change` call.
pub trait TreeChangeListener {
    /// The change is about to be applied.
    fn before_change(&mut self, change: &TreeChange);

    /// The change was applied.
    fn after_change(&mut self, change: &TreeChange);
}

/// A notification as seen by [`RecordingListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// `before_change`
    Before(TreeChange),
    /// `after_change`
    After(TreeChange),
}

/// Listener that keeps every notification. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    seen: Rc<RefCell<Vec<Notification>>>,
}

impl RecordingListener {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything recorded so far.
    pub fn take(&self) -> Vec<Notification> {
        self.seen.take()
    }
}

impl TreeChangeListener for RecordingListener {
    fn before_change(&mut self, change: &TreeChange) {
        self.seen.borrow_mut().push(Notification::Before(*change));
    }

    fn after_change(&mut self, change: &TreeChange) {
        self.seen.borrow_mut().push(Notification::After(*change));
    }
}

/// Edit script buffered for a target tree.
#[derive(Debug, Clone)]
pub struct DiffLog {
    target_root: NodeId,
    entries: Vec<LogEntry>,
}

impl DiffLog {
    /// Start an empty log for the tree whose root is `target_root`.
    pub fn new(target_root: NodeId) -> Self {
        Self {
            target_root,
            entries: Vec::new(),
        }
    }

    /// Recorded entries in order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a whole-file swap: the target root keeps its identity and gets
    /// copies of the children of `new_root`.
    pub fn replace_root(&mut self, new_root: NodeId) {
        self.push(LogEntry::ReplaceChildren {
            parent: self.target_root,
            new: new_root,
        });
    }

    fn push(&mut self, entry: LogEntry) {
        debug!(?entry, "log");
        self.entries.push(entry);
    }

    /// Apply every entry to `target`, copying new nodes from `source`.
    ///
    /// Notifications are only sent when `target` has a listener attached.
    ///
    /// # Panics
    ///
    /// When an entry no longer fits the tree (a node that is gone, or an
    /// insert position past the end). The tree is then in an undefined state
    /// and editing cannot continue.
    pub fn commit(self, target: &mut SyntaxTree, source: &SyntaxTree) -> ChangeEvent {
        debug!(entries = self.entries.len(), "commit");
        let mut event = ChangeEvent::default();
        for entry in self.entries {
            let change = apply_entry(target, source, entry);
            event.changes.push(change);
        }
        event
    }
}

fn notify_before(target: &mut SyntaxTree, change: &TreeChange) {
    if let Some(listener) = target.listener_mut() {
        listener.before_change(change);
    }
}

fn notify_after(target: &mut SyntaxTree, change: &TreeChange) {
    if let Some(listener) = target.listener_mut() {
        listener.after_change(change);
    }
}

fn apply_entry(target: &mut SyntaxTree, source: &SyntaxTree, entry: LogEntry) -> TreeChange {
    match entry {
        LogEntry::Replace { old, new } => {
            let Some(parent) = target.is_live(old).then(|| target.parent(old)).flatten() else {
                panic!("replace of {old:?}: node is detached from the tree");
            };
            let copy = target.copy_subtree_from(source, new);
            let change = TreeChange {
                kind: ChangeKind::Replaced,
                parent,
                old_child: Some(old),
                new_child: Some(copy),
            };
            notify_before(target, &change);
            target.replace_node(old, copy);
            notify_after(target, &change);
            change
        }
        LogEntry::ReplaceChildren { parent, new } => {
            assert!(target.is_live(parent), "replace children of {parent:?}: node is gone");
            let copies: Vec<NodeId> = source
                .children(new)
                .map(|child| target.copy_subtree_from(source, child))
                .collect();
            let change = TreeChange {
                kind: ChangeKind::ChildrenReplaced,
                parent,
                old_child: None,
                new_child: None,
            };
            notify_before(target, &change);
            target.replace_children(parent, source.kind(new), &copies);
            notify_after(target, &change);
            change
        }
        LogEntry::Delete { parent, node } => {
            let change = TreeChange {
                kind: ChangeKind::Removed,
                parent,
                old_child: Some(node),
                new_child: None,
            };
            notify_before(target, &change);
            assert!(
                target.delete_child(parent, node),
                "delete of {node:?}: not a child of {parent:?}"
            );
            notify_after(target, &change);
            change
        }
        LogEntry::Insert {
            parent,
            node,
            position,
        } => {
            assert!(target.is_live(parent), "insert under {parent:?}: node is gone");
            let copy = target.copy_subtree_from(source, node);
            let change = TreeChange {
                kind: ChangeKind::Added,
                parent,
                old_child: None,
                new_child: Some(copy),
            };
            notify_before(target, &change);
            assert!(
                target.insert_child_at(parent, copy, position),
                "insert under {parent:?}: position {position} is past the end"
            );
            notify_after(target, &change);
            change
        }
    }
}

impl DiffTreeChangeBuilder<TreeNode, TreeNode> for DiffLog {
    fn node_replaced(&mut self, old: TreeNode, new: TreeNode) {
        if old.id == self.target_root {
            self.push(LogEntry::ReplaceChildren {
                parent: old.id,
                new: new.id,
            });
        } else {
            self.push(LogEntry::Replace {
                old: old.id,
                new: new.id,
            });
        }
    }

    fn node_deleted(&mut self, parent: TreeNode, old_child: TreeNode) {
        self.push(LogEntry::Delete {
            parent: parent.id,
            node: old_child.id,
        });
    }

    fn node_inserted(&mut self, parent: TreeNode, new_child: TreeNode, position: usize) {
        self.push(LogEntry::Insert {
            parent: parent.id,
            node: new_child.id,
            position,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{self, DemoLanguage};
    use crate::green::Green;
    use facet_testhelpers::test;

    fn ident_list(names: &[&str]) -> SyntaxTree {
        let children = names.iter().map(|n| Green::token(demo::IDENT, n)).collect();
        SyntaxTree::from_green(&Green::node(demo::FILE, children))
    }

    fn names(tree: &SyntaxTree) -> Vec<String> {
        tree.children(tree.root()).map(|c| tree.text(c)).collect()
    }

    /// Delete `c` (index 2), then insert `x` at index 3.
    fn delete_then_insert(reverse: bool) -> Vec<String> {
        let mut target = ident_list(&["a", "b", "c", "d", "e"]);
        let source = ident_list(&["x"]);
        let root = target.root();
        let c = target.children(root).nth(2).unwrap();
        let x = source.children(source.root()).next().unwrap();

        let mut entries = vec![
            LogEntry::Delete { parent: root, node: c },
            LogEntry::Insert {
                parent: root,
                node: x,
                position: 3,
            },
        ];
        if reverse {
            entries.reverse();
        }
        let log = DiffLog {
            target_root: root,
            entries,
        };
        log.commit(&mut target, &source);
        target.check_consistency().unwrap();
        names(&target)
    }

    #[test]
    fn test_commit_replays_in_recorded_order() {
        assert_eq!(delete_then_insert(false), ["a", "b", "d", "x", "e"]);
        assert_eq!(delete_then_insert(true), ["a", "b", "x", "d", "e"]);
    }

    #[test]
    fn test_root_replace_becomes_replace_children() {
        let language = DemoLanguage::default();
        let mut target = SyntaxTree::parse(&language, "a; b;");
        let source = SyntaxTree::parse(&language, "{ c; }");
        let root = target.root();

        let mut log = DiffLog::new(root);
        log.replace_root(source.root());
        assert!(matches!(log.entries()[0], LogEntry::ReplaceChildren { .. }));

        let recorder = RecordingListener::new();
        target.attach_listener(Box::new(recorder.clone()));
        let event = log.commit(&mut target, &source);

        assert_eq!(target.root(), root);
        assert_eq!(target.text(root), "{ c; }");
        assert_eq!(target.dump(&language), source.dump(&language));
        assert_eq!(event.len(), 1);
        assert_eq!(event.changes[0].kind, ChangeKind::ChildrenReplaced);

        let seen = recorder.take();
        assert_eq!(
            seen,
            vec![
                Notification::Before(event.changes[0]),
                Notification::After(event.changes[0])
            ]
        );
    }

    #[test]
    fn test_notifications_bracket_every_change() {
        let mut target = ident_list(&["a", "b", "c"]);
        let source = ident_list(&["x", "y"]);
        let root = target.root();
        let a = target.children(root).next().unwrap();
        let b = target.children(root).nth(1).unwrap();
        let mut source_ids = source.children(source.root());
        let (x, y) = (source_ids.next().unwrap(), source_ids.next().unwrap());

        let log = DiffLog {
            target_root: root,
            entries: vec![
                LogEntry::Replace { old: a, new: x },
                LogEntry::Delete { parent: root, node: b },
                LogEntry::Insert {
                    parent: root,
                    node: y,
                    position: 2,
                },
            ],
        };
        let recorder = RecordingListener::new();
        target.attach_listener(Box::new(recorder.clone()));
        let event = log.commit(&mut target, &source);

        assert_eq!(names(&target), ["x", "c", "y"]);
        let seen = recorder.take();
        assert_eq!(seen.len(), 6);
        for (pair, change) in seen.chunks(2).zip(&event.changes) {
            assert_eq!(pair, [Notification::Before(*change), Notification::After(*change)]);
        }
        assert_eq!(event.changes[0].old_child, Some(a));
        assert_eq!(event.changes[1].kind, ChangeKind::Removed);
        assert_eq!(event.changes[2].kind, ChangeKind::Added);
    }

    #[test]
    fn test_detached_tree_commits_silently() {
        let mut target = ident_list(&["a"]);
        let source = ident_list(&["b"]);
        let root = target.root();
        let b = source.children(source.root()).next().unwrap();
        let log = DiffLog {
            target_root: root,
            entries: vec![LogEntry::Insert {
                parent: root,
                node: b,
                position: 1,
            }],
        };
        assert!(!target.has_listener());
        let event = log.commit(&mut target, &source);
        assert_eq!(event.len(), 1);
        assert_eq!(names(&target), ["a", "b"]);
    }

    #[test]
    fn test_broken_insert_is_fatal() {
        let mut target = ident_list(&["a"]);
        let source = ident_list(&["b"]);
        let root = target.root();
        let b = source.children(source.root()).next().unwrap();
        let log = DiffLog {
            target_root: root,
            entries: vec![LogEntry::Insert {
                parent: root,
                node: b,
                position: 5,
            }],
        };
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            log.commit(&mut target, &source)
        }));
        assert!(result.is_err());
    }
}
