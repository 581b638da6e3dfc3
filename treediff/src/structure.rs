//! Flyweight view over an immutable tree.
//!
//! The diff engine never walks a concrete tree type. It asks a [`TreeStructure`]
//! for the children of a handle, one level at a time, into buffers it owns.

use smallvec::SmallVec;

/// Buffer that receives the children of one node.
///
/// The engine keeps one of these per recursion depth and reuses it for every
/// node visited at that depth.
pub type ChildBuf<N> = SmallVec<[N; 16]>;

/// A tree seen through copyable node handles.
///
/// Offsets are absolute positions into the text this structure was built from.
/// Both sides of a diff must use the same unit (this workspace uses UTF-8 byte
/// offsets).
pub trait TreeStructure {
    /// Flyweight handle to a node.
    type Node: Copy;

    /// Root of the structure.
    fn root(&self) -> Self::Node;

    /// Materialize the children of a lazily expanded node.
    ///
    /// Called by the engine before every [`children`](Self::children) call.
    /// Returns the handle to use from now on, which may differ from `node` when
    /// the handle caches structural information. `None` means the node could
    /// not be expanded; the engine then replaces it whole instead of looking
    /// at its children.
    fn ensure_expanded(&mut self, node: Self::Node) -> Option<Self::Node> {
        Some(node)
    }

    /// Fill `buf` with the children of `node` and return how many were written.
    ///
    /// `buf` is empty on entry. Every call must be paired with exactly one
    /// [`dispose_children`](Self::dispose_children) on the same buffer.
    fn children(&self, node: Self::Node, buf: &mut ChildBuf<Self::Node>) -> usize;

    /// Release the children obtained from [`children`](Self::children).
    fn dispose_children(&self, buf: &mut ChildBuf<Self::Node>, count: usize) {
        debug_assert!(count <= buf.len());
        buf.clear();
    }

    /// Absolute start offset of `node`.
    fn start_offset(&self, node: Self::Node) -> usize;

    /// Absolute end offset of `node` (exclusive).
    fn end_offset(&self, node: Self::Node) -> usize;

    /// Full text spanned by `node` and its descendants.
    fn text(&self, node: Self::Node) -> String;
}
