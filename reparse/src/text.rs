//! Byte ranges and edits over UTF-8 text.

use core::fmt;

use facet::Facet;

/// Half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Facet)]
pub struct TextRange {
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl TextRange {
    /// Create a range. `start` must not exceed `end`.
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Empty range at `offset`.
    #[inline]
    pub const fn empty(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Number of bytes covered.
    #[inline]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range covers nothing.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `offset` lies inside the range.
    #[inline]
    pub const fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Whether `other` lies completely inside this range.
    #[inline]
    pub const fn contains_range(&self, other: TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The range with its end moved by `delta` bytes, or `None` when that
    /// would put the end before the start.
    pub fn shift_end(&self, delta: isize) -> Option<TextRange> {
        let end = self.end.checked_add_signed(delta)?;
        (end >= self.start).then(|| TextRange::new(self.start, end))
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A single edit: `range` of the old text was replaced by `new_len` bytes.
///
/// Shaped like an LSP content change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
pub struct TextEdit {
    /// Replaced region of the old text
    pub range: TextRange,
    /// Length of the inserted text
    pub new_len: usize,
}

impl TextEdit {
    /// Insert `len` bytes at `offset`.
    pub const fn insert(offset: usize, len: usize) -> Self {
        Self {
            range: TextRange::empty(offset),
            new_len: len,
        }
    }

    /// Delete `range`.
    pub const fn delete(range: TextRange) -> Self {
        Self { range, new_len: 0 }
    }

    /// Replace `range` with `new_len` bytes.
    pub const fn replace(range: TextRange, new_len: usize) -> Self {
        Self { range, new_len }
    }

    /// Net change of the document length.
    pub fn delta(&self) -> isize {
        self.new_len as isize - self.range.len() as isize
    }

    /// Whether the edit changes nothing.
    pub fn is_noop(&self) -> bool {
        self.range.is_empty() && self.new_len == 0
    }
}

/// Smallest edit turning `old` into `new`, found by trimming the common
/// prefix and suffix. Returns `None` for identical texts.
///
/// Both ends are kept on character boundaries of both texts.
///
/// ```
/// use reparse::{TextEdit, TextRange, changed_range};
///
/// let edit = changed_range("let a = 1;", "let ab = 1;").unwrap();
/// assert_eq!(edit, TextEdit::insert(5, 1));
/// assert_eq!(edit.delta(), 1);
///
/// assert_eq!(changed_range("same", "same"), None);
/// assert_eq!(
///     changed_range("x = 10", "x = 2"),
///     Some(TextEdit::replace(TextRange::new(4, 6), 1)),
/// );
/// ```
pub fn changed_range(old: &str, new: &str) -> Option<TextEdit> {
    if old == new {
        return None;
    }
    let (old_bytes, new_bytes) = (old.as_bytes(), new.as_bytes());

    let mut prefix = old_bytes
        .iter()
        .zip(new_bytes)
        .take_while(|(a, b)| a == b)
        .count();
    while !old.is_char_boundary(prefix) || !new.is_char_boundary(prefix) {
        prefix -= 1;
    }

    let max_suffix = old.len().min(new.len()) - prefix;
    let mut suffix = old_bytes
        .iter()
        .rev()
        .zip(new_bytes.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    while !old.is_char_boundary(old.len() - suffix) || !new.is_char_boundary(new.len() - suffix) {
        suffix -= 1;
    }

    Some(TextEdit {
        range: TextRange::new(prefix, old.len() - suffix),
        new_len: new.len() - suffix - prefix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn test_edit_deltas() {
        assert_eq!(TextEdit::insert(10, 5).delta(), 5);
        assert_eq!(TextEdit::delete(TextRange::new(5, 8)).delta(), -3);
        assert_eq!(TextEdit::replace(TextRange::new(0, 3), 5).delta(), 2);
        assert!(TextEdit::insert(3, 0).is_noop());
    }

    #[test]
    fn test_range_queries() {
        let range = TextRange::new(4, 10);
        assert!(range.contains(4));
        assert!(!range.contains(10));
        assert!(range.contains_range(TextRange::new(4, 10)));
        assert!(range.contains_range(TextRange::empty(10)));
        assert!(!range.contains_range(TextRange::new(3, 5)));
        assert_eq!(range.shift_end(-6), Some(TextRange::empty(4)));
        assert_eq!(range.shift_end(-7), None);
        assert_eq!(range.shift_end(2), Some(TextRange::new(4, 12)));
        assert_eq!(range.to_string(), "4..10");
    }

    #[test]
    fn test_shift_end_past_start_is_none() {
        assert_eq!(TextRange::empty(3).shift_end(-1), None);
        assert_eq!(TextRange::new(0, 2).shift_end(-3), None);
        assert_eq!(TextRange::new(2, 5).shift_end(-3), Some(TextRange::empty(2)));
    }

    #[test]
    fn test_changed_range_deletion_and_repeats() {
        // "aaa" -> "aa": the ambiguity resolves to the last byte.
        assert_eq!(
            changed_range("aaa", "aa"),
            Some(TextEdit::delete(TextRange::new(2, 3)))
        );
        assert_eq!(changed_range("", "abc"), Some(TextEdit::insert(0, 3)));
        assert_eq!(
            changed_range("abc", ""),
            Some(TextEdit::delete(TextRange::new(0, 3)))
        );
    }

    #[test]
    fn test_changed_range_respects_char_boundaries() {
        // 'é' is c3 a9 and 'è' is c3 a8: they share the first byte.
        let edit = changed_range("café", "cafè").unwrap();
        assert_eq!(edit, TextEdit::replace(TextRange::new(3, 5), 2));

        // Same trailing byte after different leading bytes.
        let edit = changed_range("ℕx", "ℤx").unwrap();
        assert_eq!(edit.range, TextRange::new(0, 3));
        assert_eq!(edit.new_len, 3);
    }
}
