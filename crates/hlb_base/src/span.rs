//! Source location tracking for error reporting.
//!
//! A [`Position`] is a point in source text: a byte offset plus the 1-based
//! line and column it falls on. A [`Span`] is a pair of positions covering a
//! contiguous region. Every token, CST node, and diagnostic in HLB carries a
//! span, enabling error messages that point at the exact offending source.
//!
//! # Byte Offsets
//!
//! Offsets are byte offsets, not character indices. This matches Rust's
//! string slicing semantics: `&source[span.start.offset..span.end.offset]`
//! extracts the spanned text. Columns count bytes from the start of the
//! line, which is exact for the ASCII-heavy surface syntax of HLB.

use std::fmt;

/// A point in source text.
///
/// `line` and `column` are 1-based; `offset` is a 0-based byte offset.
/// Positions are `Copy` and cheap to pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: u32,
    /// 1-based byte column within the line.
    pub column: u32,
}

impl Position {
    pub fn new(offset: usize, line: u32, column: u32) -> Self {
        Self { offset, line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { offset: 0, line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A region of source text between two positions.
///
/// `start` is inclusive, `end` is exclusive (one past the last consumed
/// character). Use [`Span::merge`] to combine spans when building compound
/// nodes: the span of a call statement is `callee.span.merge(last_arg.span)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Creates a span covering from the start of `self` to the end of `other`.
    pub fn merge(self, other: Span) -> Span {
        let start = if self.start.offset <= other.start.offset {
            self.start
        } else {
            other.start
        };
        let end = if self.end.offset >= other.end.offset {
            self.end
        } else {
            other.end
        };
        Span { start, end }
    }

    /// Returns the length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    /// Returns `true` if this span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start.offset >= self.end.offset
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(offset: usize, line: u32, column: u32) -> Position {
        Position::new(offset, line, column)
    }

    #[test]
    fn position_default_is_start_of_file() {
        let p = Position::default();
        assert_eq!(p.offset, 0);
        assert_eq!(p.line, 1);
        assert_eq!(p.column, 1);
    }

    #[test]
    fn position_displays_line_and_column() {
        assert_eq!(pos(10, 2, 5).to_string(), "2:5");
    }

    #[test]
    fn span_merge_combines_ranges() {
        let a = Span::new(pos(5, 1, 6), pos(10, 1, 11));
        let b = Span::new(pos(8, 1, 9), pos(15, 2, 3));
        let merged = a.merge(b);
        assert_eq!(merged.start.offset, 5);
        assert_eq!(merged.end.offset, 15);
        assert_eq!(merged.end.line, 2);
    }

    #[test]
    fn span_merge_is_order_independent() {
        let a = Span::new(pos(5, 1, 6), pos(10, 1, 11));
        let b = Span::new(pos(8, 1, 9), pos(15, 2, 3));
        assert_eq!(a.merge(b), b.merge(a));
    }

    #[test]
    fn span_len_returns_byte_size() {
        let span = Span::new(pos(5, 1, 6), pos(10, 1, 11));
        assert_eq!(span.len(), 5);
    }

    #[test]
    fn span_is_empty_for_zero_length() {
        let empty = Span::new(pos(5, 1, 6), pos(5, 1, 6));
        assert!(empty.is_empty());

        let nonempty = Span::new(pos(5, 1, 6), pos(10, 1, 11));
        assert!(!nonempty.is_empty());
    }
}
