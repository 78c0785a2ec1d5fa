//! Byte ranges and line/column lookup.
//!
//! Everything in this crate is byte-based: tokens, nodes and edits all carry [`Span`]s into the
//! original source. [`LineIndex`] converts offsets into zero-based `(line, column)` pairs for
//! reporting.

use std::cmp::Ordering;

/// A half-open byte range `[start, end)` in the input source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn len(self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Returns true if `other` lies entirely within `self`.
    pub const fn contains(self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Slice the covered text out of `source`.
    pub fn text(self, source: &str) -> &str {
        &source[self.start..self.end]
    }
}

/// Precomputed line starts for byte offset to `(line, column)` conversion.
///
/// Columns are byte columns relative to the line start.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        Self {
            line_starts: compute_line_starts(source),
        }
    }

    /// Convert an absolute byte offset into a zero-based `(line, column)` pair.
    ///
    /// Offsets past the end of the source extend the final line.
    pub fn line_col(&self, byte: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search_by(|&start| {
            if start <= byte {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        (line, byte.saturating_sub(self.line_starts[line]))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Compute the byte offsets where each line starts.
///
/// The returned vector always includes `0` and then `i+1` for every `\n` byte at index `i`.
fn compute_line_starts(s: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    for (i, b) in s.as_bytes().iter().copied().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}
