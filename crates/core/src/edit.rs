//! Edit model.
//!
//! This module defines [`Edit`], a byte-range replacement over the TypeScript input, plus the
//! normalization that widens erasures to their surrounding layout and the left-to-right
//! application loop.
//!
//! Key ideas:
//!
//! - Offsets are byte-based and always fall on UTF-8 boundaries (token edges).
//! - An erasure carries a [`Boundary`] describing what it may take with it: its whole line,
//!   the blanks on one side, or a separating comma.
//! - Kept bytes are never reformatted; only blanks, line breaks and list commas adjacent to an
//!   erasure are consumed.
//!
//! Invariants:
//!
//! - After [`normalize`], edits are sorted by `start` and do not overlap.
//! - [`apply`] re-validates before touching the input.

use crate::TransformError;

/// What an erasure may consume around itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Exactly the node's bytes.
    Tight,
    /// Statement-like: the whole line when the node is alone on it.
    Line,
    /// Leading syntax such as a modifier: blanks after it.
    Prefix,
    /// Trailing syntax such as `as T`: blanks before it.
    Suffix,
    /// Entry of a comma-separated list: one separating comma.
    ListItem,
}

/// A replacement of `start..end` in the input by `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Start byte offset (inclusive) in the input.
    pub start: usize,
    /// End byte offset (exclusive) in the input.
    pub end: usize,
    /// Replacement text inserted into the output.
    pub replacement: String,
    pub boundary: Boundary,
}

impl Edit {
    pub fn erase(start: usize, end: usize, boundary: Boundary) -> Self {
        Self {
            start,
            end,
            replacement: String::new(),
            boundary,
        }
    }

    pub fn replace(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
            boundary: Boundary::Tight,
        }
    }

    fn is_erasure(&self) -> bool {
        self.replacement.is_empty()
    }
}

/// Sort edits, widen erasures to their boundary and resolve the overlaps widening creates.
pub fn normalize(source: &str, mut edits: Vec<Edit>) -> Vec<Edit> {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out: Vec<Edit> = Vec::with_capacity(edits.len());
    for edit in edits {
        let mut edit = if edit.is_erasure() {
            widen(source.as_bytes(), edit)
        } else {
            edit
        };
        if let Some(prev) = out.last_mut()
            && edit.start < prev.end
        {
            if prev.is_erasure() && edit.start >= prev.start {
                prev.end = edit.start;
            } else if edit.is_erasure() {
                if edit.end <= prev.end {
                    continue;
                }
                edit.start = prev.end;
            }
        }
        out.push(edit);
    }
    out.retain(|e| e.start < e.end || !e.replacement.is_empty());
    collapse_blanks(source.as_bytes(), out)
}

/// Merge touching erasures, then let an erasure with blanks on both sides take the ones after
/// it, so `a /* c */ : T` leaves one space rather than two.
fn collapse_blanks(src: &[u8], edits: Vec<Edit>) -> Vec<Edit> {
    let mut out: Vec<Edit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if let Some(prev) = out.last_mut()
            && prev.is_erasure()
            && edit.is_erasure()
            && prev.end == edit.start
        {
            prev.end = edit.end;
            continue;
        }
        out.push(edit);
    }

    for i in 0..out.len() {
        let limit = out.get(i + 1).map_or(src.len(), |next| next.start);
        let edit = &mut out[i];
        if !edit.is_erasure() || edit.start == 0 || edit.end >= limit {
            continue;
        }
        if is_blank(src[edit.start - 1]) && is_blank(src[edit.end]) {
            edit.end = skip_blanks(src, edit.end).min(limit);
        } else if is_word_byte(src[edit.start - 1]) && is_word_byte(src[edit.end]) {
            edit.replacement.push(' ');
        }
    }
    out
}

fn widen(src: &[u8], mut edit: Edit) -> Edit {
    let before = skip_blanks_back(src, edit.start);
    let after = skip_blanks(src, edit.end);

    match edit.boundary {
        Boundary::Tight => {}
        Boundary::Line => {
            let at_line_start = before == 0 || src[before - 1] == b'\n';
            let at_line_end = after == src.len() || matches!(src[after], b'\n' | b'\r');
            if at_line_start && at_line_end {
                edit.start = before;
                edit.end = after + line_break_len(src, after);
            } else if at_line_start {
                edit.start = before;
                edit.end = after;
            } else if at_line_end {
                edit.start = before;
            } else if before < edit.start && after > edit.end {
                edit.end = after;
            } else {
                edit.start = before;
                edit.end = after;
            }
        }
        Boundary::Prefix => {
            edit.end = after;
            // `return <T>\n x` would otherwise return undefined.
            if line_break_len(src, after) > 0 && ends_with_restricted_word(&src[..before]) {
                edit.end = skip_space(src, after);
            }
        }
        Boundary::Suffix => edit.start = before,
        Boundary::ListItem => {
            if src.get(after) == Some(&b',') {
                edit.end = skip_blanks(src, after + 1);
            } else {
                let prev = skip_space_back(src, edit.start);
                if prev > 0 && src[prev - 1] == b',' {
                    edit.start = prev - 1;
                } else {
                    edit.start = before;
                }
            }
        }
    }

    // Keep neighbouring words apart: `let/**/x` must not become `letx`.
    if edit.start > 0
        && edit.end < src.len()
        && is_word_byte(src[edit.start - 1])
        && is_word_byte(src[edit.end])
    {
        edit.replacement.push(' ');
    }
    edit
}

fn is_blank(b: u8) -> bool {
    matches!(b, b' ' | b'\t')
}

fn skip_blanks(src: &[u8], mut i: usize) -> usize {
    while i < src.len() && is_blank(src[i]) {
        i += 1;
    }
    i
}

fn skip_space(src: &[u8], mut i: usize) -> usize {
    while i < src.len() && src[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn skip_blanks_back(src: &[u8], mut i: usize) -> usize {
    while i > 0 && is_blank(src[i - 1]) {
        i -= 1;
    }
    i
}

fn skip_space_back(src: &[u8], mut i: usize) -> usize {
    while i > 0 && src[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    i
}

fn line_break_len(src: &[u8], i: usize) -> usize {
    match src.get(i..) {
        Some([b'\r', b'\n', ..]) => 2,
        Some([b'\n' | b'\r', ..]) => 1,
        _ => 0,
    }
}

/// Keywords after which a line break ends the statement.
fn ends_with_restricted_word(src: &[u8]) -> bool {
    ["return", "throw", "yield"].iter().any(|word| {
        let word = word.as_bytes();
        src.ends_with(word)
            && (src.len() == word.len() || !is_word_byte(src[src.len() - word.len() - 1]))
    })
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$') || b >= 0x80
}

/// Validate edit invariants required by [`apply`].
///
/// - `start <= end` and `end <= input_len`
/// - both offsets fall on character boundaries
/// - edits are non-overlapping and in ascending `start` order
pub fn validate_edits(source: &str, edits: &[Edit]) -> Result<(), TransformError> {
    let input_len = source.len();
    let mut prev_end: usize = 0;
    for (idx, e) in edits.iter().enumerate() {
        if e.start > e.end {
            return Err(TransformError::InvalidEdit(format!(
                "start > end at index {idx}: start={}, end={}",
                e.start, e.end
            )));
        }
        if e.end > input_len {
            return Err(TransformError::InvalidEdit(format!(
                "edit out of bounds at index {idx}: end={} > input_len={}",
                e.end, input_len
            )));
        }
        if !source.is_char_boundary(e.start) || !source.is_char_boundary(e.end) {
            return Err(TransformError::InvalidEdit(format!(
                "edit splits a character at index {idx}: start={}, end={}",
                e.start, e.end
            )));
        }
        if idx > 0 && e.start < prev_end {
            return Err(TransformError::OverlappingEdits {
                a_start: edits[idx - 1].start,
                a_end: edits[idx - 1].end,
                b_start: e.start,
                b_end: e.end,
            });
        }
        prev_end = e.end;
    }
    Ok(())
}

/// Apply validated edits left to right.
pub fn apply(source: &str, edits: &[Edit]) -> Result<String, TransformError> {
    validate_edits(source, edits)?;

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for edit in edits {
        // Copy unchanged bytes before the edit.
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.replacement);
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}
