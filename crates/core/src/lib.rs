//! TypeScript type stripping library.
//!
//! This crate turns TypeScript source into JavaScript by erasing type-only syntax in place:
//! everything that survives keeps its original bytes and lines. Enums are lowered to plain
//! objects and const enum members are inlined when that is safe within one file.
//!
//! Entry points:
//!
//! - [`strip`] contains [`transform`] and the [`StripConfig`] it takes.
//!
//! Internals, in pipeline order:
//!
//! - [`parse`] runs the tree-sitter TypeScript grammar and builds the span tree in [`ast`],
//!   recovering from bad statements.
//! - [`lexer`] is a lossless token view of the same syntax tree and rejects unterminated literals.
//! - [`classify`] decides per node, including enum evaluation and const enum inlining.
//! - [`edit`] holds the edit model used to produce the output.
//! - [`diagnostics`] and [`span`] are shared plumbing.

mod alloc;
pub mod ast;
pub mod classify;
pub mod diagnostics;
pub mod edit;
mod enums;
pub mod lexer;
pub mod parse;
pub mod span;
pub mod strip;

pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use lexer::LexError;
pub use parse::ParseError;
pub use span::Span;
pub use strip::{StripConfig, TransformOutput, transform};

/// Errors that abort a transformation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("tree-sitter returned no syntax tree")]
    ParseFailed,

    #[error("no statement could be parsed: {0}")]
    Unparsable(ParseError),

    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    #[error("overlapping edits: [{a_start},{a_end}) overlaps [{b_start},{b_end})")]
    OverlappingEdits {
        a_start: usize,
        a_end: usize,
        b_start: usize,
        b_end: usize,
    },
}
