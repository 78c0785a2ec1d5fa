//! Non-fatal findings reported alongside the output.

use std::fmt;

use crate::span::{LineIndex, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A top-level statement could not be parsed and was copied through unchanged.
    ParseError,
    /// TypeScript-only runtime construct that is kept unchanged.
    UnsupportedConstruct,
    /// A const enum could not be inlined and was emitted as a regular enum instead.
    UnresolvableConstEnumInline,
    /// An enum member initializer could not be evaluated or continued.
    EnumInitializer,
}

impl DiagnosticKind {
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::ParseError => "parse-error",
            DiagnosticKind::UnsupportedConstruct => "unsupported-construct",
            DiagnosticKind::UnresolvableConstEnumInline => "const-enum-fallback",
            DiagnosticKind::EnumInitializer => "enum-initializer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Location in the input source.
    pub span: Span,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::debug!(code = kind.code(), start = span.start, end = span.end, "{message}");
        Self {
            kind,
            message,
            span,
        }
    }

    /// Every diagnostic this crate produces is a warning; failures are [`crate::TransformError`]s.
    pub fn severity(&self) -> Severity {
        Severity::Warning
    }

    /// Render as `line:col: warning: message` with one-based positions.
    pub fn render(&self, index: &LineIndex) -> String {
        let (line, col) = index.line_col(self.span.start);
        format!("{}:{}: {self}", line + 1, col + 1)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning[{}]: {}", self.kind.code(), self.message)
    }
}
