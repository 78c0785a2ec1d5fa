//! TypeScript type stripping.
//!
//! This module ties the pipeline together: parse the input, classify every node under a
//! [`StripConfig`], turn the non-kept nodes into [`Edit`]s and apply them. Everything that is
//! kept is copied byte for byte, so the output keeps the input's layout: erased declarations
//! take their line with them, erased annotations take the blanks next to them, and nothing else
//! moves.
//!
//! Transformations:
//!
//! 1. Erase: type annotations, declarations, assertions, modifiers and other type-only syntax.
//! 2. Rewrite: enums become `var` + IIFE initializers; const enum uses become literals.
//! 3. Keep as comment: type-only exports under [`StripConfig::preserve_exports`].

use crate::{
    TransformError,
    ast::{NodeKind, Tree},
    classify::{Classification, Verdict, classify},
    diagnostics::Diagnostic,
    edit::{Boundary, Edit, apply, normalize},
    parse::{Parsed, parse},
    span::Span,
};

/// Configuration options for type stripping.
///
/// Every flag defaults to `false`, which strips as much as possible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripConfig {
    /// Emit `const enum` declarations as regular enums instead of inlining their members.
    pub preserve_const_enums: bool,
    /// Keep type-only exports as `/* ... */` comments instead of erasing them.
    pub preserve_exports: bool,
    /// Keep ordinary comments.
    ///
    /// `@ts-ignore` / `@ts-expect-error` directives are governed by
    /// [`StripConfig::preserve_ts_ignore`] alone.
    pub preserve_comments: bool,
    /// Keep `@ts-ignore` and `@ts-expect-error` directive comments.
    pub preserve_ts_ignore: bool,
}

/// Output code and the diagnostics raised while producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// The stripped JavaScript source.
    pub code: String,
    /// Warnings, ordered by position in the input.
    pub diagnostics: Vec<Diagnostic>,
}

/// Strip TypeScript syntax from `source`.
///
/// Unparsable statements are copied through with a diagnostic; lexical errors and inputs where
/// no statement parses are fatal.
pub fn transform(source: &str, config: &StripConfig) -> Result<TransformOutput, TransformError> {
    let _span = tracing::debug_span!("transform", len = source.len()).entered();

    let Parsed {
        tree,
        mut diagnostics,
    } = parse(source)?;
    let classification = classify(&tree, config);
    let code = emit(&tree, &classification)?;

    diagnostics.extend(classification.into_diagnostics());
    diagnostics.sort_by_key(|d| d.span.start);

    tracing::debug!(
        input = source.len(),
        output = code.len(),
        diagnostics = diagnostics.len(),
        "transformed"
    );
    Ok(TransformOutput { code, diagnostics })
}

/// Produce the output text for a classified tree.
pub fn emit(tree: &Tree<'_>, classification: &Classification) -> Result<String, TransformError> {
    let edits = normalize(tree.source(), collect_edits(tree, classification));
    tracing::debug!(edits = edits.len(), "collected edits");
    apply(tree.source(), &edits)
}

/// Walk the tree and turn every non-kept decision into an edit.
///
/// Descendants of a replaced node are not visited; the edit covers them.
fn collect_edits(tree: &Tree<'_>, classification: &Classification) -> Vec<Edit> {
    let mut edits = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        let span = node.span;
        match &classification.decision(id).verdict {
            Verdict::Keep => stack.extend(tree.children(id).iter().rev()),
            Verdict::Erase => edits.push(Edit::erase(span.start, span.end, boundary(&node.kind))),
            Verdict::KeepAsComment => {
                let span = match node.kind {
                    NodeKind::TypeOnlySpecifier { .. } => {
                        list_item_span(tree.source(), span, edits.last())
                    }
                    _ => span,
                };
                let text = tree.text(span).replace("*/", "*\\/");
                edits.push(Edit::replace(span.start, span.end, format!("/* {text} */")));
            }
            Verdict::Rewrite(text) => edits.push(Edit::replace(span.start, span.end, text.clone())),
        }
    }
    edits
}

/// Widen a commented-out list item over its separating comma, so the list stays valid.
///
/// The following comma is preferred; a preceding one is taken only when no earlier edit
/// already covers it.
fn list_item_span(source: &str, span: Span, previous: Option<&Edit>) -> Span {
    let rest = &source[span.end..];
    let gap = rest.len() - rest.trim_start().len();
    if rest[gap..].starts_with(',') {
        return Span::new(span.start, span.end + gap + 1);
    }
    let head = source[..span.start].trim_end();
    if head.ends_with(',') {
        let comma = head.len() - 1;
        if previous.is_none_or(|edit| edit.end <= comma) {
            return Span::new(comma, span.end);
        }
    }
    span
}

fn boundary(kind: &NodeKind) -> Boundary {
    match kind {
        NodeKind::Modifier | NodeKind::AngleCast => Boundary::Prefix,
        NodeKind::Assertion(_) | NodeKind::Implements | NodeKind::TypeAnnotation => {
            Boundary::Suffix
        }
        NodeKind::TypeOnlySpecifier { .. } | NodeKind::ThisParameter => Boundary::ListItem,
        NodeKind::TypeParameters
        | NodeKind::TypeArguments
        | NodeKind::NonNull
        | NodeKind::OptionalMarker
        | NodeKind::DefiniteMarker
        | NodeKind::Reference(_) => Boundary::Tight,
        _ => Boundary::Line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    fn strip(source: &str) -> String {
        transform(source, &StripConfig::default()).unwrap().code
    }

    #[test]
    fn strips_annotations_and_declarations() {
        let source = "interface Point {\n  x: number;\n}\nconst p: Point = { x: 1 };\n";
        assert_eq!(strip(source), "const p = { x: 1 };\n");
    }

    #[test]
    fn strips_expressions() {
        assert_eq!(strip("let a = f<string>(b as any)!;\n"), "let a = f(b);\n");
        assert_eq!(strip("let n = <number>x satisfies number;\n"), "let n = x;\n");
    }

    #[test]
    fn strips_class_syntax() {
        let source = "\
abstract class A<T> extends B<T> implements C {
  private readonly x?: number;
  declare y: string;
  [key: string]: unknown;
  abstract m(): void;
  f(this: A<T>, a: T): T {
    return a;
  }
}
";
        let expected = "\
class A extends B {
  x;
  f(a) {
    return a;
  }
}
";
        assert_eq!(strip(source), expected);
    }

    #[test]
    fn const_enum_is_inlined() {
        let output = transform(
            "const enum Color { Red, Green }\nx = Color.Green;\n",
            &StripConfig::default(),
        )
        .unwrap();
        assert_eq!(output.code, "x = 1;\n");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn enum_is_lowered() {
        let source = "enum Dir {\n  Up = 1,\n  Down,\n  Name = \"n\",\n}\n";
        let expected = "var Dir; (function (Dir) {\n  Dir[Dir[\"Up\"] = 1] = \"Up\";\n  \
                        Dir[Dir[\"Down\"] = 2] = \"Down\";\n  Dir[\"Name\"] = \"n\";\n\
                        })(Dir || (Dir = {}));\n";
        assert_eq!(strip(source), expected);
    }

    /// Ordinary comments survive, the directive does not.
    #[test]
    fn directive_precedence() {
        let config = StripConfig {
            preserve_comments: true,
            ..StripConfig::default()
        };
        let output = transform("// @ts-ignore\nconst x: any = y;", &config).unwrap();
        assert_eq!(output.code, "const x = y;");
    }

    #[test]
    fn preserve_exports_marker() {
        let config = StripConfig {
            preserve_exports: true,
            ..StripConfig::default()
        };
        let output = transform("export type { A } from './a';\n", &config).unwrap();
        assert_eq!(output.code, "/* export type { A } from './a'; */\n");
    }

    /// Commented-out specifiers carry their comma, so the export list stays valid.
    #[test]
    fn preserved_specifiers_take_their_comma() {
        let config = StripConfig {
            preserve_exports: true,
            ..StripConfig::default()
        };
        let run = |source: &str| transform(source, &config).unwrap().code;
        assert_eq!(run("export { type A, b };\n"), "export { /* type A, */ b };\n");
        assert_eq!(run("export { b, type A };\n"), "export { b/* , type A */ };\n");
        assert_eq!(
            run("export { type A, type B };\n"),
            "export { /* type A, */ /* type B */ };\n"
        );
    }

    #[test]
    fn cast_after_return_keeps_the_value() {
        let source = "function f() {\n  return <any>\n  x;\n}\n";
        assert_eq!(strip(source), "function f() {\n  return x;\n}\n");
    }

    #[test]
    fn comment_before_annotation_leaves_one_space() {
        assert_eq!(strip("let a /* c */ : number = 1;\n"), "let a = 1;\n");
    }

    #[test]
    fn malformed_statement_degrades() {
        let source = "let a: number = 1;\nlet = = ;\nlet b: string = '';\n";
        let output = transform(source, &StripConfig::default()).unwrap();
        assert!(output.code.starts_with("let a = 1;\n"));
        assert!(output.code.ends_with("let b = '';\n"));
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].kind, DiagnosticKind::ParseError);
        assert!((19..28).contains(&output.diagnostics[0].span.start));
    }

    #[test]
    fn unterminated_string_is_fatal() {
        assert!(matches!(
            transform("let a = 'oops\n", &StripConfig::default()),
            Err(TransformError::Lex(_))
        ));
    }

    #[test]
    fn plain_javascript_is_unchanged() {
        let source = "const a = b < c ? d : e;\nfunction f(x) {\n  return x / 2;\n}\n";
        assert_eq!(strip(source), source);
    }
}
