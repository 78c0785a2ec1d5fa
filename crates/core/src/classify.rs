//! Keep/erase decisions for every node of a parsed tree.
//!
//! Decisions are stored in a vector parallel to the tree's arena. Most of them depend only on
//! the node kind and the active [`StripConfig`]; enums need a whole-file pass (see
//! [`crate::enums`]).

use crate::{
    ast::{NodeId, NodeKind, Tree},
    diagnostics::{Diagnostic, DiagnosticKind},
    enums,
    strip::StripConfig,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Erase,
    /// Replace the node with a `/* ... */` comment holding its text.
    KeepAsComment,
    /// Replace the node with synthesized text.
    Rewrite(String),
}

/// The rule that produced a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Runtime code.
    Runtime,
    /// Inside a statement that failed to parse.
    ParseRecovery,
    /// Inside a TypeScript-only runtime construct that is left alone.
    Unsupported,
    TypeAnnotation,
    TypeDeclaration,
    TypeParameters,
    TypeArguments,
    TypeAssertion,
    NonNullAssertion,
    Modifier,
    Ambient,
    Overload,
    AbstractMember,
    IndexSignature,
    Implements,
    ThisParameter,
    TypeOnlyImport,
    TypeOnlyExport,
    PreserveExports,
    Comment,
    PreserveComments,
    Directive,
    PreserveTsIgnore,
    EnumLowering,
    ConstEnumInlined,
    ConstEnumFallback,
    PreserveConstEnums,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub rule: Rule,
}

impl Decision {
    pub(crate) fn keep(rule: Rule) -> Self {
        Self {
            verdict: Verdict::Keep,
            rule,
        }
    }

    pub(crate) fn erase(rule: Rule) -> Self {
        Self {
            verdict: Verdict::Erase,
            rule,
        }
    }

    pub(crate) fn rewrite(text: String, rule: Rule) -> Self {
        Self {
            verdict: Verdict::Rewrite(text),
            rule,
        }
    }

    fn as_comment(rule: Rule) -> Self {
        Self {
            verdict: Verdict::KeepAsComment,
            rule,
        }
    }
}

/// Per-node decisions plus the diagnostics raised while making them.
#[derive(Debug, Clone)]
pub struct Classification {
    decisions: Vec<Decision>,
    diagnostics: Vec<Diagnostic>,
}

impl Classification {
    pub fn decision(&self, id: NodeId) -> &Decision {
        &self.decisions[id.index()]
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Decide what happens to every node of `tree` under `config`.
pub fn classify(tree: &Tree<'_>, config: &StripConfig) -> Classification {
    let _span = tracing::debug_span!("classify", nodes = tree.len()).entered();

    let mut decisions = vec![Decision::keep(Rule::Runtime); tree.len()];
    // Nodes whose subtree is copied through unchanged.
    let mut frozen = vec![false; tree.len()];
    for (id, _) in tree.walk() {
        let node = tree.node(id);
        let inherited = node.parent.and_then(|p| {
            let parent = tree.node(p);
            if frozen[p.index()] {
                Some(decisions[p.index()].rule)
            } else {
                match parent.kind {
                    NodeKind::Unparsed => Some(Rule::ParseRecovery),
                    NodeKind::Unsupported(_) => Some(Rule::Unsupported),
                    _ => None,
                }
            }
        });
        decisions[id.index()] = match inherited {
            Some(rule) => {
                frozen[id.index()] = true;
                Decision::keep(rule)
            }
            None => decide(&node.kind, config),
        };
    }

    let mut diagnostics = Vec::new();
    enums::resolve(tree, config, &mut decisions, &mut diagnostics);

    for (id, node) in tree.iter() {
        let NodeKind::Unsupported(kind) = node.kind else {
            continue;
        };
        let removed = tree
            .ancestors(id)
            .any(|a| decisions[a.index()].verdict != Verdict::Keep);
        if !removed && !frozen[id.index()] {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::UnsupportedConstruct,
                node.span,
                format!("{} are not supported; kept unchanged", kind.describe()),
            ));
        }
    }

    if tracing::enabled!(tracing::Level::TRACE) {
        for (id, node) in tree.iter() {
            let decision = &decisions[id.index()];
            if decision.verdict != Verdict::Keep {
                tracing::trace!(
                    kind = node.kind.name(),
                    start = node.span.start,
                    end = node.span.end,
                    rule = ?decision.rule,
                    "decided"
                );
            }
        }
    }

    Classification {
        decisions,
        diagnostics,
    }
}

fn decide(kind: &NodeKind, config: &StripConfig) -> Decision {
    match kind {
        NodeKind::Module
        | NodeKind::Trivia
        | NodeKind::Statement
        | NodeKind::ClassMember
        | NodeKind::Reference(_)
        | NodeKind::Binding
        | NodeKind::Enum(_) => Decision::keep(Rule::Runtime),
        NodeKind::Unparsed => Decision::keep(Rule::ParseRecovery),
        NodeKind::Unsupported(_) => Decision::keep(Rule::Unsupported),
        NodeKind::Comment if config.preserve_comments => Decision::keep(Rule::PreserveComments),
        NodeKind::Comment => Decision::erase(Rule::Comment),
        NodeKind::Directive(_) if config.preserve_ts_ignore => {
            Decision::keep(Rule::PreserveTsIgnore)
        }
        NodeKind::Directive(_) => Decision::erase(Rule::Directive),
        NodeKind::TypeAnnotation | NodeKind::OptionalMarker | NodeKind::DefiniteMarker => {
            Decision::erase(Rule::TypeAnnotation)
        }
        NodeKind::TypeDeclaration(_) => Decision::erase(Rule::TypeDeclaration),
        NodeKind::TypeOnlyImport | NodeKind::TypeOnlySpecifier { export: false } => {
            Decision::erase(Rule::TypeOnlyImport)
        }
        NodeKind::TypeOnlyExport | NodeKind::TypeOnlySpecifier { export: true } => {
            if config.preserve_exports {
                Decision::as_comment(Rule::PreserveExports)
            } else {
                Decision::erase(Rule::TypeOnlyExport)
            }
        }
        NodeKind::TypeParameters => Decision::erase(Rule::TypeParameters),
        NodeKind::TypeArguments => Decision::erase(Rule::TypeArguments),
        NodeKind::Assertion(_) | NodeKind::AngleCast => Decision::erase(Rule::TypeAssertion),
        NodeKind::NonNull => Decision::erase(Rule::NonNullAssertion),
        NodeKind::Modifier => Decision::erase(Rule::Modifier),
        NodeKind::Ambient => Decision::erase(Rule::Ambient),
        NodeKind::Overload => Decision::erase(Rule::Overload),
        NodeKind::AbstractMember => Decision::erase(Rule::AbstractMember),
        NodeKind::IndexSignature => Decision::erase(Rule::IndexSignature),
        NodeKind::Implements => Decision::erase(Rule::Implements),
        NodeKind::ThisParameter => Decision::erase(Rule::ThisParameter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    /// `(kind name, node text, decision)` for every node that is not plain runtime code.
    fn decided(
        source: &str,
        config: StripConfig,
    ) -> (Vec<(String, String, Decision)>, Vec<Diagnostic>) {
        let parsed = parse(source).unwrap();
        let tree = &parsed.tree;
        let classification = classify(tree, &config);
        let decisions = tree
            .iter()
            .filter(|(id, _)| classification.decision(*id).rule != Rule::Runtime)
            .map(|(id, node)| {
                (
                    node.kind.name().to_string(),
                    tree.text(node.span).to_string(),
                    classification.decision(id).clone(),
                )
            })
            .collect();
        (decisions, classification.into_diagnostics())
    }

    fn verdict_of(decisions: &[(String, String, Decision)], kind: &str) -> Verdict {
        decisions
            .iter()
            .find(|(k, _, _)| k == kind)
            .map(|(_, _, d)| d.verdict.clone())
            .unwrap_or_else(|| panic!("no {kind} node"))
    }

    #[test]
    fn type_syntax_is_erased() {
        let (decisions, diagnostics) = decided(
            "interface A {}\nlet a: A = b as A;\n",
            StripConfig::default(),
        );
        assert!(diagnostics.is_empty());
        assert_eq!(verdict_of(&decisions, "Interface"), Verdict::Erase);
        assert_eq!(verdict_of(&decisions, "TypeAnnotation"), Verdict::Erase);
        assert_eq!(verdict_of(&decisions, "AsExpression"), Verdict::Erase);
    }

    /// Directives follow `preserve_ts_ignore` only; ordinary comments follow `preserve_comments`.
    #[test]
    fn comment_flags_are_independent() {
        let source = "// @ts-ignore\n// note\nconst x: any = y;\n";
        let config = StripConfig {
            preserve_comments: true,
            ..StripConfig::default()
        };
        let (decisions, _) = decided(source, config);
        assert_eq!(verdict_of(&decisions, "Directive"), Verdict::Erase);
        assert_eq!(verdict_of(&decisions, "Comment"), Verdict::Keep);

        let config = StripConfig {
            preserve_ts_ignore: true,
            ..StripConfig::default()
        };
        let (decisions, _) = decided(source, config);
        assert_eq!(verdict_of(&decisions, "Directive"), Verdict::Keep);
        assert_eq!(verdict_of(&decisions, "Comment"), Verdict::Erase);
    }

    #[test]
    fn preserve_exports_keeps_marker() {
        let source = "export type { A } from './a';\n";
        let (decisions, _) = decided(source, StripConfig::default());
        assert_eq!(verdict_of(&decisions, "TypeOnlyExport"), Verdict::Erase);

        let config = StripConfig {
            preserve_exports: true,
            ..StripConfig::default()
        };
        let (decisions, _) = decided(source, config);
        assert_eq!(verdict_of(&decisions, "TypeOnlyExport"), Verdict::KeepAsComment);
    }

    #[test]
    fn const_enum_uses_are_inlined() {
        let source = "const enum Color { Red, Green }\nx = Color.Green;\n";
        let (decisions, diagnostics) = decided(source, StripConfig::default());
        assert!(diagnostics.is_empty());
        assert_eq!(verdict_of(&decisions, "Enum"), Verdict::Erase);
        assert_eq!(
            verdict_of(&decisions, "Reference"),
            Verdict::Rewrite("1".to_string())
        );
    }

    #[test]
    fn const_enum_falls_back_when_referenced_whole() {
        let source = "const enum Color { Red }\nconsole.log(Color);\n";
        let (decisions, diagnostics) = decided(source, StripConfig::default());
        assert!(matches!(verdict_of(&decisions, "Enum"), Verdict::Rewrite(_)));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::UnresolvableConstEnumInline
        );
    }

    #[test]
    fn preserve_const_enums_lowers() {
        let source = "const enum E { A = 1 }\nE.A;\n";
        let config = StripConfig {
            preserve_const_enums: true,
            ..StripConfig::default()
        };
        let (decisions, diagnostics) = decided(source, config);
        assert!(diagnostics.is_empty());
        assert_eq!(
            verdict_of(&decisions, "Enum"),
            Verdict::Rewrite(
                "var E; (function (E) { E[E[\"A\"] = 1] = \"A\"; })(E || (E = {}));".to_string()
            )
        );
        assert!(!decisions.iter().any(|(k, _, _)| k == "Reference"));
    }

    #[test]
    fn unsupported_constructs_are_reported_and_frozen() {
        let source = "namespace N { export const a: number = 1; }\n";
        let (decisions, diagnostics) = decided(source, StripConfig::default());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnsupportedConstruct);
        assert_eq!(verdict_of(&decisions, "TypeAnnotation"), Verdict::Keep);
    }

    /// Unsupported syntax inside something already erased is not worth a warning.
    #[test]
    fn unsupported_inside_erased_is_silent() {
        let source = "declare class A { constructor(private x: number); }\n";
        let (_, diagnostics) = decided(source, StripConfig::default());
        assert!(diagnostics.is_empty());
    }
}
