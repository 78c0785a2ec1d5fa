//! Builds the span [`Tree`] from the tree-sitter TypeScript grammar.
//!
//! The concrete syntax tree is walked once. Type-only syntax becomes a leaf node; runtime syntax
//! is only kept as structure where the classifier needs ancestry (top-level statements, class
//! members, unsupported constructs) or a name (bindings and references). Type positions are
//! never descended into.
//!
//! A top-level statement containing a syntax error becomes [`NodeKind::Unparsed`] and is copied
//! unchanged. Only a file in which no statement parses at all is rejected.

use std::cell::RefCell;

use tree_sitter::{Node as SyntaxNode, Parser};

use crate::{
    TransformError,
    alloc::ensure_tree_sitter_allocator,
    ast::{
        AssertionKind, DeclKind, DirectiveKind, EnumDecl, EnumMember, Node, NodeId, NodeKind,
        Reference, Tree, UnsupportedKind,
    },
    diagnostics::{Diagnostic, DiagnosticKind},
    lexer::check_literals,
    span::Span,
};

thread_local! {
    /// Shared parser instance, so the grammar is loaded once per thread.
    static TYPESCRIPT_PARSER: RefCell<Parser> = {
        ensure_tree_sitter_allocator();

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .expect("tree-sitter-typescript language load failed");
        RefCell::new(parser)
    };
}

/// A syntax error inside one statement.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("expected {expected} at byte {offset}")]
pub struct ParseError {
    pub offset: usize,
    pub expected: &'static str,
}

/// Parser output: the tree plus recovery diagnostics.
#[derive(Debug, Clone)]
pub struct Parsed<'src> {
    pub tree: Tree<'src>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the TypeScript grammar over `source`.
pub(crate) fn syntax_tree(source: &str) -> Result<tree_sitter::Tree, TransformError> {
    ensure_tree_sitter_allocator();

    TYPESCRIPT_PARSER
        .with(|p| {
            let mut parser = p.borrow_mut();
            parser.parse(source, None)
        })
        .ok_or(TransformError::ParseFailed)
}

/// Parse `source` into a span tree.
pub fn parse(source: &str) -> Result<Parsed<'_>, TransformError> {
    let syntax = syntax_tree(source)?;
    let root = syntax.root_node();
    check_literals(root, source)?;
    Builder::new(source).build(root)
}

/// Whether identifiers introduce names or use them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Value,
    Pattern,
}

/// How a statement-level syntax node maps onto the span tree.
enum Shape<'tree> {
    /// The whole statement becomes one childless node.
    Leaf(NodeKind),
    Enum {
        decl: SyntaxNode<'tree>,
        exported: bool,
        declare: bool,
    },
    /// A namespace with runtime content; its body is still walked.
    RuntimeNamespace(SyntaxNode<'tree>),
}

struct Builder<'src, 'tree> {
    source: &'src str,
    nodes: Vec<Node>,
    pending: Vec<(SyntaxNode<'tree>, NodeId, Mode)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src, 'tree> Builder<'src, 'tree> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            nodes: Vec::new(),
            pending: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn build(mut self, root: SyntaxNode<'tree>) -> Result<Parsed<'src>, TransformError> {
        let module = self.add(NodeKind::Module, Span::new(0, self.source.len()), None);
        let in_error = root.is_error();

        let mut broken: Option<(Span, ParseError)> = None;
        let mut first_error = None;
        let mut parsed = 0usize;
        for child in children(root) {
            if is_broken(child, in_error) {
                let span = span_of(child);
                broken = Some(match broken {
                    Some((run, err)) => (run.cover(span), err),
                    None => (span, first_problem(child)),
                });
                continue;
            }
            if let Some((run, err)) = broken.take() {
                self.unparsed(module, run, err);
                first_error.get_or_insert(err);
            }

            match child.kind() {
                "comment" | "html_comment" => self.comment(child, module),
                "hash_bang_line" => {
                    self.add(NodeKind::Trivia, span_of(child), Some(module));
                }
                _ => {
                    parsed += 1;
                    if !self.special(child, module) {
                        let statement = self.add(NodeKind::Statement, span_of(child), Some(module));
                        self.pending.push((child, statement, Mode::Value));
                    }
                    self.drain();
                }
            }
        }
        if let Some((run, err)) = broken.take() {
            self.unparsed(module, run, err);
            first_error.get_or_insert(err);
        }

        if let (0, Some(err)) = (parsed, first_error) {
            return Err(TransformError::Unparsable(err));
        }

        let diagnostics = std::mem::take(&mut self.diagnostics);
        let tree = self.finish(module);
        tracing::debug!(nodes = tree.len(), parsed, "parsed module");
        Ok(Parsed {
            tree,
            diagnostics,
        })
    }

    fn drain(&mut self) {
        while let Some((node, parent, mode)) = self.pending.pop() {
            self.visit(node, parent, mode);
        }
    }

    fn add(&mut self, kind: NodeKind, span: Span, parent: Option<NodeId>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node {
            kind,
            span,
            parent,
            children: Vec::new(),
        });
        id
    }

    fn leaf(&mut self, kind: NodeKind, span: Span, parent: NodeId) {
        self.add(kind, span, Some(parent));
    }

    fn push(&mut self, node: SyntaxNode<'tree>, parent: NodeId, mode: Mode) {
        self.pending.push((node, parent, mode));
    }

    /// Queue every child of `node`; they are visited in document order.
    fn push_children(&mut self, node: SyntaxNode<'tree>, parent: NodeId, mode: Mode) {
        for child in children(node).into_iter().rev() {
            self.push(child, parent, mode);
        }
    }

    /// Queue the children of `node`, walking `patterns` in pattern mode and the rest as values.
    fn push_with_patterns(&mut self, node: SyntaxNode<'tree>, parent: NodeId, patterns: &[&str]) {
        let targets: Vec<_> = patterns
            .iter()
            .filter_map(|field| node.child_by_field_name(field))
            .collect();
        for child in children(node).into_iter().rev() {
            let mode = if targets.contains(&child) {
                Mode::Pattern
            } else {
                Mode::Value
            };
            self.push(child, parent, mode);
        }
    }

    fn unparsed(&mut self, module: NodeId, span: Span, err: ParseError) {
        self.add(NodeKind::Unparsed, span, Some(module));
        self.diagnostics.push(Diagnostic::warning(
            DiagnosticKind::ParseError,
            span,
            format!("could not parse statement ({err}); copied unchanged"),
        ));
    }

    fn comment(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let span = span_of(node);
        self.leaf(comment_kind(span.text(self.source)), span, parent);
    }

    fn visit(&mut self, node: SyntaxNode<'tree>, parent: NodeId, mode: Mode) {
        if node.is_missing() || node.start_byte() == node.end_byte() {
            return;
        }
        if self.special(node, parent) {
            return;
        }

        let span = span_of(node);
        match node.kind() {
            "comment" | "html_comment" => self.comment(node, parent),
            "type_annotation" | "asserts_annotation" | "type_predicate_annotation" => {
                self.leaf(NodeKind::TypeAnnotation, span, parent);
            }
            "type_parameters" => self.leaf(NodeKind::TypeParameters, span, parent),
            "type_arguments" => self.leaf(NodeKind::TypeArguments, span, parent),
            "implements_clause" => self.leaf(NodeKind::Implements, span, parent),
            "accessibility_modifier" | "override_modifier" => {
                self.leaf(NodeKind::Modifier, span, parent);
            }
            "method_signature" => self.member_leaf(NodeKind::Overload, node, parent),
            "abstract_method_signature" => self.member_leaf(NodeKind::AbstractMember, node, parent),
            "index_signature" => self.member_leaf(NodeKind::IndexSignature, node, parent),
            "as_expression" => self.assertion(node, parent, AssertionKind::As),
            "satisfies_expression" => self.assertion(node, parent, AssertionKind::Satisfies),
            "type_assertion" => self.angle_cast(node, parent),
            "non_null_expression" => self.non_null(node, parent),
            "required_parameter" | "optional_parameter" => self.parameter(node, parent),
            "variable_declarator" => self.declarator(node, parent),
            "public_field_definition" => self.field(node, parent),
            "method_definition" => self.method(node, parent),
            "class_declaration" | "abstract_class_declaration" | "class" => {
                self.class(node, parent);
            }
            "function_declaration"
            | "generator_function_declaration"
            | "function_expression"
            | "function"
            | "generator_function" => self.function(node, parent),
            "arrow_function" => self.push_with_patterns(node, parent, &["parameter"]),
            "catch_clause" => self.push_with_patterns(node, parent, &["parameter"]),
            "for_in_statement" if node.child_by_field_name("kind").is_some() => {
                self.push_with_patterns(node, parent, &["left"]);
            }
            "pair_pattern" => self.push_with_patterns(node, parent, &["value"]),
            "assignment_pattern" | "object_assignment_pattern" => {
                self.push_with_patterns(node, parent, &["left"]);
            }
            "import_clause" | "namespace_import" => {
                self.push_children(node, parent, Mode::Pattern);
            }
            "import_specifier" => self.import_specifier(node, parent),
            "export_specifier" => self.export_specifier(node, parent),
            "member_expression" | "subscript_expression" => self.member_access(node, parent),
            "identifier" if mode == Mode::Pattern => self.leaf(NodeKind::Binding, span, parent),
            "identifier" | "shorthand_property_identifier" => {
                self.reference(span, span, None, false, parent);
            }
            "shorthand_property_identifier_pattern" => {
                self.leaf(NodeKind::Binding, span, parent);
            }
            "string" | "number" | "regex" | "property_identifier" | "type_identifier" => {}
            _ => self.push_children(node, parent, mode),
        }
    }

    /// Handle declarations that map onto one node as a whole. Returns false for everything else.
    fn special(&mut self, node: SyntaxNode<'tree>, parent: NodeId) -> bool {
        let Some(shape) = statement_shape(node) else {
            return false;
        };
        let span = span_of(node);
        match shape {
            Shape::Leaf(kind) => self.leaf(kind, span, parent),
            Shape::Enum {
                decl,
                exported,
                declare,
            } => self.enum_decl(decl, span, parent, exported, declare),
            Shape::RuntimeNamespace(module) => {
                let id = self.add(
                    NodeKind::Unsupported(UnsupportedKind::Namespace),
                    span,
                    Some(parent),
                );
                if let Some(body) = module.child_by_field_name("body") {
                    self.push_children(body, id, Mode::Value);
                }
            }
        }
        true
    }

    /// A class body entry that owns the `;` or `,` right after it.
    fn member_leaf(&mut self, kind: NodeKind, node: SyntaxNode<'tree>, parent: NodeId) {
        let mut span = span_of(node);
        if let Some(next) = node.next_sibling() {
            if !next.is_named() && matches!(next.kind(), ";" | ",") {
                span.end = next.end_byte();
            }
        }
        self.leaf(kind, span, parent);
    }

    /// `x as T`: the node covers the keyword and the type, the operand is walked.
    fn assertion(&mut self, node: SyntaxNode<'tree>, parent: NodeId, kind: AssertionKind) {
        let keyword = match kind {
            AssertionKind::As => "as",
            AssertionKind::Satisfies => "satisfies",
        };
        let nodes = children(node);
        let Some(at) = nodes
            .iter()
            .find(|child| !child.is_named() && child.kind() == keyword)
            .map(|child| child.start_byte())
        else {
            return self.push_children(node, parent, Mode::Value);
        };
        self.leaf(
            NodeKind::Assertion(kind),
            Span::new(at, node.end_byte()),
            parent,
        );
        for child in nodes.into_iter().rev() {
            if child.end_byte() <= at {
                self.push(child, parent, Mode::Value);
            }
        }
    }

    /// `<T>x`: the node covers `<T>`, the operand is walked.
    fn angle_cast(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let nodes = children(node);
        let Some(cast) = nodes.iter().find(|child| child.kind() == "type_arguments") else {
            return self.push_children(node, parent, Mode::Value);
        };
        let cast = span_of(*cast);
        self.leaf(NodeKind::AngleCast, cast, parent);
        for child in nodes.into_iter().rev() {
            if child.start_byte() >= cast.end {
                self.push(child, parent, Mode::Value);
            }
        }
    }

    fn non_null(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let nodes = children(node);
        let Some(bang) = nodes
            .iter()
            .rev()
            .find(|child| !child.is_named() && child.kind() == "!")
            .map(|child| span_of(*child))
        else {
            return self.push_children(node, parent, Mode::Value);
        };
        self.leaf(NodeKind::NonNull, bang, parent);
        for child in nodes.into_iter().rev() {
            if child.end_byte() <= bang.start {
                self.push(child, parent, Mode::Value);
            }
        }
    }

    fn parameter(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let span = span_of(node);
        let pattern = node.child_by_field_name("pattern");
        if pattern.is_some_and(|p| p.kind() == "this") {
            return self.leaf(NodeKind::ThisParameter, span, parent);
        }

        let nodes = children(node);
        let is_property = nodes.iter().any(|child| {
            matches!(child.kind(), "accessibility_modifier" | "override_modifier")
                || (!child.is_named() && child.kind() == "readonly")
        });
        let owner = if is_property {
            self.add(
                NodeKind::Unsupported(UnsupportedKind::ParameterProperty),
                span,
                Some(parent),
            )
        } else {
            parent
        };
        for child in nodes.into_iter().rev() {
            match child.kind() {
                "?" if !child.is_named() => {
                    self.leaf(NodeKind::OptionalMarker, span_of(child), owner);
                }
                "readonly" if !child.is_named() => {
                    self.leaf(NodeKind::Modifier, span_of(child), owner);
                }
                _ if Some(child) == pattern => self.push(child, owner, Mode::Pattern),
                _ => self.push(child, owner, Mode::Value),
            }
        }
    }

    fn declarator(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let name = node.child_by_field_name("name");
        for child in children(node).into_iter().rev() {
            if !child.is_named() && child.kind() == "!" {
                self.leaf(NodeKind::DefiniteMarker, span_of(child), parent);
            } else if Some(child) == name {
                self.push(child, parent, Mode::Pattern);
            } else {
                self.push(child, parent, Mode::Value);
            }
        }
    }

    fn field(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let nodes = children(node);
        let has_word = |word: &str| {
            nodes
                .iter()
                .any(|child| !child.is_named() && child.kind() == word)
        };
        if has_word("declare") {
            return self.member_leaf(NodeKind::Ambient, node, parent);
        }
        if has_word("abstract") {
            return self.member_leaf(NodeKind::AbstractMember, node, parent);
        }

        let member = self.add(NodeKind::ClassMember, span_of(node), Some(parent));
        self.member_parts(node, nodes, member);
    }

    fn method(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let in_class = node.parent().is_some_and(|p| p.kind() == "class_body");
        let owner = if in_class {
            self.add(NodeKind::ClassMember, span_of(node), Some(parent))
        } else {
            parent
        };
        self.member_parts(node, children(node), owner);
    }

    /// Markers and modifiers of a class member; the name is skipped unless computed.
    fn member_parts(
        &mut self,
        node: SyntaxNode<'tree>,
        nodes: Vec<SyntaxNode<'tree>>,
        owner: NodeId,
    ) {
        let name = node.child_by_field_name("name");
        for child in nodes.into_iter().rev() {
            let span = span_of(child);
            match child.kind() {
                "readonly" if !child.is_named() => self.leaf(NodeKind::Modifier, span, owner),
                "?" if !child.is_named() => self.leaf(NodeKind::OptionalMarker, span, owner),
                "!" if !child.is_named() => self.leaf(NodeKind::DefiniteMarker, span, owner),
                "computed_property_name" => self.push(child, owner, Mode::Value),
                _ if Some(child) == name => {}
                _ => self.push(child, owner, Mode::Value),
            }
        }
    }

    fn class(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let name = node.child_by_field_name("name");
        for child in children(node).into_iter().rev() {
            if !child.is_named() && child.kind() == "abstract" {
                self.leaf(NodeKind::Modifier, span_of(child), parent);
            } else if Some(child) == name {
                self.leaf(NodeKind::Binding, span_of(child), parent);
            } else {
                self.push(child, parent, Mode::Value);
            }
        }
    }

    fn function(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let name = node.child_by_field_name("name");
        for child in children(node).into_iter().rev() {
            if Some(child) == name && child.kind() == "identifier" {
                self.leaf(NodeKind::Binding, span_of(child), parent);
            } else {
                self.push(child, parent, Mode::Value);
            }
        }
    }

    fn import_specifier(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let span = span_of(node);
        if starts_with_type_keyword(node) {
            return self.leaf(NodeKind::TypeOnlySpecifier { export: false }, span, parent);
        }
        let local = node
            .child_by_field_name("alias")
            .or_else(|| node.child_by_field_name("name"));
        if let Some(local) = local.filter(|local| local.kind() == "identifier") {
            self.leaf(NodeKind::Binding, span_of(local), parent);
        }
    }

    fn export_specifier(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let span = span_of(node);
        if starts_with_type_keyword(node) {
            return self.leaf(NodeKind::TypeOnlySpecifier { export: true }, span, parent);
        }
        let reexport = node
            .parent()
            .and_then(|clause| clause.parent())
            .is_some_and(|statement| statement.child_by_field_name("source").is_some());
        if reexport {
            return;
        }
        if let Some(local) = node
            .child_by_field_name("name")
            .filter(|name| name.kind() == "identifier")
        {
            let local = span_of(local);
            self.reference(local, local, None, false, parent);
        }
    }

    /// `E.A` and `E["A"]` with a plain identifier object become one reference.
    fn member_access(&mut self, node: SyntaxNode<'tree>, parent: NodeId) {
        let object = node.child_by_field_name("object");
        let member = if node.kind() == "member_expression" {
            node.child_by_field_name("property")
                .filter(|p| p.kind() == "property_identifier")
        } else {
            node.child_by_field_name("index")
                .filter(|i| i.kind() == "string")
        };
        let optional = children(node)
            .iter()
            .any(|child| child.kind() == "optional_chain");

        match (object, member) {
            (Some(object), Some(member)) if object.kind() == "identifier" && !optional => {
                let accessed = node.parent().is_some_and(|p| {
                    matches!(p.kind(), "member_expression" | "subscript_expression")
                        && p.child_by_field_name("object") == Some(node)
                });
                self.reference(
                    span_of(node),
                    span_of(object),
                    Some(span_of(member)),
                    accessed,
                    parent,
                );
            }
            _ => self.push_children(node, parent, Mode::Value),
        }
    }

    fn reference(
        &mut self,
        span: Span,
        name: Span,
        member: Option<Span>,
        followed_by_access: bool,
        parent: NodeId,
    ) {
        self.leaf(
            NodeKind::Reference(Reference {
                name,
                member,
                followed_by_access,
            }),
            span,
            parent,
        );
    }

    fn enum_decl(
        &mut self,
        decl: SyntaxNode<'tree>,
        span: Span,
        parent: NodeId,
        exported: bool,
        declare: bool,
    ) {
        let (Some(name), Some(body)) = (
            decl.child_by_field_name("name"),
            decl.child_by_field_name("body"),
        ) else {
            let statement = self.add(NodeKind::Statement, span, Some(parent));
            return self.push_children(decl, statement, Mode::Value);
        };
        let is_const = children(decl)
            .iter()
            .any(|child| !child.is_named() && child.kind() == "const");

        let mut members = Vec::new();
        let mut inner = Vec::new();
        for child in children(body) {
            match child.kind() {
                "enum_assignment" => {
                    let Some(member_name) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let value = child.child_by_field_name("value");
                    members.push(EnumMember {
                        span: span_of(child),
                        name: span_of(member_name),
                        initializer: value.map(span_of),
                    });
                    inner.extend(
                        children(child)
                            .into_iter()
                            .filter(|c| Some(*c) == value || c.kind() == "comment"),
                    );
                }
                "comment" => inner.push(child),
                _ if child.is_named() => members.push(EnumMember {
                    span: span_of(child),
                    name: span_of(child),
                    initializer: None,
                }),
                _ => {}
            }
        }

        let id = self.add(
            NodeKind::Enum(Box::new(EnumDecl {
                name: span_of(name),
                is_const,
                is_declare: declare,
                is_exported: exported,
                body: span_of(body),
                members,
            })),
            span,
            Some(parent),
        );
        for child in inner.into_iter().rev() {
            self.push(child, id, Mode::Value);
        }
    }

    fn finish(mut self, root: NodeId) -> Tree<'src> {
        let len = self.source.len();
        for i in 0..self.nodes.len() {
            if let Some(parent) = self.nodes[i].parent {
                self.nodes[parent.index()].children.push(NodeId::new(i));
            }
        }
        let spans: Vec<Span> = self.nodes.iter().map(|n| n.span).collect();
        for node in &mut self.nodes {
            node.children.sort_by_key(|c| spans[c.index()]);
        }

        let top_level = std::mem::take(&mut self.nodes[root.index()].children);
        let mut filled = Vec::with_capacity(top_level.len() * 2 + 1);
        let mut cursor = 0usize;
        for child in top_level {
            let span = self.nodes[child.index()].span;
            if span.start > cursor {
                filled.push(self.add(NodeKind::Trivia, Span::new(cursor, span.start), Some(root)));
            }
            filled.push(child);
            cursor = cursor.max(span.end);
        }
        if cursor < len {
            filled.push(self.add(NodeKind::Trivia, Span::new(cursor, len), Some(root)));
        }
        self.nodes[root.index()].children = filled;

        Tree::from_parts(self.source, self.nodes, root)
    }
}

/// Map a statement-level node that erases, lowers or freezes as a whole.
fn statement_shape(node: SyntaxNode<'_>) -> Option<Shape<'_>> {
    let shape = match node.kind() {
        "interface_declaration" => Shape::Leaf(NodeKind::TypeDeclaration(DeclKind::Interface)),
        "type_alias_declaration" => Shape::Leaf(NodeKind::TypeDeclaration(DeclKind::TypeAlias)),
        "function_signature" => Shape::Leaf(NodeKind::Overload),
        "import_alias" => Shape::Leaf(NodeKind::Unsupported(UnsupportedKind::ImportEquals)),
        "ambient_declaration" => match first_named(node) {
            Some(inner) if inner.kind() == "enum_declaration" => Shape::Enum {
                decl: inner,
                exported: false,
                declare: true,
            },
            _ => Shape::Leaf(NodeKind::Ambient),
        },
        "enum_declaration" => Shape::Enum {
            decl: node,
            exported: false,
            declare: false,
        },
        "internal_module" | "module" => namespace_shape(node),
        "expression_statement" => {
            let inner = first_named(node)?;
            if !matches!(inner.kind(), "internal_module" | "module") {
                return None;
            }
            namespace_shape(inner)
        }
        "import_statement" => {
            let nodes = children(node);
            let second = nodes.iter().filter(|child| !child.is_extra()).nth(1);
            if second.is_some_and(|c| !c.is_named() && matches!(c.kind(), "type" | "typeof")) {
                Shape::Leaf(NodeKind::TypeOnlyImport)
            } else if nodes.iter().any(|c| c.kind() == "import_require_clause") {
                Shape::Leaf(NodeKind::Unsupported(UnsupportedKind::ImportEquals))
            } else {
                return None;
            }
        }
        "export_statement" => return export_shape(node),
        _ => return None,
    };
    Some(shape)
}

fn export_shape(node: SyntaxNode<'_>) -> Option<Shape<'_>> {
    let nodes = children(node);
    let second = nodes
        .iter()
        .filter(|child| !child.is_extra() && child.kind() != "decorator")
        .nth(1)?;
    if !second.is_named() {
        match second.kind() {
            "type" | "as" => return Some(Shape::Leaf(NodeKind::TypeOnlyExport)),
            "=" => {
                return Some(Shape::Leaf(NodeKind::Unsupported(
                    UnsupportedKind::ExportAssignment,
                )));
            }
            _ => {}
        }
    }

    let declaration = node.child_by_field_name("declaration")?;
    Some(match statement_shape(declaration)? {
        Shape::Leaf(NodeKind::TypeDeclaration(_)) => Shape::Leaf(NodeKind::TypeOnlyExport),
        Shape::Enum { decl, declare, .. } => Shape::Enum {
            decl,
            exported: true,
            declare,
        },
        other => other,
    })
}

fn namespace_shape(module: SyntaxNode<'_>) -> Shape<'_> {
    let type_only = module
        .child_by_field_name("body")
        .is_none_or(|body| children(body).into_iter().all(declares_only_types));
    if type_only {
        Shape::Leaf(NodeKind::TypeDeclaration(DeclKind::Namespace))
    } else {
        Shape::RuntimeNamespace(module)
    }
}

/// True for a namespace body entry that has no runtime effect.
fn declares_only_types(node: SyntaxNode<'_>) -> bool {
    if !node.is_named() || node.is_extra() || node.kind() == "empty_statement" {
        return true;
    }
    match statement_shape(node) {
        Some(Shape::Leaf(kind)) => matches!(
            kind,
            NodeKind::TypeDeclaration(_)
                | NodeKind::TypeOnlyExport
                | NodeKind::TypeOnlyImport
                | NodeKind::Ambient
                | NodeKind::Overload
        ),
        Some(Shape::Enum { declare, .. }) => declare,
        _ => false,
    }
}

/// A top-level child that cannot become a statement.
fn is_broken(node: SyntaxNode<'_>, in_error: bool) -> bool {
    if node.is_extra() {
        return false;
    }
    node.is_error()
        || node.is_missing()
        || node.has_error()
        || !node.is_named()
        || (in_error && !is_statement(node.kind()))
}

fn is_statement(kind: &str) -> bool {
    kind.ends_with("_statement")
        || kind.ends_with("_declaration")
        || matches!(
            kind,
            "module" | "internal_module" | "import_alias" | "function_signature"
        )
}

/// The first missing token or skipped text inside a broken statement.
fn first_problem(node: SyntaxNode<'_>) -> ParseError {
    let fallback = ParseError {
        offset: node.start_byte(),
        expected: "statement",
    };
    let mut cursor = node.walk();
    loop {
        let current = cursor.node();
        if current.is_missing() {
            return ParseError {
                offset: current.start_byte(),
                expected: current.kind(),
            };
        }
        if current.is_error() {
            return ParseError {
                offset: current.start_byte(),
                expected: "statement",
            };
        }
        if current.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return fallback;
            }
        }
    }
}

/// `type` or `typeof` in front of an import or export specifier.
fn starts_with_type_keyword(node: SyntaxNode<'_>) -> bool {
    children(node)
        .first()
        .is_some_and(|c| !c.is_named() && matches!(c.kind(), "type" | "typeof"))
}

fn children(node: SyntaxNode<'_>) -> Vec<SyntaxNode<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn first_named(node: SyntaxNode<'_>) -> Option<SyntaxNode<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .find(|child| !child.is_extra())
}

fn span_of(node: SyntaxNode<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

/// Classify a comment as an ordinary comment or a checker directive.
fn comment_kind(text: &str) -> NodeKind {
    let body = text.trim_start_matches(|c: char| c == '/' || c == '*' || c.is_whitespace());
    if body.starts_with("@ts-expect-error") {
        NodeKind::Directive(DirectiveKind::ExpectError)
    } else if body.starts_with("@ts-ignore") {
        NodeKind::Directive(DirectiveKind::Ignore)
    } else {
        NodeKind::Comment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interesting(source: &str) -> Vec<(&'static str, String)> {
        let parsed = parse(source).unwrap();
        assert!(
            parsed.diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            parsed.diagnostics
        );
        let tree = &parsed.tree;
        tree.walk()
            .map(|(id, _)| tree.node(id))
            .filter(|node| {
                !matches!(
                    node.kind,
                    NodeKind::Module
                        | NodeKind::Trivia
                        | NodeKind::Statement
                        | NodeKind::ClassMember
                        | NodeKind::Binding
                        | NodeKind::Reference(_)
                )
            })
            .map(|node| (node.kind.name(), tree.text(node.span).to_string()))
            .collect()
    }

    fn pairs(expected: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
        expected
            .iter()
            .map(|(kind, text)| (*kind, text.to_string()))
            .collect()
    }

    #[test]
    fn variable_annotation() {
        assert_eq!(
            interesting("let x: number = 1;"),
            pairs(&[("TypeAnnotation", ": number")])
        );
    }

    #[test]
    fn interface_declaration() {
        assert_eq!(
            interesting("interface A<T extends { a: 1 }> extends B<T> { b: string }\nconst c = 1;"),
            pairs(&[(
                "Interface",
                "interface A<T extends { a: 1 }> extends B<T> { b: string }"
            )])
        );
    }

    #[test]
    fn call_type_arguments_and_as() {
        assert_eq!(
            interesting("const y = f<string>(x) as T;"),
            pairs(&[("TypeArguments", "<string>"), ("AsExpression", "as T")])
        );
    }

    /// Relational operators are not mistaken for type arguments.
    #[test]
    fn comparison_is_not_type_arguments() {
        assert_eq!(interesting("const z = a < b && c > d;"), vec![]);
        assert_eq!(interesting("if (a < b) { c(d > e); }"), vec![]);
    }

    #[test]
    fn generic_arrow_function() {
        assert_eq!(
            interesting("const f = <T,>(a: T, b?: number): T => a;"),
            pairs(&[
                ("TypeParameters", "<T,>"),
                ("TypeAnnotation", ": T"),
                ("OptionalMarker", "?"),
                ("TypeAnnotation", ": number"),
                ("TypeAnnotation", ": T"),
            ])
        );
    }

    #[test]
    fn class_members() {
        let source = "abstract class A<T> extends B<T> implements C, D {\n  private x?: number;\n  abstract m(): void;\n  constructor(public y: string) { super(); }\n}";
        assert_eq!(
            interesting(source),
            pairs(&[
                ("Modifier", "abstract"),
                ("TypeParameters", "<T>"),
                ("TypeArguments", "<T>"),
                ("Implements", "implements C, D"),
                ("Modifier", "private"),
                ("OptionalMarker", "?"),
                ("TypeAnnotation", ": number"),
                ("AbstractMember", "abstract m(): void;"),
                ("Unsupported", "public y: string"),
                ("Modifier", "public"),
                ("TypeAnnotation", ": string"),
            ])
        );
    }

    #[test]
    fn index_signature_and_declare_field() {
        assert_eq!(
            interesting("class S {\n  [key: string]: unknown;\n  declare z: number;\n  w!: string;\n}"),
            pairs(&[
                ("IndexSignature", "[key: string]: unknown;"),
                ("Ambient", "declare z: number;"),
                ("DefiniteMarker", "!"),
                ("TypeAnnotation", ": string"),
            ])
        );
    }

    #[test]
    fn enum_payload() {
        let parsed = parse("export const enum E { A = 1, B }").unwrap();
        let tree = &parsed.tree;
        let (id, decl) = tree
            .iter()
            .find_map(|(id, node)| match &node.kind {
                NodeKind::Enum(decl) => Some((id, decl.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(tree.text(tree.node(id).span), "export const enum E { A = 1, B }");
        assert!(decl.is_const && decl.is_exported && !decl.is_declare);
        assert_eq!(tree.text(decl.name), "E");
        assert_eq!(tree.text(decl.body), "{ A = 1, B }");
        let names: Vec<_> = decl.members.iter().map(|m| tree.text(m.name)).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(decl.members[0].initializer.map(|s| tree.text(s)), Some("1"));
        assert_eq!(decl.members[1].initializer, None);
    }

    #[test]
    fn declared_enum_covers_declare_keyword() {
        let parsed = parse("declare enum D { X }\n").unwrap();
        let tree = &parsed.tree;
        let (id, decl) = tree
            .iter()
            .find_map(|(id, node)| match &node.kind {
                NodeKind::Enum(decl) => Some((id, decl.clone())),
                _ => None,
            })
            .unwrap();
        assert!(decl.is_declare && !decl.is_const);
        assert_eq!(tree.text(tree.node(id).span), "declare enum D { X }");
    }

    #[test]
    fn type_only_imports_and_exports() {
        let source = "import type { A } from './a';\nimport { b, type C } from './b';\nexport type { D };\nexport { b };";
        assert_eq!(
            interesting(source),
            pairs(&[
                ("TypeOnlyImport", "import type { A } from './a';"),
                ("TypeOnlySpecifier", "type C"),
                ("TypeOnlyExport", "export type { D };"),
            ])
        );
    }

    #[test]
    fn exported_type_declarations() {
        let source = "export interface I {}\nexport type T = 1;\nexport as namespace Lib;\n";
        assert_eq!(
            interesting(source),
            pairs(&[
                ("TypeOnlyExport", "export interface I {}"),
                ("TypeOnlyExport", "export type T = 1;"),
                ("TypeOnlyExport", "export as namespace Lib;"),
            ])
        );
    }

    #[test]
    fn comments_and_directives() {
        assert_eq!(
            interesting("// @ts-ignore\nlet a = 1; /* note */"),
            pairs(&[("Directive", "// @ts-ignore"), ("Comment", "/* note */")])
        );
        assert_eq!(
            interesting("/** @ts-expect-error */ f();"),
            pairs(&[("Directive", "/** @ts-expect-error */")])
        );
    }

    #[test]
    fn recovery_skips_one_statement() {
        let source = "const a: number = 1;\nconst = ;\nconst b: string = \"x\";";
        let parsed = parse(source).unwrap();
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::ParseError);
        let tree = &parsed.tree;
        let found: Vec<_> = tree
            .walk()
            .map(|(id, _)| tree.node(id))
            .filter(|n| matches!(n.kind, NodeKind::TypeAnnotation | NodeKind::Unparsed))
            .map(|n| (n.kind.name(), tree.text(n.span)))
            .collect();
        assert_eq!(found.len(), 3, "{found:?}");
        assert_eq!(found[0], ("TypeAnnotation", ": number"));
        assert_eq!(found[1].0, "Unparsed");
        assert!(found[1].1.starts_with("const ="), "{found:?}");
        assert_eq!(found[2], ("TypeAnnotation", ": string"));
    }

    #[test]
    fn nothing_parses_is_fatal() {
        assert!(matches!(
            parse("= = ="),
            Err(TransformError::Unparsable(_))
        ));
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        assert!(matches!(
            parse("let s = 'open;\nlet t = 1;\n"),
            Err(TransformError::Lex(_))
        ));
    }

    #[test]
    fn angle_cast_and_non_null() {
        assert_eq!(
            interesting("let v = <any>w!;"),
            pairs(&[("AngleCast", "<any>"), ("NonNull", "!")])
        );
    }

    #[test]
    fn overloads_and_ambient() {
        assert_eq!(
            interesting("function f(a: string): void;\nfunction f(a: any) {}\ndeclare const x: number;"),
            pairs(&[
                ("Overload", "function f(a: string): void;"),
                ("TypeAnnotation", ": any"),
                ("Ambient", "declare const x: number;"),
            ])
        );
    }

    #[test]
    fn namespaces() {
        assert_eq!(
            interesting("namespace T { export interface A {} }\nnamespace R { export const x = 1; }"),
            pairs(&[
                ("TypeNamespace", "namespace T { export interface A {} }"),
                ("Unsupported", "namespace R { export const x = 1; }"),
            ])
        );
    }

    #[test]
    fn import_equals_and_export_assignment() {
        assert_eq!(
            interesting("import fs = require('fs');\nexport = fs;\n"),
            pairs(&[
                ("Unsupported", "import fs = require('fs');"),
                ("Unsupported", "export = fs;"),
            ])
        );
    }

    /// Top-level children cover every byte of the input exactly once.
    #[test]
    fn top_level_tiles_source() {
        let source = "#!/usr/bin/env node\n// lead\nlet a: A;\n\n  type B = 1;  \n";
        let parsed = parse(source).unwrap();
        let tree = &parsed.tree;
        let mut cursor = 0;
        for &child in tree.children(tree.root()) {
            let span = tree.node(child).span;
            assert_eq!(span.start, cursor);
            cursor = span.end;
        }
        assert_eq!(cursor, source.len());
    }

    #[test]
    fn shift_and_comparison_operators() {
        assert_eq!(interesting("x >>= 2; y = a >> b >= c >>> 1;"), vec![]);
    }

    #[test]
    fn tagged_template_with_assertion() {
        assert_eq!(
            interesting("const t = tag`a${b as any}c`;"),
            pairs(&[("AsExpression", "as any")])
        );
    }

    #[test]
    fn complex_type_alias() {
        let source =
            "type M<T> = { [K in keyof T]?: T[K] } extends infer U extends object ? U : never;";
        assert_eq!(interesting(source), pairs(&[("TypeAlias", source)]));
    }

    #[test]
    fn satisfies_in_default_export() {
        assert_eq!(
            interesting("export default { a: 1 } satisfies Config;"),
            pairs(&[("SatisfiesExpression", "satisfies Config")])
        );
    }

    #[test]
    fn control_flow_without_types() {
        let source = "for (const k in obj) {}\nlabel: for (;;) { break label; }\ndo x++; while (x < 3)\nswitch (v) { case 1: break; default: f(); }\ntry { g(); } catch { }";
        assert_eq!(interesting(source), vec![]);
    }

    /// Keyword property names and regexes after a control-flow head parse without errors.
    #[test]
    fn slash_after_keyword_property_and_condition() {
        let source = "let x = a.default / 2;\nif (x) /'/.test(s);\nwhile (x) /a/g.exec(s);\n";
        assert_eq!(interesting(source), vec![]);
    }

    #[test]
    fn this_parameter_and_predicates() {
        assert_eq!(
            interesting("function isS(this: Window, v: unknown): v is string { return true; }"),
            pairs(&[
                ("ThisParameter", "this: Window"),
                ("TypeAnnotation", ": unknown"),
                ("TypeAnnotation", ": v is string"),
            ])
        );
    }

    #[test]
    fn bindings_from_declarations_and_patterns() {
        let parsed =
            parse("import d, { e as f } from 'm';\nconst { a, b: [c] } = o;\nfunction g(h) {}\n")
                .unwrap();
        let tree = &parsed.tree;
        let names: Vec<_> = tree
            .walk()
            .map(|(id, _)| tree.node(id))
            .filter(|node| node.kind == NodeKind::Binding)
            .map(|node| tree.text(node.span))
            .collect();
        assert_eq!(names, vec!["d", "f", "a", "c", "g", "h"]);
    }

    #[test]
    fn references_record_member_access() {
        let parsed = parse("use(Color.Red, Color[\"Green\"].x, Color);").unwrap();
        let tree = &parsed.tree;
        let refs: Vec<_> = tree
            .walk()
            .filter_map(|(id, _)| match tree.node(id).kind {
                NodeKind::Reference(r) if tree.text(r.name) == "Color" => Some((
                    tree.text(tree.node(id).span),
                    r.member.map(|m| tree.text(m)),
                    r.followed_by_access,
                )),
                _ => None,
            })
            .collect();
        assert_eq!(
            refs,
            vec![
                ("Color.Red", Some("Red"), false),
                ("Color[\"Green\"]", Some("\"Green\""), true),
                ("Color", None, false),
            ]
        );
    }
}
