//! Span-based syntax tree.
//!
//! The tree is deliberately shallow: it only records nodes the classifier has an opinion about
//! (type syntax, declarations, comments, enum references) plus enough runtime structure to keep
//! every node's ancestry meaningful. Nodes live in an arena and refer to each other through
//! [`NodeId`]s.
//!
//! Invariants established by the parser:
//!
//! - Every node's span lies within its parent's span.
//! - Children are ordered by start offset and never overlap.
//! - Top-level children tile the whole input (gaps are filled with [`NodeKind::Trivia`]).

use crate::span::Span;

/// Index into [`Tree`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Interface,
    TypeAlias,
    /// Namespace whose body declares only types.
    Namespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    As,
    Satisfies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// `@ts-ignore`
    Ignore,
    /// `@ts-expect-error`
    ExpectError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedKind {
    /// `namespace X { ... }` / `module X { ... }` with runtime content.
    Namespace,
    /// Constructor parameter with an accessibility or `readonly` modifier.
    ParameterProperty,
    /// `import x = require("y")`, `import x = A.B`
    ImportEquals,
    /// `export = value`
    ExportAssignment,
}

impl UnsupportedKind {
    pub fn describe(self) -> &'static str {
        match self {
            UnsupportedKind::Namespace => "namespace declarations",
            UnsupportedKind::ParameterProperty => "parameter properties",
            UnsupportedKind::ImportEquals => "`import =` declarations",
            UnsupportedKind::ExportAssignment => "`export =` assignments",
        }
    }
}

/// One `name [= initializer]` entry of an enum body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub span: Span,
    pub name: Span,
    pub initializer: Option<Span>,
}

/// Payload of an enum declaration node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: Span,
    pub is_const: bool,
    pub is_declare: bool,
    pub is_exported: bool,
    /// `{ ... }` including both braces.
    pub body: Span,
    pub members: Vec<EnumMember>,
}

/// An identifier used as a value, with an optional constant member access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub name: Span,
    /// `.Member` name or `["Member"]` string literal.
    pub member: Option<Span>,
    /// The member access is itself followed by `.`, `?.` or `[`.
    pub followed_by_access: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Module,
    /// Whitespace (or a hashbang) between top-level items.
    Trivia,
    /// Runtime statement. Kept as-is; strippable parts are children.
    Statement,
    /// Runtime class member.
    ClassMember,
    /// Top-level statement that failed to parse and was skipped.
    Unparsed,
    Comment,
    Directive(DirectiveKind),
    /// `: T` on a binding, parameter, property or return position.
    TypeAnnotation,
    /// `?` after a parameter or property name.
    OptionalMarker,
    /// `!` after a declared name.
    DefiniteMarker,
    TypeDeclaration(DeclKind),
    Enum(Box<EnumDecl>),
    /// `import type ...`
    TypeOnlyImport,
    /// `export type ...`, `export interface ...`, `export as namespace X`
    TypeOnlyExport,
    /// `type X` inside an import or export clause.
    TypeOnlySpecifier { export: bool },
    TypeParameters,
    TypeArguments,
    /// `x as T`, `x satisfies T`; the node covers the keyword and the type.
    Assertion(AssertionKind),
    /// `<T>x`; the node covers `<T>`.
    AngleCast,
    /// Postfix `!`.
    NonNull,
    /// `public`, `private`, `protected`, `readonly`, `override` or the `abstract` of a class.
    Modifier,
    /// `declare ...` statement or class member.
    Ambient,
    /// Function or method signature without a body.
    Overload,
    AbstractMember,
    IndexSignature,
    /// `implements A, B`
    Implements,
    /// `this: T` parameter.
    ThisParameter,
    Unsupported(UnsupportedKind),
    Reference(Reference),
    /// A name introduced in value space.
    Binding,
}

impl NodeKind {
    /// Short name used by debug dumps.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Module => "Module",
            NodeKind::Trivia => "Trivia",
            NodeKind::Statement => "Statement",
            NodeKind::ClassMember => "ClassMember",
            NodeKind::Unparsed => "Unparsed",
            NodeKind::Comment => "Comment",
            NodeKind::Directive(_) => "Directive",
            NodeKind::TypeAnnotation => "TypeAnnotation",
            NodeKind::OptionalMarker => "OptionalMarker",
            NodeKind::DefiniteMarker => "DefiniteMarker",
            NodeKind::TypeDeclaration(DeclKind::Interface) => "Interface",
            NodeKind::TypeDeclaration(DeclKind::TypeAlias) => "TypeAlias",
            NodeKind::TypeDeclaration(DeclKind::Namespace) => "TypeNamespace",
            NodeKind::Enum(_) => "Enum",
            NodeKind::TypeOnlyImport => "TypeOnlyImport",
            NodeKind::TypeOnlyExport => "TypeOnlyExport",
            NodeKind::TypeOnlySpecifier { .. } => "TypeOnlySpecifier",
            NodeKind::TypeParameters => "TypeParameters",
            NodeKind::TypeArguments => "TypeArguments",
            NodeKind::Assertion(AssertionKind::As) => "AsExpression",
            NodeKind::Assertion(AssertionKind::Satisfies) => "SatisfiesExpression",
            NodeKind::AngleCast => "AngleCast",
            NodeKind::NonNull => "NonNull",
            NodeKind::Modifier => "Modifier",
            NodeKind::Ambient => "Ambient",
            NodeKind::Overload => "Overload",
            NodeKind::AbstractMember => "AbstractMember",
            NodeKind::IndexSignature => "IndexSignature",
            NodeKind::Implements => "Implements",
            NodeKind::ThisParameter => "ThisParameter",
            NodeKind::Unsupported(_) => "Unsupported",
            NodeKind::Reference(_) => "Reference",
            NodeKind::Binding => "Binding",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Parsed syntax tree borrowing the source it was built from.
#[derive(Debug, Clone)]
pub struct Tree<'src> {
    source: &'src str,
    nodes: Vec<Node>,
    root: NodeId,
}

impl<'src> Tree<'src> {
    pub(crate) fn from_parts(source: &'src str, nodes: Vec<Node>, root: NodeId) -> Self {
        Self {
            source,
            nodes,
            root,
        }
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn text(&self, span: Span) -> &'src str {
        span.text(self.source)
    }

    /// All nodes with their ids, in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::new(i), node))
    }

    /// Parent chain of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(id).parent, |&p| self.node(p).parent)
    }

    /// Every node below `id`, pre-order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.children(next).iter().rev());
            Some(next)
        })
    }

    /// Depth-first pre-order walk starting at the root.
    pub fn walk(&self) -> impl Iterator<Item = (NodeId, usize)> + '_ {
        let mut stack = vec![(self.root, 0usize)];
        std::iter::from_fn(move || {
            let (id, depth) = stack.pop()?;
            for &child in self.children(id).iter().rev() {
                stack.push((child, depth + 1));
            }
            Some((id, depth))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree<'static> {
        let source = "let a; b";
        let nodes = vec![
            Node {
                kind: NodeKind::Module,
                span: Span::new(0, 8),
                parent: None,
                children: vec![NodeId::new(1), NodeId::new(3)],
            },
            Node {
                kind: NodeKind::Statement,
                span: Span::new(0, 6),
                parent: Some(NodeId::new(0)),
                children: vec![NodeId::new(2)],
            },
            Node {
                kind: NodeKind::Binding,
                span: Span::new(4, 5),
                parent: Some(NodeId::new(1)),
                children: vec![],
            },
            Node {
                kind: NodeKind::Statement,
                span: Span::new(7, 8),
                parent: Some(NodeId::new(0)),
                children: vec![],
            },
        ];
        Tree::from_parts(source, nodes, NodeId::new(0))
    }

    #[test]
    fn walk_is_preorder_with_depth() {
        let tree = sample();
        let order: Vec<_> = tree.walk().map(|(id, depth)| (id.index(), depth)).collect();
        assert_eq!(order, vec![(0, 0), (1, 1), (2, 2), (3, 1)]);
    }

    #[test]
    fn ancestors_nearest_first() {
        let tree = sample();
        let chain: Vec<_> = tree.ancestors(NodeId::new(2)).map(NodeId::index).collect();
        assert_eq!(chain, vec![1, 0]);
        assert_eq!(tree.text(tree.node(NodeId::new(2)).span), "a");
    }
}
