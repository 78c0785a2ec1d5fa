//! Token view of TypeScript source text.
//!
//! Tokens are read off the leaves of the tree-sitter syntax tree, so every context-sensitive
//! choice is the grammar's: whether `/` starts a regular expression or divides, whether `}`
//! closes a block or resumes a template, whether `>>` is one operator. The stream is lossless:
//! concatenating the text of every token reproduces the input exactly, with whitespace, line
//! breaks and comments as tokens of their own.
//!
//! Literals, comments and regular expressions are single tokens. Template literals are split at
//! each `${` and the `}` that closes it.
//!
//! The grammar recovers from an unterminated literal or comment by guessing where it ends.
//! Both [`tokenize`] and the parser refuse to guess and report a [`LexError`] instead.

use std::fmt;

use tree_sitter::Node as SyntaxNode;

use crate::{TransformError, parse::syntax_tree, span::Span};

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Horizontal whitespace run.
    Whitespace,
    /// A single line break (`\n`, `\r\n`, `\r`, U+2028 or U+2029).
    Newline,
    LineComment,
    BlockComment,
    /// `#!...` on the first line.
    Hashbang,
    Ident,
    /// ECMAScript reserved word.
    ///
    /// Contextual words such as `type` or `async` are [`TokenKind::Ident`].
    Keyword,
    /// `#name`
    PrivateName,
    Punct,
    Number,
    String,
    Regex,
    /// `` `text` `` without substitutions.
    NoSubstitutionTemplate,
    /// `` `text${ ``
    TemplateHead,
    /// `}text${`
    TemplateMiddle,
    /// `` }text` ``
    TemplateTail,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace
                | TokenKind::Newline
                | TokenKind::LineComment
                | TokenKind::BlockComment
                | TokenKind::Hashbang
        )
    }

    pub fn is_comment(self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

/// A single token, borrowing its text from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub span: Span,
    pub text: &'src str,
}

impl Token<'_> {
    /// True for a punctuator, keyword or identifier whose text is exactly `text`.
    pub fn is(&self, text: &str) -> bool {
        matches!(
            self.kind,
            TokenKind::Punct | TokenKind::Keyword | TokenKind::Ident
        ) && self.text == text
    }
}

/// What kind of literal was left open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unterminated {
    String,
    Template,
    BlockComment,
    Regex,
}

impl fmt::Display for Unterminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unterminated::String => "string literal",
            Unterminated::Template => "template literal",
            Unterminated::BlockComment => "block comment",
            Unterminated::Regex => "regular expression",
        })
    }
}

/// Fatal tokenization error.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unterminated {kind} starting at byte {offset}")]
pub struct LexError {
    pub kind: Unterminated,
    pub offset: usize,
}

/// Reserved words that never act as plain identifiers in module code.
const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "enum",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "new",
    "null",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
];

/// Grammar nodes emitted as one token even though they have children.
const ATOMIC: &[&str] = &[
    "string",
    "regex",
    "number",
    "comment",
    "html_comment",
    "hash_bang_line",
];

/// Tokenize the whole input, trivia included.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, TransformError> {
    let syntax = syntax_tree(source)?;
    let root = syntax.root_node();
    check_literals(root, source)?;

    let mut tokens = Vec::new();
    let mut cursor = 0;
    for (kind, span) in leaves(root, source) {
        // Recovered trees can yield overlapping pieces; the gap filler covers what is skipped.
        if span.is_empty() || span.start < cursor {
            continue;
        }
        push_gap(source, Span::new(cursor, span.start), &mut tokens);
        tokens.push(Token {
            kind,
            span,
            text: span.text(source),
        });
        cursor = span.end;
    }
    push_gap(source, Span::new(cursor, source.len()), &mut tokens);
    Ok(tokens)
}

/// Reject literals and comments the grammar had to close on its own.
///
/// Reports the first problem in document order. Only subtrees containing an error are searched.
pub(crate) fn check_literals(root: SyntaxNode<'_>, source: &str) -> Result<(), LexError> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(kind) = unterminated(node, source) {
            return Err(LexError {
                kind,
                offset: node.start_byte(),
            });
        }
        if !node.has_error() || matches!(node.kind(), "string" | "regex" | "comment") {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    Ok(())
}

fn unterminated(node: SyntaxNode<'_>, source: &str) -> Option<Unterminated> {
    let text = &source[node.byte_range()];
    let open = match node.kind() {
        "string" => {
            let quote = text.chars().next()?;
            text.len() < 2 || !text.ends_with(quote) || has_missing_child(node)
        }
        "template_string" => text.len() < 2 || !text.ends_with('`') || has_missing_child(node),
        "template_substitution" | "regex" => has_missing_child(node),
        "comment" => text.starts_with("/*") && (text.len() < 4 || !text.ends_with("*/")),
        "'" | "\"" if !node.is_missing() => node.parent().is_none_or(|p| p.kind() != "string"),
        "`" if !node.is_missing() => {
            node.parent().is_none_or(|p| p.kind() != "template_string")
        }
        // A closed `/*` always lexes as a comment.
        "/" | "/=" => source[node.start_byte()..].starts_with("/*"),
        _ if node.is_error() && node.child_count() == 0 => return opener(text),
        _ => false,
    };
    if !open {
        return None;
    }
    Some(match node.kind() {
        "string" | "'" | "\"" => Unterminated::String,
        "template_string" | "template_substitution" | "`" => Unterminated::Template,
        "regex" => Unterminated::Regex,
        _ => Unterminated::BlockComment,
    })
}

/// The literal a skipped run of text opens, if any.
fn opener(text: &str) -> Option<Unterminated> {
    if text.starts_with(['\'', '"']) {
        Some(Unterminated::String)
    } else if text.starts_with('`') {
        Some(Unterminated::Template)
    } else if text.starts_with("/*") {
        Some(Unterminated::BlockComment)
    } else {
        None
    }
}

fn has_missing_child(node: SyntaxNode<'_>) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|child| child.is_missing())
}

enum Pending<'tree> {
    Node(SyntaxNode<'tree>),
    Piece(TokenKind, Span),
}

/// Significant tokens and comments in document order.
fn leaves(root: SyntaxNode<'_>, source: &str) -> Vec<(TokenKind, Span)> {
    let mut out = Vec::new();
    let mut stack = vec![Pending::Node(root)];
    while let Some(item) = stack.pop() {
        let node = match item {
            Pending::Piece(kind, span) => {
                out.push((kind, span));
                continue;
            }
            Pending::Node(node) => node,
        };
        if node.is_missing() || node.start_byte() == node.end_byte() {
            continue;
        }
        let span = Span::new(node.start_byte(), node.end_byte());
        if node.kind() == "template_string" {
            stack.extend(template_pieces(node).into_iter().rev());
        } else if node.child_count() == 0 || ATOMIC.contains(&node.kind()) {
            out.push((leaf_kind(node, span.text(source)), span));
        } else {
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev().map(Pending::Node));
        }
    }
    out
}

/// Split a template at its substitutions. `${` ends the piece before a substitution and `}`
/// starts the piece after it.
fn template_pieces(template: SyntaxNode<'_>) -> Vec<Pending<'_>> {
    let mut cursor = template.walk();
    let substitutions: Vec<_> = template
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "template_substitution")
        .collect();
    let (start, end) = (template.start_byte(), template.end_byte());
    if substitutions.is_empty() {
        return vec![Pending::Piece(
            TokenKind::NoSubstitutionTemplate,
            Span::new(start, end),
        )];
    }

    let mut pieces = Vec::new();
    let mut piece_start = start;
    for (i, substitution) in substitutions.iter().enumerate() {
        let kind = if i == 0 {
            TokenKind::TemplateHead
        } else {
            TokenKind::TemplateMiddle
        };
        pieces.push(Pending::Piece(
            kind,
            Span::new(piece_start, substitution.start_byte() + 2),
        ));
        let mut inner = substitution.walk();
        let expressions: Vec<_> = substitution.named_children(&mut inner).collect();
        pieces.extend(expressions.into_iter().map(Pending::Node));
        piece_start = substitution.end_byte().saturating_sub(1);
    }
    pieces.push(Pending::Piece(
        TokenKind::TemplateTail,
        Span::new(piece_start, end),
    ));
    pieces
}

fn leaf_kind(node: SyntaxNode<'_>, text: &str) -> TokenKind {
    match node.kind() {
        "comment" | "html_comment" if text.starts_with("/*") => TokenKind::BlockComment,
        "comment" | "html_comment" => TokenKind::LineComment,
        "hash_bang_line" => TokenKind::Hashbang,
        "string" => TokenKind::String,
        "regex" => TokenKind::Regex,
        "number" => TokenKind::Number,
        "private_property_identifier" => TokenKind::PrivateName,
        _ => word_kind(text),
    }
}

fn word_kind(text: &str) -> TokenKind {
    match text.chars().next() {
        Some(c) if c.is_ascii_digit() => TokenKind::Number,
        Some(c) if c == '$' || c == '_' || c == '\\' || c.is_alphabetic() => {
            if KEYWORDS.contains(&text) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            }
        }
        Some('#') if text.len() > 1 => TokenKind::PrivateName,
        _ => TokenKind::Punct,
    }
}

/// Split the text between two significant tokens into whitespace and line breaks.
fn push_gap<'src>(source: &'src str, gap: Span, tokens: &mut Vec<Token<'src>>) {
    let mut pos = gap.start;
    while pos < gap.end {
        let rest = &source[pos..gap.end];
        let Some(c) = rest.chars().next() else {
            break;
        };
        let (kind, len) = if rest.starts_with("\r\n") {
            (TokenKind::Newline, 2)
        } else if is_line_terminator(c) {
            (TokenKind::Newline, c.len_utf8())
        } else if is_blank(c) {
            let len = rest.find(|c: char| !is_blank(c)).unwrap_or(rest.len());
            (TokenKind::Whitespace, len)
        } else {
            (TokenKind::Punct, c.len_utf8())
        };
        let span = Span::new(pos, pos + len);
        tokens.push(Token {
            kind,
            span,
            text: span.text(source),
        });
        pos += len;
    }
}

pub(crate) fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_blank(c: char) -> bool {
    !is_line_terminator(c)
        && (c.is_whitespace() || matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{2060}'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn significant(source: &str) -> Vec<(TokenKind, &str)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn lex_error(source: &str) -> LexError {
        match tokenize(source) {
            Err(TransformError::Lex(err)) => err,
            other => panic!("expected a lex error, got {other:?}"),
        }
    }

    /// Token texts concatenate back to the input.
    #[test]
    fn lossless() {
        let source = "#!/usr/bin/env node\nconst a = `x${b}y${`n${c}`}z`; // hi\r\n/* c */ let r = /[/]+/g;";
        let tokens = tokenize(source).unwrap();
        let joined: String = tokens.iter().map(|t| t.text).collect();
        assert_eq!(joined, source);
        assert_eq!(tokens[0].kind, TokenKind::Hashbang);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Newline && t.text == "\r\n"));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Regex && t.text == "/[/]+/g"));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::BlockComment && t.text == "/* c */"));
    }

    #[test]
    fn keywords_and_contextual_words() {
        assert_eq!(
            significant("const type = async"),
            vec![
                (TokenKind::Keyword, "const"),
                (TokenKind::Ident, "type"),
                (TokenKind::Punct, "="),
                (TokenKind::Ident, "async"),
            ]
        );
    }

    #[test]
    fn shift_operators_are_single_tokens() {
        let tokens = significant("a >>= b >> c >>> d;");
        let texts: Vec<_> = tokens.iter().map(|(_, t)| *t).collect();
        assert_eq!(texts, vec!["a", ">>=", "b", ">>", "c", ">>>", "d", ";"]);
    }

    /// A keyword used as a property name still ends an expression.
    #[test]
    fn division_after_keyword_property() {
        for source in [
            "let x = a.default / 2;\n",
            "let w = a.new/2;\n",
            "let y = t.delete / n / m;\n",
        ] {
            let tokens = significant(source);
            assert!(
                tokens.iter().all(|(kind, _)| *kind != TokenKind::Regex),
                "{source}: {tokens:?}"
            );
            assert!(tokens.contains(&(TokenKind::Punct, "/")), "{source}");
        }
    }

    /// The `)` of a control-flow head is followed by a statement, so `/` starts a regex there.
    #[test]
    fn regex_after_control_flow_head() {
        let tokens = significant("let a = 1;\nif (x) /'/.test(s);\n");
        assert!(tokens.contains(&(TokenKind::Regex, "/'/")), "{tokens:?}");
        let tokens = significant("while (x) /a/g.exec(s);");
        assert!(tokens.contains(&(TokenKind::Regex, "/a/g")), "{tokens:?}");
        let tokens = significant("const q = (a) / 2;");
        assert!(tokens.contains(&(TokenKind::Punct, "/")), "{tokens:?}");
    }

    #[test]
    fn template_parts() {
        assert_eq!(
            significant("`a${b + `c${d}`}e`"),
            vec![
                (TokenKind::TemplateHead, "`a${"),
                (TokenKind::Ident, "b"),
                (TokenKind::Punct, "+"),
                (TokenKind::TemplateHead, "`c${"),
                (TokenKind::Ident, "d"),
                (TokenKind::TemplateTail, "}`"),
                (TokenKind::TemplateTail, "}e`"),
            ]
        );
        assert_eq!(
            significant("`x${a}y${b}z`"),
            vec![
                (TokenKind::TemplateHead, "`x${"),
                (TokenKind::Ident, "a"),
                (TokenKind::TemplateMiddle, "}y${"),
                (TokenKind::Ident, "b"),
                (TokenKind::TemplateTail, "}z`"),
            ]
        );
        assert_eq!(
            significant("`plain`"),
            vec![(TokenKind::NoSubstitutionTemplate, "`plain`")]
        );
    }

    #[test]
    fn numbers_and_private_names() {
        let tokens = significant("[0x1F, 1_000, 1.5e-3, .5, 10n];");
        let numbers: Vec<_> = tokens
            .iter()
            .filter(|(kind, _)| *kind == TokenKind::Number)
            .map(|(_, text)| *text)
            .collect();
        assert_eq!(numbers, vec!["0x1F", "1_000", "1.5e-3", ".5", "10n"]);

        let tokens = significant("class A { #x = 1; m() { return this.#x; } }");
        let private = tokens
            .iter()
            .filter(|token| **token == (TokenKind::PrivateName, "#x"))
            .count();
        assert_eq!(private, 2);
    }

    #[test]
    fn unterminated_literals() {
        assert_eq!(
            lex_error("const s = \"abc;\n"),
            LexError {
                kind: Unterminated::String,
                offset: 10
            }
        );
        assert_eq!(
            lex_error("a /* b"),
            LexError {
                kind: Unterminated::BlockComment,
                offset: 2
            }
        );
        assert_eq!(lex_error("let t = `abc").kind, Unterminated::Template);
        assert_eq!(
            lex_error("const s = \"abc;\n").to_string(),
            "unterminated string literal starting at byte 10"
        );
    }
}
