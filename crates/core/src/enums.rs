//! Enum evaluation, lowering and const enum inlining.
//!
//! Every enum member is evaluated with a small constant folder over its initializer tokens.
//! Regular enums are lowered to the usual `var E; (function (E) { ... })(E || (E = {}));`
//! pattern; const enums are inlined at their use sites when that is provably safe and lowered
//! the same way otherwise.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::{
    ast::{EnumDecl, NodeId, NodeKind, Tree},
    classify::{Decision, Rule, Verdict},
    diagnostics::{Diagnostic, DiagnosticKind},
    lexer::{Token, TokenKind, tokenize},
    span::Span,
    strip::StripConfig,
};

/// A compile-time enum member value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConstValue {
    Number(f64),
    String(String),
}

impl ConstValue {
    /// JavaScript literal for this value.
    pub(crate) fn literal(&self) -> String {
        match self {
            ConstValue::Number(n) if *n < 0.0 => format!("-{}", js_number(-n)),
            ConstValue::Number(n) => js_number(*n),
            ConstValue::String(s) => quote(s),
        }
    }

    /// Literal safe to splice into any expression position.
    fn inline_literal(&self) -> String {
        match self {
            ConstValue::Number(n) if *n < 0.0 => format!("({})", self.literal()),
            _ => self.literal(),
        }
    }

    fn to_js_string(&self) -> String {
        match self {
            ConstValue::Number(n) if *n < 0.0 => format!("-{}", js_number(-n)),
            ConstValue::Number(n) => js_number(*n),
            ConstValue::String(s) => s.clone(),
        }
    }
}

/// How one member's runtime value is produced.
#[derive(Debug, Clone, PartialEq)]
enum MemberValue {
    Constant(ConstValue),
    /// Non-constant initializer, emitted as written.
    Computed(Span),
    /// No initializer after a computed member: previous member plus one.
    FollowsComputed(String),
}

#[derive(Debug, Clone)]
struct EvaluatedMember {
    name: String,
    value: MemberValue,
}

type KnownEnums = HashMap<String, Vec<(String, ConstValue)>>;

/// Decide every enum declaration and every const enum reference in `tree`.
pub(crate) fn resolve(
    tree: &Tree<'_>,
    config: &StripConfig,
    decisions: &mut [Decision],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let declarations: Vec<(NodeId, &EnumDecl)> = tree
        .iter()
        .filter_map(|(id, node)| match &node.kind {
            NodeKind::Enum(decl) => Some((id, decl.as_ref())),
            _ => None,
        })
        .collect();
    if declarations.is_empty() {
        return;
    }

    let mut declaration_count: HashMap<&str, usize> = HashMap::new();
    for (_, decl) in &declarations {
        *declaration_count.entry(tree.text(decl.name)).or_default() += 1;
    }

    let mut known = KnownEnums::new();
    let mut evaluated = Vec::with_capacity(declarations.len());
    for &(id, decl) in &declarations {
        let name = tree.text(decl.name);
        let members = evaluate(tree, decl, &known, diagnostics);
        let constants = known.entry(name.to_string()).or_default();
        for member in &members {
            if let MemberValue::Constant(value) = &member.value {
                constants.push((member.name.clone(), value.clone()));
            }
        }
        evaluated.push((id, decl, members));
    }

    let bindings: HashSet<&str> = tree
        .iter()
        .filter(|(_, node)| node.kind == NodeKind::Binding)
        .map(|(_, node)| tree.text(node.span))
        .collect();

    for (id, decl, members) in evaluated {
        let name = tree.text(decl.name);
        let decision = if decl.is_const && !config.preserve_const_enums {
            match inline_blocker(tree, id, decl, &members, &bindings, &declaration_count) {
                None => {
                    inline_references(tree, id, name, &members, decisions);
                    Decision::erase(Rule::ConstEnumInlined)
                }
                Some(_) if decl.is_declare => Decision::erase(Rule::Ambient),
                Some(reason) => {
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::UnresolvableConstEnumInline,
                        decl.name,
                        format!("const enum `{name}` is emitted as a regular enum: {reason}"),
                    ));
                    Decision::rewrite(
                        lower(tree, id, decl, &members, decisions),
                        Rule::ConstEnumFallback,
                    )
                }
            }
        } else if decl.is_declare {
            Decision::erase(Rule::Ambient)
        } else if decl.is_const {
            Decision::rewrite(
                lower(tree, id, decl, &members, decisions),
                Rule::PreserveConstEnums,
            )
        } else {
            Decision::rewrite(
                lower(tree, id, decl, &members, decisions),
                Rule::EnumLowering,
            )
        };
        tracing::trace!(name, rule = ?decision.rule, "enum");
        decisions[id.index()] = decision;
    }
}

fn evaluate(
    tree: &Tree<'_>,
    decl: &EnumDecl,
    known: &KnownEnums,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<EvaluatedMember> {
    let enum_name = tree.text(decl.name);
    let mut members: Vec<EvaluatedMember> = Vec::with_capacity(decl.members.len());

    for member in &decl.members {
        let name = member_name(tree.text(member.name));
        let value = match member.initializer {
            Some(init) => {
                let scope: Vec<(String, ConstValue)> = members
                    .iter()
                    .filter_map(|m| match &m.value {
                        MemberValue::Constant(v) => Some((m.name.clone(), v.clone())),
                        _ => None,
                    })
                    .collect();
                match fold(tree.text(init), enum_name, &scope, known) {
                    Some(value) => MemberValue::Constant(value),
                    None => MemberValue::Computed(init),
                }
            }
            None => match members.last().map(|m| &m.value) {
                None => MemberValue::Constant(ConstValue::Number(0.0)),
                Some(MemberValue::Constant(ConstValue::Number(n))) => {
                    MemberValue::Constant(ConstValue::Number(n + 1.0))
                }
                Some(_) => {
                    let prev = members.last().map(|m| m.name.clone()).unwrap_or_default();
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::EnumInitializer,
                        member.span,
                        format!(
                            "enum member `{name}` needs an initializer; continuing from `{prev}` at runtime"
                        ),
                    ));
                    MemberValue::FollowsComputed(prev)
                }
            },
        };
        members.push(EvaluatedMember { name, value });
    }
    members
}

/// Why a const enum cannot be inlined, if anything.
fn inline_blocker(
    tree: &Tree<'_>,
    id: NodeId,
    decl: &EnumDecl,
    members: &[EvaluatedMember],
    bindings: &HashSet<&str>,
    declaration_count: &HashMap<&str, usize>,
) -> Option<String> {
    let name = tree.text(decl.name);
    if decl.is_exported {
        return Some("it is exported".to_string());
    }
    if let Some(member) = members
        .iter()
        .find(|m| !matches!(m.value, MemberValue::Constant(_)))
    {
        return Some(format!("member `{}` is not a constant expression", member.name));
    }
    if declaration_count.get(name).copied().unwrap_or(0) > 1 {
        return Some("it is declared more than once".to_string());
    }
    if bindings.contains(name) {
        return Some(format!("`{name}` is also bound as a value in this file"));
    }
    for (ref_id, reference) in references_to(tree, name) {
        if tree.ancestors(ref_id).any(|a| a == id) {
            continue;
        }
        match reference.member {
            None => return Some("it is referenced without a member access".to_string()),
            Some(member) => {
                let member = member_name(tree.text(member));
                if !members.iter().any(|m| m.name == member) {
                    return Some(format!("it has no member `{member}`"));
                }
            }
        }
    }
    None
}

fn references_to<'t>(
    tree: &'t Tree<'_>,
    name: &'t str,
) -> impl Iterator<Item = (NodeId, crate::ast::Reference)> + 't {
    tree.iter().filter_map(move |(id, node)| match node.kind {
        NodeKind::Reference(reference) if tree.text(reference.name) == name => {
            Some((id, reference))
        }
        _ => None,
    })
}

fn inline_references(
    tree: &Tree<'_>,
    id: NodeId,
    name: &str,
    members: &[EvaluatedMember],
    decisions: &mut [Decision],
) {
    for (ref_id, reference) in references_to(tree, name) {
        if tree.ancestors(ref_id).any(|a| a == id) {
            continue;
        }
        let Some(member) = reference.member else {
            continue;
        };
        let member = member_name(tree.text(member));
        let value = members.iter().find_map(|m| match &m.value {
            MemberValue::Constant(v) if m.name == member => Some(v),
            _ => None,
        });
        if let Some(value) = value {
            let mut text = value.inline_literal();
            if reference.followed_by_access && !text.starts_with('(') {
                text = format!("({text})");
            }
            decisions[ref_id.index()] = Decision::rewrite(text, Rule::ConstEnumInlined);
        }
    }
}

/// Build the runtime replacement for an enum declaration.
///
/// The head and tail stay on the declaration's first and last lines, and the source between
/// members is reused (minus separating commas and erased comments), so line structure is kept.
fn lower(
    tree: &Tree<'_>,
    id: NodeId,
    decl: &EnumDecl,
    members: &[EvaluatedMember],
    decisions: &[Decision],
) -> String {
    let source = tree.source();
    let name = tree.text(decl.name);
    let comments: Vec<(Span, bool)> = tree
        .children(id)
        .iter()
        .filter(|&&c| matches!(tree.node(c).kind, NodeKind::Comment | NodeKind::Directive(_)))
        .map(|&c| (tree.node(c).span, decisions[c.index()].verdict == Verdict::Keep))
        .collect();

    let mut out = String::new();
    if decl.is_exported {
        out.push_str("export ");
    }
    let _ = write!(out, "var {name}; (function ({name}) {{");

    let mut cursor = decl.body.start + 1;
    for (member, evaluated) in decl.members.iter().zip(members) {
        push_gap(&mut out, source, Span::new(cursor, member.span.start), &comments);
        let key = quote(&evaluated.name);
        match &evaluated.value {
            MemberValue::Constant(value @ ConstValue::String(_)) => {
                let _ = write!(out, "{name}[{key}] = {};", value.literal());
            }
            MemberValue::Constant(value) => {
                let _ = write!(out, "{name}[{name}[{key}] = {}] = {key};", value.literal());
            }
            MemberValue::Computed(init) => {
                let init = initializer_text(tree, id, *init);
                let _ = write!(out, "{name}[{name}[{key}] = {init}] = {key};");
            }
            MemberValue::FollowsComputed(prev) => {
                let _ = write!(
                    out,
                    "{name}[{name}[{key}] = {name}[{}] + 1] = {key};",
                    quote(prev)
                );
            }
        }
        cursor = member.span.end;
    }
    push_gap(&mut out, source, Span::new(cursor, decl.body.end - 1), &comments);
    let _ = write!(out, "}})({name} || ({name} = {{}}));");
    out
}

/// Copy inter-member source, dropping commas and comments that are not kept.
fn push_gap(out: &mut String, source: &str, gap: Span, comments: &[(Span, bool)]) {
    let mut cursor = gap.start;
    let push_plain = |out: &mut String, text: &str| {
        out.extend(text.chars().filter(|&c| c != ','));
    };
    for &(span, keep) in comments {
        if span.start < gap.start || span.end > gap.end {
            continue;
        }
        push_plain(out, &source[cursor..span.start]);
        if keep {
            out.push_str(span.text(source));
        } else {
            let trimmed = out.trim_end_matches([' ', '\t']).len();
            out.truncate(trimmed);
        }
        cursor = span.end;
    }
    push_plain(out, &source[cursor..gap.end]);
}

/// Initializer source with type-only syntax inside it removed.
fn initializer_text(tree: &Tree<'_>, enum_id: NodeId, init: Span) -> String {
    let source = tree.source();
    let mut cuts: Vec<Span> = tree
        .descendants(enum_id)
        .map(|id| tree.node(id))
        .filter(|n| {
            init.contains(n.span)
                && matches!(
                    n.kind,
                    NodeKind::Assertion(_)
                        | NodeKind::AngleCast
                        | NodeKind::NonNull
                        | NodeKind::TypeArguments
                )
        })
        .map(|n| n.span)
        .collect();
    cuts.sort();

    let mut out = String::new();
    let mut cursor = init.start;
    for cut in cuts {
        if cut.start < cursor {
            continue;
        }
        out.push_str(source[cursor..cut.start].trim_end_matches([' ', '\t']));
        cursor = cut.end;
    }
    out.push_str(&source[cursor..init.end]);
    out
}

/// Member name without quotes.
fn member_name(raw: &str) -> String {
    if raw.starts_with(['"', '\'']) {
        unquote(raw).unwrap_or_else(|| raw.to_string())
    } else {
        raw.to_string()
    }
}

// ----- constant folding -----

/// Evaluate an initializer as a constant expression.
fn fold(
    text: &str,
    enum_name: &str,
    scope: &[(String, ConstValue)],
    known: &KnownEnums,
) -> Option<ConstValue> {
    let tokens: Vec<Token<'_>> = tokenize(text)
        .ok()?
        .into_iter()
        .filter(|t| !t.kind.is_trivia())
        .collect();
    let mut folder = Folder {
        tokens,
        pos: 0,
        enum_name,
        scope,
        known,
    };
    let value = folder.bit_or()?;
    if folder.pos != folder.tokens.len() {
        return None;
    }
    match value {
        ConstValue::Number(n) if !n.is_finite() => None,
        value => Some(value),
    }
}

struct Folder<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    enum_name: &'a str,
    scope: &'a [(String, ConstValue)],
    known: &'a KnownEnums,
}

impl Folder<'_> {
    fn peek_is(&self, text: &str) -> bool {
        self.tokens
            .get(self.pos)
            .is_some_and(|t| t.is(text))
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.peek_is(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn bit_or(&mut self) -> Option<ConstValue> {
        let mut left = self.bit_xor()?;
        while self.eat("|") {
            let right = self.bit_xor()?;
            left = int_op(&left, &right, |a, b| a | b)?;
        }
        Some(left)
    }

    fn bit_xor(&mut self) -> Option<ConstValue> {
        let mut left = self.bit_and()?;
        while self.eat("^") {
            let right = self.bit_and()?;
            left = int_op(&left, &right, |a, b| a ^ b)?;
        }
        Some(left)
    }

    fn bit_and(&mut self) -> Option<ConstValue> {
        let mut left = self.shift()?;
        while self.eat("&") {
            let right = self.shift()?;
            left = int_op(&left, &right, |a, b| a & b)?;
        }
        Some(left)
    }

    fn shift(&mut self) -> Option<ConstValue> {
        let mut left = self.additive()?;
        loop {
            if self.eat("<<") {
                let right = self.additive()?;
                left = int_op(&left, &right, |a, b| a.wrapping_shl(b as u32 & 31))?;
            } else if self.peek_is(">>") || self.peek_is(">>>") {
                let unsigned = self.peek_is(">>>");
                self.pos += 1;
                let right = self.additive()?;
                let (ConstValue::Number(a), ConstValue::Number(b)) = (&left, &right) else {
                    return None;
                };
                let shift = to_int32(*b) as u32 & 31;
                left = ConstValue::Number(if unsigned {
                    f64::from((to_int32(*a) as u32) >> shift)
                } else {
                    f64::from(to_int32(*a) >> shift)
                });
            } else {
                return Some(left);
            }
        }
    }

    fn additive(&mut self) -> Option<ConstValue> {
        let mut left = self.multiplicative()?;
        loop {
            if self.eat("+") {
                let right = self.multiplicative()?;
                left = match (&left, &right) {
                    (ConstValue::Number(a), ConstValue::Number(b)) => ConstValue::Number(a + b),
                    _ => ConstValue::String(left.to_js_string() + &right.to_js_string()),
                };
            } else if self.eat("-") {
                let right = self.multiplicative()?;
                left = num_op(&left, &right, |a, b| a - b)?;
            } else {
                return Some(left);
            }
        }
    }

    fn multiplicative(&mut self) -> Option<ConstValue> {
        let mut left = self.exponent()?;
        loop {
            let op: fn(f64, f64) -> f64 = if self.eat("*") {
                |a, b| a * b
            } else if self.eat("/") {
                |a, b| a / b
            } else if self.eat("%") {
                |a, b| a % b
            } else {
                return Some(left);
            };
            let right = self.exponent()?;
            left = num_op(&left, &right, op)?;
        }
    }

    fn exponent(&mut self) -> Option<ConstValue> {
        let base = self.unary()?;
        if self.eat("**") {
            let power = self.exponent()?;
            return num_op(&base, &power, f64::powf);
        }
        Some(base)
    }

    fn unary(&mut self) -> Option<ConstValue> {
        if self.eat("-") {
            return match self.unary()? {
                ConstValue::Number(n) => Some(ConstValue::Number(-n)),
                ConstValue::String(_) => None,
            };
        }
        if self.eat("+") {
            return match self.unary()? {
                ConstValue::Number(n) => Some(ConstValue::Number(n)),
                ConstValue::String(_) => None,
            };
        }
        if self.eat("~") {
            return match self.unary()? {
                ConstValue::Number(n) => Some(ConstValue::Number(f64::from(!to_int32(n)))),
                ConstValue::String(_) => None,
            };
        }
        self.primary()
    }

    fn primary(&mut self) -> Option<ConstValue> {
        let token = *self.tokens.get(self.pos)?;
        self.pos += 1;
        match token.kind {
            TokenKind::Number => parse_number(token.text).map(ConstValue::Number),
            TokenKind::String | TokenKind::NoSubstitutionTemplate => {
                unquote(token.text).map(ConstValue::String)
            }
            TokenKind::Punct if token.text == "(" => {
                let value = self.bit_or()?;
                self.eat(")").then_some(value)
            }
            TokenKind::Ident => self.name(token.text),
            _ => None,
        }
    }

    /// `Member`, `Enum.Member` or `Enum["Member"]`.
    fn name(&mut self, first: &str) -> Option<ConstValue> {
        let member = if self.eat(".") {
            let token = self.tokens.get(self.pos)?;
            self.pos += 1;
            Some(token.text.to_string())
        } else if self.peek_is("[") {
            let token = self.tokens.get(self.pos + 1)?;
            if token.kind != TokenKind::String {
                return None;
            }
            let member = unquote(token.text)?;
            self.pos += 2;
            self.eat("]").then_some(())?;
            Some(member)
        } else {
            None
        };

        let lookup = |entries: &[(String, ConstValue)], key: &str| {
            entries
                .iter()
                .rev()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        };
        let other = |key: &str| {
            self.known
                .get(first)
                .and_then(|entries| lookup(entries.as_slice(), key))
        };
        match member {
            None => lookup(self.scope, first),
            Some(member) if first == self.enum_name => {
                lookup(self.scope, member.as_str()).or_else(|| other(member.as_str()))
            }
            Some(member) => other(member.as_str()),
        }
    }
}

fn num_op(a: &ConstValue, b: &ConstValue, op: impl Fn(f64, f64) -> f64) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Number(a), ConstValue::Number(b)) => Some(ConstValue::Number(op(*a, *b))),
        _ => None,
    }
}

fn int_op(a: &ConstValue, b: &ConstValue, op: impl Fn(i32, i32) -> i32) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Number(a), ConstValue::Number(b)) => Some(ConstValue::Number(f64::from(op(
            to_int32(*a),
            to_int32(*b),
        )))),
        _ => None,
    }
}

/// ECMAScript `ToInt32`.
fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let wrapped = n.trunc().rem_euclid(4_294_967_296.0);
    (wrapped as u32) as i32
}

fn parse_number(text: &str) -> Option<f64> {
    if text.ends_with('n') {
        return None;
    }
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    let radix = match digits.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => return digits.parse::<f64>().ok(),
    };
    u64::from_str_radix(&digits[2..], radix)
        .ok()
        .map(|n| n as f64)
}

/// Format a non-negative finite number the way JavaScript prints it.
fn js_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

/// Double-quoted JavaScript string literal.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Decode a quoted string or substitution-free template literal.
pub(crate) fn unquote(raw: &str) -> Option<String> {
    let delim = raw.chars().next()?;
    if !matches!(delim, '"' | '\'' | '`') || !raw.ends_with(delim) || raw.len() < 2 {
        return None;
    }
    let body = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            'u' => {
                let code = if chars.peek() == Some(&'{') {
                    chars.next();
                    let hex: String = chars.by_ref().take_while(|&c| c != '}').collect();
                    u32::from_str_radix(&hex, 16).ok()?
                } else {
                    let hex: String = chars.by_ref().take(4).collect();
                    u32::from_str_radix(&hex, 16).ok()?
                };
                out.push(char::from_u32(code)?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}
