//! An AST for HCL2, the configuration syntax consumed by Terraform.
//!
//! This is a write-only model: the types here cover the subset of the HCL2
//! grammar that generated configuration needs (literals, collections,
//! templates, traversals, function calls). Operators, conditionals,
//! for-expressions and splats are not represented.
//!
//! Grammar reference:
//! <https://github.com/hashicorp/hcl/blob/main/hclsyntax/spec.md>

pub mod serializer;

use std::fmt;

use regex::Regex;
use std::sync::OnceLock;

/// A bare name token, used for block types, attribute names and variable
/// references.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::new(value)
    }
}

impl From<&Identifier> for Identifier {
    fn from(value: &Identifier) -> Self {
        value.clone()
    }
}

/// The expression sub-language used in attribute values.
///
/// Each node owns its children by value; the tree is acyclic by
/// construction. `StringLit` holds the decoded value — escaping is applied
/// by the serializer, never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    StringLit(String),
    NumericLit(f64),
    BooleanLit(bool),
    NullLit,
    /// `[ e1, e2, ... ]`
    Tuple(Vec<Expr>),
    /// `{ k1 = v1, k2 = v2, ... }`
    Object(Vec<ObjectElem>),
    /// A verbatim traversal such as `aws_instance.web.id`.
    Variable(Identifier),
    /// `expr[index]`
    Index { expr: Box<Expr>, index: Box<Expr> },
    /// `expr.attr`
    GetAttr { expr: Box<Expr>, attr: Identifier },
    /// Call to a terraform builtin, `name(arg, ...)`.
    FunctionCall { name: Identifier, args: Vec<Expr> },
    /// `"..."` with interpolation sequences kept verbatim.
    QuotedTemplate(String),
    /// `<<-IDENT` (or `<<IDENT` when `indented` is false) multi-line string.
    Heredoc {
        delimiter: Identifier,
        body: String,
        indented: bool,
    },
    /// `( expr )`
    Bracketed(Box<Expr>),
}

impl Expr {
    /// Chain an attribute access onto this expression.
    pub fn dot<I: Into<Identifier>>(self, attr: I) -> Expr {
        Expr::GetAttr {
            expr: Box::new(self),
            attr: attr.into(),
        }
    }

    /// Chain an index access onto this expression.
    pub fn at(self, index: Expr) -> Expr {
        Expr::Index {
            expr: Box::new(self),
            index: Box::new(index),
        }
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::StringLit(value.to_owned())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::StringLit(value)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::NumericLit(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::NumericLit(value as f64)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::BooleanLit(value)
    }
}

/// One `key = value` entry in an object expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectElem {
    pub key: ObjectKey,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKey {
    Ident(Identifier),
    Expr(Expr),
}

/// A block label is either a quoted string or a naked identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockLabel {
    Str(String),
    Ident(Identifier),
}

impl From<&str> for BlockLabel {
    fn from(value: &str) -> Self {
        BlockLabel::Str(value.to_owned())
    }
}

impl From<String> for BlockLabel {
    fn from(value: String) -> Self {
        BlockLabel::Str(value)
    }
}

impl From<Identifier> for BlockLabel {
    fn from(value: Identifier) -> Self {
        BlockLabel::Ident(value)
    }
}

/// An element of a body: attributes and nested blocks carry meaning for
/// terraform, the comment variants only affect the emitted text. Order
/// within a body is preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyItem {
    Attribute(Identifier, Expr),
    Block {
        ident: Identifier,
        labels: Vec<BlockLabel>,
        body: Vec<BodyItem>,
    },
    InlineComment(String),
    BlockComment {
        text: String,
        indent: bool,
    },
    BlankLine,
}

/// A configuration file is a sequence of top-level body items.
pub type ConfigFile = Vec<BodyItem>;

/// `name = value` attribute.
pub fn attribute<I: Into<Identifier>, E: Into<Expr>>(name: I, value: E) -> BodyItem {
    BodyItem::Attribute(name.into(), value.into())
}

/// Block with the given type, labels and body.
pub fn block<I: Into<Identifier>>(
    ident: I,
    labels: Vec<BlockLabel>,
    body: Vec<BodyItem>,
) -> BodyItem {
    BodyItem::Block {
        ident: ident.into(),
        labels,
        body,
    }
}

pub fn tuple(values: Vec<Expr>) -> Expr {
    Expr::Tuple(values)
}

pub fn object<I: Into<Identifier>, E: Into<Expr>>(entries: Vec<(I, E)>) -> Expr {
    Expr::Object(
        entries
            .into_iter()
            .map(|(k, v)| ObjectElem {
                key: ObjectKey::Ident(k.into()),
                value: v.into(),
            })
            .collect(),
    )
}

/// A verbatim reference such as `aws_instance.web.id`.
pub fn variable<I: Into<Identifier>>(name: I) -> Expr {
    Expr::Variable(name.into())
}

pub fn function_call<I: Into<Identifier>>(name: I, args: Vec<Expr>) -> Expr {
    Expr::FunctionCall {
        name: name.into(),
        args,
    }
}

pub fn heredoc<I: Into<Identifier>, S: Into<String>>(delimiter: I, body: S) -> Expr {
    Expr::Heredoc {
        delimiter: delimiter.into(),
        body: body.into(),
        indented: true,
    }
}

/// A quoted template whose body (interpolations included) is emitted
/// verbatim between the quotes.
pub fn quoted_template<S: Into<String>>(body: S) -> Expr {
    Expr::QuotedTemplate(body.into())
}

pub fn bracketed(expr: Expr) -> Expr {
    Expr::Bracketed(Box::new(expr))
}

/// Marker prefix reserved for verbatim expression text; see [`raw_expr`].
const RAW_EXPR_MARKER: &str = "!rawexpr!";

/// Escape hatch: wrap expression text that the AST cannot otherwise
/// represent so that [`expr_from_str`] passes it through verbatim.
pub fn raw_expr(text: &str) -> String {
    format!("{}{}", RAW_EXPR_MARKER, text)
}

fn dollar_ref_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$\{([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+|\[[0-9]+\])*)\}$")
            .expect("dollar ref pattern")
    })
}

/// Convert a plain string into the right expression kind.
///
/// A string of exactly the form `"${ident.path}"` becomes a reference to
/// that path rather than a literal. A [`raw_expr`] marker makes the
/// remainder a verbatim reference. Strings containing a newline or a
/// double quote become heredocs; everything else is a quoted literal.
pub fn expr_from_str(s: &str) -> Expr {
    if let Some(raw) = s.strip_prefix(RAW_EXPR_MARKER) {
        return Expr::Variable(Identifier::new(raw));
    }
    if let Some(caps) = dollar_ref_pattern().captures(s) {
        return Expr::Variable(Identifier::new(&caps[1]));
    }
    if s.contains('\n') || s.contains('"') {
        return Expr::Heredoc {
            delimiter: Identifier::new(unique_heredoc_delimiter(s)),
            body: s.to_owned(),
            indented: false,
        };
    }
    Expr::StringLit(s.to_owned())
}

/// Pick a heredoc terminator not contained in `body`: `EOF`, then `EOF1`,
/// `EOF2`, ... in order.
pub fn unique_heredoc_delimiter(body: &str) -> String {
    if !body.contains("EOF") {
        return "EOF".to_owned();
    }
    let mut i = 1u32;
    loop {
        let candidate = format!("EOF{}", i);
        if !body.contains(&candidate) {
            return candidate;
        }
        i += 1;
    }
}
