//! AST representing a template.

use serde::{Deserialize, Serialize};

use crate::tags::Node;
use crate::types::span::Span;
use crate::Value;

#[derive(Debug)]
pub struct Template {
    pub scope: Scope,
}

#[derive(Debug)]
pub struct Scope {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug)]
pub enum Stmt {
    Raw(Span),
    InlineExpr(InlineExpr),
    Include(Include),
    IfElse(IfElse),
    ForLoop(ForLoop),
    Tag(Tag),
}

#[derive(Debug)]
pub struct InlineExpr {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug)]
pub struct Include {
    pub name: String,
    pub globals: Option<Expr>,
}

/// A string literal that is known at compile time, e.g. a template name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct String {
    pub name: std::string::String,
    pub span: Span,
}

#[derive(Debug)]
pub struct IfElse {
    pub not: bool,
    pub cond: Expr,
    pub then_branch: Scope,
    pub else_branch: Option<Scope>,
}

#[derive(Debug)]
pub struct ForLoop {
    pub vars: LoopVars,
    pub iterable: Expr,
    pub body: Scope,
}

/// The node produced by a registered tag parser.
#[derive(Debug)]
pub struct Tag {
    pub node: Node,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopVars {
    Item(Ident),
    KeyValue(KeyValue),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: Ident,
    pub value: Ident,
    pub span: Span,
}

#[derive(Debug)]
pub enum Expr {
    Base(BaseExpr),
    Filter(Filter),
}

/// A piped function call, e.g. `name | upper` or `items | join(", ")`.
#[derive(Debug)]
pub struct Filter {
    pub name: Ident,
    pub args: Vec<Expr>,
    pub receiver: Box<Expr>,
    pub span: Span,
}

#[derive(Debug)]
pub enum BaseExpr {
    Var(Var),
    Literal(Literal),
    Call(Call),
    List(List),
    Map(Map),
}

/// A direct function call, e.g. `_t("Page.Title", "Welcome")`.
#[derive(Debug)]
pub struct Call {
    pub name: Ident,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug)]
pub struct List {
    pub items: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug)]
pub struct Map {
    pub entries: Vec<(std::string::String, Expr)>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Var {
    pub path: Vec<Key>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Key {
    List(Index),
    Map(Ident),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Index {
    pub value: usize,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ident {
    pub name: std::string::String,
    pub span: Span,
}

#[derive(Debug)]
pub struct Literal {
    pub value: Value,
    pub span: Span,
}

impl Scope {
    pub const fn new() -> Self {
        Self { stmts: Vec::new() }
    }
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Self::Base(base) => base.span(),
            Self::Filter(filter) => filter.span,
        }
    }
}

impl BaseExpr {
    pub fn span(&self) -> Span {
        match self {
            BaseExpr::Var(var) => var.span(),
            BaseExpr::Literal(lit) => lit.span,
            BaseExpr::Call(call) => call.span,
            BaseExpr::List(list) => list.span,
            BaseExpr::Map(map) => map.span,
        }
    }
}

impl Var {
    pub fn span(&self) -> Span {
        match (self.path.first(), self.path.last()) {
            (Some(first), Some(last)) => first.span().combine(last.span()),
            _ => Span { m: 0, n: 0 },
        }
    }

    pub fn first_name(&self) -> Option<&str> {
        match self.path.first() {
            Some(Key::Map(ident)) => Some(&ident.name),
            _ => None,
        }
    }
}

impl Key {
    pub const fn span(&self) -> Span {
        match self {
            Key::List(key) => key.span,
            Key::Map(key) => key.span,
        }
    }
}
