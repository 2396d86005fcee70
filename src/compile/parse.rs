use std::collections::BTreeMap;
use std::fmt::Display;
use std::mem;

use crate::compile::lex::Token;
use crate::compile::stream::{self, TokenStream};
use crate::tags::{self, TagParser};
use crate::types::ast;
use crate::types::span::Span;
use crate::{Error, Result, Value};

/// Builds a template AST from the token stream.
///
/// Statements are collected into a stack of frames, one per open `if` or
/// `for` block, so nesting never recurses. Expressions recurse into list,
/// map and call arguments.
pub struct Parser<'a, 'source> {
    tokens: TokenStream<'source>,

    /// Custom tag parsers, consulted for block names that are not built in.
    tags: &'a BTreeMap<String, Box<dyn TagParser>>,

    /// The open blocks, the first frame is the template itself.
    frames: Vec<Frame>,
}

/// An open block and the statements collected for its current branch.
struct Frame {
    open: Open,
    body: ast::Scope,
}

enum Open {
    Template,

    If {
        span: Span,
        /// Finished `if` and `elseif` branches.
        arms: Vec<Arm>,
        /// The condition of the branch being collected, `None` once the
        /// `else` branch is reached.
        cond: Option<Cond>,
    },

    For {
        span: Span,
        vars: ast::LoopVars,
        iterable: ast::Expr,
    },
}

/// A condition with its `not` flag.
type Cond = (bool, ast::Expr);

struct Arm {
    cond: Cond,
    body: ast::Scope,
}

/// A single `{% ... %}` block.
enum Block {
    If(Cond),
    ElseIf(Cond),
    Else,
    EndIf,
    For(ast::LoopVars, ast::Expr),
    EndFor,
    Include(ast::String, Option<ast::Expr>),
    Tag(tags::Node),
}

impl<'a, 'source> Parser<'a, 'source> {
    pub fn new(source: &'source str, tags: &'a BTreeMap<String, Box<dyn TagParser>>) -> Self {
        Self {
            tokens: TokenStream::new(source),
            tags,
            frames: vec![Frame {
                open: Open::Template,
                body: ast::Scope::new(),
            }],
        }
    }

    pub fn parse_template(mut self) -> Result<ast::Template> {
        while let Some((token, span)) = self.next()? {
            match token {
                Token::Raw => self.push(ast::Stmt::Raw(span)),

                Token::BeginComment => {
                    if self.is_next(Token::Raw)? {
                        self.expect(Token::Raw)?;
                    }
                    self.expect(Token::EndComment)?;
                }

                Token::BeginExpr => {
                    let expr = self.parse_expr()?;
                    let end = self.expect(Token::EndExpr)?;
                    self.push(ast::Stmt::InlineExpr(ast::InlineExpr {
                        expr,
                        span: span.combine(end),
                    }));
                }

                Token::BeginBlock => {
                    let (block, span) = self.parse_block(span)?;
                    self.apply(block, span)?;
                }

                tk => return Err(self.err_unexpected_token("template", tk, span)),
            }
        }

        if let Some(frame) = self.frames.get(1) {
            let (msg, span) = match &frame.open {
                Open::If { span, .. } => ("unclosed `if` block", *span),
                Open::For { span, .. } => ("unclosed `for` block", *span),
                Open::Template => ("unclosed block", Span::from(0..0)),
            };
            return Err(Error::syntax(msg, self.source(), span));
        }

        let scope = self
            .frames
            .pop()
            .map_or_else(ast::Scope::new, |frame| frame.body);
        Ok(ast::Template { scope })
    }

    /// Updates the open frames for a parsed block.
    fn apply(&mut self, block: Block, span: Span) -> Result<()> {
        match block {
            Block::If(cond) => self.frames.push(Frame {
                open: Open::If {
                    span,
                    arms: Vec::new(),
                    cond: Some(cond),
                },
                body: ast::Scope::new(),
            }),

            Block::ElseIf(next) => self.next_branch(Some(next), "elseif", span)?,
            Block::Else => self.next_branch(None, "else", span)?,

            Block::EndIf => {
                let stmt = self.close_if(span)?;
                self.push(stmt);
            }

            Block::For(vars, iterable) => self.frames.push(Frame {
                open: Open::For {
                    span,
                    vars,
                    iterable,
                },
                body: ast::Scope::new(),
            }),

            Block::EndFor => match self.frames.pop() {
                Some(Frame {
                    open: Open::For { vars, iterable, .. },
                    body,
                }) => self.push(ast::Stmt::ForLoop(ast::ForLoop {
                    vars,
                    iterable,
                    body,
                })),
                _ => {
                    return Err(Error::syntax(
                        "unexpected `endfor` block",
                        self.source(),
                        span,
                    ))
                }
            },

            Block::Include(name, globals) => {
                self.push(ast::Stmt::Include(ast::Include { name, globals }));
            }

            Block::Tag(node) => self.push(ast::Stmt::Tag(ast::Tag { node, span })),
        }
        Ok(())
    }

    /// Finishes the current branch of the innermost `if` and starts the next
    /// one, `next` is `None` for the `else` branch.
    fn next_branch(&mut self, next: Option<Cond>, name: &str, span: Span) -> Result<()> {
        let source = self.source();
        let frame = self.frames.last_mut();
        let Some(Frame {
            open: Open::If { arms, cond, .. },
            body,
        }) = frame
        else {
            return Err(Error::syntax(format!("unexpected `{name}` block"), source, span));
        };
        let Some(finished) = cond.take() else {
            return Err(Error::syntax(format!("unexpected `{name}` block"), source, span));
        };
        arms.push(Arm {
            cond: finished,
            body: mem::replace(body, ast::Scope::new()),
        });
        *cond = next;
        Ok(())
    }

    /// Pops the innermost `if` and desugars its `elseif` branches into
    /// nested `if` statements in the `else` branch.
    fn close_if(&mut self, span: Span) -> Result<ast::Stmt> {
        let source = self.source();
        let err = || Error::syntax("unexpected `endif` block", source, span);
        let Some(Frame {
            open: Open::If { mut arms, cond, .. },
            body,
        }) = self.frames.pop()
        else {
            return Err(err());
        };

        let mut else_branch = match cond {
            Some(cond) => {
                arms.push(Arm { cond, body });
                None
            }
            None => Some(body),
        };
        let mut stmt = None;
        for Arm { cond: (not, cond), body } in arms.into_iter().rev() {
            if let Some(prev) = stmt.take() {
                else_branch = Some(ast::Scope { stmts: vec![prev] });
            }
            stmt = Some(ast::Stmt::IfElse(ast::IfElse {
                not,
                cond,
                then_branch: body,
                else_branch: else_branch.take(),
            }));
        }
        stmt.ok_or_else(err)
    }

    fn push(&mut self, stmt: ast::Stmt) {
        if let Some(frame) = self.frames.last_mut() {
            frame.body.stmts.push(stmt);
        }
    }

    /// Parses the inside of a block and its end tag.
    ///
    ///   if not page.hide_menu
    ///
    ///   else if page.parent
    ///
    ///   for key, value in settings
    ///
    ///   include "Includes/Footer.twig" with {year: 2024}
    ///
    /// Any other name is handed to the registered tag parser.
    fn parse_block(&mut self, begin: Span) -> Result<(Block, Span)> {
        let name_span = self.expect(Token::Name)?;
        let name = &self.source()[name_span];

        let block = match name {
            "if" => Block::If(self.parse_cond()?),
            "elseif" => Block::ElseIf(self.parse_cond()?),
            "else" if self.is_next_name("if")? => {
                self.expect_name("if")?;
                Block::ElseIf(self.parse_cond()?)
            }
            "else" => Block::Else,
            "endif" => Block::EndIf,
            "for" => {
                let vars = self.parse_loop_vars()?;
                self.expect_name("in")?;
                Block::For(vars, self.parse_expr()?)
            }
            "endfor" => Block::EndFor,
            "include" => {
                let span = self.expect(Token::String)?;
                let name = ast::String {
                    name: stream::parse_string(self.source(), span)?,
                    span,
                };
                let globals = match self.is_next_name("with")? {
                    true => {
                        self.expect_name("with")?;
                        Some(self.parse_expr()?)
                    }
                    false => None,
                };
                Block::Include(name, globals)
            }
            name => return self.parse_tag(name, begin, name_span),
        };

        let end = self.expect(Token::EndBlock)?;
        Ok((block, begin.combine(end)))
    }

    /// Runs a registered tag parser, which consumes the end of the block.
    fn parse_tag(&mut self, name: &str, begin: Span, name_span: Span) -> Result<(Block, Span)> {
        let tags = self.tags;
        let Some(parser) = tags.get(name) else {
            return Err(Error::syntax(
                format!("unknown tag `{name}`"),
                self.source(),
                name_span,
            ));
        };
        let token = tags::Token {
            kind: tags::TokenKind::Name,
            value: Value::from(name),
            span: name_span,
            line: name_span.line(self.source()),
        };
        let node = parser.parse(&token, &mut self.tokens)?;
        match self.tokens.last_raw() {
            Some((Token::EndBlock, end)) => Ok((Block::Tag(node), begin.combine(end))),
            _ => Err(Error::syntax(
                format!("tag `{name}` did not consume the end of the block"),
                self.source(),
                begin.combine(name_span),
            )),
        }
    }

    /// Parses an expression with an optional leading `not`.
    fn parse_cond(&mut self) -> Result<Cond> {
        let not = self.is_next_name("not")?;
        if not {
            self.expect_name("not")?;
        }
        Ok((not, self.parse_expr()?))
    }

    /// Parses a base expression followed by any number of filters.
    ///
    ///   page.title | lower | default("Untitled")
    ///
    fn parse_expr(&mut self) -> Result<ast::Expr> {
        let mut expr = ast::Expr::Base(self.parse_base_expr()?);
        while self.is_next(Token::Pipe)? {
            self.expect(Token::Pipe)?;
            let name = self.parse_ident()?;
            let (args, end) = match self.is_next(Token::OpenParen)? {
                true => self.parse_args()?,
                false => (Vec::new(), name.span),
            };
            let span = expr.span().combine(end);
            expr = ast::Expr::Filter(ast::Filter {
                name,
                args,
                receiver: Box::new(expr),
                span,
            });
        }
        Ok(expr)
    }

    /// Parses a literal, a list or map, a variable or a function call.
    ///
    ///   -1.5
    ///
    ///   {title: "Home", 'show-nav': true}
    ///
    ///   menu.0.children
    ///
    ///   _t("Page.TITLE", "Welcome")
    ///
    fn parse_base_expr(&mut self) -> Result<ast::BaseExpr> {
        let expr = match self.parse()? {
            (sign @ (Token::Minus | Token::Plus), sign_span) => {
                let digits = self.expect(Token::Number)?;
                let value = match (stream::parse_number(self.source(), digits)?, sign) {
                    (Value::Integer(i), Token::Minus) => Value::Integer(-i),
                    (Value::Float(f), Token::Minus) => Value::Float(-f),
                    (value, _) => value,
                };
                literal(value, sign_span.combine(digits))
            }

            (Token::Number, span) => literal(stream::parse_number(self.source(), span)?, span),

            (Token::String, span) => {
                literal(Value::String(stream::parse_string(self.source(), span)?), span)
            }

            (Token::OpenBracket, begin) => {
                let (items, span) =
                    self.parse_delimited(begin, Token::CloseBracket, Self::parse_expr)?;
                ast::BaseExpr::List(ast::List { items, span })
            }

            (Token::OpenBrace, begin) => {
                let (entries, span) =
                    self.parse_delimited(begin, Token::CloseBrace, Self::parse_entry)?;
                ast::BaseExpr::Map(ast::Map { entries, span })
            }

            (Token::Name, span) => match &self.source()[span] {
                "true" => literal(Value::Bool(true), span),
                "false" => literal(Value::Bool(false), span),
                "none" | "null" => literal(Value::None, span),
                name => {
                    let ident = ast::Ident {
                        name: name.to_owned(),
                        span,
                    };
                    if self.is_next(Token::OpenParen)? {
                        let (args, end) = self.parse_args()?;
                        ast::BaseExpr::Call(ast::Call {
                            name: ident,
                            args,
                            span: span.combine(end),
                        })
                    } else {
                        ast::BaseExpr::Var(self.parse_path(ident)?)
                    }
                }
            },

            (tk, span) => return Err(self.err_unexpected_token("expression", tk, span)),
        };
        Ok(expr)
    }

    /// Parses a `key: value` map literal entry, the key is a name or a
    /// string.
    fn parse_entry(&mut self) -> Result<(String, ast::Expr)> {
        let key = match self.parse()? {
            (Token::Name, span) => self.source()[span].to_owned(),
            (Token::String, span) => stream::parse_string(self.source(), span)?,
            (tk, span) => return Err(self.err_unexpected_token("map key", tk, span)),
        };
        self.expect(Token::Colon)?;
        Ok((key, self.parse_expr()?))
    }

    /// Parses the `.` separated keys following a variable name.
    fn parse_path(&mut self, first: ast::Ident) -> Result<ast::Var> {
        let mut path = vec![ast::Key::Map(first)];
        while self.is_next(Token::Dot)? {
            self.expect(Token::Dot)?;
            let key = match self.parse()? {
                (Token::Name, span) => ast::Key::Map(ast::Ident {
                    name: self.source()[span].to_owned(),
                    span,
                }),
                (Token::Index, span) => {
                    let value = self.source()[span].parse().map_err(|_| {
                        Error::syntax("list index out of range", self.source(), span)
                    })?;
                    ast::Key::List(ast::Index { value, span })
                }
                (tk, span) => {
                    return Err(self.err_unexpected_token("identifier or index", tk, span));
                }
            };
            path.push(key);
        }
        Ok(ast::Var { path })
    }

    /// Parses parenthesized call arguments.
    fn parse_args(&mut self) -> Result<(Vec<ast::Expr>, Span)> {
        let begin = self.expect(Token::OpenParen)?;
        self.parse_delimited(begin, Token::CloseParen, Self::parse_expr)
    }

    /// Parses comma separated items up to and including `close`, a trailing
    /// comma is allowed. Returns the items and the span from `begin`.
    fn parse_delimited<T>(
        &mut self,
        begin: Span,
        close: Token,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<(Vec<T>, Span)> {
        let mut items = Vec::new();
        while !self.is_next(close)? {
            items.push(item(self)?);
            if !self.is_next(Token::Comma)? {
                break;
            }
            self.expect(Token::Comma)?;
        }
        let end = self.expect(close)?;
        Ok((items, begin.combine(end)))
    }

    /// Parses `item` or `key, value`.
    fn parse_loop_vars(&mut self) -> Result<ast::LoopVars> {
        let key = self.parse_ident()?;
        if !self.is_next(Token::Comma)? {
            return Ok(ast::LoopVars::Item(key));
        }
        self.expect(Token::Comma)?;
        let value = self.parse_ident()?;
        let span = key.span.combine(value.span);
        Ok(ast::LoopVars::KeyValue(ast::KeyValue { key, value, span }))
    }

    fn parse_ident(&mut self) -> Result<ast::Ident> {
        let span = self.expect(Token::Name)?;
        Ok(ast::Ident {
            name: self.source()[span].to_owned(),
            span,
        })
    }

    fn expect_name(&mut self, exp: &str) -> Result<Span> {
        let span = self.expect(Token::Name)?;
        let found = &self.source()[span];
        if found != exp {
            return Err(Error::syntax(
                format!("expected `{exp}`, found `{found}`"),
                self.source(),
                span,
            ));
        }
        Ok(span)
    }

    /// Returns the next token, failing at the end of the source.
    fn parse(&mut self) -> Result<(Token, Span)> {
        self.next()?
            .ok_or_else(|| self.err_unexpected_eof("token"))
    }

    fn expect(&mut self, exp: Token) -> Result<Span> {
        match self.next()? {
            Some((tk, span)) if tk == exp => Ok(span),
            Some((tk, span)) => Err(self.err_unexpected_token(exp.human(), tk, span)),
            None => Err(self.err_unexpected_eof(exp.human())),
        }
    }

    fn is_next_name(&mut self, exp: &str) -> Result<bool> {
        let source = self.source();
        let next = self.tokens.peek_raw()?;
        Ok(matches!(next, Some((Token::Name, span)) if &source[span] == exp))
    }

    fn is_next(&mut self, exp: Token) -> Result<bool> {
        Ok(matches!(self.tokens.peek_raw()?, Some((tk, _)) if tk == exp))
    }

    fn next(&mut self) -> Result<Option<(Token, Span)>> {
        self.tokens.next_raw()
    }

    fn source(&self) -> &'source str {
        self.tokens.source()
    }

    fn err_unexpected_eof(&self, exp: impl Display) -> Error {
        let n = self.source().len();
        Error::syntax(format!("expected {exp}, found EOF"), self.source(), n..n)
    }

    fn err_unexpected_token(&self, exp: impl Display, got: Token, span: Span) -> Error {
        Error::syntax(
            format!("expected {exp}, found {}", got.human()),
            self.source(),
            span,
        )
    }
}

fn literal(value: Value, span: Span) -> ast::BaseExpr {
    ast::BaseExpr::Literal(ast::Literal { value, span })
}
