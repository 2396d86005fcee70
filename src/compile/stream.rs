//! The token stream handed to registered tag parsers.
//!
//! The built-in parser works directly on lexer tokens. Tag parsers see a
//! simplified view where every token has a [`TokenKind`], a [`Value`] and the
//! line it started on.

use crate::compile::lex::{self, Lexer};
use crate::types::span::Span;
use crate::{Error, Result, Value};

/// A token as seen by a tag parser.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The parsed value of the token.
    ///
    /// Names and punctuation are strings, numbers are integers or floats and
    /// string literals are the unescaped string. End tags and the end of the
    /// source have no value.
    pub value: Value,
    pub span: Span,
    /// The 1-based line the token starts on.
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    String,
    Punctuation,
    ExprEnd,
    BlockEnd,
    Eof,
}

/// A stream of tokens over a single template source.
#[derive(Debug)]
pub struct TokenStream<'source> {
    lexer: Lexer<'source>,
    peeked: Option<Option<(lex::Token, Span)>>,
    /// The last token consumed.
    last: Option<(lex::Token, Span)>,
}

impl Token {
    /// Returns true if the token has the given kind and, if provided, the
    /// given value.
    pub fn test(&self, kind: TokenKind, value: Option<&str>) -> bool {
        self.kind == kind && value.map_or(true, |v| self.value.as_str() == Some(v))
    }

    fn describe(&self) -> String {
        match &self.value {
            Value::String(s) if self.kind != TokenKind::String => {
                format!("{} `{s}`", self.kind.human())
            }
            _ => self.kind.human().to_owned(),
        }
    }
}

impl TokenKind {
    pub fn human(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Number => "number",
            Self::String => "string",
            Self::Punctuation => "punctuation",
            Self::ExprEnd => "end expression",
            Self::BlockEnd => "end block",
            Self::Eof => "end of template",
        }
    }
}

impl<'source> TokenStream<'source> {
    pub(crate) fn new(source: &'source str) -> Self {
        Self {
            lexer: Lexer::new(source),
            peeked: None,
            last: None,
        }
    }

    /// The template source this stream is reading.
    pub fn source(&self) -> &'source str {
        self.lexer.source
    }

    /// Returns the next token without consuming it.
    pub fn look(&mut self) -> Result<Token> {
        let next = self.peek_raw()?;
        self.convert(next)
    }

    /// Consumes and returns the next token.
    pub fn next(&mut self) -> Result<Token> {
        let next = self.next_raw()?;
        self.convert(next)
    }

    /// Consumes the next token only if it matches the given kind and value.
    pub fn next_if(&mut self, kind: TokenKind, value: Option<&str>) -> Result<Option<Token>> {
        let token = self.look()?;
        if token.test(kind, value) {
            self.next_raw()?;
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    /// Consumes the next token, failing if it does not match the given kind
    /// and value.
    pub fn expect(&mut self, kind: TokenKind, value: Option<&str>) -> Result<Token> {
        let token = self.next()?;
        if token.test(kind, value) {
            return Ok(token);
        }
        let expected = match value {
            Some(v) => format!("{} `{v}`", kind.human()),
            None => kind.human().to_owned(),
        };
        let found = token.describe();
        Err(self.error(format!("expected {expected}, found {found}"), token.span))
    }

    /// Constructs a syntax error pointing at the given span.
    pub fn error(&self, msg: impl Into<String>, span: Span) -> Error {
        Error::syntax(msg, self.source(), span)
    }

    pub(crate) fn peek_raw(&mut self) -> Result<Option<(lex::Token, Span)>> {
        if let Some(next) = self.peeked {
            return Ok(next);
        }
        let next = self.lexer.next()?;
        self.peeked = Some(next);
        Ok(next)
    }

    pub(crate) fn next_raw(&mut self) -> Result<Option<(lex::Token, Span)>> {
        let next = match self.peeked.take() {
            Some(next) => next,
            None => self.lexer.next()?,
        };
        if next.is_some() {
            self.last = next;
        }
        Ok(next)
    }

    pub(crate) fn last_raw(&self) -> Option<(lex::Token, Span)> {
        self.last
    }

    fn convert(&self, next: Option<(lex::Token, Span)>) -> Result<Token> {
        let source = self.source();
        let (tk, span) = match next {
            Some(next) => next,
            None => {
                let span = Span::from(source.len()..source.len());
                return Ok(Token {
                    kind: TokenKind::Eof,
                    value: Value::None,
                    span,
                    line: span.line(source),
                });
            }
        };

        let (kind, value) = match tk {
            lex::Token::Name => (TokenKind::Name, Value::from(&source[span])),
            lex::Token::Number | lex::Token::Index => {
                (TokenKind::Number, parse_number(source, span)?)
            }
            lex::Token::String => (TokenKind::String, Value::from(parse_string(source, span)?)),
            lex::Token::EndExpr => (TokenKind::ExprEnd, Value::None),
            lex::Token::EndBlock => (TokenKind::BlockEnd, Value::None),
            tk => match tk.punctuation() {
                Some(c) => (TokenKind::Punctuation, Value::from(c.to_string())),
                None => {
                    return Err(self.error(format!("unexpected {}", tk.human()), span));
                }
            },
        };

        Ok(Token {
            kind,
            value,
            span,
            line: span.line(source),
        })
    }
}

/// Parses a number literal into an integer, or a float if it has a fractional
/// part or exponent.
pub(crate) fn parse_number(source: &str, span: Span) -> Result<Value> {
    let raw = source[span].replace('_', "");
    let value = if raw.contains(['.', 'e', 'E']) {
        raw.parse::<f64>().ok().map(Value::Float)
    } else {
        raw.parse::<i64>().ok().map(Value::Integer)
    };
    value.ok_or_else(|| Error::syntax("invalid number", source, span))
}

/// Strips the quotes from a string literal and resolves escape sequences.
pub(crate) fn parse_string(source: &str, span: Span) -> Result<String> {
    let raw = &source[span];
    let inner = &raw[1..raw.len() - 1];

    if !inner.contains('\\') {
        return Ok(inner.to_owned());
    }

    let mut string = String::with_capacity(inner.len());
    let mut iter = inner.char_indices().map(|(d, c)| (span.m + 1 + d, c));
    while let Some((i, c)) = iter.next() {
        if c != '\\' {
            string.push(c);
            continue;
        }
        let (j, c) = iter
            .next()
            .ok_or_else(|| Error::syntax("undelimited string", source, span))?;
        let c = match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            _ => {
                let span = Span::from(i..j + c.len_utf8());
                return Err(Error::syntax("unknown escape character", source, span));
            }
        };
        string.push(c);
    }
    Ok(string)
}
