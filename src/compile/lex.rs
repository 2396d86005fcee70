use crate::types::span::Span;
use crate::{Error, Result};

/// Splits a template source into tokens.
///
/// Outside of tags the source is raw text. Inside `{{ }}` and `{% %}` it is
/// split into names, literals and punctuation. Inside `{# #}` everything up
/// to the end tag is raw text. The parser calls [`next`][Lexer::next] until
/// it returns `None`.
#[derive(Debug)]
pub struct Lexer<'source> {
    pub source: &'source str,

    /// The byte offset of the next token.
    cursor: usize,

    mode: Mode,

    /// Strip leading whitespace from the next raw token, set by `-}}`, `-%}`
    /// and `-#}`.
    trim_next_raw: bool,

    /// The last non-whitespace token was a `.`, digits that follow are a
    /// list index.
    after_dot: bool,

    /// A token found while lexing the previous one, e.g. the tag that ends a
    /// raw token.
    pending: Option<(Token, Span)>,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Raw,

    /// Inside an expression or block tag.
    Code {
        begin: Span,
        end: Token,
        /// Open `{` map literals, a `}` inside a map never ends the tag.
        braces: usize,
    },

    /// Inside a comment tag.
    Comment { begin: Span },
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Raw template
    Raw,
    /// `{{`
    BeginExpr,
    /// `}}`
    EndExpr,
    /// `{%`
    BeginBlock,
    /// `%}`
    EndBlock,
    /// `{#`
    BeginComment,
    /// `#}`
    EndComment,
    Dot,
    Comma,
    Colon,
    Pipe,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    Plus,
    Minus,
    Whitespace,
    /// A tag name, keyword, attribute or variable
    Name,
    /// A list index following a `.`, e.g. the `0` in `users.0`.
    Index,
    /// An integer or float literal, e.g. `19` or `3.14`.
    Number,
    /// A string literal, e.g. `"Hello World!\n"` or `'main.css'`.
    String,
}

/// Single character tokens and their characters.
const PUNCTUATION: &[(char, Token)] = &[
    ('.', Token::Dot),
    (',', Token::Comma),
    (':', Token::Colon),
    ('|', Token::Pipe),
    ('(', Token::OpenParen),
    (')', Token::CloseParen),
    ('[', Token::OpenBracket),
    (']', Token::CloseBracket),
    ('{', Token::OpenBrace),
    ('}', Token::CloseBrace),
    ('+', Token::Plus),
    ('-', Token::Minus),
];

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            cursor: 0,
            mode: Mode::Raw,
            trim_next_raw: false,
            after_dot: false,
            pending: None,
        }
    }

    /// Returns the next non-whitespace token and its span.
    pub fn next(&mut self) -> Result<Option<(Token, Span)>> {
        while let Some((tk, span)) = self.lex()? {
            if tk != Token::Whitespace {
                return Ok(Some((tk, span)));
            }
        }
        Ok(None)
    }

    /// Returns the next token and its span.
    fn lex(&mut self) -> Result<Option<(Token, Span)>> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        let i = self.cursor;
        if i >= self.source.len() {
            return Ok(None);
        }
        match self.mode {
            Mode::Raw => Ok(Some(self.lex_raw(i))),
            Mode::Code { begin, end, braces } => {
                self.lex_code(i, begin, end, braces).map(Some)
            }
            Mode::Comment { begin } => self.lex_comment(i, begin).map(Some),
        }
    }

    /// Lexes raw text up to the next begin tag.
    fn lex_raw(&mut self, i: usize) -> (Token, Span) {
        let Some((tag, trim, j, k)) = find_begin_tag(self.source, i) else {
            self.cursor = self.source.len();
            return self.raw(i, self.source.len(), false);
        };

        self.cursor = k;
        self.after_dot = false;
        let begin = Span::from(j..k);
        self.mode = match tag {
            Token::BeginComment => Mode::Comment { begin },
            _ => Mode::Code {
                begin,
                end: tag.pair(),
                braces: 0,
            },
        };

        if i == j {
            self.trim_next_raw = false;
            return (tag, begin);
        }
        self.pending = Some((tag, begin));
        self.raw(i, j, trim)
    }

    /// Returns a raw token for `i..j` after applying whitespace control.
    fn raw(&mut self, mut i: usize, mut j: usize, trim_end: bool) -> (Token, Span) {
        if trim_end {
            j = self.source[..j].trim_end().len().max(i);
        }
        if self.trim_next_raw {
            self.trim_next_raw = false;
            let s = &self.source[i..j];
            i += s.len() - s.trim_start().len();
        }
        (Token::Raw, Span::from(i..j))
    }

    /// Lexes one token between `{{ }}` or `{% %}`.
    fn lex_code(
        &mut self,
        i: usize,
        begin: Span,
        end: Token,
        mut braces: usize,
    ) -> Result<(Token, Span)> {
        if braces == 0 {
            if let Some((tk, trim, j)) = end_tag_at(self.source, i) {
                if tk != end {
                    return Err(Error::syntax(
                        format!("unexpected {}", tk.human()),
                        self.source,
                        i..j,
                    ));
                }
                self.mode = Mode::Raw;
                self.trim_next_raw = trim;
                self.cursor = j;
                return Ok((tk, Span::from(i..j)));
            }
        }

        if begin_tag_at(self.source, i) {
            return Err(self.err_unclosed(begin, end.pair()));
        }

        let rest = &self.source[i..];
        let Some(c) = rest.chars().next() else {
            return Err(self.err_unclosed(begin, end.pair()));
        };

        let (tk, j) = if let Some(&(_, tk)) = PUNCTUATION.iter().find(|(p, _)| *p == c) {
            match tk {
                Token::OpenBrace => braces += 1,
                Token::CloseBrace => braces = braces.saturating_sub(1),
                _ => {}
            }
            (tk, i + 1)
        } else if c == '"' || c == '\'' {
            (Token::String, self.scan_string(i, c)?)
        } else if c.is_ascii_digit() && self.after_dot {
            (Token::Index, self.scan_while(i, |c| c.is_ascii_digit()))
        } else if c.is_ascii_digit() {
            (Token::Number, scan_number(self.source, i))
        } else if c.is_whitespace() {
            (Token::Whitespace, self.scan_while(i, char::is_whitespace))
        } else if is_ident_start(c) {
            (Token::Name, self.scan_while(i, is_ident))
        } else {
            return Err(Error::syntax(
                "unexpected character",
                self.source,
                i..i + c.len_utf8(),
            ));
        };

        if tk != Token::Whitespace {
            self.after_dot = tk == Token::Dot;
        }
        self.mode = Mode::Code { begin, end, braces };
        self.cursor = j;
        Ok((tk, Span::from(i..j)))
    }

    /// Lexes the comment text and the end tag.
    fn lex_comment(&mut self, i: usize, begin: Span) -> Result<(Token, Span)> {
        let Some(d) = self.source[i..].find("#}") else {
            return Err(self.err_unclosed(begin, Token::BeginComment));
        };
        let trim = d > 0 && self.source[..i + d].ends_with('-');
        let j = i + d - usize::from(trim);
        let end = (Token::EndComment, Span::from(j..i + d + 2));

        self.cursor = i + d + 2;
        self.mode = Mode::Raw;
        self.trim_next_raw = trim;

        if i == j {
            return Ok(end);
        }
        self.pending = Some(end);
        Ok((Token::Raw, Span::from(i..j)))
    }

    /// Returns the end of the string literal starting at `i`.
    fn scan_string(&self, i: usize, quote: char) -> Result<usize> {
        let mut escaped = false;
        for (d, c) in self.source[i + 1..].char_indices() {
            let j = i + 1 + d;
            match c {
                '\r' | '\n' => {
                    return Err(Error::syntax("undelimited string", self.source, i..j));
                }
                c if c == quote && !escaped => return Ok(j + 1),
                c => escaped = c == '\\' && !escaped,
            }
        }
        Err(Error::syntax(
            "undelimited string",
            self.source,
            i..self.source.len(),
        ))
    }

    /// Returns the end of the run of characters matching `pred` from `i`.
    fn scan_while(&self, i: usize, pred: impl Fn(char) -> bool) -> usize {
        self.source[i..]
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map_or(self.source.len(), |(d, _)| i + d)
    }

    fn err_unclosed(&self, begin: Span, tag: Token) -> Error {
        Error::syntax(format!("unclosed {}", tag.human()), self.source, begin)
    }
}

impl Token {
    pub fn human(&self) -> &'static str {
        match self {
            Self::Raw => "raw template",
            Self::BeginExpr => "begin expression",
            Self::EndExpr => "end expression",
            Self::BeginBlock => "begin block",
            Self::EndBlock => "end block",
            Self::BeginComment => "begin comment",
            Self::EndComment => "end comment",
            Self::Dot => "member access operator",
            Self::Comma => "comma",
            Self::Colon => "colon",
            Self::Pipe => "pipe",
            Self::OpenParen => "open parenthesis",
            Self::CloseParen => "close parenthesis",
            Self::OpenBracket => "open bracket",
            Self::CloseBracket => "close bracket",
            Self::OpenBrace => "open brace",
            Self::CloseBrace => "close brace",
            Self::Plus => "plus",
            Self::Minus => "minus",
            Self::Whitespace => "whitespace",
            Self::Name => "name",
            Self::Index => "index",
            Self::Number => "number",
            Self::String => "string",
        }
    }

    /// Returns the character of a punctuation token.
    pub fn punctuation(&self) -> Option<char> {
        PUNCTUATION
            .iter()
            .find(|(_, tk)| tk == self)
            .map(|(c, _)| *c)
    }

    /// Returns the matching end tag of a begin tag and the other way around.
    fn pair(&self) -> Self {
        match self {
            Self::BeginExpr => Self::EndExpr,
            Self::EndExpr => Self::BeginExpr,
            Self::BeginBlock => Self::EndBlock,
            Self::EndBlock => Self::BeginBlock,
            Self::BeginComment => Self::EndComment,
            Self::EndComment => Self::BeginComment,
            tk => *tk,
        }
    }
}

/// Finds the next begin tag at or after `i`.
///
/// Returns the token, whether it trims, and the span `j..k` of the tag.
fn find_begin_tag(source: &str, i: usize) -> Option<(Token, bool, usize, usize)> {
    let bytes = source.as_bytes();
    let mut from = i;
    while let Some(d) = source[from..].find('{') {
        let j = from + d;
        let tk = match bytes.get(j + 1) {
            Some(b'{') => Token::BeginExpr,
            Some(b'%') => Token::BeginBlock,
            Some(b'#') => Token::BeginComment,
            _ => {
                from = j + 1;
                continue;
            }
        };
        let trim = bytes.get(j + 2) == Some(&b'-');
        return Some((tk, trim, j, j + 2 + usize::from(trim)));
    }
    None
}

fn begin_tag_at(source: &str, i: usize) -> bool {
    matches!(source.as_bytes()[i..], [b'{', b'{' | b'%' | b'#', ..])
}

/// Returns the end tag starting at `i`, whether it trims and where it ends.
fn end_tag_at(source: &str, i: usize) -> Option<(Token, bool, usize)> {
    let rest = &source[i..];
    let (trim, rest) = match rest.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let tk = match rest.as_bytes() {
        [b'}', b'}', ..] => Token::EndExpr,
        [b'%', b'}', ..] => Token::EndBlock,
        [b'#', b'}', ..] => Token::EndComment,
        _ => return None,
    };
    Some((tk, trim, i + 2 + usize::from(trim)))
}

/// Returns the end of the number starting at `i`, digits with an optional
/// fraction and exponent. Underscores may separate digits.
fn scan_number(source: &str, i: usize) -> usize {
    let bytes = source.as_bytes();
    let digits = |mut j: usize| {
        while j < bytes.len() && (bytes[j].is_ascii_digit() || bytes[j] == b'_') {
            j += 1;
        }
        j
    };
    let is_digit = |j: usize| bytes.get(j).map_or(false, u8::is_ascii_digit);

    let mut j = digits(i);
    if bytes.get(j) == Some(&b'.') && is_digit(j + 1) {
        j = digits(j + 1);
    }
    if matches!(bytes.get(j), Some(b'e' | b'E')) {
        let k = match bytes.get(j + 1) {
            Some(b'+' | b'-') => j + 2,
            _ => j + 1,
        };
        if is_digit(k) {
            j = digits(k);
        }
    }
    j
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_empty() {
        let tokens = lex("").unwrap();
        assert_eq!(tokens, []);
    }

    #[test]
    fn lex_raw() {
        let tokens = lex("lorem ipsum").unwrap();
        assert_eq!(tokens, [(Token::Raw, "lorem ipsum")]);
    }

    #[test]
    fn lex_lone_brace_is_raw() {
        let tokens = lex("a { b } c").unwrap();
        assert_eq!(tokens, [(Token::Raw, "a { b } c")]);
    }

    #[test]
    fn lex_begin_expr_trim() {
        let tokens = lex("lorem ipsum \t\n{{-").unwrap();
        assert_eq!(
            tokens,
            [(Token::Raw, "lorem ipsum"), (Token::BeginExpr, "{{-"),]
        );
    }

    #[test]
    fn lex_end_expr_trim() {
        let tokens = lex("lorem {{ ipsum -}} \t\ndolor").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Raw, "lorem "),
                (Token::BeginExpr, "{{"),
                (Token::Whitespace, " "),
                (Token::Name, "ipsum"),
                (Token::Whitespace, " "),
                (Token::EndExpr, "-}}"),
                (Token::Raw, "dolor"),
            ]
        );
    }

    #[test]
    fn lex_require_block() {
        let tokens = lex(r#"{% require themedCSS("layout", 'screen') %}"#).unwrap();
        assert_eq!(
            tokens,
            [
                (Token::BeginBlock, "{%"),
                (Token::Whitespace, " "),
                (Token::Name, "require"),
                (Token::Whitespace, " "),
                (Token::Name, "themedCSS"),
                (Token::OpenParen, "("),
                (Token::String, "\"layout\""),
                (Token::Comma, ","),
                (Token::Whitespace, " "),
                (Token::String, "'screen'"),
                (Token::CloseParen, ")"),
                (Token::Whitespace, " "),
                (Token::EndBlock, "%}"),
            ]
        );
    }

    #[test]
    fn lex_numbers_and_indexes() {
        let tokens = lex("{{ f(1.5, 2e3) ~ items.0.1 }}");
        assert!(tokens.is_err());

        let tokens = lex("{{ f(1.5, 2e3, 10) | x(items.0.1) }}").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::BeginExpr, "{{"),
                (Token::Whitespace, " "),
                (Token::Name, "f"),
                (Token::OpenParen, "("),
                (Token::Number, "1.5"),
                (Token::Comma, ","),
                (Token::Whitespace, " "),
                (Token::Number, "2e3"),
                (Token::Comma, ","),
                (Token::Whitespace, " "),
                (Token::Number, "10"),
                (Token::CloseParen, ")"),
                (Token::Whitespace, " "),
                (Token::Pipe, "|"),
                (Token::Whitespace, " "),
                (Token::Name, "x"),
                (Token::OpenParen, "("),
                (Token::Name, "items"),
                (Token::Dot, "."),
                (Token::Index, "0"),
                (Token::Dot, "."),
                (Token::Index, "1"),
                (Token::CloseParen, ")"),
                (Token::Whitespace, " "),
                (Token::EndExpr, "}}"),
            ]
        );
    }

    #[test]
    fn lex_map_literal_before_end_tag() {
        let tokens = lex("{{ f({'a': 1}) }}{{ {'b': {'c': 2}}}}").unwrap();
        let kinds: Vec<_> = tokens
            .iter()
            .map(|(tk, _)| *tk)
            .filter(|tk| *tk != Token::Whitespace)
            .collect();
        assert_eq!(
            kinds,
            [
                Token::BeginExpr,
                Token::Name,
                Token::OpenParen,
                Token::OpenBrace,
                Token::String,
                Token::Colon,
                Token::Number,
                Token::CloseBrace,
                Token::CloseParen,
                Token::EndExpr,
                Token::BeginExpr,
                Token::OpenBrace,
                Token::String,
                Token::Colon,
                Token::OpenBrace,
                Token::String,
                Token::Colon,
                Token::Number,
                Token::CloseBrace,
                Token::CloseBrace,
                Token::EndExpr,
            ]
        );
    }

    #[test]
    fn lex_multiline_block() {
        let tokens = lex("{% if\n  cond %}").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::BeginBlock, "{%"),
                (Token::Whitespace, " "),
                (Token::Name, "if"),
                (Token::Whitespace, "\n  "),
                (Token::Name, "cond"),
                (Token::Whitespace, " "),
                (Token::EndBlock, "%}"),
            ]
        );
    }

    #[test]
    fn lex_comment() {
        let tokens = lex("lorem ipsum {# anything goes e.g. - # { #}").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Raw, "lorem ipsum "),
                (Token::BeginComment, "{#"),
                (Token::Raw, " anything goes e.g. - # { "),
                (Token::EndComment, "#}"),
            ]
        );
    }

    #[test]
    fn lex_comment_trim() {
        let tokens = lex("a {#- x -#}  b").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Raw, "a"),
                (Token::BeginComment, "{#-"),
                (Token::Raw, " x "),
                (Token::EndComment, "-#}"),
                (Token::Raw, "b"),
            ]
        );
    }

    #[test]
    fn lex_err_unclosed_block() {
        let err = lex("{% if cond {{ x }}").unwrap_err();
        assert_eq!(err.to_string(), "unclosed begin block between bytes 0 and 2");
    }

    #[test]
    fn lex_err_mismatched_end_tag() {
        let err = lex("{{ x %}").unwrap_err();
        assert_eq!(err.to_string(), "unexpected end block between bytes 5 and 7");
    }

    #[test]
    fn lex_err_undelimited_string() {
        let err = lex("{{ 'abc }}").unwrap_err();
        assert_eq!(err.to_string(), "undelimited string between bytes 3 and 10");
    }

    #[track_caller]
    fn lex(source: &str) -> Result<Vec<(Token, &str)>> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        while let Some((tk, sp)) = lexer.lex()? {
            tokens.push((tk, &source[sp]));
        }
        for _ in 0..3 {
            assert!(lexer.lex().unwrap().is_none());
        }
        Ok(tokens)
    }
}
