use std::cmp::max;
use std::fmt;
use std::io;

use crate::types::span::Span;

/// An error that can occur during template compilation, loading or rendering.
///
/// Errors that point at a location in a template carry the template source
/// so that they can be pretty printed. Use the alternate formatting flag
/// (`{:#}`) to render the offending line with an underline.
pub struct Error {
    kind: ErrorKind,
    span: Option<(String, Span)>,
    name: Option<String>,
}

/// The kind of an [`Error`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The template could not be parsed.
    #[error("{0}")]
    Syntax(String),

    /// The template failed during rendering.
    #[error("{0}")]
    Render(String),

    /// A template could not be found.
    #[error("template `{0}` not found")]
    NotFound(String),

    /// Nested includes went deeper than allowed.
    #[error("reached maximum include depth ({0})")]
    MaxIncludeDepth(usize),

    /// An error raised by a function, service or provider.
    #[error("{0}")]
    Custom(String),

    /// Reading a template or the cache failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A value could not be converted or a cached program could not be read.
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// Writing rendered output failed.
    #[error("format error")]
    Fmt(#[from] fmt::Error),
}

impl Error {
    /// Construct a new error with a custom message.
    ///
    /// This is the error to return from functions, global providers and host
    /// services.
    pub fn custom(msg: impl fmt::Display) -> Self {
        Self::from_kind(ErrorKind::Custom(msg.to_string()))
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the name of the template this error occurred in, if known.
    pub fn template_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn syntax(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::from_kind(ErrorKind::Syntax(msg.into())).with_span(source, span)
    }

    pub(crate) fn render(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::from_kind(ErrorKind::Render(msg.into())).with_span(source, span)
    }

    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::NotFound(name.into()))
    }

    pub(crate) fn max_include_depth(max: usize) -> Self {
        Self::from_kind(ErrorKind::MaxIncludeDepth(max))
    }

    /// Attaches a source location unless the error already has one.
    pub(crate) fn with_span(mut self, source: &str, span: impl Into<Span>) -> Self {
        if self.span.is_none() && !source.is_empty() {
            self.span = Some((source.to_owned(), span.into()));
        }
        self
    }

    /// Attaches a template name unless the error already has one.
    pub(crate) fn with_template_name(mut self, name: impl Into<String>) -> Self {
        if self.name.is_none() {
            self.name = Some(name.into());
        }
        self
    }

    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            span: None,
            name: None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::from_kind(ErrorKind::Io(err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::from_kind(ErrorKind::Config(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::from_kind(ErrorKind::Serde(err))
    }
}

impl From<fmt::Error> for Error {
    fn from(err: fmt::Error) -> Self {
        Self::from_kind(ErrorKind::Fmt(err))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(err),
            ErrorKind::Config(err) => Some(err),
            ErrorKind::Serde(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => fmt_pretty(&self.kind, self.name.as_deref(), source, *span, f),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => {
                if f.alternate() {
                    fmt_pretty(&self.kind, self.name.as_deref(), source, *span, f)
                } else {
                    write!(f, "{} between bytes {} and {}", self.kind, span.m, span.n)?;
                    if let Some(name) = &self.name {
                        write!(f, " in `{name}`")?;
                    }
                    Ok(())
                }
            }
            None => match &self.name {
                Some(name) => write!(f, "{} in `{name}`", self.kind),
                None => write!(f, "{}", self.kind),
            },
        }
    }
}

fn fmt_pretty(
    msg: &ErrorKind,
    name: Option<&str>,
    source: &str,
    span: Span,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let lines: Vec<_> = source.split_terminator('\n').collect();
    let (line, col) = to_line_col(&lines, span.m);
    let width = max(1, width(&source[span]));
    let code = lines
        .get(line)
        .or_else(|| lines.last())
        .copied()
        .unwrap_or_default();

    let num = (line + 1).to_string();
    let pad = num.len();
    let pipe = "|";
    let underline = "^".repeat(width);

    if let Some(name) = name {
        write!(f, "\n {0:pad$}--> {name}:{num}:{col}", "", col = col + 1)?;
    }

    write!(
        f,
        "\n \
        {0:pad$} {pipe}\n \
        {num:>} {pipe} {code}\n \
        {0:pad$} {pipe} {underline:>width$} {msg}\n",
        "",
        pad = pad,
        pipe = pipe,
        num = num,
        code = code,
        underline = underline,
        width = col + width,
        msg = msg
    )
}

fn to_line_col(lines: &[&str], offset: usize) -> (usize, usize) {
    let mut n = 0;
    for (i, line) in lines.iter().enumerate() {
        let len = line.len() + 1;
        if n + len > offset {
            return (i, width(&line[..offset - n]));
        }
        n += len;
    }
    (
        lines.len().saturating_sub(1),
        lines.last().map(|l| width(l)).unwrap_or(0),
    )
}

#[cfg(feature = "unicode")]
fn width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(not(feature = "unicode"))]
fn width(s: &str) -> usize {
    s.chars().count()
}
