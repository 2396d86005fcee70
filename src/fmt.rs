//! Printing rendered values.
//!
//! The renderer writes into any [`std::fmt::Write`], a [`String`] or an
//! [`IoWriter`] around the caller's [`std::io::Write`].

use std::fmt::{self, Write};
use std::io;

use crate::Value;

/// Adapts an [`io::Write`] for the renderer, keeping the I/O error that
/// interrupted it.
pub(crate) struct IoWriter<W> {
    inner: W,
    err: Option<io::Error>,
}

impl<W> IoWriter<W>
where
    W: io::Write,
{
    pub fn new(inner: W) -> Self {
        Self { inner, err: None }
    }

    pub fn take_err(&mut self) -> Option<io::Error> {
        self.err.take()
    }
}

impl<W> Write for IoWriter<W>
where
    W: io::Write,
{
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.inner.write_all(s.as_bytes()).map_err(|err| {
            self.err = Some(err);
            fmt::Error
        })
    }
}

/// Why a value could not be printed.
pub(crate) enum FormatError {
    Unprintable(&'static str),
    Fmt(fmt::Error),
}

impl From<fmt::Error> for FormatError {
    fn from(err: fmt::Error) -> Self {
        Self::Fmt(err)
    }
}

/// Prints a scalar value, HTML escaping strings when `escape` is set.
///
/// `none` prints nothing, booleans and numbers use their [`Display`]
/// form. Lists and maps cannot be printed.
///
/// [`Display`]: std::fmt::Display
pub(crate) fn print(out: &mut dyn Write, value: &Value, escape: bool) -> Result<(), FormatError> {
    match value {
        Value::None => {}
        Value::Bool(b) => write!(out, "{b}")?,
        Value::Integer(n) => write!(out, "{n}")?,
        Value::Float(n) => write!(out, "{n}")?,
        Value::String(s) if escape => out.write_str(&escape_html(s))?,
        Value::String(s) => out.write_str(s)?,
        value => return Err(FormatError::Unprintable(value.human())),
    }
    Ok(())
}

/// Escapes the characters that are significant in HTML text and attributes.
///
/// ```
/// assert_eq!(
///     trellis::escape_html(r#"<a href="?a=1&b='2'">"#),
///     "&lt;a href=&quot;?a=1&amp;b=&#x27;2&#x27;&quot;&gt;",
/// );
/// ```
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
