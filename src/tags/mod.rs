//! Custom block tags.
//!
//! A tag is a `{% name ... %}` block whose syntax is not built into the
//! parser. The engine hands the [`TokenStream`] to the registered
//! [`TagParser`] right after the tag name, and the parser consumes
//! everything up to and including the end of the block. The resulting
//! [`Node`] is either static text or a deferred call on a host [`Service`].

mod base_tag;
mod require;

use serde::{Deserialize, Serialize};

pub use crate::compile::stream::{Token, TokenKind, TokenStream};
pub use crate::tags::base_tag::{base_tag, BaseTag};
pub use crate::tags::require::RequireTag;
use crate::{Result, Value};

/// Parses the body of a custom tag.
pub trait TagParser: Send + Sync {
    /// The name that introduces the tag, e.g. `require`.
    fn tag(&self) -> &str;

    /// Parses the rest of the block.
    ///
    /// `token` is the tag name token. The stream is positioned right after it
    /// and the implementation must consume the closing
    /// [`TokenKind::BlockEnd`].
    fn parse(&self, token: &Token, stream: &mut TokenStream<'_>) -> Result<Node>;
}

/// A host object that custom tags can call into when a template renders.
pub trait Service: Send + Sync {
    fn invoke(&self, method: &str, args: &[TagArg]) -> Result<()>;
}

/// The result of parsing a custom tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Text emitted verbatim, never escaped.
    Text(String),
    /// A method call on a named service, performed each time the template
    /// renders. Emits nothing.
    Invoke(Invoke),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoke {
    pub service: String,
    pub method: String,
    pub args: Vec<TagArg>,
    /// The line the tag appeared on.
    pub line: usize,
}

/// A literal tag argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagArg {
    pub value: Value,
    /// Whether the argument was written as a string literal.
    pub is_string: bool,
}

impl TagArg {
    pub fn string(s: impl Into<String>) -> Self {
        Self {
            value: Value::String(s.into()),
            is_string: true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}
