//! Defines the [`Value`] enum, representing any valid renderable data.

mod from;

use std::borrow::Cow;
pub use std::collections::BTreeMap as Map;
use std::mem;
pub use std::vec::Vec as List;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A value that is either borrowed from the render context or computed.
pub(crate) type ValueCow<'a> = Cow<'a, Value>;

/// Convert a `T` to a `Value`.
///
/// Any type implementing [`serde::Serialize`] can be converted. Unsigned
/// integers that do not fit in an `i64` become floats.
pub fn to_value<T>(value: T) -> Result<Value>
where
    T: Serialize,
{
    Ok(Value::from(serde_json::to_value(value)?))
}

/// Data to be rendered represented as a recursive enum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(List<Value>),
    Map(Map<String, Value>),
}

impl Value {
    /// Whether the value is considered true in a condition.
    ///
    /// `none`, `false`, zero, the empty string, the empty list and the empty
    /// map are false. Everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Returns the string if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map if this is a [`Value::Map`].
    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn human(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(s), Self::Bool(o)) => s == o,
            (Self::Integer(s), Self::Integer(o)) => s == o,
            (Self::Float(s), Self::Float(o)) => s == o,
            (Self::String(s), Self::String(o)) => s == o,
            (Self::List(s), Self::List(o)) => s == o,
            (Self::Map(s), Self::Map(o)) => s == o,
            _ => mem::discriminant(self) == mem::discriminant(other),
        }
    }
}
