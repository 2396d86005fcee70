//! Builtin functions, registered by [`Engine::new`][crate::Engine::new].

use crate::fmt::escape_html;
use crate::{Error, Result, Value};

/// Returns the uppercase equivalent of the string.
pub fn upper(s: String) -> String {
    s.to_uppercase()
}

/// Returns the lowercase equivalent of the string.
pub fn lower(s: String) -> String {
    s.to_lowercase()
}

/// Removes leading and trailing whitespace.
pub fn trim(s: String) -> String {
    s.trim().to_owned()
}

/// Returns the number of characters in a string or items in a list or map.
pub fn length(value: Value) -> Result<i64> {
    let n = match &value {
        Value::None => 0,
        Value::String(s) => s.chars().count(),
        Value::List(l) => l.len(),
        Value::Map(m) => m.len(),
        value => {
            return Err(Error::custom(format!(
                "cannot get the length of {}",
                value.human()
            )))
        }
    };
    Ok(n as i64)
}

/// Returns the default if the value is `none` or an empty string.
pub fn default(value: Value, default: Value) -> Value {
    match value {
        Value::None => default,
        Value::String(s) if s.is_empty() => default,
        value => value,
    }
}

/// Joins the items of a list with an optional separator.
pub fn join(list: Vec<Value>, sep: Option<String>) -> Result<String> {
    let sep = sep.unwrap_or_default();
    let mut items = Vec::with_capacity(list.len());
    for item in list {
        let item = match item {
            Value::None => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s,
            value => {
                return Err(Error::custom(format!("cannot join {}", value.human())));
            }
        };
        items.push(item);
    }
    Ok(items.join(&sep))
}

/// HTML escapes a string, other values are returned unchanged.
pub fn escape(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape_html(&s)),
        value => value,
    }
}
