//! Message translation and the `_t` template function.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use crate::{Error, Map, Result, Value};

/// Per-locale message tables with a current locale.
///
/// Messages are looked up in the current locale, then in its language
/// (`en` for `en_US`). Keys are usually dotted, e.g. `Page.TITLE`.
///
/// ```
/// use trellis::{Map, Translator};
///
/// let translator = Translator::new("de_AT");
/// translator.add_toml("de", r#"
///     [Page]
///     GREETING = "Hallo {name}"
/// "#)?;
///
/// let mut injections = Map::new();
/// injections.insert("name".into(), "Ann".into());
/// assert_eq!(translator.translate("Page.GREETING", None, &injections), "Hallo Ann");
/// assert_eq!(translator.translate("Page.MISSING", Some("Default"), &Map::new()), "Default");
/// # Ok::<(), trellis::Error>(())
/// ```
#[derive(Debug)]
pub struct Translator {
    locale: RwLock<String>,
    tables: RwLock<BTreeMap<String, BTreeMap<String, String>>>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new("en_US")
    }
}

impl Translator {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: RwLock::new(locale.into()),
            tables: RwLock::new(BTreeMap::new()),
        }
    }

    /// The current locale.
    pub fn locale(&self) -> String {
        self.locale
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_locale(&self, locale: impl Into<String>) {
        *self.locale.write().unwrap_or_else(PoisonError::into_inner) = locale.into();
    }

    /// Adds messages for a locale, replacing existing keys.
    pub fn add_messages<I, K, V>(&self, locale: &str, messages: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables
            .entry(locale.to_owned())
            .or_default()
            .extend(messages.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Adds messages for a locale from a TOML document.
    ///
    /// Nested tables are flattened into dotted keys.
    pub fn add_toml(&self, locale: &str, s: &str) -> Result<()> {
        let table: toml::Table = toml::from_str(s)?;
        let mut messages = Vec::new();
        flatten("", table, &mut messages);
        self.add_messages(locale, messages);
        Ok(())
    }

    /// Adds messages from a TOML file named after its locale, e.g. `en.toml`.
    pub fn add_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let locale = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::custom(format!("invalid translation file {}", path.display())))?;
        log::debug!("loading translations for `{locale}` from {}", path.display());
        let contents = fs::read_to_string(path)?;
        self.add_toml(locale, &contents)
    }

    /// Translates a key in the current locale.
    ///
    /// Falls back to `default` and then to the key itself. `{name}`
    /// placeholders are replaced with the matching injection.
    pub fn translate(
        &self,
        key: &str,
        default: Option<&str>,
        injections: &Map<String, Value>,
    ) -> String {
        let locale = self.locale();
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let lookup = |locale: &str| tables.get(locale).and_then(|t| t.get(key));
        let message = lookup(&locale)
            .or_else(|| lookup(language(&locale)))
            .map(String::as_str)
            .or(default)
            .unwrap_or(key);
        inject(message, injections)
    }
}

/// Implements `_t(key[, default][, injections])`.
pub(crate) fn call(translator: &Translator, args: &[Value]) -> Result<Value> {
    let (key, rest) = match args {
        [Value::String(key), rest @ ..] => (key, rest),
        [value, ..] => {
            return Err(Error::custom(format!(
                "`_t` expected string key, found {}",
                value.human()
            )))
        }
        [] => return Err(Error::custom("`_t` expected a key")),
    };

    let empty = Map::new();
    let (default, injections) = match rest {
        [] => (None, &empty),
        [Value::String(default)] => (Some(default.as_str()), &empty),
        [Value::Map(injections)] => (None, injections),
        [Value::String(default), Value::Map(injections)] => (Some(default.as_str()), injections),
        [Value::None, Value::Map(injections)] => (None, injections),
        _ => {
            return Err(Error::custom(format!(
                "`_t` expected a default string and an injection map, found {} more arguments",
                rest.len()
            )))
        }
    };

    Ok(Value::String(translator.translate(key, default, injections)))
}

fn language(locale: &str) -> &str {
    locale.split(['_', '-']).next().unwrap_or(locale)
}

fn flatten(prefix: &str, table: toml::Table, out: &mut Vec<(String, String)>) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(table) => flatten(&key, table, out),
            toml::Value::String(s) => out.push((key, s)),
            value => out.push((key, value.to_string())),
        }
    }
}

fn inject(message: &str, injections: &Map<String, Value>) -> String {
    if injections.is_empty() {
        return message.to_owned();
    }
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(i) = rest.find('{') {
        out.push_str(&rest[..i]);
        let after = &rest[i + 1..];
        match after.find('}') {
            Some(j) => {
                let name = &after[..j];
                match injections.get(name).and_then(display) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[i..i + j + 2]),
                }
                rest = &after[j + 1..];
            }
            None => {
                out.push_str(&rest[i..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn display(value: &Value) -> Option<String> {
    match value {
        Value::None => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::List(_) | Value::Map(_) => None,
    }
}
