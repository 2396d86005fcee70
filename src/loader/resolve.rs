use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::loader::{has_extension, ThemeLoader, EXTENSION};

/// One or more template names to try, in order.
///
/// - A name, e.g. `Page` or `App\Pages\Page`. Backslashes are treated as
///   `/` and the `.twig` extension is added. A name that already ends in
///   `.twig` and is an existing file resolves to its absolute path.
/// - A list of candidates, tried depth first.
/// - A typed request. The type is inserted as a directory in front of the
///   last segment of each name at this level, e.g. `App/Page` with the type
///   `Layout` becomes `App/Layout/Page.twig`. Nested lists keep their own
///   type.
///
/// Candidates deserialize from a string, a list or a map with `type` and
/// `templates` keys.
///
/// ```
/// use trellis::Candidates;
///
/// let candidates: Candidates = serde_json::from_str(
///     r#"{"type": "Layout", "templates": ["App/HomePage", "Page"]}"#,
/// )?;
/// assert_eq!(
///     candidates,
///     Candidates::typed("Layout", ["App/HomePage", "Page"]),
/// );
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Candidates {
    Name(String),
    List(Vec<Candidates>),
    Typed {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        templates: Vec<Candidates>,
    },
}

impl Candidates {
    /// A typed request over the given templates.
    pub fn typed<I, T>(kind: impl Into<String>, templates: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Candidates>,
    {
        Self::Typed {
            kind: Some(kind.into()),
            templates: templates.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the type and the entries at this level.
    fn entries(&self) -> (&str, &[Candidates]) {
        match self {
            Self::Name(_) => ("", std::slice::from_ref(self)),
            Self::List(list) => ("", list),
            Self::Typed { kind, templates } => (kind.as_deref().unwrap_or_default(), templates),
        }
    }
}

impl From<&str> for Candidates {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Candidates {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl<T> From<Vec<T>> for Candidates
where
    T: Into<Candidates>,
{
    fn from(list: Vec<T>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

impl<T, const N: usize> From<[T; N]> for Candidates
where
    T: Into<Candidates>,
{
    fn from(list: [T; N]) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

pub(crate) fn resolve(loader: &ThemeLoader, candidates: &Candidates) -> Option<String> {
    let (kind, entries) = candidates.entries();
    for entry in entries {
        let name = match entry {
            Candidates::Name(name) => name,
            nested => {
                if let Some(path) = resolve(loader, nested) {
                    return Some(path);
                }
                continue;
            }
        };

        if has_extension(name) {
            if let Some(path) = direct_path(name) {
                log::trace!("resolved `{name}` as the file {path}");
                return Some(path);
            }
        }

        let path = template_path(name, kind);
        log::trace!("trying template `{path}`");
        if loader.exists(&path) {
            return Some(path);
        }
    }
    None
}

/// Returns the canonical path of an existing file.
fn direct_path(name: &str) -> Option<String> {
    let path = Path::new(name);
    if !path.is_file() {
        return None;
    }
    let path = fs::canonicalize(path).ok()?;
    path.to_str().map(ToOwned::to_owned)
}

/// Builds `{head}/{kind}/{tail}.twig` from a template identifier, skipping
/// empty parts.
fn template_path(name: &str, kind: &str) -> String {
    let name = name.replace('\\', "/");
    let (head, tail) = match name.rsplit_once('/') {
        Some((head, tail)) => (head, tail),
        None => ("", name.as_str()),
    };
    let joined = [head, kind, tail]
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("{joined}.{EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_path_inserts_type_before_tail() {
        assert_eq!(template_path("Page", ""), "Page.twig");
        assert_eq!(template_path("Page", "Layout"), "Layout/Page.twig");
        assert_eq!(template_path("App\\Pages\\Page", ""), "App/Pages/Page.twig");
        assert_eq!(template_path("App\\Pages\\Page", "Includes"), "App/Pages/Includes/Page.twig");
        assert_eq!(template_path("/App/Page", ""), "App/Page.twig");
    }

    #[test]
    fn candidates_deserialize_untagged() {
        let c: Candidates = serde_json::from_str(r#""Page""#).unwrap();
        assert_eq!(c, Candidates::from("Page"));

        let c: Candidates = serde_json::from_str(r#"["A", ["B"]]"#).unwrap();
        assert_eq!(
            c,
            Candidates::List(vec![Candidates::from("A"), Candidates::from(["B"])])
        );

        let c: Candidates = serde_json::from_str(r#"{"templates": ["A"]}"#).unwrap();
        assert_eq!(
            c,
            Candidates::Typed {
                kind: None,
                templates: vec![Candidates::from("A")]
            }
        );
    }

    #[test]
    fn resolve_with_no_dirs_is_none() {
        let loader = ThemeLoader::default();
        assert_eq!(loader.resolve(&Candidates::from(["Page", "Other"])), None);
    }
}
