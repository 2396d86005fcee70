//! Locate template sources in the theme directories.

mod resolve;
mod theme;

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

pub use crate::loader::resolve::Candidates;
pub use crate::loader::theme::{theme_paths, DEFAULT_THEME};
use crate::{Config, Error, Result};

/// The extension of template files.
pub const EXTENSION: &str = "twig";

/// Finds templates in an ordered list of directories.
///
/// A template name is a `/` separated path relative to one of the
/// directories, e.g. `Layout/Page.twig`. The first directory that contains
/// the file wins.
#[derive(Debug, Clone, Default)]
pub struct ThemeLoader {
    dirs: Vec<PathBuf>,
}

/// A template source read from disk.
#[derive(Debug)]
pub(crate) struct Source {
    pub path: PathBuf,
    pub text: String,
    pub modified: Option<SystemTime>,
}

impl ThemeLoader {
    /// Construct a loader over the given directories, searched in order.
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Construct a loader from the configured theme stack.
    ///
    /// Each theme contributes its `templates` directory, if there is one.
    pub fn from_config(config: &Config) -> Self {
        let dirs = theme_paths(&config.themes, &config.default_theme_dirs)
            .into_iter()
            .map(|path| config.base_path.join(path).join("templates"))
            .filter(|dir| dir.is_dir())
            .collect::<Vec<_>>();
        log::debug!("template directories: {dirs:?}");
        Self { dirs }
    }

    /// The directories searched, in order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Whether a template with the given name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Returns the full path of the template with the given name.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let rel = relative(name)?;
        self.dirs
            .iter()
            .map(|dir| dir.join(&rel))
            .find(|path| path.is_file())
    }

    /// Reads the source of the template with the given name.
    pub fn load(&self, name: &str) -> Result<String> {
        Ok(self.read(name)?.text)
    }

    /// Returns the first candidate that names an existing template.
    ///
    /// See [`Candidates`] for the lookup rules. Not finding anything is not
    /// an error.
    pub fn resolve(&self, candidates: &Candidates) -> Option<String> {
        resolve::resolve(self, candidates)
    }

    /// Like [`find`][ThemeLoader::find] but also accepts the path of an
    /// existing `.twig` file, which [`resolve`][ThemeLoader::resolve] may
    /// return as is.
    pub(crate) fn locate(&self, name: &str) -> Option<PathBuf> {
        self.find(name).or_else(|| {
            let path = Path::new(name);
            (has_extension(name) && path.is_file()).then(|| path.to_path_buf())
        })
    }

    /// Reads a template source. The returned path is canonical, so it
    /// identifies the file regardless of the working directory.
    pub(crate) fn read(&self, name: &str) -> Result<Source> {
        let path = self.locate(name).ok_or_else(|| Error::not_found(name))?;
        let path = fs::canonicalize(path)?;
        log::debug!("loading template `{name}` from {}", path.display());
        let text = fs::read_to_string(&path)?;
        let modified = modified(&path);
        Ok(Source {
            path,
            text,
            modified,
        })
    }
}

/// Whether the name carries the template extension.
pub(crate) fn has_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map_or(false, |ext| ext == EXTENSION)
}

pub(crate) fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Converts a template name to a relative path, rejecting names that could
/// escape the template directories.
fn relative(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}
