//! Engine configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Settings for the engine, the theme loader and the compiled template cache.
///
/// Every field has a default so a configuration file only needs to mention
/// what it changes.
///
/// ```
/// use trellis::Config;
///
/// let config = Config::from_toml_str(r#"
///     base_url = "https://example.com"
///     themes = ["simple", "$default"]
///     autoescape = true
/// "#)?;
/// assert_eq!(config.themes, ["simple", "$default"]);
/// assert!(config.auto_reload);
/// # Ok::<(), trellis::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The root of the site. Theme and module directories are relative to it.
    pub base_path: PathBuf,

    /// The public base URL, used by the `base_tag` tag.
    pub base_url: String,

    /// The theme stack in lookup order.
    ///
    /// `$default` expands to [`default_theme_dirs`][Config::default_theme_dirs],
    /// `/path` is a path relative to the base, `module:theme` is a theme
    /// shipped by a module and anything else is a theme under `themes/`.
    pub themes: Vec<String>,

    /// The module directories that make up the `$default` theme.
    pub default_theme_dirs: Vec<String>,

    /// Where compiled templates are stored, disabled when `None`.
    pub cache_dir: Option<PathBuf>,

    /// Recompile templates when their source changes.
    pub auto_reload: bool,

    /// HTML escape printed strings.
    pub autoescape: bool,

    /// Fail on unknown variables instead of printing nothing.
    pub strict_variables: bool,

    /// The locale used by `_t`.
    pub locale: String,

    /// The maximum number of nested includes.
    pub max_include_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            base_url: String::from("/"),
            themes: vec![String::from("$default")],
            default_theme_dirs: vec![String::from("app")],
            cache_dir: None,
            auto_reload: true,
            autoescape: false,
            strict_variables: false,
            locale: String::from("en_US"),
            max_include_depth: 64,
        }
    }
}

impl Config {
    /// Parses a configuration from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading configuration from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// The default cache directory, `twig` inside the system temporary
    /// directory.
    pub fn default_cache_dir() -> PathBuf {
        std::env::temp_dir().join("twig")
    }
}
