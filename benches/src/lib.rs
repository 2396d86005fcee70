pub mod context;

use std::fs;

use tempfile::TempDir;
use trellis::{configure, Config, Engine, Services};

/// The page template used by the benchmarks.
pub const PAGE: &str = include_str!("../benchdata/page.twig");

/// A site on disk with the page template in its default theme.
pub struct Site {
    pub root: TempDir,
    pub cache: TempDir,
}

impl Site {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let templates = root.path().join("app/templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("Page.twig"), PAGE).unwrap();
        Self {
            root,
            cache: tempfile::tempdir().unwrap(),
        }
    }

    pub fn config(&self) -> Config {
        Config {
            base_path: self.root.path().to_path_buf(),
            cache_dir: Some(self.cache.path().to_path_buf()),
            ..Config::default()
        }
    }

    /// Returns an engine configured like a site's view layer.
    pub fn engine(&self) -> (Engine, Services) {
        let config = self.config();
        let services = Services::new(&config);
        let mut engine = Engine::with_config(config);
        configure(&mut engine, &services);
        (engine, services)
    }
}

impl Default for Site {
    fn default() -> Self {
        Self::new()
    }
}
