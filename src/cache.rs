//! Compiled template cache.
//!
//! Programs are kept in memory keyed by their source path and, when a cache
//! directory is configured, stored on disk as JSON so that they survive
//! restarts. With auto reload enabled an entry is only used while it is at
//! least as new as its source.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use crate::loader::{self, Source};
use crate::types::program::Template;
use crate::Result;

#[derive(Debug, Default)]
pub(crate) struct Cache {
    dir: Option<PathBuf>,
    auto_reload: bool,
    memory: Mutex<HashMap<PathBuf, Entry>>,
    inline: Mutex<HashMap<String, Arc<Template>>>,
}

#[derive(Debug)]
struct Entry {
    template: Arc<Template>,
    /// The modified time of the source the entry was compiled from.
    modified: Option<SystemTime>,
}

impl Cache {
    pub fn new(dir: Option<PathBuf>, auto_reload: bool) -> Self {
        Self {
            dir,
            auto_reload,
            ..Self::default()
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Returns the cached program for the source or compiles it.
    ///
    /// `fingerprint` identifies everything besides the source that affects
    /// compilation, e.g. the registered tags.
    pub fn get_or_compile<F>(
        &self,
        source: Source,
        fingerprint: &str,
        compile: F,
    ) -> Result<Arc<Template>>
    where
        F: FnOnce(String) -> Result<Template>,
    {
        if let Some(entry) = lock(&self.memory).get(&source.path) {
            if !self.auto_reload || is_fresh(entry.modified, source.modified) {
                log::debug!("memory cache hit for {}", source.path.display());
                return Ok(Arc::clone(&entry.template));
            }
        }

        let file = self
            .dir
            .as_deref()
            .map(|dir| cache_file(dir, &source.path, fingerprint));

        let template = match file.as_deref().and_then(|f| self.read_file(f, source.modified)) {
            Some(template) => template,
            None => {
                log::debug!("compiling {}", source.path.display());
                let template = compile(source.text)?;
                if let Some(file) = &file {
                    if let Err(err) = write_file(file, &template) {
                        log::warn!("failed to write cache file {}: {err}", file.display());
                    }
                }
                template
            }
        };

        let template = Arc::new(template);
        lock(&self.memory).insert(
            source.path,
            Entry {
                template: Arc::clone(&template),
                modified: source.modified,
            },
        );
        Ok(template)
    }

    /// Returns the cached program for an inline template or compiles it.
    ///
    /// Entries are keyed by the full source and are only dropped by
    /// [`clear_memory`][Cache::clear_memory] or [`flush`][Cache::flush].
    pub fn get_or_compile_inline<F>(&self, source: &str, compile: F) -> Result<Arc<Template>>
    where
        F: FnOnce(String) -> Result<Template>,
    {
        if let Some(template) = lock(&self.inline).get(source) {
            return Ok(Arc::clone(template));
        }
        let template = Arc::new(compile(source.to_owned())?);
        lock(&self.inline).insert(source.to_owned(), Arc::clone(&template));
        Ok(template)
    }

    /// Drops the programs held in memory.
    pub fn clear_memory(&self) {
        lock(&self.memory).clear();
        lock(&self.inline).clear();
    }

    /// Drops every cached program, in memory and on disk.
    pub fn flush(&self) -> Result<()> {
        self.clear_memory();
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        if !dir.is_dir() {
            return Ok(());
        }
        log::debug!("flushing template cache {}", dir.display());
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn read_file(&self, file: &Path, source_modified: Option<SystemTime>) -> Option<Template> {
        if self.auto_reload && !is_fresh(loader::modified(file), source_modified) {
            return None;
        }
        let data = fs::read(file).ok()?;
        match serde_json::from_slice(&data) {
            Ok(template) => {
                log::debug!("disk cache hit {}", file.display());
                Some(template)
            }
            Err(err) => {
                log::debug!("ignoring unreadable cache file {}: {err}", file.display());
                None
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_fresh(cached: Option<SystemTime>, source: Option<SystemTime>) -> bool {
    match (cached, source) {
        (Some(cached), Some(source)) => cached >= source,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}

/// The cache file for a source, `{dir}/{hh}/{hash}.json`.
fn cache_file(dir: &Path, path: &Path, fingerprint: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update([0]);
    hasher.update(fingerprint.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    dir.join(&hex[..2]).join(format!("{hex}.json"))
}

/// Writes the program next to its final location and renames it into place
/// so readers never observe a partial file.
fn write_file(file: &Path, template: &Template) -> Result<()> {
    let data = serde_json::to_vec(template)?;
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = file.with_extension(format!("json.{}.tmp", process::id()));
    fs::write(&tmp, data)?;
    if let Err(err) = fs::rename(&tmp, file) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn cache_file_is_sharded_by_hash_prefix() {
        let file = cache_file(Path::new("/tmp/twig"), Path::new("Page.twig"), "/");
        let name = file.file_name().unwrap().to_str().unwrap();
        let shard = file.parent().unwrap().file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64 + ".json".len());
        assert_eq!(&name[..2], shard);
        assert!(file.starts_with("/tmp/twig"));
    }

    #[test]
    fn cache_file_depends_on_fingerprint() {
        let a = cache_file(Path::new("c"), Path::new("Page.twig"), "/ base_tag require");
        let b = cache_file(Path::new("c"), Path::new("Page.twig"), "/site/ base_tag require");
        assert_ne!(a, b);
    }

    #[test]
    fn is_fresh_compares_modified_times() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let later = t + Duration::from_secs(1);
        assert!(is_fresh(Some(t), Some(t)));
        assert!(is_fresh(Some(later), Some(t)));
        assert!(!is_fresh(Some(t), Some(later)));
        assert!(!is_fresh(None, Some(t)));
        assert!(is_fresh(None, None));
    }

    #[test]
    fn inline_programs_are_kept_until_flush() {
        let cache = Cache::new(None, true);
        let compile = |source: String| -> Result<Template> {
            Ok(Template {
                source,
                instrs: Vec::new(),
            })
        };
        let a = cache.get_or_compile_inline("x", compile).unwrap();
        let b = cache.get_or_compile_inline("x", compile).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        cache.flush().unwrap();
        let c = cache.get_or_compile_inline("x", compile).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
