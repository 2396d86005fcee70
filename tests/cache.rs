use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use trellis::{Config, Engine, ThemeLoader};

fn cache_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for shard in fs::read_dir(dir).unwrap() {
        let shard = shard.unwrap().path();
        for file in fs::read_dir(&shard).unwrap() {
            files.push(file.unwrap().path());
        }
    }
    files
}

fn engine(templates: &Path, cache: &Path, auto_reload: bool) -> Engine {
    let mut engine = Engine::with_config(Config {
        cache_dir: Some(cache.to_path_buf()),
        auto_reload,
        ..Config::default()
    });
    engine.set_loader(ThemeLoader::new([templates]));
    engine
}

/// Rewrites a template and moves its modified time into the future so the
/// change is visible regardless of the file system's time resolution.
fn touch(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    let later = SystemTime::now() + Duration::from_secs(60);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(later)
        .unwrap();
}

#[test]
fn cache_writes_compiled_templates_to_disk() {
    let templates = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    fs::write(templates.path().join("Page.twig"), "Hello {{ name }}").unwrap();

    let engine = engine(templates.path(), cache.path(), true);
    let result = engine
        .load("Page.twig")
        .unwrap()
        .render(serde_json::json!({ "name": "Ann" }))
        .unwrap();
    assert_eq!(result, "Hello Ann");

    let files = cache_files(cache.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extension().unwrap(), "json");
}

#[test]
fn cache_survives_a_new_engine() {
    let templates = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let page = templates.path().join("Page.twig");
    fs::write(&page, "v1").unwrap();

    engine(templates.path(), cache.path(), true)
        .load("Page.twig")
        .unwrap();

    // Without auto reload the stored program is used even though the source
    // changed.
    fs::write(&page, "v2").unwrap();
    let result = engine(templates.path(), cache.path(), false)
        .load("Page.twig")
        .unwrap()
        .render(())
        .unwrap();
    assert_eq!(result, "v1");
}

#[test]
fn cache_auto_reload_recompiles_changed_sources() {
    let templates = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let page = templates.path().join("Page.twig");
    fs::write(&page, "v1").unwrap();

    let engine = engine(templates.path(), cache.path(), true);
    assert_eq!(engine.load("Page.twig").unwrap().render(()).unwrap(), "v1");

    touch(&page, "v2");
    assert_eq!(engine.load("Page.twig").unwrap().render(()).unwrap(), "v2");
}

#[test]
fn cache_without_auto_reload_keeps_memory_entry() {
    let templates = tempfile::tempdir().unwrap();
    let page = templates.path().join("Page.twig");
    fs::write(&page, "v1").unwrap();

    let mut engine = Engine::with_config(Config {
        auto_reload: false,
        ..Config::default()
    });
    engine.set_loader(ThemeLoader::new([templates.path()]));
    assert_eq!(engine.load("Page.twig").unwrap().render(()).unwrap(), "v1");

    touch(&page, "v2");
    assert_eq!(engine.load("Page.twig").unwrap().render(()).unwrap(), "v1");

    engine.flush_cache().unwrap();
    assert_eq!(engine.load("Page.twig").unwrap().render(()).unwrap(), "v2");
}

#[test]
fn cache_flush_empties_the_directory() {
    let templates = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    fs::write(templates.path().join("A.twig"), "a").unwrap();
    fs::write(templates.path().join("B.twig"), "b").unwrap();

    let engine = engine(templates.path(), cache.path(), true);
    engine.load("A.twig").unwrap();
    engine.load("B.twig").unwrap();
    assert_eq!(cache_files(cache.path()).len(), 2);

    engine.flush_cache().unwrap();
    assert!(cache.path().is_dir());
    assert_eq!(fs::read_dir(cache.path()).unwrap().count(), 0);
}

#[test]
fn cache_key_depends_on_registered_tags() {
    let templates = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    fs::write(templates.path().join("Page.twig"), "x").unwrap();

    let mut engine = engine(templates.path(), cache.path(), true);
    engine.load("Page.twig").unwrap();
    engine.add_tag(trellis::tags::RequireTag);
    engine.load("Page.twig").unwrap();
    assert_eq!(cache_files(cache.path()).len(), 2);
}

#[test]
fn cache_compile_error_names_the_template() {
    let templates = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    fs::write(templates.path().join("Broken.twig"), "{% if x %}").unwrap();

    let engine = engine(templates.path(), cache.path(), true);
    let err = engine.load("Broken.twig").unwrap_err();
    assert_eq!(
        err.to_string(),
        "unclosed `if` block between bytes 0 and 10 in `Broken.twig`"
    );
    assert!(fs::read_dir(cache.path()).unwrap().next().is_none());
}
