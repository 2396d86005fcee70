//! Sites configured with relative paths, resolved against the working
//! directory. The working directory is process wide so these tests hold a
//! lock while they change it.

use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use trellis::{Candidates, Config, Engine, Map, TemplateEngine, Value, View};

static WORKING_DIR: Mutex<()> = Mutex::new(());

fn lock() -> MutexGuard<'static, ()> {
    WORKING_DIR.lock().unwrap_or_else(PoisonError::into_inner)
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn relative_config(cache: &Path) -> Config {
    Config {
        base_path: ".".into(),
        cache_dir: Some(cache.to_path_buf()),
        auto_reload: true,
        ..Config::default()
    }
}

#[test]
fn shared_cache_dir_keeps_sites_apart() {
    let _guard = lock();
    let site_a = tempfile::tempdir().unwrap();
    let site_b = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(site_a.path(), "app/templates/Page.twig", "site A");
    write(site_b.path(), "app/templates/Page.twig", "site B");

    env::set_current_dir(site_a.path()).unwrap();
    let engine = Engine::with_config(relative_config(cache.path()));
    let result = engine.load("Page.twig").unwrap().render(()).unwrap();
    assert_eq!(result, "site A");

    env::set_current_dir(site_b.path()).unwrap();
    let engine = Engine::with_config(relative_config(cache.path()));
    let result = engine.load("Page.twig").unwrap().render(()).unwrap();
    assert_eq!(result, "site B");

    env::set_current_dir(env::temp_dir()).unwrap();
}

#[test]
fn direct_path_wins_over_theme_template() {
    let _guard = lock();
    let site = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(site.path(), "Page.twig", "direct file");
    write(site.path(), "app/templates/Page.twig", "themed copy");

    env::set_current_dir(site.path()).unwrap();
    let engine = Engine::with_config(relative_config(cache.path()));
    let mut view = View::new(&engine);
    view.set_template(&Candidates::from("Page.twig")).unwrap();

    let selected = Path::new(view.template().unwrap());
    assert!(selected.is_absolute());
    assert_eq!(selected, fs::canonicalize("Page.twig").unwrap());

    let result = view.render(&Value::None, &Map::new()).unwrap();
    assert_eq!(result, "direct file");

    env::set_current_dir(env::temp_dir()).unwrap();
}
