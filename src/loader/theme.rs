//! Theme identifiers.

/// The theme identifier that expands to the default module directories.
pub const DEFAULT_THEME: &str = "$default";

/// Expands theme identifiers into directories relative to the base path.
///
/// - `$default` expands to each of `default_dirs`.
/// - `/path` is a path relative to the base.
/// - `module:theme` is a theme shipped by a module, `module/themes/theme`.
/// - `name` is a theme in the site's `themes/` directory.
///
/// Duplicates are dropped, the first occurrence wins.
pub fn theme_paths(themes: &[String], default_dirs: &[String]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let mut push = |path: String| {
        if !path.is_empty() && !paths.contains(&path) {
            paths.push(path);
        }
    };

    for theme in themes {
        if theme == DEFAULT_THEME {
            for dir in default_dirs {
                push(dir.trim_matches('/').to_owned());
            }
        } else if let Some(path) = theme.strip_prefix('/') {
            push(path.trim_end_matches('/').to_owned());
        } else if let Some((module, name)) = theme.split_once(':') {
            push(format!("{}/themes/{name}", module.trim_end_matches('/')));
        } else {
            push(format!("themes/{theme}"));
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_paths_expands_identifiers() {
        let themes = [
            "simple".to_owned(),
            "/app/custom/".to_owned(),
            "vendor/blog:dark".to_owned(),
            "$default".to_owned(),
            "simple".to_owned(),
        ];
        let defaults = ["app".to_owned(), "vendor/admin".to_owned()];
        assert_eq!(
            theme_paths(&themes, &defaults),
            [
                "themes/simple",
                "app/custom",
                "vendor/blog/themes/dark",
                "app",
                "vendor/admin",
            ]
        );
    }
}
