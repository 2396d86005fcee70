//! The asset requirements service behind the `require` tag.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::fmt::escape_html;
use crate::loader::theme_paths;
use crate::tags::{Service, TagArg};
use crate::{Config, Error, Result};

/// Collects the scripts, stylesheets and head tags a page needs.
///
/// Templates add to it with `{% require method(args) %}` and the host
/// injects the result into the rendered page with
/// [`include_in_html`][Requirements::include_in_html].
///
/// ```
/// use trellis::Requirements;
///
/// let requirements = Requirements::default();
/// requirements.css("css/site.css", None);
/// requirements.javascript("js/site.js");
///
/// let html = requirements.include_in_html("<html><head></head><body></body></html>");
/// assert_eq!(
///     html,
///     "<html><head>\
///      <link rel=\"stylesheet\" type=\"text/css\" href=\"css/site.css\" />\n\
///      </head><body>\
///      <script type=\"application/javascript\" src=\"js/site.js\"></script>\n\
///      </body></html>"
/// );
/// ```
#[derive(Debug, Default)]
pub struct Requirements {
    base_path: PathBuf,
    theme_paths: Vec<String>,
    backend: Mutex<Backend>,
}

#[derive(Debug, Default)]
struct Backend {
    javascript: Vec<String>,
    css: Vec<(String, Option<String>)>,
    custom_script: Vec<Snippet>,
    custom_css: Vec<Snippet>,
    head_tags: Vec<Snippet>,
    blocked: BTreeSet<String>,
}

#[derive(Debug)]
struct Snippet {
    id: Option<String>,
    content: String,
}

impl Requirements {
    /// Construct a service that looks up themed files in the given theme
    /// directories, relative to `base_path`.
    pub fn new(base_path: impl Into<PathBuf>, theme_paths: Vec<String>) -> Self {
        Self {
            base_path: base_path.into(),
            theme_paths,
            backend: Mutex::default(),
        }
    }

    /// Construct a service for the configured theme stack.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.base_path,
            theme_paths(&config.themes, &config.default_theme_dirs),
        )
    }

    pub fn javascript(&self, file: &str) {
        let mut b = self.backend();
        if !b.javascript.iter().any(|f| f == file) {
            b.javascript.push(file.to_owned());
        }
    }

    pub fn css(&self, file: &str, media: Option<&str>) {
        let mut b = self.backend();
        let media = media.filter(|m| !m.is_empty()).map(ToOwned::to_owned);
        match b.css.iter_mut().find(|(f, _)| f == file) {
            Some(entry) => entry.1 = media,
            None => b.css.push((file.to_owned(), media)),
        }
    }

    /// Requires `css/{name}.css` from the first theme that has it.
    pub fn themed_css(&self, name: &str, media: Option<&str>) -> Result<()> {
        let file = self.themed_file("css", name, "css")?;
        self.css(&file, media);
        Ok(())
    }

    /// Requires `javascript/{name}.js` from the first theme that has it.
    pub fn themed_javascript(&self, name: &str) -> Result<()> {
        let file = self.themed_file("javascript", name, "js")?;
        self.javascript(&file);
        Ok(())
    }

    pub fn custom_script(&self, script: &str, id: Option<&str>) {
        push_snippet(&mut self.backend().custom_script, script, id);
    }

    pub fn custom_css(&self, css: &str, id: Option<&str>) {
        push_snippet(&mut self.backend().custom_css, css, id);
    }

    pub fn insert_head_tags(&self, html: &str, id: Option<&str>) {
        push_snippet(&mut self.backend().head_tags, html, id);
    }

    /// Excludes a file or snippet id from the output.
    pub fn block(&self, item: &str) {
        self.backend().blocked.insert(item.to_owned());
    }

    pub fn unblock(&self, item: &str) {
        self.backend().blocked.remove(item);
    }

    /// Removes everything, including blocks.
    pub fn clear(&self) {
        *self.backend() = Backend::default();
    }

    /// The required script files that are not blocked, in order.
    pub fn javascript_files(&self) -> Vec<String> {
        let b = self.backend();
        b.javascript
            .iter()
            .filter(|f| !b.blocked.contains(*f))
            .cloned()
            .collect()
    }

    /// The required stylesheets and their media that are not blocked, in
    /// order.
    pub fn css_files(&self) -> Vec<(String, Option<String>)> {
        let b = self.backend();
        b.css
            .iter()
            .filter(|(f, _)| !b.blocked.contains(f))
            .cloned()
            .collect()
    }

    /// Inserts the requirements into an HTML document.
    ///
    /// Stylesheets and head tags go before `</head>` and scripts before
    /// `</body>`. When a closing tag is missing the content is appended.
    pub fn include_in_html(&self, html: &str) -> String {
        let b = self.backend();
        let visible = |s: &&Snippet| s.id.as_ref().map_or(true, |id| !b.blocked.contains(id));

        let mut head = String::new();
        for (file, media) in b.css.iter().filter(|(f, _)| !b.blocked.contains(f)) {
            head.push_str(r#"<link rel="stylesheet" type="text/css" href=""#);
            head.push_str(&escape_html(file));
            if let Some(media) = media {
                head.push_str(r#"" media=""#);
                head.push_str(&escape_html(media));
            }
            head.push_str("\" />\n");
        }
        for css in b.custom_css.iter().filter(visible) {
            head.push_str("<style type=\"text/css\">\n");
            head.push_str(&css.content);
            head.push_str("\n</style>\n");
        }
        for tags in b.head_tags.iter().filter(visible) {
            head.push_str(&tags.content);
            head.push('\n');
        }

        let mut body = String::new();
        for file in b.javascript.iter().filter(|f| !b.blocked.contains(*f)) {
            body.push_str(r#"<script type="application/javascript" src=""#);
            body.push_str(&escape_html(file));
            body.push_str("\"></script>\n");
        }
        for script in b.custom_script.iter().filter(visible) {
            body.push_str("<script type=\"application/javascript\">//<![CDATA[\n");
            body.push_str(&script.content);
            body.push_str("\n//]]></script>\n");
        }

        let html = insert_before(html, "</head>", &head);
        insert_before(&html, "</body>", &body)
    }

    fn themed_file(&self, dir: &str, name: &str, ext: &str) -> Result<String> {
        self.theme_paths
            .iter()
            .map(|theme| format!("{theme}/{dir}/{name}.{ext}"))
            .find(|file| self.base_path.join(file).is_file())
            .ok_or_else(|| {
                Error::custom(format!("themed file `{dir}/{name}.{ext}` not found in any theme"))
            })
    }

    fn backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Service for Requirements {
    fn invoke(&self, method: &str, args: &[TagArg]) -> Result<()> {
        let args = Args { method, args };
        match method.to_ascii_lowercase().as_str() {
            "javascript" => {
                args.arity(1, 1)?;
                self.javascript(args.get(0)?);
            }
            "css" => {
                args.arity(1, 2)?;
                self.css(args.get(0)?, args.opt(1)?);
            }
            "themedcss" => {
                args.arity(1, 2)?;
                self.themed_css(args.get(0)?, args.opt(1)?)?;
            }
            "themedjavascript" => {
                args.arity(1, 1)?;
                self.themed_javascript(args.get(0)?)?;
            }
            "customscript" => {
                args.arity(1, 2)?;
                self.custom_script(args.get(0)?, args.opt(1)?);
            }
            "customcss" => {
                args.arity(1, 2)?;
                self.custom_css(args.get(0)?, args.opt(1)?);
            }
            "insertheadtags" => {
                args.arity(1, 2)?;
                self.insert_head_tags(args.get(0)?, args.opt(1)?);
            }
            "block" => {
                args.arity(1, 1)?;
                self.block(args.get(0)?);
            }
            "unblock" => {
                args.arity(1, 1)?;
                self.unblock(args.get(0)?);
            }
            "clear" => {
                args.arity(0, 0)?;
                self.clear();
            }
            _ => return Err(Error::custom(format!("unknown requirements method `{method}`"))),
        }
        Ok(())
    }
}

struct Args<'a> {
    method: &'a str,
    args: &'a [TagArg],
}

impl<'a> Args<'a> {
    fn arity(&self, min: usize, max: usize) -> Result<()> {
        let found = self.args.len();
        if found < min || found > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(Error::custom(format!(
                "`{}` expected {expected} arguments, found {found}",
                self.method
            )));
        }
        Ok(())
    }

    fn get(&self, i: usize) -> Result<&'a str> {
        self.opt(i)?.ok_or_else(|| {
            Error::custom(format!("`{}` expected argument {}", self.method, i + 1))
        })
    }

    fn opt(&self, i: usize) -> Result<Option<&'a str>> {
        match self.args.get(i) {
            None => Ok(None),
            Some(arg) => match arg.as_str() {
                Some(s) if arg.is_string => Ok(Some(s)),
                _ => Err(Error::custom(format!(
                    "`{}` expected string argument at position {}, found {}",
                    self.method,
                    i + 1,
                    arg.value.human()
                ))),
            },
        }
    }
}

fn push_snippet(snippets: &mut Vec<Snippet>, content: &str, id: Option<&str>) {
    let id = id.filter(|id| !id.is_empty()).map(ToOwned::to_owned);
    if id.is_some() {
        snippets.retain(|s| s.id != id);
    }
    snippets.push(Snippet {
        id,
        content: content.to_owned(),
    });
}

fn insert_before(html: &str, tag: &str, content: &str) -> String {
    if content.is_empty() {
        return html.to_owned();
    }
    match html.rfind(tag) {
        Some(i) => format!("{}{content}{}", &html[..i], &html[i..]),
        None => format!("{html}{content}"),
    }
}
