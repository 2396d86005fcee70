//! Twig flavoured templates for a themed CMS view layer.
//!
//! # Features
//!
//! ### Syntax
//!
//! - Expressions: `{{ page.title }}`
//! - Filters and functions: `{{ page.title | upper }}`, `{{ _t('Nav.HOME') }}`
//! - Conditionals: `{% if page.menu %} ... {% elseif page.parent %} ... {% endif %}`
//! - Loops: `{% for item in menu %} {{ loop.index }} {% endfor %}`
//! - Nested templates: `{% include "Includes/Footer.twig" with {year: 2024} %}`
//! - Comments and whitespace control: `{# note #}`, `{{- value -}}`
//! - Custom tags: `{% base_tag %}`, `{% require css("css/site.css") %}`
//!
//! ### Engine
//!
//! - Templates are looked up in the `templates` directories of a theme stack
//! - Compiled templates are cached in memory and optionally on disk
//! - Render using any [`serde`] serializable value
//! - Custom tag parsers, functions, globals and host services
//!
//! # Getting started
//!
//! The entry point is the [`Engine`]. It holds the configuration, the
//! registered functions, tags and services, and the compiled template cache.
//!
//! ```
//! let engine = trellis::Engine::new();
//! let result = engine
//!     .compile("Hello {{ user.name | upper }}!")?
//!     .render(serde_json::json!({ "user": { "name": "Ann" } }))?;
//! assert_eq!(result, "Hello ANN!");
//! # Ok::<(), trellis::Error>(())
//! ```
//!
//! A site usually builds the engine from a [`Config`] and wires it to its
//! host services with [`configure`]. Templates are then selected with a
//! [`View`] using [`Candidates`].
//!
//! ```no_run
//! use trellis::{configure, Candidates, Config, Engine, Map, Services, TemplateEngine, View};
//!
//! let config = Config::from_file("trellis.toml")?;
//! let services = Services::new(&config);
//! let mut engine = Engine::with_config(config);
//! configure(&mut engine, &services);
//!
//! let mut view = View::new(&engine);
//! view.set_template(&Candidates::from(["App/Pages/HomePage", "Page"]))?;
//! let html = view.render(&trellis::Value::None, &Map::new())?;
//! # Ok::<(), trellis::Error>(())
//! ```

mod cache;
mod compile;
mod config;
mod error;
mod fmt;
pub mod functions;
mod globals;
mod i18n;
mod loader;
mod render;
mod requirements;
pub mod tags;
mod types;
mod value;
mod view;

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub use crate::config::Config;
pub use crate::error::{Error, ErrorKind};
pub use crate::fmt::escape_html;
pub use crate::functions::Function;
pub use crate::globals::{GlobalProvider, GlobalRegistry};
pub use crate::i18n::Translator;
pub use crate::loader::{theme_paths, Candidates, ThemeLoader, DEFAULT_THEME};
pub use crate::requirements::Requirements;
pub use crate::types::span::Span;
pub use crate::value::{to_value, List, Map, Value};
pub use crate::view::{configure, Services, TemplateEngine, View};

use crate::cache::Cache;
use crate::functions::{FunctionArgs, FunctionFn, FunctionReturn};
use crate::tags::{Service, TagParser};
use crate::types::program;

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The compilation and rendering engine.
pub struct Engine {
    pub(crate) config: Config,
    pub(crate) loader: ThemeLoader,
    pub(crate) cache: Cache,
    pub(crate) functions: BTreeMap<String, Box<FunctionFn>>,
    pub(crate) globals: Map<String, Value>,
    pub(crate) tags: BTreeMap<String, Box<dyn TagParser>>,
    pub(crate) services: BTreeMap<String, Arc<dyn Service>>,
    pub(crate) templates: BTreeMap<String, Arc<program::Template>>,
}

/// A compiled template.
#[derive(Clone)]
pub struct Template<'engine> {
    engine: &'engine Engine,
    template: Arc<program::Template>,
    name: Option<String>,
}

impl Default for Engine {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct a new engine with the default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Construct a new engine with the given configuration.
    ///
    /// The template directories are taken from the configured theme stack,
    /// see [`ThemeLoader::from_config`].
    pub fn with_config(config: Config) -> Self {
        let mut engine = Self {
            loader: ThemeLoader::from_config(&config),
            cache: Cache::new(config.cache_dir.clone(), config.auto_reload),
            config,
            functions: BTreeMap::new(),
            globals: Map::new(),
            tags: BTreeMap::new(),
            services: BTreeMap::new(),
            templates: BTreeMap::new(),
        };
        #[cfg(feature = "builtins")]
        {
            use crate::functions::builtins;
            engine.add_function("upper", builtins::upper);
            engine.add_function("lower", builtins::lower);
            engine.add_function("trim", builtins::trim);
            engine.add_function("length", builtins::length);
            engine.add_function("default", builtins::default);
            engine.add_function("join", builtins::join);
            engine.add_function("escape", builtins::escape);
            engine.add_function("e", builtins::escape);
        }
        engine
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the template loader.
    #[inline]
    pub fn loader(&self) -> &ThemeLoader {
        &self.loader
    }

    /// Replace the template loader.
    pub fn set_loader(&mut self, loader: ThemeLoader) {
        self.loader = loader;
        self.cache.clear_memory();
    }

    /// Set the directory compiled templates are stored in, `None` keeps them
    /// in memory only.
    pub fn set_cache_dir(&mut self, dir: Option<PathBuf>) {
        if self.cache.dir() != dir.as_deref() {
            self.cache = Cache::new(dir.clone(), self.config.auto_reload);
        }
        self.config.cache_dir = dir;
    }

    /// Add a function that can be called from templates.
    ///
    /// See the [`Function`] trait for the supported signatures.
    #[inline]
    pub fn add_function<F, R, A>(&mut self, name: impl Into<String>, f: F)
    where
        F: Function<R, A> + Send + Sync + 'static,
        R: FunctionReturn,
        A: FunctionArgs,
    {
        self.functions.insert(name.into(), functions::new(f));
    }

    /// Add a function that receives its arguments as a slice.
    ///
    /// ```
    /// use trellis::{Engine, Value};
    ///
    /// let mut engine = Engine::new();
    /// engine.add_variadic_function("count", |args| Ok(Value::from(args.len())));
    /// let result = engine.compile("{{ count(1, 2, 3) }}")?.render(())?;
    /// assert_eq!(result, "3");
    /// # Ok::<(), trellis::Error>(())
    /// ```
    #[inline]
    pub fn add_variadic_function<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), functions::variadic(f));
    }

    /// Add a global variable, visible in every template.
    #[inline]
    pub fn add_global(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals.insert(name.into(), value.into());
    }

    /// Register the entries of a global provider.
    ///
    /// Each entry becomes a function. Entries that can be called without
    /// arguments are also evaluated now and exposed as globals.
    pub fn add_global_provider<P>(&mut self, provider: &P)
    where
        P: GlobalProvider + ?Sized,
    {
        let mut registry = GlobalRegistry::default();
        provider.provide(&mut registry);
        for (name, f) in registry.into_entries() {
            if let Some(value) = globals::probe(&name, &f) {
                self.globals.insert(name.clone(), value);
            }
            self.functions.insert(name, f);
        }
    }

    /// Register a custom tag parser.
    ///
    /// Tags named like a built in block are ignored.
    pub fn add_tag<T>(&mut self, parser: T)
    where
        T: TagParser + 'static,
    {
        let name = parser.tag().to_owned();
        if compile::BUILTIN_TAGS.contains(&name.as_str()) {
            log::warn!("ignoring custom tag `{name}`, it is a built in block");
            return;
        }
        self.tags.insert(name, Box::new(parser));
        self.cache.clear_memory();
    }

    /// Register a host service that custom tags can invoke.
    #[inline]
    pub fn add_service(&mut self, name: impl Into<String>, service: Arc<dyn Service>) {
        self.services.insert(name.into(), service);
    }

    /// Compile a template and store it under the given name.
    ///
    /// Named templates take priority over templates on disk, both for
    /// [`load`][Engine::load] and for `include`.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        let template = compile::template(source.into(), &self.tags)
            .map_err(|err| err.with_template_name(name.clone()))?;
        self.templates.insert(name, Arc::new(template));
        Ok(())
    }

    /// Lookup a template added with [`add_template`][Engine::add_template].
    #[inline]
    pub fn get_template(&self, name: &str) -> Option<Template<'_>> {
        self.templates.get(name).map(|template| Template {
            engine: self,
            template: Arc::clone(template),
            name: Some(name.to_owned()),
        })
    }

    /// Compile a template without storing it.
    pub fn compile(&self, source: impl Into<String>) -> Result<Template<'_>> {
        let template = compile::template(source.into(), &self.tags)?;
        Ok(Template {
            engine: self,
            template: Arc::new(template),
            name: None,
        })
    }

    /// Compile a template, reusing the program from an earlier call with the
    /// same source.
    ///
    /// Programs are kept until [`flush_cache`][Engine::flush_cache].
    pub fn compile_cached(&self, source: &str) -> Result<Template<'_>> {
        let template = self
            .cache
            .get_or_compile_inline(source, |s| compile::template(s, &self.tags))?;
        Ok(Template {
            engine: self,
            template,
            name: None,
        })
    }

    /// Load a template by name from the engine or the template directories.
    pub fn load(&self, name: &str) -> Result<Template<'_>> {
        let template = self.load_program(name)?;
        Ok(Template {
            engine: self,
            template,
            name: Some(name.to_owned()),
        })
    }

    /// Returns the first candidate that names an existing template.
    #[inline]
    pub fn resolve(&self, candidates: &Candidates) -> Option<String> {
        self.loader.resolve(candidates)
    }

    /// Whether any candidate names an existing template.
    #[inline]
    pub fn has_template(&self, candidates: &Candidates) -> bool {
        self.resolve(candidates).is_some()
    }

    /// Drop every compiled template from the cache, in memory and on disk.
    pub fn flush_cache(&self) -> Result<()> {
        self.cache.flush()
    }

    pub(crate) fn load_program(&self, name: &str) -> Result<Arc<program::Template>> {
        if let Some(template) = self.templates.get(name) {
            return Ok(Arc::clone(template));
        }
        let source = self.loader.read(name)?;
        self.cache
            .get_or_compile(source, &self.fingerprint(), |s| {
                compile::template(s, &self.tags)
            })
            .map_err(|err| err.with_template_name(name))
    }

    /// Identifies the settings that change how a template compiles.
    fn fingerprint(&self) -> String {
        let mut s = self.config.base_url.clone();
        for tag in self.tags.keys() {
            s.push(' ');
            s.push_str(tag);
        }
        s
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("loader", &self.loader)
            .field("functions", &self.functions.keys())
            .field("globals", &self.globals)
            .field("tags", &self.tags.keys())
            .field("services", &self.services.keys())
            .field("templates", &self.templates.keys())
            .finish_non_exhaustive()
    }
}

impl<'engine> Template<'engine> {
    /// Render the template to a string using the provided value.
    #[inline]
    pub fn render<S>(&self, ctx: S) -> Result<String>
    where
        S: serde::Serialize,
    {
        self.render_value(&to_value(ctx)?)
    }

    /// Render the template to a string using a [`Value`] as the context.
    #[inline]
    pub fn render_value(&self, ctx: &Value) -> Result<String> {
        render::to_string(
            self.engine,
            Arc::clone(&self.template),
            self.name.as_deref(),
            ctx,
        )
    }

    /// Render the template to a writer using the provided value.
    #[inline]
    pub fn render_to_writer<W, S>(&self, writer: W, ctx: S) -> Result<()>
    where
        W: io::Write,
        S: serde::Serialize,
    {
        render::to_writer(
            self.engine,
            Arc::clone(&self.template),
            self.name.as_deref(),
            &to_value(ctx)?,
            writer,
        )
    }

    /// Returns the template name, if it was loaded by name.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the original template source.
    #[inline]
    pub fn source(&self) -> &str {
        &self.template.source
    }
}

impl std::fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
