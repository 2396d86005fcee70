//! The host facing view: engine configuration and template selection.

use std::sync::Arc;

use crate::i18n::{self, Translator};
use crate::tags::{BaseTag, RequireTag, Service};
use crate::{Candidates, Config, Engine, Error, GlobalProvider, Map, Requirements, Result, Value};

/// The host objects an engine is wired to.
pub struct Services {
    /// Called into by `{% require %}`.
    pub requirements: Arc<Requirements>,

    /// Backs the `_t` function.
    pub translator: Arc<Translator>,

    /// Registered as template functions and globals.
    pub providers: Vec<Box<dyn GlobalProvider>>,
}

impl Services {
    /// Construct services for the configured site with no global providers.
    pub fn new(config: &Config) -> Self {
        Self {
            requirements: Arc::new(Requirements::from_config(config)),
            translator: Arc::new(Translator::new(config.locale.clone())),
            providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl GlobalProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

/// Configures an engine for use as a site's view layer.
///
/// - Compiled templates are cached in the configured cache directory, or in
///   [`Config::default_cache_dir`] when none is set.
/// - Every global provider entry becomes a function, and a global when it
///   can be called without arguments.
/// - The `require` and `base_tag` tags are registered.
/// - `_t` is registered, backed by the translator.
/// - The requirements service is registered for `require`.
///
/// Auto reload and autoescape are taken from the engine's [`Config`].
pub fn configure(engine: &mut Engine, services: &Services) {
    let cache_dir = engine
        .config()
        .cache_dir
        .clone()
        .unwrap_or_else(Config::default_cache_dir);
    engine.set_cache_dir(Some(cache_dir));

    for provider in &services.providers {
        engine.add_global_provider(provider.as_ref());
    }

    let base_url = engine.config().base_url.clone();
    engine.add_tag(RequireTag);
    engine.add_tag(BaseTag::new(base_url));

    let translator = Arc::clone(&services.translator);
    engine.add_variadic_function("_t", move |args| i18n::call(&translator, args));

    let requirements: Arc<dyn Service> = services.requirements.clone();
    engine.add_service(RequireTag::SERVICE, requirements);
    log::debug!("configured view engine");
}

/// The operations a host view needs from a template engine.
pub trait TemplateEngine {
    /// Selects the template to render from the candidates.
    ///
    /// Fails when no candidate resolves, the current selection is kept.
    fn set_template(&mut self, candidates: &Candidates) -> Result<()>;

    /// Whether any of the candidates resolves to a template.
    fn has_template(&self, candidates: &Candidates) -> bool;

    /// Renders the selected template.
    ///
    /// The model is available as `model`, the overlay entries as top level
    /// variables.
    fn render(&self, model: &Value, overlay: &Map<String, Value>) -> Result<String>;

    /// Compiles and renders an inline template in the same context as
    /// [`render`][TemplateEngine::render]. With `cache` set the compiled
    /// program is kept for the next call with the same source.
    ///
    /// Cached programs stay in memory until the cache is flushed, so only
    /// set `cache` for sources from a fixed set.
    fn render_string(
        &self,
        source: &str,
        model: &Value,
        overlay: &Map<String, Value>,
        cache: bool,
    ) -> Result<String>;
}

/// A [`TemplateEngine`] backed by an [`Engine`].
///
/// ```no_run
/// use trellis::{configure, Candidates, Config, Engine, Map, Services, TemplateEngine, View};
///
/// let config = Config::from_file("trellis.toml")?;
/// let services = Services::new(&config);
/// let mut engine = Engine::with_config(config);
/// configure(&mut engine, &services);
///
/// let mut view = View::new(&engine);
/// view.set_template(&Candidates::typed("Layout", ["App/HomePage", "Page"]))?;
/// let html = view.render(&trellis::to_value(["a", "b"])?, &Map::new())?;
/// let html = services.requirements.include_in_html(&html);
/// # Ok::<(), trellis::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct View<'engine> {
    engine: &'engine Engine,
    template: Option<String>,
}

impl<'engine> View<'engine> {
    pub fn new(engine: &'engine Engine) -> Self {
        Self {
            engine,
            template: None,
        }
    }

    /// The name of the selected template.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }
}

impl TemplateEngine for View<'_> {
    fn set_template(&mut self, candidates: &Candidates) -> Result<()> {
        match self.engine.resolve(candidates) {
            Some(name) => {
                log::debug!("selected template `{name}`");
                self.template = Some(name);
                Ok(())
            }
            None => {
                let names = serde_json::to_string(candidates)?;
                Err(Error::not_found(names))
            }
        }
    }

    fn has_template(&self, candidates: &Candidates) -> bool {
        self.engine.has_template(candidates)
    }

    fn render(&self, model: &Value, overlay: &Map<String, Value>) -> Result<String> {
        let name = self
            .template
            .as_deref()
            .ok_or_else(|| Error::custom("no template selected"))?;
        self.engine
            .load(name)?
            .render_value(&context(model, overlay))
    }

    fn render_string(
        &self,
        source: &str,
        model: &Value,
        overlay: &Map<String, Value>,
        cache: bool,
    ) -> Result<String> {
        let template = if cache {
            self.engine.compile_cached(source)?
        } else {
            self.engine.compile(source)?
        };
        template.render_value(&context(model, overlay))
    }
}

fn context(model: &Value, overlay: &Map<String, Value>) -> Value {
    let mut context = overlay.clone();
    context.insert(String::from("model"), model.clone());
    Value::Map(context)
}
