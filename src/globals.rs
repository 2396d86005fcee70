//! Template global providers.

use crate::functions::{self, FunctionArgs, FunctionFn, FunctionReturn};
use crate::{Function, Result, Value};

/// A source of functions and values available to every template.
///
/// Each entry a provider registers becomes a template function. When the
/// entry can be called without arguments it is also called once during
/// [`configure`][crate::configure] and the result is exposed as a global
/// variable of the same name.
///
/// ```
/// use trellis::{Engine, GlobalProvider, GlobalRegistry};
///
/// struct Site;
///
/// impl GlobalProvider for Site {
///     fn provide(&self, registry: &mut GlobalRegistry) {
///         registry.add("site_name", || "Example");
///         registry.add("greeting", |name: String| format!("Hi {name}"));
///     }
/// }
///
/// let mut engine = Engine::new();
/// engine.add_global_provider(&Site);
/// let result = engine
///     .compile("{{ site_name }} / {{ site_name() }} / {{ greeting('Ann') }}")?
///     .render(())?;
/// assert_eq!(result, "Example / Example / Hi Ann");
/// # Ok::<(), trellis::Error>(())
/// ```
pub trait GlobalProvider {
    fn provide(&self, registry: &mut GlobalRegistry);
}

/// Collects the entries of a [`GlobalProvider`].
#[derive(Default)]
pub struct GlobalRegistry {
    entries: Vec<(String, Box<FunctionFn>)>,
}

impl GlobalRegistry {
    /// Registers a typed function, see [`Function`].
    pub fn add<F, R, A>(&mut self, name: impl Into<String>, f: F)
    where
        F: Function<R, A> + Send + Sync + 'static,
        R: FunctionReturn,
        A: FunctionArgs,
    {
        self.entries.push((name.into(), functions::new(f)));
    }

    /// Registers a function that receives all arguments as a slice.
    pub fn add_variadic<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.entries.push((name.into(), functions::variadic(f)));
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Box<FunctionFn>)> {
        self.entries
    }
}

/// Evaluates a provider entry without arguments.
///
/// Returns `None` when the entry requires arguments, in which case it is
/// only usable as a function.
pub(crate) fn probe(name: &str, f: &FunctionFn) -> Option<Value> {
    let no_args: &[Value] = &[];
    match f(no_args) {
        Ok(value) => Some(value),
        Err(err) if err.is_missing_args() => None,
        Err(err) => {
            log::warn!("global `{name}` failed without arguments: {err}");
            None
        }
    }
}
