//! Functions callable from templates.
//!
//! A function is called directly, `name(a, b)`, or as a filter,
//! `a | name(b)`, in which case the piped value is the first argument.

mod args;
#[cfg(feature = "builtins")]
pub mod builtins;

use crate::{Error, Result, Value};

pub(crate) type FunctionFn =
    dyn Fn(&[Value]) -> std::result::Result<Value, CallError> + Send + Sync + 'static;

/// Why a function call failed.
#[doc(hidden)]
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The function was called with the wrong number of arguments.
    #[error("{}", arity_message(.min, .max, .found))]
    Arity { min: usize, max: usize, found: usize },

    /// An argument had the wrong type.
    #[error("function expected {expected} argument at position {position}, found {found}")]
    Arg {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// The function itself returned an error.
    #[error("{0}")]
    Failed(Error),
}

pub(crate) fn new<F, R, A>(f: F) -> Box<FunctionFn>
where
    F: Function<R, A> + Send + Sync + 'static,
    R: FunctionReturn,
    A: FunctionArgs,
{
    Box::new(move |values: &[Value]| {
        let args = A::from_values(values)?;
        let result = Function::call(&f, args);
        FunctionReturn::to_value(result).map_err(CallError::Failed)
    })
}

pub(crate) fn variadic<F>(f: F) -> Box<FunctionFn>
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
{
    Box::new(move |values: &[Value]| f(values).map_err(CallError::Failed))
}

/// Represents any function that can be registered with the engine.
///
/// This trait is used by [`Engine::add_function`][crate::Engine::add_function]
/// to abstract over closures and functions of different arity and argument
/// types. The renderer checks the number and the type of the arguments when
/// the function is called.
///
/// [`Function`] is implemented for functions that take up to four of the
/// following owned types as arguments.
/// - [`bool`]
/// - [`i64`]
/// - [`f64`], integers are converted
/// - [`String`]
/// - [`Vec<Value>`]
/// - [`Map<String, Value>`][crate::Map]
/// - [`Value`], any value
/// - [`Option<T>`] of any of the above, trailing optional arguments may be
///   left out
///
/// And return any of the following types.
/// - `R` where `R` implements `Into<Value>`
/// - `Result<R>` where `R` implements `Into<Value>`
///
/// # Examples
///
/// ```
/// use trellis::Engine;
///
/// let mut engine = Engine::new();
/// engine.add_function("repeat", |s: String, n: i64| s.repeat(n as usize));
/// engine.add_function("greet", |name: Option<String>| {
///     format!("Hello {}!", name.as_deref().unwrap_or("World"))
/// });
///
/// let result = engine
///     .compile("{{ repeat('ab', 2) }} {{ greet() }} {{ 'Ann' | greet }}")?
///     .render(())?;
/// assert_eq!(result, "abab Hello World! Hello Ann!");
/// # Ok::<(), trellis::Error>(())
/// ```
pub trait Function<R, A> {
    #[doc(hidden)]
    fn call(&self, args: A) -> R;
}

#[doc(hidden)]
pub trait FunctionArgs: Sized {
    fn from_values(values: &[Value]) -> std::result::Result<Self, CallError>;
}

#[doc(hidden)]
pub trait FunctionArg: Sized {
    /// Whether the argument may be left out.
    const OPTIONAL: bool = false;

    fn from_value(v: Value) -> args::Result<Self>;
}

#[doc(hidden)]
pub trait FunctionReturn {
    fn to_value(self) -> Result<Value>;
}

macro_rules! impl_function {
    ($($arg:ident $idx:tt),*) => {
        impl<Func, R, $($arg,)*> Function<R, ($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> R,
            R: FunctionReturn,
            $($arg: FunctionArg,)*
        {
            #[allow(non_snake_case)]
            fn call(&self, ($($arg,)*): ($($arg,)*)) -> R {
                self($($arg),*)
            }
        }

        impl<$($arg,)*> FunctionArgs for ($($arg,)*)
        where
            $($arg: FunctionArg,)*
        {
            fn from_values(values: &[Value]) -> std::result::Result<Self, CallError> {
                let optional: &[bool] = &[$($arg::OPTIONAL),*];
                check_arity(optional, values.len())?;
                Ok(($(get_arg::<$arg>(values, $idx)?,)*))
            }
        }
    };
}

impl_function!();
impl_function!(A 0);
impl_function!(A 0, B 1);
impl_function!(A 0, B 1, C 2);
impl_function!(A 0, B 1, C 2, D 3);

fn check_arity(optional: &[bool], found: usize) -> std::result::Result<(), CallError> {
    let max = optional.len();
    let min = optional.iter().rposition(|o| !o).map_or(0, |i| i + 1);
    if found < min || found > max {
        return Err(CallError::Arity { min, max, found });
    }
    Ok(())
}

fn get_arg<T>(values: &[Value], i: usize) -> std::result::Result<T, CallError>
where
    T: FunctionArg,
{
    let value = values.get(i).cloned().unwrap_or_default();
    T::from_value(value).map_err(|err| CallError::Arg {
        position: i + 1,
        expected: err.expected,
        found: err.found,
    })
}

fn arity_message(min: &usize, max: &usize, found: &usize) -> String {
    let s = |n: &usize| if *n == 1 { "" } else { "s" };
    if min == max {
        format!("function expected {min} argument{}, found {found}", s(min))
    } else {
        format!("function expected {min} to {max} arguments, found {found}")
    }
}

impl<T> FunctionReturn for T
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        Ok(self.into())
    }
}

impl<T> FunctionReturn for Result<T>
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        self.map(Into::into)
    }
}

impl CallError {
    /// Whether the call failed only because arguments were missing.
    pub(crate) fn is_missing_args(&self) -> bool {
        matches!(self, Self::Arity { min, found, .. } if found < min)
    }
}
