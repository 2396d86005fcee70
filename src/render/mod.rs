//! Execute a compiled program against a context.

mod core;
mod iter;
mod stack;

use std::io;
use std::sync::Arc;

use crate::fmt::IoWriter;
use crate::render::core::RendererImpl;
use crate::render::stack::Stack;
use crate::types::program::Template;
use crate::value::ValueCow;
use crate::{Engine, Error, Result, Value};

pub(crate) fn to_string(
    engine: &Engine,
    template: Arc<Template>,
    name: Option<&str>,
    context: &Value,
) -> Result<String> {
    let mut s = String::with_capacity(template.source.len());
    renderer(engine, context).render(&mut s, template, name)?;
    Ok(s)
}

pub(crate) fn to_writer<W>(
    engine: &Engine,
    template: Arc<Template>,
    name: Option<&str>,
    context: &Value,
    writer: W,
) -> Result<()>
where
    W: io::Write,
{
    let mut w = IoWriter::new(writer);
    renderer(engine, context)
        .render(&mut w, template, name)
        .map_err(|err| w.take_err().map_or(err, Error::from))
}

fn renderer<'render>(engine: &'render Engine, context: &'render Value) -> RendererImpl<'render> {
    let strict = engine.config.strict_variables;
    RendererImpl {
        engine,
        stack: Stack::new(ValueCow::Borrowed(context), &engine.globals, strict),
    }
}
