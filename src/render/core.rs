use std::fmt::Write;
use std::sync::Arc;

use crate::fmt::{self, FormatError};
use crate::functions::CallError;
use crate::render::iter::LoopState;
use crate::render::stack::{Stack, State};
use crate::types::ast;
use crate::types::program::{Instr, Template};
use crate::types::span::Span;
use crate::value::ValueCow;
use crate::{Engine, Error, List, Map, Result, Value};

pub(crate) struct RendererImpl<'render> {
    pub(crate) engine: &'render Engine,
    pub(crate) stack: Stack<'render>,
}

enum RenderState {
    Done,
    Include { name: ast::String },
    IncludeWith { name: ast::String, globals: Value },
}

struct Frame {
    template: Arc<Template>,
    name: Option<String>,
    pc: usize,
    has_scope: bool,
}

impl<'render> RendererImpl<'render> {
    pub(crate) fn render(
        mut self,
        out: &mut dyn Write,
        template: Arc<Template>,
        name: Option<&str>,
    ) -> Result<()> {
        let mut templates = vec![Frame {
            template,
            name: name.map(ToOwned::to_owned),
            pc: 0,
            has_scope: false,
        }];

        let max_include_depth = self.engine.config.max_include_depth;

        while let Some(frame) = templates.last_mut() {
            let with_name = |e: Error, name: &Option<String>| match name {
                Some(s) => e.with_template_name(s.clone()),
                None => e,
            };

            let t = Arc::clone(&frame.template);
            let state = self
                .render_one(out, &t, &mut frame.pc)
                .map_err(|e| with_name(e, &frame.name))?;

            match state {
                RenderState::Done => {
                    if frame.has_scope {
                        self.stack.pop_boundary();
                    }
                    templates.pop();
                }
                RenderState::Include { name } => {
                    let template = self
                        .get_template(&t.source, &name)
                        .map_err(|e| with_name(e, &frame.name))?;
                    templates.push(Frame {
                        template,
                        name: Some(name.name),
                        pc: 0,
                        has_scope: false,
                    });
                }
                RenderState::IncludeWith { name, globals } => {
                    let template = self
                        .get_template(&t.source, &name)
                        .map_err(|e| with_name(e, &frame.name))?;
                    self.stack.push(State::Boundary);
                    self.stack.push(State::Scope(ValueCow::Owned(globals)));
                    templates.push(Frame {
                        template,
                        name: Some(name.name),
                        pc: 0,
                        has_scope: true,
                    });
                }
            }
            // The root template is not an include.
            if templates.len() > max_include_depth + 1 {
                return Err(Error::max_include_depth(max_include_depth));
            }
        }

        Ok(())
    }

    fn render_one(
        &mut self,
        out: &mut dyn Write,
        t: &Template,
        pc: &mut usize,
    ) -> Result<RenderState> {
        // The expressions that we are building
        let mut exprs: Vec<ValueCow<'render>> = Vec::new();

        while let Some(instr) = t.instrs.get(*pc) {
            match instr {
                Instr::Jump(j) => {
                    *pc = *j;
                    continue;
                }

                Instr::JumpIfTrue(j) => {
                    if pop_expr(&mut exprs).is_truthy() {
                        *pc = *j;
                        continue;
                    }
                }

                Instr::JumpIfFalse(j) => {
                    if !pop_expr(&mut exprs).is_truthy() {
                        *pc = *j;
                        continue;
                    }
                }

                Instr::Emit(span) => {
                    let value = pop_expr(&mut exprs);
                    let escape = self.engine.config.autoescape;
                    fmt::print(out, &value, escape)
                        .map_err(|err| format_error(err, &t.source, *span))?;
                }

                Instr::EmitSafe(span) => {
                    let value = pop_expr(&mut exprs);
                    fmt::print(out, &value, false)
                        .map_err(|err| format_error(err, &t.source, *span))?;
                }

                Instr::EmitRaw(span) => {
                    out.write_str(&t.source.as_str()[*span])?;
                }

                Instr::EmitText(text) => {
                    out.write_str(text)?;
                }

                Instr::Invoke(invoke, span) => {
                    let service = self.engine.services.get(&invoke.service).ok_or_else(|| {
                        Error::render(
                            format!("unknown service `{}`", invoke.service),
                            &t.source,
                            *span,
                        )
                    })?;
                    log::trace!(
                        "invoking {}.{} from line {}",
                        invoke.service,
                        invoke.method,
                        invoke.line
                    );
                    service
                        .invoke(&invoke.method, &invoke.args)
                        .map_err(|err| err.with_span(&t.source, *span))?;
                }

                Instr::LoopStart(vars, span) => {
                    let iterable = pop_expr(&mut exprs);
                    self.stack
                        .push(State::Loop(LoopState::new(&t.source, vars, iterable, *span)?));
                }

                Instr::LoopNext(j) => {
                    let more = self
                        .stack
                        .last_loop_state_mut()
                        .and_then(|loop_state| loop_state.iterate());
                    if more.is_none() {
                        self.stack.pop_loop_state();
                        *pc = *j;
                        continue;
                    }
                }

                Instr::Include(name) => {
                    *pc += 1;
                    return Ok(RenderState::Include { name: name.clone() });
                }

                Instr::IncludeWith(name) => {
                    *pc += 1;
                    let globals = pop_expr(&mut exprs).into_owned();
                    if !matches!(globals, Value::Map(_)) {
                        return Err(Error::render(
                            format!(
                                "expected map for include variables, but expression evaluated to {}",
                                globals.human()
                            ),
                            &t.source,
                            name.span,
                        ));
                    }
                    return Ok(RenderState::IncludeWith {
                        name: name.clone(),
                        globals,
                    });
                }

                Instr::ExprStart(var) => {
                    let value = self.stack.lookup_var(&t.source, var)?;
                    exprs.push(value);
                }

                Instr::ExprStartLit(value) => {
                    exprs.push(ValueCow::Owned(value.clone()));
                }

                Instr::Call(name, argc) => {
                    let args: Vec<Value> = split_off(&mut exprs, *argc)
                        .into_iter()
                        .map(ValueCow::into_owned)
                        .collect();
                    let value = self.call(&t.source, name, &args)?;
                    exprs.push(ValueCow::Owned(value));
                }

                Instr::MakeList(n) => {
                    let list: List<Value> = split_off(&mut exprs, *n)
                        .into_iter()
                        .map(ValueCow::into_owned)
                        .collect();
                    exprs.push(ValueCow::Owned(Value::List(list)));
                }

                Instr::MakeMap(keys) => {
                    let values = split_off(&mut exprs, keys.len());
                    let map: Map<String, Value> = keys
                        .iter()
                        .cloned()
                        .zip(values.into_iter().map(ValueCow::into_owned))
                        .collect();
                    exprs.push(ValueCow::Owned(Value::Map(map)));
                }
            }
            *pc += 1;
        }

        debug_assert!(exprs.is_empty());
        Ok(RenderState::Done)
    }

    fn call(&self, source: &str, name: &ast::Ident, args: &[Value]) -> Result<Value> {
        let func = self.engine.functions.get(&name.name).ok_or_else(|| {
            Error::render(format!("unknown function `{}`", name.name), source, name.span)
        })?;
        func(args).map_err(|err| match err {
            CallError::Failed(err) => err.with_span(source, name.span),
            err => Error::render(err.to_string(), source, name.span),
        })
    }

    fn get_template(&self, source: &str, name: &ast::String) -> Result<Arc<Template>> {
        self.engine
            .load_program(&name.name)
            .map_err(|err| err.with_span(source, name.span))
    }
}

fn pop_expr<'a>(exprs: &mut Vec<ValueCow<'a>>) -> ValueCow<'a> {
    exprs.pop().unwrap_or(ValueCow::Owned(Value::None))
}

fn split_off<'a>(exprs: &mut Vec<ValueCow<'a>>, n: usize) -> Vec<ValueCow<'a>> {
    let at = exprs.len().saturating_sub(n);
    exprs.split_off(at)
}

fn format_error(err: FormatError, source: &str, span: Span) -> Error {
    match err {
        FormatError::Unprintable(human) => Error::render(
            format!("expected printable value, but expression evaluated to {human}"),
            source,
            span,
        ),
        FormatError::Fmt(err) => Error::from(err),
    }
}
