//! Defines a compiled [`Template`] which is a sequence of [`Instr`] that can be
//! executed by the renderer.

use serde::{Deserialize, Serialize};

use crate::tags::Invoke;
use crate::types::ast;
use crate::types::span::Span;
use crate::Value;

pub const FIXME: usize = !0;

#[derive(Debug, Serialize, Deserialize)]
pub struct Template {
    pub source: String,
    pub instrs: Vec<Instr>,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum Instr {
    /// Jump to an instruction
    Jump(usize),

    /// Jump to the instruction if the current expression is true
    JumpIfTrue(usize),

    /// Jump to the instruction if the current expression is false
    JumpIfFalse(usize),

    /// Emit the current expression using the engine formatter
    Emit(Span),

    /// Emit the current expression without escaping
    EmitSafe(Span),

    /// Emit raw template
    EmitRaw(Span),

    /// Emit static text produced by a tag
    EmitText(String),

    /// Call a method on a host service
    Invoke(Invoke, Span),

    /// Start a loop over the current expression
    LoopStart(ast::LoopVars, Span),

    /// Advance and jump to the start of the loop
    LoopNext(usize),

    /// Render a template
    Include(ast::String),

    /// Render a template with the current expression
    IncludeWith(ast::String),

    /// Lookup a variable and push it onto the expression stack
    ExprStart(ast::Var),

    /// Push a literal onto the expression stack
    ExprStartLit(Value),

    /// Pop the given number of arguments and call the function
    Call(ast::Ident, usize),

    /// Pop the given number of values and push them as a list
    MakeList(usize),

    /// Pop one value per key and push them as a map
    MakeMap(Vec<String>),
}
