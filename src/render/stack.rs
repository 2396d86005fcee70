use crate::render::iter::LoopState;
use crate::types::ast;
use crate::value::ValueCow;
use crate::{Error, Map, Result, Value};

/// The variable scopes of a render.
///
/// Lookups walk the stack from the top and stop at the first template
/// boundary. Engine globals are consulted last and are visible everywhere.
#[derive(Debug)]
pub struct Stack<'render> {
    stack: Vec<State<'render>>,
    globals: &'render Map<String, Value>,
    strict: bool,
}

#[derive(Debug)]
pub enum State<'render> {
    /// An entire scope of variables, always a map
    Scope(ValueCow<'render>),

    /// The current state of a loop iteration
    Loop(LoopState<'render>),

    /// Used to represent a template boundary.
    Boundary,
}

impl<'render> Stack<'render> {
    pub fn new(
        context: ValueCow<'render>,
        globals: &'render Map<String, Value>,
        strict: bool,
    ) -> Self {
        Self {
            stack: vec![State::Scope(context)],
            globals,
            strict,
        }
    }

    /// Resolves a variable path.
    ///
    /// An unknown variable or key evaluates to `none`, unless strict
    /// variables are enabled.
    pub fn lookup_var(&self, source: &str, var: &ast::Var) -> Result<ValueCow<'render>> {
        let (first, rest) = match var.path.split_first() {
            Some((ast::Key::Map(first), rest)) => (first, rest),
            _ => return Err(Error::render("expected variable name", source, var.span())),
        };

        let value = match self.lookup_name(&first.name) {
            Some(value) => value,
            None if self.strict => {
                return Err(Error::render("not found in this scope", source, first.span));
            }
            None => return Ok(ValueCow::Owned(Value::None)),
        };

        match value {
            ValueCow::Borrowed(mut v) => {
                for key in rest {
                    match self.index(source, v, key)? {
                        Some(next) => v = next,
                        None => return Ok(ValueCow::Owned(Value::None)),
                    }
                }
                Ok(ValueCow::Borrowed(v))
            }
            // If the value is owned then make sure to only clone the edge
            // value that we lookup.
            ValueCow::Owned(owned) => {
                let mut v: &Value = &owned;
                for key in rest {
                    match self.index(source, v, key)? {
                        Some(next) => v = next,
                        None => return Ok(ValueCow::Owned(Value::None)),
                    }
                }
                Ok(ValueCow::Owned(v.clone()))
            }
        }
    }

    fn lookup_name(&self, name: &str) -> Option<ValueCow<'render>> {
        for state in self.stack.iter().rev() {
            match state {
                State::Scope(ValueCow::Borrowed(scope)) => {
                    let scope: &'render Value = *scope;
                    if let Some(value) = scope.as_map().and_then(|map| map.get(name)) {
                        return Some(ValueCow::Borrowed(value));
                    }
                }
                State::Scope(ValueCow::Owned(scope)) => {
                    if let Some(value) = scope.as_map().and_then(|map| map.get(name)) {
                        return Some(ValueCow::Owned(value.clone()));
                    }
                }
                State::Loop(loop_state) => {
                    if let Some(value) = loop_state.lookup(name) {
                        return Some(value);
                    }
                }
                State::Boundary => {
                    // We've reached the template boundary stop searching
                    break;
                }
            }
        }
        self.globals.get(name).map(ValueCow::Borrowed)
    }

    /// Indexes into a value, `None` means the key does not exist.
    fn index<'a>(
        &self,
        source: &str,
        value: &'a Value,
        key: &ast::Key,
    ) -> Result<Option<&'a Value>> {
        let found = match (value, key) {
            (Value::List(list), ast::Key::List(index)) => list.get(index.value),
            (Value::Map(map), ast::Key::Map(ident)) => map.get(&ident.name),
            (Value::Map(map), ast::Key::List(index)) => map.get(&index.value.to_string()),
            (value, key) if self.strict => {
                return Err(Error::render(
                    format!("cannot index into {}", value.human()),
                    source,
                    key.span(),
                ));
            }
            _ => None,
        };
        if found.is_none() && self.strict {
            return Err(Error::render("not found", source, key.span()));
        }
        Ok(found)
    }

    pub fn push(&mut self, state: State<'render>) {
        self.stack.push(state);
    }

    pub fn last_loop_state_mut(&mut self) -> Option<&mut LoopState<'render>> {
        match self.stack.last_mut() {
            Some(State::Loop(loop_state)) => Some(loop_state),
            _ => None,
        }
    }

    pub fn pop_loop_state(&mut self) {
        if let Some(State::Loop(_)) = self.stack.last() {
            self.stack.pop();
        }
    }

    /// Pops the scope and boundary pushed for an `include ... with`.
    pub fn pop_boundary(&mut self) {
        while let Some(state) = self.stack.pop() {
            if let State::Boundary = state {
                break;
            }
        }
    }
}
