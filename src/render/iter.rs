use std::collections::btree_map;
use std::{slice, vec};

use crate::types::ast;
use crate::types::span::Span;
use crate::value::ValueCow;
use crate::{Error, Map, Result, Value};

/// The name of the variable exposing loop metadata.
pub const LOOP: &str = "loop";

/// The state of a `for` loop.
///
/// Iterating a list with a single variable binds each item, iterating a map
/// with a single variable binds each value. With two variables the key is the
/// list index or the map key.
#[derive(Debug)]
pub struct LoopState<'render> {
    vars: ast::LoopVars,
    iter: LoopIter<'render>,
    length: usize,
    /// The number of items yielded so far.
    index: usize,
    current: Option<(Value, ValueCow<'render>)>,
}

#[derive(Debug)]
enum LoopIter<'render> {
    ListBorrowed(slice::Iter<'render, Value>),
    ListOwned(vec::IntoIter<Value>),
    MapBorrowed(btree_map::Iter<'render, String, Value>),
    MapOwned(btree_map::IntoIter<String, Value>),
}

impl<'render> LoopState<'render> {
    pub fn new(
        source: &str,
        vars: &ast::LoopVars,
        iterable: ValueCow<'render>,
        span: Span,
    ) -> Result<Self> {
        let (iter, length) = match iterable {
            ValueCow::Borrowed(Value::List(list)) => {
                (LoopIter::ListBorrowed(list.iter()), list.len())
            }
            ValueCow::Borrowed(Value::Map(map)) => (LoopIter::MapBorrowed(map.iter()), map.len()),
            ValueCow::Owned(Value::List(list)) => {
                let n = list.len();
                (LoopIter::ListOwned(list.into_iter()), n)
            }
            ValueCow::Owned(Value::Map(map)) => {
                let n = map.len();
                (LoopIter::MapOwned(map.into_iter()), n)
            }
            // Twig skips loops over nothing.
            ValueCow::Borrowed(Value::None) | ValueCow::Owned(Value::None) => {
                (LoopIter::ListOwned(Vec::new().into_iter()), 0)
            }
            value => {
                return Err(Error::render(
                    format!(
                        "expected iterable, but expression evaluated to {}",
                        value.human()
                    ),
                    source,
                    span,
                ));
            }
        };

        Ok(Self {
            vars: vars.clone(),
            iter,
            length,
            index: 0,
            current: None,
        })
    }

    /// Advances to the next item, returns `None` when exhausted.
    pub fn iterate(&mut self) -> Option<()> {
        let i = self.index;
        let next = match &mut self.iter {
            LoopIter::ListBorrowed(iter) => (Value::from(i), ValueCow::Borrowed(iter.next()?)),
            LoopIter::ListOwned(iter) => (Value::from(i), ValueCow::Owned(iter.next()?)),
            LoopIter::MapBorrowed(iter) => {
                let (k, v) = iter.next()?;
                (Value::String(k.clone()), ValueCow::Borrowed(v))
            }
            LoopIter::MapOwned(iter) => {
                let (k, v) = iter.next()?;
                (Value::String(k), ValueCow::Owned(v))
            }
        };
        self.current = Some(next);
        self.index += 1;
        Some(())
    }

    /// Returns the value bound to `name` in the current iteration, if any.
    pub fn lookup(&self, name: &str) -> Option<ValueCow<'render>> {
        if name == LOOP {
            return Some(ValueCow::Owned(self.loop_value()));
        }
        let (key, value) = self.current.as_ref()?;
        match &self.vars {
            ast::LoopVars::Item(item) if item.name == name => Some(value.clone()),
            ast::LoopVars::KeyValue(kv) if kv.key.name == name => {
                Some(ValueCow::Owned(key.clone()))
            }
            ast::LoopVars::KeyValue(kv) if kv.value.name == name => Some(value.clone()),
            _ => None,
        }
    }

    fn loop_value(&self) -> Value {
        let index0 = self.index.saturating_sub(1);
        let mut map = Map::new();
        map.insert(String::from("index"), Value::from(self.index));
        map.insert(String::from("index0"), Value::from(index0));
        map.insert(String::from("first"), Value::Bool(self.index == 1));
        map.insert(String::from("last"), Value::Bool(self.index == self.length));
        map.insert(String::from("length"), Value::from(self.length));
        Value::Map(map)
    }
}
