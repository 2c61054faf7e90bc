use std::fmt;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::form::Mutators;

/// The engine's mutators with an array field's name already applied.
///
/// The typed methods cover the standard array operations; [`call`] reaches
/// any other mutator the engine installs.
///
/// [`call`]: ArrayMutators::call
#[derive(Clone)]
pub struct ArrayMutators {
    name: String,
    mutators: Mutators,
}

impl ArrayMutators {
    /// Curry `mutators` with `name`.
    ///
    /// Fails unless the engine provides at least `push` and `pop`.
    pub fn new(name: &str, mutators: Mutators) -> Result<Self> {
        if !mutators.contains_key("push") || !mutators.contains_key("pop") {
            return Err(Error::MissingArrayMutators {
                name: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            mutators,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of every mutator the engine provides.
    pub fn available(&self) -> impl Iterator<Item = &str> {
        self.mutators.keys().map(String::as_str)
    }

    /// Call any engine mutator on this array.
    pub fn call(&self, mutator: &str, args: &[Value]) -> Result<Option<Value>> {
        let f = self.mutators.get(mutator).ok_or_else(|| Error::UnknownMutator {
            mutator: mutator.to_string(),
        })?;
        debug!(field = %self.name, mutator, "calling array mutator");
        Ok(f(&self.name, args))
    }

    /// Append `value`.
    pub fn push(&self, value: Value) -> Result<()> {
        self.call("push", &[value]).map(drop)
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.call("pop", &[])
    }

    /// Insert `value` at `index`.
    pub fn insert(&self, index: usize, value: Value) -> Result<()> {
        self.call("insert", &[json!(index), value]).map(drop)
    }

    /// Remove and return the item at `index`.
    pub fn remove(&self, index: usize) -> Result<Option<Value>> {
        self.call("remove", &[json!(index)])
    }

    /// Swap the items at `a` and `b`.
    pub fn swap(&self, a: usize, b: usize) -> Result<()> {
        self.call("swap", &[json!(a), json!(b)]).map(drop)
    }

    /// Move the item at `from` to `to`.
    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        self.call("move", &[json!(from), json!(to)]).map(drop)
    }

    /// Replace the item at `index`.
    pub fn update(&self, index: usize, value: Value) -> Result<()> {
        self.call("update", &[json!(index), value]).map(drop)
    }

    /// Remove and return the first item.
    pub fn shift(&self) -> Result<Option<Value>> {
        self.call("shift", &[])
    }

    /// Prepend `value`.
    pub fn unshift(&self, value: Value) -> Result<()> {
        self.call("unshift", &[value]).map(drop)
    }

    /// Append every value.
    pub fn concat(&self, values: Vec<Value>) -> Result<()> {
        self.call("concat", &[Value::Array(values)]).map(drop)
    }

    /// Remove the items at `indexes`; returns the removed items.
    pub fn remove_batch(&self, indexes: &[usize]) -> Result<Option<Value>> {
        self.call("removeBatch", &[json!(indexes)])
    }
}

impl fmt::Debug for ArrayMutators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayMutators")
            .field("name", &self.name)
            .field("mutators", &self.mutators.keys().collect::<Vec<_>>())
            .finish()
    }
}
