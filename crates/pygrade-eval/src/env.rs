//! Scoped variable environment for the interpreter.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

struct Scope {
    bindings: IndexMap<String, Value>,
    parent: Option<Environment>,
}

/// A chain of scopes shared by reference.
///
/// Functions capture the environment they were defined in, so scopes live
/// behind `Rc` and outlive the call that created them. `define` always
/// writes the innermost scope; `get` searches outward.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    /// A fresh root scope.
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Scope {
            bindings: IndexMap::new(),
            parent: None,
        })))
    }

    /// A new innermost scope whose lookups fall back to `self`.
    pub fn child(&self) -> Self {
        Self(Rc::new(RefCell::new(Scope {
            bindings: IndexMap::new(),
            parent: Some(self.clone()),
        })))
    }

    pub fn define(&self, name: &str, value: Value) {
        self.0.borrow_mut().bindings.insert(name.to_string(), value);
    }

    /// Look up a variable, searching from innermost to outermost scope.
    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.borrow();
        match scope.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => scope.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    /// Remove a binding from the innermost scope.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().bindings.shift_remove(name)
    }

    /// Bindings of the innermost scope, in definition order.
    pub fn local_bindings(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .bindings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.0.borrow();
        f.debug_struct("Environment")
            .field("names", &scope.bindings.keys().collect::<Vec<_>>())
            .field("has_parent", &scope.parent.is_some())
            .finish()
    }
}
