//! Runtime values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use pygrade_types::ast::{Expr, Stmt};
use pygrade_types::node::format_float;
use pygrade_types::Signature;

use crate::env::Environment;
use crate::error::EvalResult;
use crate::evaluator::Interpreter;

/// Deepest container nesting that `repr` renders and `==` descends into.
pub const MAX_NESTING: usize = 200;

/// Native implementation of a builtin. Builtins that declare a
/// [`Signature`] receive their arguments already bound, one positional
/// value per parameter with defaults filled in; the rest receive the raw
/// positional and keyword arguments.
pub type BuiltinFn = fn(&mut Interpreter, Vec<Value>, Vec<(String, Value)>) -> EvalResult<Value>;

/// A Python value.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    /// Insertion-ordered key/value pairs; keys compare with Python `==`.
    Dict(Rc<RefCell<Vec<(Value, Value)>>>),
    Set(Rc<RefCell<Vec<Value>>>),
    Function(Rc<Function>),
    Builtin(Rc<Builtin>),
    BoundMethod(Rc<BoundMethod>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Module(Rc<ModuleValue>),
    /// Anything reached through a module the interpreter does not provide.
    /// Attribute access and calls yield more opaque values.
    Opaque(Rc<str>),
}

pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// `lambda` body.
    Expr(Expr),
}

/// A user-defined function or lambda.
pub struct Function {
    pub name: String,
    pub signature: Signature,
    /// Defaults evaluated at definition time, keyed by parameter name.
    pub defaults: IndexMap<String, Value>,
    pub body: FunctionBody,
    pub closure: Environment,
}

pub struct Builtin {
    pub name: String,
    /// `None` for builtins with no introspectable signature.
    pub signature: Option<Signature>,
    pub func: BuiltinFn,
}

pub struct BoundMethod {
    pub receiver: Value,
    pub func: Value,
}

pub struct Class {
    pub name: String,
    pub bases: Vec<Rc<Class>>,
    pub attrs: RefCell<IndexMap<String, Value>>,
}

pub struct Instance {
    pub class: Rc<Class>,
    pub attrs: RefCell<IndexMap<String, Value>>,
}

pub struct ModuleValue {
    pub name: String,
    pub attrs: IndexMap<String, Value>,
}

// ── Constructors ──────────────────────────────────────────────────────────────

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(pairs: Vec<(Value, Value)>) -> Value {
        Value::Dict(Rc::new(RefCell::new(pairs)))
    }

    pub fn set(items: Vec<Value>) -> Value {
        let mut unique: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::Set(Rc::new(RefCell::new(unique)))
    }

    pub fn builtin(name: &str, signature: Option<Signature>, func: BuiltinFn) -> Value {
        Value::Builtin(Rc::new(Builtin {
            name: name.to_string(),
            signature,
            func,
        }))
    }
}

// ── Introspection ─────────────────────────────────────────────────────────────

impl Value {
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::BoundMethod(_) => "method",
            Value::Class(_) => "type",
            Value::Instance(i) => &i.class.name,
            Value::Module(_) => "module",
            Value::Opaque(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Set(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(pairs) => !pairs.borrow().is_empty(),
            _ => true,
        }
    }

    /// The parameters a caller sees, or `None` when the value is not
    /// callable or exposes no signature.
    pub fn signature(&self) -> Option<Signature> {
        match self {
            Value::Function(f) => Some(f.signature.clone()),
            Value::Builtin(b) => b.signature.clone(),
            Value::BoundMethod(m) => m.func.signature().map(|s| s.without_receiver()),
            Value::Class(class) => match class.lookup("__init__") {
                Some(init) => init.signature().map(|s| s.without_receiver()),
                None => Some(Signature::empty()),
            },
            _ => None,
        }
    }

    /// Python `is`.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b) || a.name == b.name,
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Python `repr()`. A container that contains itself renders as
    /// `[...]` or `{...}`.
    pub fn repr(&self) -> String {
        self.repr_in(&mut Vec::new())
    }

    /// `open` holds the containers currently being rendered.
    fn repr_in(&self, open: &mut Vec<*const ()>) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => repr_str(s),
            Value::List(items) => guarded(open, Rc::as_ptr(items).cast(), "[...]", |open| {
                format!("[{}]", repr_items(&items.borrow()[..], open))
            }),
            Value::Tuple(items) => guarded(open, Rc::as_ptr(items).cast(), "(...)", |open| {
                match items.len() {
                    1 => format!("({},)", repr_items(&items[..], open)),
                    _ => format!("({})", repr_items(&items[..], open)),
                }
            }),
            Value::Dict(pairs) => guarded(open, Rc::as_ptr(pairs).cast(), "{...}", |open| {
                let inner: Vec<String> = pairs
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr_in(open), v.repr_in(open)))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }),
            Value::Set(items) if items.borrow().is_empty() => "set()".to_string(),
            Value::Set(items) => guarded(open, Rc::as_ptr(items).cast(), "{...}", |open| {
                format!("{{{}}}", repr_items(&items.borrow()[..], open))
            }),
            Value::Function(f) => format!("<function {}>", f.name),
            Value::Builtin(b) => format!("<built-in function {}>", b.name),
            Value::BoundMethod(m) => format!(
                "<bound method {} of {}>",
                callable_name(&m.func),
                m.receiver.repr_in(open)
            ),
            Value::Class(c) => format!("<class '{}'>", c.name),
            Value::Instance(i) => format!("<{} object>", i.class.name),
            Value::Module(m) => format!("<module '{}'>", m.name),
            Value::Opaque(name) => format!("<{name}>"),
        }
    }

    /// Python `str()`.
    pub fn to_display(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.repr(),
        }
    }
}

fn callable_name(value: &Value) -> &str {
    match value {
        Value::Function(f) => &f.name,
        Value::Builtin(b) => &b.name,
        other => other.type_name(),
    }
}

/// Render a container unless it is already open or nested too deeply.
fn guarded(
    open: &mut Vec<*const ()>,
    id: *const (),
    recursive: &str,
    render: impl FnOnce(&mut Vec<*const ()>) -> String,
) -> String {
    if open.contains(&id) || open.len() >= MAX_NESTING {
        return recursive.to_string();
    }
    open.push(id);
    let text = render(open);
    open.pop();
    text
}

fn repr_items(items: &[Value], open: &mut Vec<*const ()>) -> String {
    items
        .iter()
        .map(|v| v.repr_in(open))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote a string the way Python's `repr` does.
fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python `==`: numbers compare across int/float/bool, containers compare
/// element-wise, everything else by identity. Containers nested deeper than
/// [`MAX_NESTING`] compare unequal, so self-referencing values terminate.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.eq_at(other, 0)
    }
}

impl Value {
    fn eq_at(&self, other: &Value, depth: usize) -> bool {
        let nested = |a: &[Value], b: &[Value]| {
            depth < MAX_NESTING
                && a.len() == b.len()
                && a.iter().zip(b).all(|(x, y)| x.eq_at(y, depth + 1))
        };
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || nested(&a.borrow()[..], &b.borrow()[..])
            }
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b) || nested(&a[..], &b[..]),
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                depth < MAX_NESTING
                    && a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter()
                            .any(|(k2, v2)| k.eq_at(k2, depth + 1) && v.eq_at(v2, depth + 1))
                    })
            }
            (Value::Set(a), Value::Set(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                depth < MAX_NESTING
                    && a.len() == b.len()
                    && a.iter().all(|x| b.iter().any(|y| x.eq_at(y, depth + 1)))
            }
            (Value::Opaque(_), _) | (_, Value::Opaque(_)) => false,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => a.is_identical(b),
            },
        }
    }
}

// ── Classes ───────────────────────────────────────────────────────────────────

impl Class {
    /// Attribute lookup through the class and its bases, depth first,
    /// left to right.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.attrs.borrow().get(name) {
            return Some(v.clone());
        }
        self.bases.iter().find_map(|base| base.lookup(name))
    }

    pub fn is_subclass_of(self: &Rc<Self>, other: &Rc<Class>) -> bool {
        Rc::ptr_eq(self, other) || self.bases.iter().any(|b| b.is_subclass_of(other))
    }
}

// Closures, classes and instances can reach themselves through their
// environments; Debug prints names only.

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<bound method {}>", callable_name(&self.func))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class '{}'>", self.name)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object>", self.class.name)
    }
}

impl fmt::Debug for ModuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<module '{}'>", self.name)
    }
}

/// Debug output is the `repr`, which stays finite for cyclic containers.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr() {
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
        assert_eq!(Value::str("a\nb").repr(), "'a\\nb'");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).repr(), "(1,)");
        assert_eq!(Value::tuple(vec![]).repr(), "()");
        assert_eq!(
            Value::list(vec![Value::Float(1.0), Value::None, Value::Bool(true)]).repr(),
            "[1.0, None, True]"
        );
        assert_eq!(
            Value::dict(vec![(Value::str("a"), Value::Int(1))]).repr(),
            "{'a': 1}"
        );
        assert_eq!(Value::set(vec![]).repr(), "set()");
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::str("1"));
        assert_ne!(Value::None, Value::Int(0));
    }

    #[test]
    fn test_container_equality() {
        let a = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(a, b);
        assert!(!a.is_identical(&b));
        let d1 = Value::dict(vec![
            (Value::str("a"), Value::Int(1)),
            (Value::str("b"), Value::Int(2)),
        ]);
        let d2 = Value::dict(vec![
            (Value::str("b"), Value::Int(2)),
            (Value::str("a"), Value::Int(1)),
        ]);
        assert_eq!(d1, d2);
    }

    fn self_referencing(first: i64) -> Value {
        let list = Value::list(vec![Value::Int(first)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        list
    }

    #[test]
    fn test_self_referencing_list_repr() {
        assert_eq!(self_referencing(1).repr(), "[1, [...]]");
        assert_eq!(format!("{:?}", self_referencing(1)), "[1, [...]]");
    }

    #[test]
    fn test_self_referencing_list_equality_terminates() {
        let a = self_referencing(1);
        assert_eq!(a, a.clone());
        assert_ne!(a, self_referencing(1));
        assert_ne!(a, self_referencing(2));
    }

    #[test]
    fn test_deep_nesting_repr_is_bounded() {
        let mut value = Value::Int(0);
        for _ in 0..(MAX_NESTING * 2) {
            value = Value::list(vec![value]);
        }
        assert!(value.repr().contains("[...]"));
    }

    #[test]
    fn test_set_deduplicates() {
        let s = Value::set(vec![Value::Int(1), Value::Int(1), Value::Float(1.0)]);
        assert_eq!(s.repr(), "{1}");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
    }
}
