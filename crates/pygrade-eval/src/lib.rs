//! pygrade tree-walking interpreter.
//!
//! Executes a parsed Python module to produce the live bindings the grader
//! needs: user functions, classes and imported modules whose call
//! signatures can be introspected, plus the value of a snippet's final
//! expression. Execution is gas-metered and call depth is bounded, so a
//! runaway submission ends in an [`EvalError`] instead of a hang.

mod builtins;
mod env;
mod error;
mod evaluator;
mod ops;
mod value;

pub use env::Environment;
pub use error::{EvalError, EvalResult};
pub use evaluator::{Interpreter, Limits};
pub use value::{
    Builtin, BuiltinFn, Class, Function, FunctionBody, Instance, ModuleValue, Value, MAX_NESTING,
};
