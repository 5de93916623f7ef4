//! Shared types for the pygrade pipeline.
//!
//! This crate defines the Python AST, the generic node view used by the
//! comparator and formatter, source spans, syntax errors, and call
//! signatures with argument binding.

mod error;
mod span;
pub mod ast;
pub mod node;
pub mod signature;

pub use error::{ErrorCategory, ErrorCode, ParseErrors, SyntaxError, MAX_ERRORS};
pub use node::{Leaf, NodeRef, Slot};
pub use signature::{
    BindError, BindErrorKind, Binding, BoundArguments, ParamKind, Parameter, Signature,
};
pub use span::{SourceFile, Span};

/// Result type used by the lexer and parser.
pub type Result<T> = std::result::Result<T, SyntaxError>;
