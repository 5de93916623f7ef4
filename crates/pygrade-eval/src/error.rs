//! Runtime error types for the interpreter.

use pygrade_types::BindError;
use thiserror::Error;

/// Evaluation error: a Python exception, or the interpreter giving up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("NameError: name '{0}' is not defined")]
    Name(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("AttributeError: {0}")]
    Attribute(String),
    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),
    #[error("IndexError: {0}")]
    Index(String),
    #[error("KeyError: {0}")]
    Key(String),
    #[error("ValueError: {0}")]
    Value(String),
    #[error("OverflowError: {0}")]
    Overflow(String),
    /// Arguments did not fit the callee's parameters.
    #[error("TypeError: {callee}() {error}")]
    Binding {
        callee: String,
        #[source]
        error: BindError,
    },
    /// `raise` in user code.
    #[error("{0}")]
    Raised(String),
    #[error("AssertionError{}", message_suffix(.0))]
    Assertion(String),
    /// Gas exhaustion
    #[error("execution stopped after {0} steps")]
    GasExhausted(u64),
    #[error("RecursionError: maximum call depth of {0} exceeded")]
    RecursionLimit(u32),
    #[error("RecursionError: maximum recursion depth exceeded in comparison")]
    ComparisonDepth,
    /// Valid syntax the interpreter does not execute.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Source handed to the interpreter did not parse.
    #[error("SyntaxError: {0}")]
    Syntax(String),
}

impl EvalError {
    /// Name lookups that failed. The grader treats these as "callee not
    /// found" rather than as a broken environment.
    pub fn is_name_error(&self) -> bool {
        matches!(self, EvalError::Name(_))
    }

    /// The interpreter stopped for its own reasons, not because the code
    /// raised.
    pub fn is_limit(&self) -> bool {
        matches!(self, EvalError::GasExhausted(_) | EvalError::RecursionLimit(_))
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        EvalError::Type(message.into())
    }
}

fn message_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
