//! Locating a callee's signature.
//!
//! The comparator only sees [`Resolver`], so tests can swap the live
//! interpreter for a fixed table of signatures.

use pygrade_eval::{EvalError, Interpreter, Limits};
use pygrade_types::ast::{Expr, Module};
use pygrade_types::Signature;
use thiserror::Error;
use tracing::{debug, trace};

use crate::format::source;

/// Why no signature was produced for a callee.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Not found, or found but without an introspectable signature. The
    /// call is compared structurally instead.
    #[error("`{0}` cannot be resolved")]
    NotResolvable(String),
    /// Building the environment failed in a way that makes resolution
    /// meaningless.
    #[error("{0}")]
    Environment(String),
}

/// Finds the signature of whatever a callee expression refers to.
pub trait Resolver {
    fn resolve(&mut self, callee: &Expr) -> Result<Signature, ResolveError>;
}

/// Resolves callees against the bindings produced by executing a module.
///
/// The module runs at most once, on the first resolution. A build that
/// stops on a binding `TypeError` or a `NameError` keeps the bindings made
/// before it; any other failure is reported on every resolution.
pub struct LiveResolver<'m> {
    module: &'m Module,
    limits: Limits,
    state: Option<LiveState>,
}

struct LiveState {
    interp: Interpreter,
    failure: Option<EvalError>,
}

impl<'m> LiveResolver<'m> {
    pub fn new(module: &'m Module, limits: Limits) -> Self {
        Self {
            module,
            limits,
            state: None,
        }
    }

    fn state(&mut self) -> &mut LiveState {
        let (module, limits) = (self.module, self.limits);
        self.state.get_or_insert_with(|| {
            let mut interp = Interpreter::new(limits);
            let failure = interp.exec_partial(module);
            debug!(
                gas = interp.gas_used(),
                failed = failure.is_some(),
                "environment built"
            );
            LiveState { interp, failure }
        })
    }

    /// The build failure that makes this module ungradable, if any.
    pub fn fatal_failure(&mut self) -> Option<EvalError> {
        self.state().failure.clone().filter(|f| !is_tolerated(f))
    }
}

/// Lookups that merely failed to find something.
fn is_lookup_error(error: &EvalError) -> bool {
    error.is_name_error() || matches!(error, EvalError::Attribute(_))
}

/// Build failures that leave the bindings made so far meaningful: a call
/// whose arguments don't fit, reported later as a malformed call, and a
/// name the snippet never defines.
fn is_tolerated(failure: &EvalError) -> bool {
    failure.is_name_error() || matches!(failure, EvalError::Binding { .. })
}

impl Resolver for LiveResolver<'_> {
    fn resolve(&mut self, callee: &Expr) -> Result<Signature, ResolveError> {
        let text = source(callee);
        let state = self.state();
        if let Some(failure) = state.failure.as_ref().filter(|f| !is_tolerated(f)) {
            debug!(callee = %text, %failure, "environment build failed");
            return Err(ResolveError::Environment(failure.to_string()));
        }
        // The build may have spent most of the budget.
        state.interp.refuel();
        match state.interp.eval_expr(callee) {
            Ok(value) => match value.signature() {
                Some(signature) => {
                    trace!(callee = %text, params = signature.params.len(), "callee resolved");
                    Ok(signature)
                }
                None => Err(ResolveError::NotResolvable(text)),
            },
            Err(error) if is_lookup_error(&error) => Err(ResolveError::NotResolvable(text)),
            Err(error) => {
                debug!(callee = %text, %error, "evaluating callee failed");
                Err(ResolveError::Environment(error.to_string()))
            }
        }
    }
}
