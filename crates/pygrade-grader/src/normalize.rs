//! Call normalization: rewriting a call's arguments as `name=value` pairs
//! bound against the callee's signature.

use std::fmt;

use pygrade_types::ast::{Call, Expr, ExprKind};
use pygrade_types::{BindError, Binding};
use thiserror::Error;
use tracing::trace;

use crate::format::source;
use crate::resolver::{ResolveError, Resolver};

/// A parameter and the argument expression bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub value: Expr,
    /// Filled from the declared default rather than the call site.
    pub from_default: bool,
}

/// A call with every argument keyed by parameter name, in parameter order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSignature {
    /// The callee as written.
    pub callee: String,
    pub params: Vec<BoundParam>,
}

impl ResolvedSignature {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Renders as `callee(a=1, b=2)`.
impl fmt::Display for ResolvedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}={}", p.name, source(&p.value)))
            .collect();
        write!(f, "{}({})", self.callee, args.join(", "))
    }
}

/// Why a call could not be normalized.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("{0}")]
    NotResolvable(String),
    /// The arguments do not fit the resolved signature.
    #[error(transparent)]
    Binding(#[from] BindError),
    #[error("{0}")]
    Environment(String),
}

impl From<ResolveError> for NormalizeError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::NotResolvable(callee) => NormalizeError::NotResolvable(callee),
            ResolveError::Environment(detail) => NormalizeError::Environment(detail),
        }
    }
}

/// Bind `call`'s arguments to its callee's parameters, filling defaults.
///
/// Calls that unpack `*args` or `**kwargs` are not normalized.
pub fn normalize(
    call: &Call,
    resolver: &mut dyn Resolver,
) -> Result<ResolvedSignature, NormalizeError> {
    let callee = source(&call.func);
    if call.has_unpacking() {
        return Err(NormalizeError::NotResolvable(callee));
    }
    let signature = resolver.resolve(&call.func)?;

    let keywords: Vec<(String, Expr)> = call
        .keywords
        .iter()
        .filter_map(|k| k.arg.as_ref().map(|name| (name.name.clone(), k.value.clone())))
        .collect();
    let mut bound = signature.bind(call.args.clone(), keywords)?;
    bound.apply_defaults();

    let mut params = Vec::with_capacity(signature.params.len());
    for (param, binding) in bound.into_entries() {
        let (value, from_default) = match binding {
            Binding::Value(value) => (value, false),
            Binding::Default => match &param.default {
                Some(default) => (default.clone(), true),
                None => continue,
            },
            Binding::VarPositional(items) => (Expr::synthetic(ExprKind::Tuple(items)), false),
            Binding::VarKeyword(pairs) => {
                let (keys, values): (Vec<Expr>, Vec<Expr>) = pairs
                    .into_iter()
                    .map(|(k, v)| (Expr::synthetic(ExprKind::Str(k)), v))
                    .unzip();
                (Expr::synthetic(ExprKind::Dict { keys, values }), false)
            }
        };
        params.push(BoundParam {
            name: param.name.clone(),
            value,
            from_default,
        });
    }

    let resolved = ResolvedSignature { callee, params };
    trace!(call = %resolved, "call normalized");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pygrade_parser::parse_source;
    use pygrade_types::ast::StmtKind;
    use pygrade_types::{ParamKind, Parameter, Signature};

    /// Resolves every callee to one fixed signature.
    struct Fixed(Signature);

    impl Resolver for Fixed {
        fn resolve(&mut self, _: &Expr) -> Result<Signature, ResolveError> {
            Ok(self.0.clone())
        }
    }

    fn call(src: &str) -> Call {
        let module = parse_source("<test>", src).unwrap();
        match module.body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(Expr {
                kind: ExprKind::Call(call),
                ..
            })) => *call,
            other => panic!("not a call: {other:?}"),
        }
    }

    fn ab() -> Fixed {
        Fixed(Signature::new(vec![
            Parameter::new("a", ParamKind::PositionalOrKeyword),
            Parameter::new("b", ParamKind::PositionalOrKeyword).with_default(ExprKind::Int(1)),
        ]))
    }

    #[test]
    fn test_positional_and_keyword_forms_agree() {
        let positional = normalize(&call("f(2)"), &mut ab()).unwrap();
        let keyword = normalize(&call("f(a=2)"), &mut ab()).unwrap();
        assert_eq!(positional.to_string(), "f(a=2, b=1)");
        assert_eq!(positional.to_string(), keyword.to_string());
        assert!(positional.params[1].from_default);
    }

    #[test]
    fn test_binding_errors_pass_through() {
        assert_eq!(
            normalize(&call("f()"), &mut ab()),
            Err(NormalizeError::Binding(BindError::MissingArgument("a".into())))
        );
        assert_eq!(
            normalize(&call("f(1, 2, 3)"), &mut ab()),
            Err(NormalizeError::Binding(BindError::SurplusArgument))
        );
        assert_eq!(
            normalize(&call("f(1, c=2)"), &mut ab()),
            Err(NormalizeError::Binding(BindError::UnexpectedArgument("c".into())))
        );
    }

    #[test]
    fn test_unpacking_is_not_normalized() {
        assert!(matches!(
            normalize(&call("f(*xs)"), &mut ab()),
            Err(NormalizeError::NotResolvable(_))
        ));
    }

    #[test]
    fn test_var_params_collapse() {
        let mut resolver = Fixed(Signature::new(vec![
            Parameter::new("args", ParamKind::VarPositional),
            Parameter::new("kw", ParamKind::VarKeyword),
        ]));
        let resolved = normalize(&call("g(1, 2, x=3)"), &mut resolver).unwrap();
        assert_eq!(resolved.to_string(), "g(args=(1, 2), kw={\"x\": 3})");
    }
}
