//! Call signatures and argument binding.
//!
//! [`Signature::bind`] maps a call's positional and keyword arguments onto
//! declared parameters using Python's rules; [`BoundArguments::apply_defaults`]
//! fills everything left unbound. Binding is generic over the argument type so
//! the grader can bind AST nodes and the interpreter can bind runtime values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{Expr, ExprKind, Param};
pub use crate::ast::ParamKind;

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Expr>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: ExprKind) -> Self {
        self.default = Some(Expr::synthetic(default));
        self
    }
}

/// An ordered parameter list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Parameter>,
}

/// Why a call's arguments could not be bound.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum BindError {
    #[error("missing a required argument: '{0}'")]
    MissingArgument(String),
    #[error("got an unexpected keyword argument '{0}'")]
    UnexpectedArgument(String),
    #[error("'{0}' parameter is positional only, but was passed as a keyword")]
    PositionalOnlyArgument(String),
    #[error("too many positional arguments")]
    SurplusArgument,
    #[error("multiple values for argument '{0}'")]
    DuplicateArgument(String),
}

/// Coarse classification of a [`BindError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindErrorKind {
    Missing,
    Unexpected,
    Surplus,
    Duplicate,
}

impl BindError {
    pub fn kind(&self) -> BindErrorKind {
        match self {
            BindError::MissingArgument(_) => BindErrorKind::Missing,
            BindError::UnexpectedArgument(_) | BindError::PositionalOnlyArgument(_) => {
                BindErrorKind::Unexpected
            }
            BindError::SurplusArgument => BindErrorKind::Surplus,
            BindError::DuplicateArgument(_) => BindErrorKind::Duplicate,
        }
    }

    /// The parameter or keyword the error is about.
    pub fn name(&self) -> Option<&str> {
        match self {
            BindError::MissingArgument(n)
            | BindError::UnexpectedArgument(n)
            | BindError::PositionalOnlyArgument(n)
            | BindError::DuplicateArgument(n) => Some(n),
            BindError::SurplusArgument => None,
        }
    }
}

/// What a single parameter ended up bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding<T> {
    Value(T),
    /// Take the parameter's declared default.
    Default,
    VarPositional(Vec<T>),
    VarKeyword(Vec<(String, T)>),
}

/// Result of [`Signature::bind`], aligned with the signature's parameters.
#[derive(Debug, Clone)]
pub struct BoundArguments<'s, T> {
    signature: &'s Signature,
    bindings: Vec<Option<Binding<T>>>,
}

impl Signature {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self { params }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Build a signature from the parameters of a `def` or `lambda`.
    pub fn from_params(params: &[Param]) -> Self {
        Self::new(
            params
                .iter()
                .map(|p| Parameter {
                    name: p.name.name.clone(),
                    kind: p.kind,
                    default: p.default.clone(),
                })
                .collect(),
        )
    }

    /// The signature seen through a bound method: the receiver parameter is
    /// already supplied.
    pub fn without_receiver(&self) -> Signature {
        match self.params.first() {
            Some(p)
                if matches!(
                    p.kind,
                    ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword
                ) =>
            {
                Signature::new(self.params[1..].to_vec())
            }
            _ => self.clone(),
        }
    }

    fn var_keyword_index(&self) -> Option<usize> {
        self.params
            .iter()
            .position(|p| p.kind == ParamKind::VarKeyword)
    }

    /// Bind arguments to parameters.
    pub fn bind<T>(
        &self,
        positional: Vec<T>,
        keywords: Vec<(String, T)>,
    ) -> Result<BoundArguments<'_, T>, BindError> {
        let mut kwargs = keywords;
        for (i, (name, _)) in kwargs.iter().enumerate() {
            if kwargs[..i].iter().any(|(seen, _)| seen == name) {
                return Err(BindError::DuplicateArgument(name.clone()));
            }
        }

        let mut bindings: Vec<Option<Binding<T>>> = self.params.iter().map(|_| None).collect();
        let mut args = positional.into_iter();

        // ── Positional phase ──
        for (i, param) in self.params.iter().enumerate() {
            match param.kind {
                ParamKind::VarPositional => {
                    bindings[i] = Some(Binding::VarPositional(args.by_ref().collect()));
                    break;
                }
                ParamKind::KeywordOnly | ParamKind::VarKeyword => break,
                ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword => {
                    let Some(value) = args.next() else { break };
                    if param.kind == ParamKind::PositionalOrKeyword
                        && kwargs.iter().any(|(n, _)| n == &param.name)
                    {
                        return Err(BindError::DuplicateArgument(param.name.clone()));
                    }
                    bindings[i] = Some(Binding::Value(value));
                }
            }
        }
        if args.next().is_some() {
            return Err(BindError::SurplusArgument);
        }

        // ── Keyword phase ──
        let var_keyword = self.var_keyword_index();
        for (i, param) in self.params.iter().enumerate() {
            if bindings[i].is_some() {
                continue;
            }
            match param.kind {
                ParamKind::VarPositional | ParamKind::VarKeyword => {}
                ParamKind::PositionalOnly => {
                    if var_keyword.is_none() && kwargs.iter().any(|(n, _)| n == &param.name) {
                        return Err(BindError::PositionalOnlyArgument(param.name.clone()));
                    }
                    if param.default.is_none() {
                        return Err(BindError::MissingArgument(param.name.clone()));
                    }
                }
                ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly => {
                    if let Some(pos) = kwargs.iter().position(|(n, _)| n == &param.name) {
                        let (_, value) = kwargs.remove(pos);
                        bindings[i] = Some(Binding::Value(value));
                    } else if param.default.is_none() {
                        return Err(BindError::MissingArgument(param.name.clone()));
                    }
                }
            }
        }

        if !kwargs.is_empty() {
            match var_keyword {
                Some(i) => bindings[i] = Some(Binding::VarKeyword(kwargs)),
                None => return Err(BindError::UnexpectedArgument(kwargs.remove(0).0)),
            }
        }

        Ok(BoundArguments {
            signature: self,
            bindings,
        })
    }
}

impl<'s, T> BoundArguments<'s, T> {
    /// Fill unbound parameters: declared defaults, an empty `*args`, an
    /// empty `**kwargs`.
    pub fn apply_defaults(&mut self) {
        for (slot, param) in self.bindings.iter_mut().zip(&self.signature.params) {
            if slot.is_some() {
                continue;
            }
            *slot = match param.kind {
                ParamKind::VarPositional => Some(Binding::VarPositional(Vec::new())),
                ParamKind::VarKeyword => Some(Binding::VarKeyword(Vec::new())),
                _ if param.default.is_some() => Some(Binding::Default),
                _ => None,
            };
        }
    }

    /// Bound parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'s Parameter, &Binding<T>)> {
        self.signature
            .params
            .iter()
            .zip(&self.bindings)
            .filter_map(|(p, b)| b.as_ref().map(|b| (p, b)))
    }

    pub fn into_entries(self) -> Vec<(&'s Parameter, Binding<T>)> {
        self.signature
            .params
            .iter()
            .zip(self.bindings)
            .filter_map(|(p, b)| b.map(|b| (p, b)))
            .collect()
    }
}

impl BoundArguments<'_, Expr> {
    /// Collapse every binding into one expression per parameter: defaults
    /// are cloned, `*args` becomes a tuple and `**kwargs` a dict.
    pub fn into_exprs(self) -> Vec<(String, Expr)> {
        self.into_entries()
            .into_iter()
            .filter_map(|(param, binding)| {
                let expr = match binding {
                    Binding::Value(e) => e,
                    Binding::Default => param.default.clone()?,
                    Binding::VarPositional(items) => Expr::synthetic(ExprKind::Tuple(items)),
                    Binding::VarKeyword(pairs) => {
                        let (keys, values): (Vec<Expr>, Vec<Expr>) = pairs
                            .into_iter()
                            .map(|(k, v)| (Expr::synthetic(ExprKind::Str(k)), v))
                            .unzip();
                        Expr::synthetic(ExprKind::Dict { keys, values })
                    }
                };
                Some((param.name.clone(), expr))
            })
            .collect()
    }
}
