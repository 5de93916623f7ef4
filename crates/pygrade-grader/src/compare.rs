//! Structural comparison of a submission tree against a solution tree.
//!
//! The walk pairs nodes slot by slot and list element by list element,
//! strictly by position, and stops at the first divergence. Calls are
//! normalized against their callee's signature before their arguments are
//! compared, so argument style (positional or keyword, explicit or
//! defaulted) does not matter.

use pygrade_types::ast::{Call, ExprKind, Module};
use pygrade_types::node::{NodeRef, Slot};
use pygrade_types::BindError;
use thiserror::Error;
use tracing::{debug, trace};

use crate::format::{describe, format_node, source};
use crate::mismatch::{MismatchKind, MismatchRecord, Rendered};
use crate::normalize::{normalize, BoundParam, NormalizeError, ResolvedSignature};
use crate::resolver::Resolver;

// ══════════════════════════════════════════════════════════════════════════════
// Types
// ══════════════════════════════════════════════════════════════════════════════

/// Comparison could not be completed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompareError {
    /// Executing one of the snippets failed.
    #[error("{0}")]
    Environment(String),
    /// The solution's own call does not fit its callee.
    #[error("the solution call `{call}` can't be evaluated: {error}")]
    SolutionCall { call: String, error: BindError },
}

/// Why the walk stopped early.
enum Stop {
    Mismatch(Box<MismatchRecord>),
    Error(CompareError),
}

type Step = Result<(), Stop>;

/// Where the walk is: the latest line seen on each side and the nearest
/// enclosing call. Cloned into every child so siblings never see each
/// other's updates.
#[derive(Debug, Clone, Default)]
struct Context {
    line: Option<u32>,
    solution_line: Option<u32>,
    parent: Option<String>,
}

impl Context {
    fn enter(&self, submission: NodeRef<'_>, solution: NodeRef<'_>) -> Self {
        Self {
            line: submission.line().or(self.line),
            solution_line: solution.line().or(self.solution_line),
            parent: self.parent.clone(),
        }
    }

    fn record(
        &self,
        kind: MismatchKind,
        submission: Option<Rendered>,
        solution: Option<Rendered>,
    ) -> Stop {
        Stop::Mismatch(Box::new(MismatchRecord {
            kind,
            submission,
            solution,
            line: self.line,
            solution_line: self.solution_line,
            parent: self.parent.clone(),
        }))
    }
}

/// Two renderings that differ: a type mismatch when the prose kinds
/// differ, a value mismatch otherwise.
fn value_or_type(submission: &Rendered, solution: &Rendered) -> MismatchKind {
    if submission.description == solution.description {
        MismatchKind::WrongValue
    } else {
        MismatchKind::WrongType
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Entry point
// ══════════════════════════════════════════════════════════════════════════════

/// Compare two modules. `Ok(None)` means they are equivalent.
///
/// Each side resolves its callees through its own resolver.
pub fn compare(
    submission: &Module,
    solution: &Module,
    submission_resolver: &mut dyn Resolver,
    solution_resolver: &mut dyn Resolver,
) -> Result<Option<MismatchRecord>, CompareError> {
    let mut comparator = Comparator {
        submission: submission_resolver,
        solution: solution_resolver,
    };
    let result = comparator.nodes(
        Some(NodeRef::Module(submission)),
        Some(NodeRef::Module(solution)),
        Context::default(),
    );
    match result {
        Ok(()) => Ok(None),
        Err(Stop::Mismatch(record)) => {
            debug!(kind = ?record.kind, line = ?record.line, "first divergence");
            Ok(Some(*record))
        }
        Err(Stop::Error(error)) => Err(error),
    }
}

struct Comparator<'r> {
    submission: &'r mut dyn Resolver,
    solution: &'r mut dyn Resolver,
}

// ══════════════════════════════════════════════════════════════════════════════
// Generic walk
// ══════════════════════════════════════════════════════════════════════════════

impl Comparator<'_> {
    fn nodes(&mut self, submission: Option<NodeRef<'_>>, solution: Option<NodeRef<'_>>, ctx: Context) -> Step {
        let (left, right) = match (submission, solution) {
            (None, None) => return Ok(()),
            (None, Some(right)) => {
                let ctx = Context {
                    solution_line: right.line().or(ctx.solution_line),
                    ..ctx
                };
                return Err(ctx.record(MismatchKind::Missing, None, Some(Rendered::node(right))));
            }
            (Some(left), None) => {
                let ctx = Context {
                    line: left.line().or(ctx.line),
                    ..ctx
                };
                return Err(ctx.record(MismatchKind::Unexpected, Some(Rendered::node(left)), None));
            }
            (Some(left), Some(right)) => (left, right),
        };

        let ctx = ctx.enter(left, right);
        if left.kind() != right.kind() {
            return Err(mismatch(&ctx, left, right));
        }
        if let (NodeRef::Expr(l), NodeRef::Expr(r)) = (left, right) {
            if let (ExprKind::Call(lc), ExprKind::Call(rc)) = (&l.kind, &r.kind) {
                return self.calls(left, right, lc, rc, ctx);
            }
        }
        self.slots(left, right, ctx)
    }

    /// Pairwise comparison of two same-kind nodes' slots.
    fn slots(&mut self, left: NodeRef<'_>, right: NodeRef<'_>, ctx: Context) -> Step {
        for ((lname, lslot), (rname, rslot)) in left.slots().into_iter().zip(right.slots()) {
            if lname != rname {
                return Err(mismatch(&ctx, left, right));
            }
            match (lslot, rslot) {
                (Slot::Node(a), Slot::Node(b)) => self.nodes(Some(a), Some(b), ctx.clone())?,
                (Slot::Optional(a), Slot::Optional(b)) => self.nodes(a, b, ctx.clone())?,
                (Slot::Nodes(a), Slot::Nodes(b)) => self.lists(&a, &b, ctx.clone())?,
                (Slot::Leaf(a), Slot::Leaf(b)) if a == b => {}
                (Slot::Leaves(a), Slot::Leaves(b)) if a == b => {}
                // A differing leaf is reported as its owning node.
                _ => {
                    trace!(slot = lname, kind = left.kind(), "slot differs");
                    return Err(mismatch(&ctx, left, right));
                }
            }
        }
        Ok(())
    }

    /// Strict positional pairing; surplus elements on either side are
    /// unexpected or missing. Each element's line carries forward to the
    /// next position.
    fn lists(&mut self, left: &[NodeRef<'_>], right: &[NodeRef<'_>], ctx: Context) -> Step {
        let mut ctx = ctx;
        for i in 0..left.len().max(right.len()) {
            let (l, r) = (left.get(i).copied(), right.get(i).copied());
            self.nodes(l, r, ctx.clone())?;
            if let Some(l) = l {
                ctx.line = l.line().or(ctx.line);
            }
            if let Some(r) = r {
                ctx.solution_line = r.line().or(ctx.solution_line);
            }
        }
        Ok(())
    }
}

fn mismatch(ctx: &Context, left: NodeRef<'_>, right: NodeRef<'_>) -> Stop {
    let (submission, solution) = (Rendered::node(left), Rendered::node(right));
    let kind = value_or_type(&submission, &solution);
    ctx.record(kind, Some(submission), Some(solution))
}

// ══════════════════════════════════════════════════════════════════════════════
// Calls
// ══════════════════════════════════════════════════════════════════════════════

impl Comparator<'_> {
    fn calls(
        &mut self,
        left: NodeRef<'_>,
        right: NodeRef<'_>,
        left_call: &Call,
        right_call: &Call,
        ctx: Context,
    ) -> Step {
        let submission = normalize(left_call, &mut *self.submission);
        let solution = normalize(right_call, &mut *self.solution);

        match (submission, solution) {
            (Err(NormalizeError::Binding(error)), solution) => {
                let expected = match &solution {
                    Ok(resolved) => resolved.to_string(),
                    Err(_) => format_node(right),
                };
                debug!(call = %format_node(left), %error, "submission call is malformed");
                let ctx = Context {
                    parent: None,
                    ..ctx
                };
                Err(ctx.record(
                    MismatchKind::MalformedCall { error },
                    Some(Rendered::node(left)),
                    Some(Rendered::text("Call", describe(right), expected)),
                ))
            }
            (Err(NormalizeError::Environment(detail)), _)
            | (_, Err(NormalizeError::Environment(detail))) => {
                Err(Stop::Error(CompareError::Environment(detail)))
            }
            (_, Err(NormalizeError::Binding(error))) => Err(Stop::Error(CompareError::SolutionCall {
                call: format_node(right),
                error,
            })),
            (Ok(l), Ok(r)) if !(l.is_empty() && r.is_empty()) => {
                self.bound_calls(left_call, right_call, &l, &r, ctx)
            }
            _ => {
                trace!(call = %format_node(left), "comparing call structurally");
                let ctx = Context {
                    parent: Some(format_node(left)),
                    ..ctx
                };
                self.slots(left, right, ctx)
            }
        }
    }

    /// Compare the callees, then the bound arguments in parameter order.
    fn bound_calls(
        &mut self,
        left_call: &Call,
        right_call: &Call,
        left: &ResolvedSignature,
        right: &ResolvedSignature,
        ctx: Context,
    ) -> Step {
        let ctx = Context {
            parent: Some(left.to_string()),
            ..ctx
        };
        self.nodes(
            Some(NodeRef::Expr(&left_call.func)),
            Some(NodeRef::Expr(&right_call.func)),
            ctx.clone(),
        )?;

        for i in 0..left.params.len().max(right.params.len()) {
            match (left.params.get(i), right.params.get(i)) {
                (Some(l), Some(r)) => self.bound_param(l, r, &ctx)?,
                (Some(l), None) => {
                    return Err(param_ctx(&ctx, Some(l), None).record(
                        MismatchKind::Unexpected,
                        Some(keyword_rendering(l)),
                        None,
                    ))
                }
                (None, Some(r)) => {
                    return Err(param_ctx(&ctx, None, Some(r)).record(
                        MismatchKind::Missing,
                        None,
                        Some(keyword_rendering(r)),
                    ))
                }
                (None, None) => {}
            }
        }
        Ok(())
    }

    fn bound_param(&mut self, left: &BoundParam, right: &BoundParam, ctx: &Context) -> Step {
        if left.name != right.name {
            let (l, r) = (keyword_rendering(left), keyword_rendering(right));
            return Err(param_ctx(ctx, Some(left), Some(right)).record(MismatchKind::WrongValue, Some(l), Some(r)));
        }
        if source(&left.value) == source(&right.value) {
            return Ok(());
        }
        let (l, r) = (NodeRef::Expr(&left.value), NodeRef::Expr(&right.value));
        if left.from_default || right.from_default {
            // Defaults live at the definition, not the call; report the
            // whole value at the call's line.
            return Err(mismatch(&param_ctx(ctx, Some(left), Some(right)), l, r));
        }
        // Recurse so nested calls are normalized too; equal after
        // normalization counts as equal.
        self.nodes(Some(l), Some(r), ctx.clone())
    }
}

/// The context a bound parameter's mismatch is reported in. Defaulted
/// values keep the call's line.
fn param_ctx(ctx: &Context, left: Option<&BoundParam>, right: Option<&BoundParam>) -> Context {
    let line_of = |param: Option<&BoundParam>, fallback: Option<u32>| match param {
        Some(p) if !p.from_default => NodeRef::Expr(&p.value).line().or(fallback),
        _ => fallback,
    };
    Context {
        line: line_of(left, ctx.line),
        solution_line: line_of(right, ctx.solution_line),
        parent: ctx.parent.clone(),
    }
}

fn keyword_rendering(param: &BoundParam) -> Rendered {
    Rendered::text(
        "Keyword",
        "a keyword argument",
        format!("{}={}", param.name, source(&param.value)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pygrade_parser::parse_source;
    use pygrade_types::ast::Expr;
    use pygrade_types::Signature;

    use crate::resolver::ResolveError;

    /// Resolves nothing, so every call is compared structurally.
    struct Nothing;

    impl Resolver for Nothing {
        fn resolve(&mut self, callee: &Expr) -> Result<Signature, ResolveError> {
            Err(ResolveError::NotResolvable(source(callee)))
        }
    }

    fn diff(submission: &str, solution: &str) -> Option<MismatchRecord> {
        let sub = parse_source("submission.py", submission).unwrap();
        let sol = parse_source("solution.py", solution).unwrap();
        compare(&sub, &sol, &mut Nothing, &mut Nothing).unwrap()
    }

    #[test]
    fn test_identical_trees() {
        assert_eq!(diff("x = [1, 2]\nprint(x)", "x = [1, 2]\nprint(x)"), None);
    }

    #[test]
    fn test_leaf_difference_renders_owner() {
        let record = diff("x = 1 + 2", "x = 1 - 2").unwrap();
        assert_eq!(record.kind, MismatchKind::WrongValue);
        assert_eq!(record.submission_text(), "1 + 2");
        assert_eq!(record.solution_text(), "1 - 2");
    }

    #[test]
    fn test_missing_statement_reports_previous_line() {
        let record = diff("x = 1\ny = 2", "x = 1\ny = 2\nz = 3").unwrap();
        assert_eq!(record.kind, MismatchKind::Missing);
        assert_eq!(record.line, Some(2));
        assert_eq!(record.solution_line, Some(3));
        assert_eq!(record.solution_text(), "z = 3");
    }

    #[test]
    fn test_structural_call_sets_parent() {
        let record = diff("print(1, 2)", "print(1, 3)").unwrap();
        assert_eq!(record.parent.as_deref(), Some("print(1, 2)"));
        assert_eq!(record.submission_text(), "2");
    }

    #[test]
    fn test_kind_difference_is_wrong_type() {
        let record = diff("x = 'a'", "x = 1").unwrap();
        assert_eq!(record.kind, MismatchKind::WrongType);
        let record = diff("x = 1.0", "x = 1").unwrap();
        assert_eq!(record.kind, MismatchKind::WrongValue);
    }

    #[test]
    fn test_first_divergence_wins() {
        let record = diff("a = 1\nb = 2\nc = 3", "a = 9\nb = 8\nc = 3").unwrap();
        assert_eq!(record.line, Some(1));
        assert_eq!(record.submission_text(), "1");
    }
}
