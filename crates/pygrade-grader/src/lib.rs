//! pygrade grader: compares a learner's Python snippet against a solution.
//!
//! ```text
//! submission ─┐
//!             ├→ Parser → Comparator (+ Call Normalizer, Formatter) → Message → Option<String>
//! solution  ──┘
//! ```
//!
//! [`grade_code`] returns `None` when the two snippets are equivalent and a
//! single learner-facing sentence describing the first divergence
//! otherwise. Calls are compared after binding their arguments to the
//! callee's live signature, so `f(1)` and `f(a=1)` agree.
//!
//! [`grade`] additionally checks the learner's final value against
//! pass/fail [`Condition`]s.

mod compare;
mod conditions;
mod format;
mod grade;
mod message;
mod mismatch;
mod normalize;
mod options;
mod resolver;

pub use compare::{compare, CompareError};
pub use conditions::{
    fail_if, grade_result, pass_if, Condition, ConditionError, ConditionMatch, OutputComparator,
    StrictComparator,
};
pub use format::{describe, format_node, source};
pub use grade::{
    grade, grade_code, grade_code_outcome, Feedback, FeedbackKind, GradeError, GradeOutcome, Side,
};
pub use message::render;
pub use mismatch::{MismatchKind, MismatchRecord, Rendered};
pub use normalize::{normalize, BoundParam, NormalizeError, ResolvedSignature};
pub use options::GradeOptions;
pub use resolver::{LiveResolver, ResolveError, Resolver};

pub use pygrade_eval::Value;
