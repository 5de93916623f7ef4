//! Grading entry points.
//!
//! [`grade_code`] is the single call an exercise harness needs:
//!
//! ```text
//! text ─→ parse ─→ compare (LiveResolver per side) ─→ render ─→ Option<String>
//! ```
//!
//! Every stage's failure becomes a [`GradeOutcome`] variant, so learner
//! input never escapes as an error or a panic. A snippet that raises when
//! executed is reported as a [`GradeOutcome::Failure`] unless a mismatch
//! was found first.

use pygrade_eval::{EvalError, Interpreter, Value};
use pygrade_parser::parse_source;
use pygrade_types::ast::Module;
use pygrade_types::{ParseErrors, SyntaxError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::compare::{compare, CompareError};
use crate::conditions::{grade_result, Condition, ConditionError, StrictComparator};
use crate::message::{self, EMPTY_SOLUTION, EMPTY_SUBMISSION};
use crate::mismatch::MismatchRecord;
use crate::options::GradeOptions;
use crate::resolver::LiveResolver;

const SUBMISSION_FILE: &str = "submission.py";
const SOLUTION_FILE: &str = "solution.py";

// ══════════════════════════════════════════════════════════════════════════════
// Outcome
// ══════════════════════════════════════════════════════════════════════════════

/// Which snippet something refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Submission,
    Solution,
}

/// Structured result of comparing two snippets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GradeOutcome {
    Correct,
    Mismatch { mismatch: MismatchRecord },
    EmptySubmission,
    EmptySolution,
    SyntaxError { side: Side, error: SyntaxError },
    /// Grading could not be completed.
    Failure { detail: String },
}

impl GradeOutcome {
    /// The learner-facing message; `None` only for [`GradeOutcome::Correct`].
    pub fn message(&self) -> Option<String> {
        match self {
            GradeOutcome::Correct => None,
            GradeOutcome::Mismatch { mismatch } => Some(message::render(mismatch)),
            GradeOutcome::EmptySubmission => Some(EMPTY_SUBMISSION.to_string()),
            GradeOutcome::EmptySolution => Some(EMPTY_SOLUTION.to_string()),
            GradeOutcome::SyntaxError { side, error } => {
                Some(message::syntax_error(error, *side == Side::Submission))
            }
            GradeOutcome::Failure { detail } => Some(message::failure(detail)),
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, GradeOutcome::Correct)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Errors raised while grading a learner's result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradeError {
    #[error(transparent)]
    Compare(#[from] CompareError),
    #[error(transparent)]
    Evaluation(#[from] EvalError),
    #[error(transparent)]
    Conditions(#[from] ConditionError),
}

// ══════════════════════════════════════════════════════════════════════════════
// Code comparison
// ══════════════════════════════════════════════════════════════════════════════

/// Compare a submission with a solution using default options.
///
/// Returns `None` when they are equivalent, otherwise one sentence
/// describing the first difference.
pub fn grade_code(submission: &str, solution: &str) -> Option<String> {
    grade_code_outcome(submission, solution, &GradeOptions::default()).message()
}

/// Compare a submission with a solution, keeping the structured outcome.
pub fn grade_code_outcome(submission: &str, solution: &str, options: &GradeOptions) -> GradeOutcome {
    let (sub_module, sol_module) = match parse_pair(submission, solution) {
        Ok(modules) => modules,
        Err(outcome) => return outcome,
    };

    let mut sub_resolver = LiveResolver::new(&sub_module, options.limits());
    let mut sol_resolver = LiveResolver::new(&sol_module, options.limits());
    match compare(&sub_module, &sol_module, &mut sub_resolver, &mut sol_resolver) {
        Ok(None) => match sub_resolver.fatal_failure().or_else(|| sol_resolver.fatal_failure()) {
            Some(failure) => {
                warn!(%failure, limit = failure.is_limit(), "environment build failed");
                GradeOutcome::Failure {
                    detail: failure.to_string(),
                }
            }
            None => {
                debug!("submission matches solution");
                GradeOutcome::Correct
            }
        },
        Ok(Some(mismatch)) => GradeOutcome::Mismatch { mismatch },
        Err(error) => {
            warn!(%error, "comparison failed");
            GradeOutcome::Failure {
                detail: error.to_string(),
            }
        }
    }
}

/// Parse both snippets, or explain why they cannot be compared.
fn parse_pair(submission: &str, solution: &str) -> Result<(Module, Module), GradeOutcome> {
    if submission.trim().is_empty() {
        return Err(GradeOutcome::EmptySubmission);
    }
    if solution.trim().is_empty() {
        return Err(GradeOutcome::EmptySolution);
    }
    let sub = parse_side(SUBMISSION_FILE, submission, Side::Submission)?;
    let sol = parse_side(SOLUTION_FILE, solution, Side::Solution)?;
    // Comments alone parse to nothing.
    if sub.body.is_empty() {
        return Err(GradeOutcome::EmptySubmission);
    }
    if sol.body.is_empty() {
        return Err(GradeOutcome::EmptySolution);
    }
    Ok((sub, sol))
}

fn parse_side(file: &str, source: &str, side: Side) -> Result<Module, GradeOutcome> {
    parse_source(file, source).map_err(|errors: ParseErrors| {
        debug!(?side, count = errors.total_errors, "parse failed");
        match errors.first() {
            Some(error) => GradeOutcome::SyntaxError {
                side,
                error: error.clone(),
            },
            None => GradeOutcome::Failure {
                detail: format!("{file} could not be parsed"),
            },
        }
    })
}

// ══════════════════════════════════════════════════════════════════════════════
// Full grading
// ══════════════════════════════════════════════════════════════════════════════

/// How feedback should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Success,
    Error,
    Warning,
    Info,
}

/// What the harness shows the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub message: String,
    pub correct: bool,
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
}

impl Feedback {
    fn new(message: impl Into<String>, correct: bool, kind: FeedbackKind) -> Self {
        Self {
            message: message.into(),
            correct,
            kind,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Grade a submission: its code against the solution first, then its final
/// value against `conditions`.
///
/// With no conditions, matching the solution's code is enough.
pub fn grade(
    conditions: &[Condition],
    submission: &str,
    solution: &str,
    options: &GradeOptions,
) -> Feedback {
    let outcome = grade_code_outcome(submission, solution, options);
    match &outcome {
        GradeOutcome::Correct => {}
        GradeOutcome::EmptySolution => {
            return Feedback::new(EMPTY_SOLUTION, true, FeedbackKind::Info);
        }
        other => {
            let message = other.message().unwrap_or_default();
            return Feedback::new(message, false, FeedbackKind::Error);
        }
    }

    if conditions.is_empty() {
        return Feedback::new(options.praise.clone(), true, FeedbackKind::Success);
    }
    match check_result(conditions, submission, options) {
        Ok(feedback) => feedback,
        Err(error) => {
            warn!(%error, "checking the result failed");
            Feedback::new(
                format!("Error occurred while checking the submission: {error}"),
                false,
                FeedbackKind::Warning,
            )
        }
    }
}

fn check_result(
    conditions: &[Condition],
    submission: &str,
    options: &GradeOptions,
) -> Result<Feedback, GradeError> {
    let value = evaluate_last(submission, options)?;
    let verdict = grade_result(conditions, &value, &StrictComparator)?;
    debug!(correct = verdict.correct, value = %value.repr(), "result graded");

    let (prefix, kind) = if verdict.correct {
        (&options.praise, FeedbackKind::Success)
    } else {
        (&options.encourage, FeedbackKind::Error)
    };
    let message = match verdict.message {
        Some(message) => format!("{prefix} {message}"),
        None => prefix.clone(),
    };
    Ok(Feedback::new(message.trim(), verdict.correct, kind))
}

/// The value of the submission's final expression statement; `None` when
/// it ends with any other statement.
fn evaluate_last(submission: &str, options: &GradeOptions) -> Result<Value, GradeError> {
    let module = parse_source(SUBMISSION_FILE, submission)
        .map_err(|_| CompareError::Environment("the submission could not be parsed".into()))?;
    let mut interp = Interpreter::new(options.limits());
    Ok(interp.last_value(&module)?.unwrap_or(Value::None))
}
