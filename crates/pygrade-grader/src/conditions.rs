//! Pass/fail conditions on a learner's final value.

use std::rc::Rc;

use pygrade_eval::{Value, MAX_NESTING};
use thiserror::Error;
use tracing::trace;

/// One expected value and the verdict it carries.
#[derive(Debug, Clone)]
pub struct Condition {
    pub expected: Value,
    pub message: Option<String>,
    /// Whether matching this condition means the result is correct.
    pub correct: bool,
}

/// A condition that marks `expected` as correct. An empty message means
/// none.
pub fn pass_if(expected: Value, message: &str) -> Condition {
    Condition {
        expected,
        message: non_empty(message),
        correct: true,
    }
}

/// A condition that marks `expected` as a known wrong answer.
pub fn fail_if(expected: Value, message: &str) -> Condition {
    Condition {
        expected,
        message: non_empty(message),
        correct: false,
    }
}

fn non_empty(message: &str) -> Option<String> {
    (!message.is_empty()).then(|| message.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("At least one condition object must be provided")]
    Empty,
}

/// Equality used to match a learner's value against a condition.
pub trait OutputComparator {
    fn equals(&self, actual: &Value, expected: &Value) -> bool;
}

/// Values match when they have the same type and are equal, all the way
/// down: `1` does not match `1.0`, nor `[1]` match `[1.0]`. Containers
/// nested deeper than [`MAX_NESTING`] do not match.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictComparator;

impl OutputComparator for StrictComparator {
    fn equals(&self, actual: &Value, expected: &Value) -> bool {
        self.equals_at(actual, expected, 0)
    }
}

impl StrictComparator {
    fn equals_at(&self, actual: &Value, expected: &Value, depth: usize) -> bool {
        if actual.type_name() != expected.type_name() {
            return false;
        }
        let all_equal = |a: &[Value], b: &[Value]| {
            depth < MAX_NESTING
                && a.len() == b.len()
                && a.iter().zip(b).all(|(x, y)| self.equals_at(x, y, depth + 1))
        };
        match (actual, expected) {
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || all_equal(&a.borrow()[..], &b.borrow()[..])
            }
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b) || all_equal(&a[..], &b[..]),
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                depth < MAX_NESTING
                    && a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter().any(|(k, v)| {
                            self.equals_at(key, k, depth + 1) && self.equals_at(value, v, depth + 1)
                        })
                    })
            }
            _ => actual == expected,
        }
    }
}

/// The verdict for a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionMatch {
    pub correct: bool,
    /// The matched condition's message, if it had one.
    pub message: Option<String>,
}

/// Match `value` against `conditions`.
///
/// The first matching pass condition wins, then the first matching fail
/// condition. A value that matches nothing is incorrect when a pass
/// condition exists and correct otherwise.
pub fn grade_result(
    conditions: &[Condition],
    value: &Value,
    comparator: &dyn OutputComparator,
) -> Result<ConditionMatch, ConditionError> {
    if conditions.is_empty() {
        return Err(ConditionError::Empty);
    }
    let matched = |correct: bool| {
        conditions
            .iter()
            .filter(|c| c.correct == correct)
            .find(|c| comparator.equals(value, &c.expected))
    };
    if let Some(hit) = matched(true).or_else(|| matched(false)) {
        trace!(correct = hit.correct, "condition matched");
        return Ok(ConditionMatch {
            correct: hit.correct,
            message: hit.message.clone(),
        });
    }
    Ok(ConditionMatch {
        correct: !conditions.iter().any(|c| c.correct),
        message: None,
    })
}
