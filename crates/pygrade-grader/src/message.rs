//! Learner-facing sentences.

use pygrade_types::{BindErrorKind, ErrorCode, SyntaxError};

use crate::mismatch::{MismatchKind, MismatchRecord, Rendered};

pub(crate) const EMPTY_SUBMISSION: &str = "I didn't receive your code. Did you write any?";
pub(crate) const EMPTY_SOLUTION: &str = "No solution is provided for this exercise.";

/// One sentence explaining a mismatch. Never fails; absent fields drop
/// their clause.
pub fn render(record: &MismatchRecord) -> String {
    let got = record.submission_text();
    let expected = record.solution_text();
    let at = at_line(record.line);

    match &record.kind {
        MismatchKind::WrongValue => {
            format!("I expected `{expected}`, but you wrote `{got}`{at}{}.", parent_clause(record))
        }
        MismatchKind::WrongType => {
            format!(
                "I expected {} `{expected}`, but what you wrote was interpreted as {} `{got}`{at}{}.",
                description(&record.solution),
                description(&record.submission),
                parent_clause(record),
            )
        }
        MismatchKind::Missing => format!("I expected `{expected}`{at}."),
        MismatchKind::Unexpected => format!("I did not expect `{got}`{at}."),
        MismatchKind::MalformedCall { error } => {
            let hint = match error.kind() {
                BindErrorKind::Missing => {
                    "You may have misspelled an argument name, or left out an important argument."
                }
                BindErrorKind::Unexpected => {
                    "You may have included an unnecessary argument, or misspelled an important argument name."
                }
                BindErrorKind::Surplus => {
                    "You may have passed more arguments than the function accepts."
                }
                BindErrorKind::Duplicate => {
                    "You passed multiple values for the same argument; remove one of them."
                }
            };
            format!("I expected `{expected}`, but `{got}`{at} can't be evaluated: {error}. {hint}")
        }
    }
}

fn description(side: &Option<Rendered>) -> &str {
    side.as_ref().map_or("", |r| r.description.as_str())
}

fn at_line(line: Option<u32>) -> String {
    line.map(|n| format!(" at line {n}")).unwrap_or_default()
}

/// `, in `parent`` when the parent says something the mismatched text
/// does not.
fn parent_clause(record: &MismatchRecord) -> String {
    match record.parent.as_deref() {
        Some(parent) if !parent.is_empty() && parent != record.submission_text() => {
            format!(", in `{parent}`")
        }
        _ => String::new(),
    }
}

/// Explain a syntax error. `own_code` is false for the solution.
pub(crate) fn syntax_error(error: &SyntaxError, own_code: bool) -> String {
    if let (true, Some(name)) = (error.code == ErrorCode::REPEATED_KEYWORD, &error.subject) {
        let whose = if own_code { "You passed" } else { "The solution passes" };
        return format!(
            "{whose} multiple arguments named `{name}` at line {}, which will cause an error. \
             Check your spelling, or remove one of the arguments.",
            error.line()
        );
    }
    let whose = if own_code { "your code" } else { "the solution code" };
    format!(
        "I couldn't parse {whose}: {} at line {}.",
        error.message.trim_end_matches('.'),
        error.line()
    )
}

pub(crate) fn failure(detail: &str) -> String {
    format!("There was a problem checking your code: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pygrade_types::{BindError, Span};

    fn record(kind: MismatchKind) -> MismatchRecord {
        MismatchRecord {
            kind,
            submission: Some(Rendered::text("Int", "a number", "2")),
            solution: Some(Rendered::text("Int", "a number", "1")),
            line: Some(3),
            solution_line: Some(3),
            parent: None,
        }
    }

    #[test]
    fn test_parent_clause_only_when_distinct() {
        let mut r = record(MismatchKind::WrongValue);
        r.parent = Some("f(a=2)".into());
        assert_eq!(render(&r), "I expected `1`, but you wrote `2` at line 3, in `f(a=2)`.");
        r.parent = Some("2".into());
        assert_eq!(render(&r), "I expected `1`, but you wrote `2` at line 3.");
    }

    #[test]
    fn test_missing_line_drops_clause() {
        let mut r = record(MismatchKind::Missing);
        r.line = None;
        assert_eq!(render(&r), "I expected `1`.");
    }

    #[test]
    fn test_malformed_hints() {
        let mut r = record(MismatchKind::MalformedCall {
            error: BindError::SurplusArgument,
        });
        r.submission = Some(Rendered::text("Call", "a function call", "f(1, 2)"));
        r.solution = Some(Rendered::text("Call", "a function call", "f(a=1)"));
        assert_eq!(
            render(&r),
            "I expected `f(a=1)`, but `f(1, 2)` at line 3 can't be evaluated: \
             too many positional arguments. \
             You may have passed more arguments than the function accepts."
        );
    }

    #[test]
    fn test_syntax_error_sides() {
        let error = SyntaxError::new(
            "solution.py",
            ErrorCode::UNSUPPORTED_SYNTAX,
            "unsupported syntax",
            Span::new(2, 1, 2, 4),
            "x = ",
        );
        assert_eq!(
            syntax_error(&error, false),
            "I couldn't parse the solution code: unsupported syntax at line 2."
        );
    }
}
