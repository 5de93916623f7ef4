use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of syntax errors stored before the rest are only counted.
pub const MAX_ERRORS: usize = 20;

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Lexical,
    Syntax,
    Indentation,
    Limit,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Syntax => write!(f, "syntax"),
            Self::Indentation => write!(f, "indentation"),
            Self::Limit => write!(f, "limit"),
        }
    }
}

/// Numeric error code (E100–E499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Lexical errors (E100–E199) ──
    pub const UNEXPECTED_CHARACTER: Self = Self(100);
    pub const UNTERMINATED_STRING: Self = Self(101);
    pub const INVALID_NUMBER: Self = Self(102);

    // ── Syntax errors (E200–E299) ──
    pub const UNEXPECTED_TOKEN: Self = Self(200);
    pub const UNCLOSED_BRACKET: Self = Self(201);
    pub const REPEATED_KEYWORD: Self = Self(202);
    pub const INVALID_TARGET: Self = Self(203);
    pub const UNSUPPORTED_SYNTAX: Self = Self(204);
    pub const POSITIONAL_AFTER_KEYWORD: Self = Self(205);
    pub const INVALID_PARAMETERS: Self = Self(206);

    // ── Indentation errors (E300–E399) ──
    pub const UNEXPECTED_INDENT: Self = Self(300);
    pub const EXPECTED_INDENT: Self = Self(301);
    pub const INCONSISTENT_DEDENT: Self = Self(302);

    // ── Structural limits (E400–E499) ──
    pub const NESTING_LIMIT: Self = Self(400);

    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Lexical,
            300..=399 => ErrorCategory::Indentation,
            400..=499 => ErrorCategory::Limit,
            _ => ErrorCategory::Syntax,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A structured syntax error raised while lexing or parsing Python source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxError {
    /// Source file name (`submission.py`, `solution.py`).
    pub file: String,
    pub code: ErrorCode,
    /// Derived from `code`.
    pub category: ErrorCategory,
    pub message: String,
    pub span: Span,
    /// The exact source line for context.
    pub source_line: String,
    /// The offending name, when the error is about one (a repeated keyword).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl SyntaxError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// 1-based line the error starts on.
    pub fn line(&self) -> u32 {
        self.span.start_line
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [{}] {}",
            self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Syntax errors collected by one lexer or parser run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseErrors {
    pub errors: Vec<SyntaxError>,
    pub total_errors: usize,
}

impl ParseErrors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, storing at most [`MAX_ERRORS`].
    pub fn push_error(&mut self, error: SyntaxError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Append everything from `other`, keeping the cap.
    pub fn extend(&mut self, other: ParseErrors) {
        let skipped = other.total_errors - other.errors.len();
        for err in other.errors {
            self.push_error(err);
        }
        self.total_errors += skipped;
    }

    /// The earliest error in source order.
    pub fn first(&self) -> Option<&SyntaxError> {
        self.errors
            .iter()
            .min_by_key(|e| (e.span.start_line, e.span.start_col))
    }
}
