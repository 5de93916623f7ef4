//! Core parser infrastructure: token cursor, error reporting, helpers.

use pygrade_lexer::{Lexer, Token, TokenKind};
use pygrade_types::ast::{Ident, Module};
use pygrade_types::{ErrorCode, ParseErrors, SourceFile, Span, SyntaxError, MAX_ERRORS};
use tracing::trace;

/// Maximum nesting of expressions (parentheses, unary chains, lambdas).
pub const MAX_EXPR_DEPTH: u32 = 64;
/// Maximum nesting of indented blocks.
pub const MAX_BLOCK_DEPTH: u32 = 32;

/// Recursive-descent parser over the lexer's token stream.
///
/// Collects errors and resynchronizes at the next logical line.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    errors: ParseErrors,
    pub(crate) expr_depth: u32,
    pub(crate) block_depth: u32,
}

pub struct ParseResult {
    /// `None` only when nothing could be parsed at all.
    pub module: Option<Module>,
    pub errors: ParseErrors,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        Self {
            tokens,
            pos: 0,
            source_file,
            errors: ParseErrors::empty(),
            expr_depth: 0,
            block_depth: 0,
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        const EOF: &Token = &Token {
            kind: TokenKind::Eof,
            span: Span {
                start_line: 1,
                start_col: 1,
                end_line: 1,
                end_col: 1,
            },
        };
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .unwrap_or(EOF)
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.span,
            None => Span::point(1, 1),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check_exact(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check_exact(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check_exact(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    /// Expect a closing bracket, reporting an unclosed bracket otherwise.
    pub(crate) fn expect_closing(&mut self, closing: &TokenKind, opened_at: Span) -> Option<Token> {
        if self.check_exact(closing) {
            return Some(self.advance());
        }
        let message = if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
            format!("'{closing}' was never closed (opened at {opened_at})")
        } else {
            format!("expected '{}', got '{}'", closing, self.peek_kind())
        };
        self.error_at_current(ErrorCode::UNCLOSED_BRACKET, message);
        None
    }

    pub(crate) fn expect_identifier(&mut self) -> Option<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Name(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected a name, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    /// End of a simple-statement line: a newline, or the end of input.
    pub(crate) fn expect_newline(&mut self) -> Option<()> {
        if self.eat(&TokenKind::Newline) || self.at_end() {
            return Some(());
        }
        self.error_at_current(
            ErrorCode::UNEXPECTED_TOKEN,
            format!("invalid syntax: unexpected '{}'", self.peek_kind()),
        );
        None
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        self.push_error(self.make_error(code, message, span));
    }

    pub(crate) fn make_error(
        &self,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
    ) -> SyntaxError {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        SyntaxError::new(&self.source_file.name, code, message, span, source_line)
    }

    pub(crate) fn push_error(&mut self, error: SyntaxError) {
        trace!(code = %error.code, line = error.span.start_line, "syntax error");
        self.errors.push_error(error);
    }

    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.total_errors >= MAX_ERRORS
    }

    // ── Depth Guards ──────────────────────────────────────────────────────────

    /// Enter one level of expression nesting. Returns `None` (with an error)
    /// past [`MAX_EXPR_DEPTH`]; callers must pair a successful enter with
    /// [`Parser::leave_expr`].
    pub(crate) fn enter_expr(&mut self) -> Option<()> {
        if self.expr_depth >= MAX_EXPR_DEPTH {
            self.error_at_current(
                ErrorCode::NESTING_LIMIT,
                format!("expression nesting is deeper than {MAX_EXPR_DEPTH} levels"),
            );
            return None;
        }
        self.expr_depth += 1;
        Some(())
    }

    pub(crate) fn leave_expr(&mut self) {
        self.expr_depth = self.expr_depth.saturating_sub(1);
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip to the start of the next logical line, keeping block structure.
    pub(crate) fn synchronize(&mut self) {
        let mut depth = 0i32;
        while !self.at_end() {
            match self.peek_kind() {
                TokenKind::Newline if depth <= 0 => {
                    self.advance();
                    return;
                }
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent if depth <= 0 => return,
                TokenKind::Dedent => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    pub fn parse(mut self) -> ParseResult {
        let module = self.parse_module();
        ParseResult {
            module: Some(module),
            errors: self.errors,
        }
    }
}

/// Lex and parse a source text in one step.
///
/// Any lexer or parser error fails the whole parse; the errors come back
/// ordered by position.
pub fn parse_source(name: &str, source: &str) -> Result<Module, ParseErrors> {
    let source_file = SourceFile::new(name, source);
    let lexed = Lexer::new(&source_file).lex();
    let mut errors = lexed.errors;
    let parsed = Parser::new(lexed.tokens, &source_file).parse();
    errors.extend(parsed.errors);
    if errors.has_errors() {
        errors
            .errors
            .sort_by_key(|e| (e.span.start_line, e.span.start_col));
        return Err(errors);
    }
    parsed.module.ok_or(errors)
}
