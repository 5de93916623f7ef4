//! Core lexer: converts Python source text to a token stream.
//!
//! Features:
//! - Indentation tracked with a stack; emits `Indent`/`Dedent` at line starts
//! - Implicit line joining inside `()`, `[]`, `{}` and `\` continuation
//! - `#` comments and blank lines produce no tokens
//! - Single, double and triple quoted strings with `r`/`b`/`f`/`u` prefixes
//! - Decimal, hex, octal, binary and float literals with `_` separators
//! - Error recovery: collects up to 20 errors instead of stopping at the first

use std::collections::VecDeque;

use pygrade_types::{ErrorCode, ParseErrors, SourceFile, Span, SyntaxError, MAX_ERRORS};

use crate::token::{Token, TokenKind};

const TAB_WIDTH: usize = 8;

pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    pos: usize,
    /// 1-based.
    line: u32,
    /// 1-based, counted in characters.
    col: u32,
    errors: ParseErrors,
    /// Open bracket count; newlines inside brackets are insignificant.
    bracket_depth: u32,
    /// Indentation widths of the enclosing blocks; always starts with 0.
    indent_stack: Vec<usize>,
    at_line_start: bool,
    /// Layout tokens waiting to be emitted (dedent runs).
    pending: VecDeque<Token>,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// Always ends with [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub errors: ParseErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: ParseErrors::empty(),
            bracket_depth: 0,
            indent_stack: vec![0],
            at_line_start: true,
            pending: VecDeque::new(),
        }
    }

    /// Lex the entire source file.
    pub fn lex(mut self) -> LexResult {
        let mut tokens: Vec<Token> = Vec::new();

        loop {
            if self.errors.total_errors >= MAX_ERRORS {
                break;
            }
            if let Some(token) = self.pending.pop_front() {
                tokens.push(token);
                continue;
            }
            if self.at_line_start && self.bracket_depth == 0 {
                self.at_line_start = false;
                if !self.scan_indentation() {
                    continue;
                }
                if let Some(token) = self.pending.pop_front() {
                    tokens.push(token);
                    continue;
                }
            }
            match self.scan_token() {
                Some(token) if token.kind == TokenKind::Eof => break,
                Some(token) => {
                    let is_newline = token.kind == TokenKind::Newline;
                    let redundant = is_newline
                        && tokens
                            .last()
                            .is_none_or(|t| t.kind == TokenKind::Newline);
                    if !redundant {
                        tokens.push(token);
                    }
                }
                None => {}
            }
        }

        let end = self.current_span();
        if tokens
            .last()
            .is_some_and(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Dedent))
        {
            tokens.push(Token::new(TokenKind::Newline, end));
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            tokens.push(Token::new(TokenKind::Dedent, end));
        }
        tokens.push(Token::new(TokenKind::Eof, end));

        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // UTF-8 continuation bytes share the column of their lead byte.
            self.col += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn text_from(&self, start: usize) -> &'src str {
        std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("")
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let err = SyntaxError::new(&self.source_file.name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    // ─────────────────────────────────────────────────────────────
    // Indentation
    // ─────────────────────────────────────────────────────────────

    /// Measure the indentation of a new logical line and queue layout
    /// tokens. Returns `false` when the line was blank or comment-only and
    /// has been consumed entirely.
    fn scan_indentation(&mut self) -> bool {
        let mut width = 0usize;
        while let Some(ch) = self.peek() {
            match ch {
                b' ' => width += 1,
                b'\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                b'\x0c' => width = 0,
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            None => return false,
            Some(b'\n') | Some(b'\r') | Some(b'#') => {
                while let Some(ch) = self.peek() {
                    self.advance();
                    if ch == b'\n' {
                        break;
                    }
                }
                self.at_line_start = true;
                return false;
            }
            _ => {}
        }

        let current = self.indent_stack.last().copied().unwrap_or(0);
        let span = self.current_span();
        if width > current {
            self.indent_stack.push(width);
            self.pending.push_back(Token::new(TokenKind::Indent, span));
        } else if width < current {
            while self.indent_stack.last().is_some_and(|&w| w > width) {
                self.indent_stack.pop();
                self.pending.push_back(Token::new(TokenKind::Dedent, span));
            }
            if self.indent_stack.last().copied().unwrap_or(0) != width {
                self.emit_error(
                    ErrorCode::INCONSISTENT_DEDENT,
                    "unindent does not match any outer indentation level",
                    span,
                );
                self.indent_stack.push(width);
            }
        }
        true
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    /// Scan one token. `None` means something was skipped (a comment, a
    /// joined line, an invalid character) and the caller should loop.
    fn scan_token(&mut self) -> Option<Token> {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\x0c')) {
            self.advance();
        }

        let start_line = self.line;
        let start_col = self.col;
        let start = self.pos;
        let Some(ch) = self.advance() else {
            return Some(Token::new(TokenKind::Eof, self.current_span()));
        };

        let single = |lexer: &Self, kind| Some(Token::new(kind, lexer.span_from(start_line, start_col)));

        match ch {
            b'\n' => {
                if self.bracket_depth > 0 {
                    return None;
                }
                self.at_line_start = true;
                Some(Token::new(
                    TokenKind::Newline,
                    Span::point(start_line, start_col),
                ))
            }
            b'#' => {
                while self.peek().is_some_and(|c| c != b'\n') {
                    self.advance();
                }
                None
            }
            b'\\' => {
                self.eat(b'\r');
                if !self.eat(b'\n') {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNEXPECTED_CHARACTER,
                        "unexpected character after line continuation character",
                        span,
                    );
                }
                None
            }
            b'"' | b'\'' => Some(self.scan_string(ch, false, start_line, start_col)),
            b'0'..=b'9' => Some(self.scan_number(start, start_line, start_col)),
            b'.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                Some(self.scan_number(start, start_line, start_col))
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | 0x80..=0xFF => {
                Some(self.scan_identifier(start, start_line, start_col))
            }

            b'(' | b'[' | b'{' => {
                self.bracket_depth += 1;
                let kind = match ch {
                    b'(' => TokenKind::LParen,
                    b'[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                };
                single(self, kind)
            }
            b')' | b']' | b'}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                let kind = match ch {
                    b')' => TokenKind::RParen,
                    b']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                };
                single(self, kind)
            }
            b',' => single(self, TokenKind::Comma),
            b':' => single(self, TokenKind::Colon),
            b';' => single(self, TokenKind::Semicolon),
            b'.' => single(self, TokenKind::Dot),
            b'~' => single(self, TokenKind::Tilde),
            b'@' => single(self, TokenKind::At),
            b'&' => single(self, TokenKind::Amp),
            b'|' => single(self, TokenKind::Pipe),
            b'^' => single(self, TokenKind::Caret),

            b'+' => {
                let kind = if self.eat(b'=') { TokenKind::PlusEq } else { TokenKind::Plus };
                single(self, kind)
            }
            b'-' => {
                let kind = if self.eat(b'=') {
                    TokenKind::MinusEq
                } else if self.eat(b'>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                };
                single(self, kind)
            }
            b'%' => {
                let kind = if self.eat(b'=') { TokenKind::PercentEq } else { TokenKind::Percent };
                single(self, kind)
            }
            b'*' => {
                let kind = if self.eat(b'*') {
                    if self.eat(b'=') {
                        TokenKind::DoubleStarEq
                    } else {
                        TokenKind::DoubleStar
                    }
                } else if self.eat(b'=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                };
                single(self, kind)
            }
            b'/' => {
                let kind = if self.eat(b'/') {
                    if self.eat(b'=') {
                        TokenKind::DoubleSlashEq
                    } else {
                        TokenKind::DoubleSlash
                    }
                } else if self.eat(b'=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                };
                single(self, kind)
            }
            b'=' => {
                let kind = if self.eat(b'=') { TokenKind::EqEq } else { TokenKind::Eq };
                single(self, kind)
            }
            b'<' => {
                let kind = if self.eat(b'=') {
                    TokenKind::LessEq
                } else if self.eat(b'<') {
                    TokenKind::LShift
                } else {
                    TokenKind::Less
                };
                single(self, kind)
            }
            b'>' => {
                let kind = if self.eat(b'=') {
                    TokenKind::GreaterEq
                } else if self.eat(b'>') {
                    TokenKind::RShift
                } else {
                    TokenKind::Greater
                };
                single(self, kind)
            }
            b'!' if self.eat(b'=') => single(self, TokenKind::NotEq),

            _ => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNEXPECTED_CHARACTER,
                    format!("invalid character '{}'", ch as char),
                    span,
                );
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_identifier(&mut self, start: usize, start_line: u32, start_col: u32) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80)
        {
            self.advance();
        }
        let text = self.text_from(start);

        if matches!(self.peek(), Some(b'"' | b'\'')) && is_string_prefix(text) {
            let raw = text.bytes().any(|c| c == b'r' || c == b'R');
            if let Some(quote) = self.advance() {
                return self.scan_string(quote, raw, start_line, start_col);
            }
        }

        let span = self.span_from(start_line, start_col);
        let kind =
            TokenKind::from_keyword(text).unwrap_or_else(|| TokenKind::Name(text.to_string()));
        Token::new(kind, span)
    }

    // ─────────────────────────────────────────────────────────────
    // Number literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self, start: usize, start_line: u32, start_col: u32) -> Token {
        let first = self.source[start];
        let radix = match (first, self.peek()) {
            (b'0', Some(b'x' | b'X')) => 16,
            (b'0', Some(b'o' | b'O')) => 8,
            (b'0', Some(b'b' | b'B')) => 2,
            _ => 10,
        };

        if radix != 10 {
            self.advance();
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_hexdigit() || c == b'_')
            {
                self.advance();
            }
            let digits: String = self.text_from(start)[2..]
                .chars()
                .filter(|c| *c != '_')
                .collect();
            let span = self.span_from(start_line, start_col);
            return match i64::from_str_radix(&digits, radix) {
                Ok(v) => Token::new(TokenKind::Int(v), span),
                Err(_) => {
                    self.emit_error(
                        ErrorCode::INVALID_NUMBER,
                        format!("invalid number literal '{}'", self.text_from(start)),
                        span,
                    );
                    Token::new(TokenKind::Int(0), span)
                }
            };
        }

        let mut is_float = first == b'.';
        self.skip_digits();
        if !is_float && self.peek() == Some(b'.') {
            is_float = true;
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = matches!(self.peek_at(1), Some(b'+' | b'-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..digit_at {
                    self.advance();
                }
                self.skip_digits();
            }
        }

        let text: String = self.text_from(start).chars().filter(|c| *c != '_').collect();
        if matches!(self.peek(), Some(b'j' | b'J')) {
            self.advance();
            let span = self.span_from(start_line, start_col);
            self.emit_error(
                ErrorCode::INVALID_NUMBER,
                "complex number literals are not supported",
                span,
            );
            return Token::new(TokenKind::Int(0), span);
        }

        let span = self.span_from(start_line, start_col);
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => Token::new(TokenKind::Float(v), span),
                Err(_) => {
                    self.emit_error(
                        ErrorCode::INVALID_NUMBER,
                        format!("invalid number literal '{text}'"),
                        span,
                    );
                    Token::new(TokenKind::Float(0.0), span)
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Token::new(TokenKind::Int(v), span),
                Err(_) => {
                    self.emit_error(
                        ErrorCode::INVALID_NUMBER,
                        format!("integer literal '{text}' is too large"),
                        span,
                    );
                    Token::new(TokenKind::Int(0), span)
                }
            }
        }
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'_') {
            self.advance();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // String literals
    // ─────────────────────────────────────────────────────────────

    /// Scan a string whose opening quote has been consumed.
    fn scan_string(&mut self, quote: u8, raw: bool, start_line: u32, start_col: u32) -> Token {
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }
        let mut buf: Vec<u8> = Vec::new();

        loop {
            match self.peek() {
                None => break,
                Some(b'\n') if !triple => break,
                Some(c) if c == quote => {
                    if !triple {
                        self.advance();
                        return self.finish_string(buf, start_line, start_col);
                    }
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        self.advance();
                        self.advance();
                        self.advance();
                        return self.finish_string(buf, start_line, start_col);
                    }
                    self.advance();
                    buf.push(c);
                }
                Some(b'\\') if raw => {
                    self.advance();
                    buf.push(b'\\');
                    if let Some(next) = self.advance() {
                        buf.push(next);
                    }
                }
                Some(b'\\') => {
                    self.advance();
                    self.scan_escape(&mut buf);
                }
                Some(c) => {
                    self.advance();
                    buf.push(c);
                }
            }
        }

        let span = self.span_from(start_line, start_col);
        self.emit_error(
            ErrorCode::UNTERMINATED_STRING,
            "unterminated string literal",
            span,
        );
        self.finish_string(buf, start_line, start_col)
    }

    fn finish_string(&self, buf: Vec<u8>, start_line: u32, start_col: u32) -> Token {
        let text = String::from_utf8_lossy(&buf).into_owned();
        Token::new(TokenKind::Str(text), self.span_from(start_line, start_col))
    }

    /// Decode one escape sequence after its backslash.
    fn scan_escape(&mut self, buf: &mut Vec<u8>) {
        let Some(ch) = self.advance() else { return };
        let decoded: &[u8] = match ch {
            b'\n' => b"",
            b'n' => b"\n",
            b't' => b"\t",
            b'r' => b"\r",
            b'0' => b"\0",
            b'\\' => b"\\",
            b'\'' => b"'",
            b'"' => b"\"",
            b'x' => {
                let hex: Vec<u8> = (0..2).filter_map(|_| self.advance()).collect();
                let value = std::str::from_utf8(&hex)
                    .ok()
                    .and_then(|h| u32::from_str_radix(h, 16).ok())
                    .and_then(char::from_u32);
                if let Some(c) = value {
                    let mut tmp = [0u8; 4];
                    buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                }
                return;
            }
            other => {
                // Unknown escapes keep their backslash.
                buf.push(b'\\');
                buf.push(other);
                return;
            }
        };
        buf.extend_from_slice(decoded);
    }
}

fn is_string_prefix(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "r" | "b" | "f" | "u" | "rb" | "br" | "fr" | "rf"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let sf = SourceFile::new("test.py", source);
        Lexer::new(&sf).lex().tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_statement() {
        assert_eq!(
            kinds("x = 1"),
            vec![
                TokenKind::Name("x".into()),
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_prefix_is_not_a_name() {
        assert_eq!(kinds("r'a\\d'")[0], TokenKind::Str("a\\d".into()));
        assert_eq!(kinds("f\"x\"")[0], TokenKind::Str("x".into()));
        assert_eq!(kinds("rb")[0], TokenKind::Name("rb".into()));
    }

    #[test]
    fn test_utf8_string_content() {
        assert_eq!(kinds("'héllo'")[0], TokenKind::Str("héllo".into()));
    }

    #[test]
    fn test_string_prefixes() {
        assert!(is_string_prefix("Rb"));
        assert!(!is_string_prefix("x"));
    }
}
