//! Lexer tests: layout tokens, literals, operators, comments, error
//! recovery, and the 100-iteration determinism check.

use pygrade_lexer::{Lexer, TokenKind};
use pygrade_types::{ErrorCode, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

/// Token kinds, excluding the final Eof.
fn kinds(source: &str) -> Vec<TokenKind> {
    let sf = SourceFile::new("test.py", source);
    Lexer::new(&sf)
        .lex()
        .tokens
        .into_iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.kind)
        .collect()
}

fn error_codes(source: &str) -> Vec<ErrorCode> {
    let sf = SourceFile::new("test.py", source);
    Lexer::new(&sf)
        .lex()
        .errors
        .errors
        .into_iter()
        .map(|e| e.code)
        .collect()
}

fn name(s: &str) -> TokenKind {
    TokenKind::Name(s.to_string())
}

// ─────────────────────────────────────────────────────────────────────
// Layout
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_indent_and_dedent() {
    let src = "if x:\n    y = 1\nz\n";
    assert_eq!(
        kinds(src),
        vec![
            TokenKind::If,
            name("x"),
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            name("y"),
            TokenKind::Eq,
            TokenKind::Int(1),
            TokenKind::Newline,
            TokenKind::Dedent,
            name("z"),
            TokenKind::Newline,
        ]
    );
}

#[test]
fn test_dedents_closed_at_eof() {
    let src = "def f():\n    if a:\n        pass";
    let ks = kinds(src);
    let dedents = ks.iter().filter(|k| **k == TokenKind::Dedent).count();
    let indents = ks.iter().filter(|k| **k == TokenKind::Indent).count();
    assert_eq!(indents, 2);
    assert_eq!(dedents, 2);
    assert_eq!(ks[ks.len() - 3], TokenKind::Newline);
}

#[test]
fn test_multi_level_dedent() {
    let src = "for a in b:\n  for c in d:\n    pass\nx\n";
    let ks = kinds(src);
    let pos = ks.iter().position(|k| *k == name("x")).unwrap();
    assert_eq!(ks[pos - 1], TokenKind::Dedent);
    assert_eq!(ks[pos - 2], TokenKind::Dedent);
}

#[test]
fn test_blank_and_comment_lines_ignored() {
    let src = "x = 1\n\n   # comment\n\ny = 2  # trailing\n";
    assert_eq!(
        kinds(src),
        vec![
            name("x"),
            TokenKind::Eq,
            TokenKind::Int(1),
            TokenKind::Newline,
            name("y"),
            TokenKind::Eq,
            TokenKind::Int(2),
            TokenKind::Newline,
        ]
    );
}

#[test]
fn test_implicit_line_joining() {
    let src = "f(1,\n      2)\n";
    assert_eq!(
        kinds(src),
        vec![
            name("f"),
            TokenKind::LParen,
            TokenKind::Int(1),
            TokenKind::Comma,
            TokenKind::Int(2),
            TokenKind::RParen,
            TokenKind::Newline,
        ]
    );
}

#[test]
fn test_backslash_continuation() {
    let src = "x = 1 + \\\n    2\n";
    assert!(!kinds(src).contains(&TokenKind::Indent));
    assert_eq!(kinds(src).len(), 6);
}

#[test]
fn test_semicolons() {
    assert_eq!(
        kinds("a; b"),
        vec![name("a"), TokenKind::Semicolon, name("b"), TokenKind::Newline]
    );
}

// ─────────────────────────────────────────────────────────────────────
// Literals
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_numbers() {
    assert_eq!(kinds("42")[0], TokenKind::Int(42));
    assert_eq!(kinds("1_000")[0], TokenKind::Int(1000));
    assert_eq!(kinds("0x1F")[0], TokenKind::Int(31));
    assert_eq!(kinds("0b101")[0], TokenKind::Int(5));
    assert_eq!(kinds("3.5")[0], TokenKind::Float(3.5));
    assert_eq!(kinds(".5")[0], TokenKind::Float(0.5));
    assert_eq!(kinds("1e3")[0], TokenKind::Float(1000.0));
    assert_eq!(kinds("2.")[0], TokenKind::Float(2.0));
}

#[test]
fn test_strings() {
    assert_eq!(kinds("'a'")[0], TokenKind::Str("a".into()));
    assert_eq!(kinds("\"it's\"")[0], TokenKind::Str("it's".into()));
    assert_eq!(kinds("'a\\nb'")[0], TokenKind::Str("a\nb".into()));
    assert_eq!(kinds("'\\x41'")[0], TokenKind::Str("A".into()));
    assert_eq!(kinds("'\\d'")[0], TokenKind::Str("\\d".into()));
}

#[test]
fn test_triple_quoted_string_spans_lines() {
    let ks = kinds("s = \"\"\"one\ntwo\"\"\"\nx\n");
    assert_eq!(ks[2], TokenKind::Str("one\ntwo".into()));
    assert_eq!(ks[3], TokenKind::Newline);
    assert_eq!(ks[4], name("x"));
}

#[test]
fn test_keywords_and_names() {
    assert_eq!(
        kinds("not x is None"),
        vec![
            TokenKind::Not,
            name("x"),
            TokenKind::Is,
            TokenKind::None,
            TokenKind::Newline
        ]
    );
    assert_eq!(kinds("yield")[0], TokenKind::ReservedWord("yield"));
    assert_eq!(kinds("größe")[0], name("größe"));
}

// ─────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_compound_operators() {
    assert_eq!(
        kinds("a **= b // c != d -> e"),
        vec![
            name("a"),
            TokenKind::DoubleStarEq,
            name("b"),
            TokenKind::DoubleSlash,
            name("c"),
            TokenKind::NotEq,
            name("d"),
            TokenKind::Arrow,
            name("e"),
            TokenKind::Newline,
        ]
    );
    assert_eq!(kinds("x<<=1")[1], TokenKind::LShift);
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_unterminated_string() {
    assert_eq!(error_codes("x = 'abc\ny = 1"), vec![ErrorCode::UNTERMINATED_STRING]);
}

#[test]
fn test_inconsistent_dedent() {
    let src = "if x:\n        a\n    b\n";
    assert_eq!(error_codes(src), vec![ErrorCode::INCONSISTENT_DEDENT]);
}

#[test]
fn test_invalid_character_recovers() {
    let src = "x = 1 $ 2\n";
    assert_eq!(error_codes(src), vec![ErrorCode::UNEXPECTED_CHARACTER]);
    assert!(kinds(src).contains(&TokenKind::Int(2)));
}

#[test]
fn test_integer_overflow() {
    assert_eq!(
        error_codes("99999999999999999999"),
        vec![ErrorCode::INVALID_NUMBER]
    );
}

#[test]
fn test_error_positions_are_one_based() {
    let sf = SourceFile::new("test.py", "a = 1\nb = ?\n");
    let result = Lexer::new(&sf).lex();
    let err = &result.errors.errors[0];
    assert_eq!(err.span.start_line, 2);
    assert_eq!(err.span.start_col, 5);
    assert_eq!(err.source_line, "b = ?");
}

// ─────────────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_lexer_determinism_100_iterations() {
    let src = "def foo(a, b=1):\n    return a + b\n\nfoo(2)\n";
    let first = kinds(src);
    for i in 0..100 {
        assert_eq!(first, kinds(src), "Determinism failure at iteration {i}");
    }
}
