//! Parser tests: statements, expression precedence, call arguments,
//! parameter lists, error reporting, and determinism.

use pygrade_lexer::Lexer;
use pygrade_parser::{parse_source, ParseResult, Parser};
use pygrade_types::ast::*;
use pygrade_types::{ErrorCode, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn parse(source: &str) -> ParseResult {
    let sf = SourceFile::new("test.py", source);
    let lex = Lexer::new(&sf).lex();
    Parser::new(lex.tokens, &sf).parse()
}

fn parse_ok(source: &str) -> Module {
    match parse_source("test.py", source) {
        Ok(module) => module,
        Err(errors) => {
            for e in &errors.errors {
                eprintln!("  ERROR: {e}");
            }
            panic!("unexpected parse errors (see above)");
        }
    }
}

fn first_error_code(source: &str) -> ErrorCode {
    let errors = parse_source("test.py", source).expect_err("expected a parse error");
    errors.first().expect("at least one error").code
}

/// The expression of a single expression statement.
fn expr(source: &str) -> Expr {
    let module = parse_ok(source);
    match module.body.into_iter().next().map(|s| s.kind) {
        Some(StmtKind::Expr(e)) => e,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

fn call(source: &str) -> Call {
    match expr(source).kind {
        ExprKind::Call(c) => *c,
        other => panic!("expected call, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Statements
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_empty_source() {
    let module = parse_ok("");
    assert!(module.body.is_empty());
    let module = parse_ok("\n\n# only a comment\n");
    assert!(module.body.is_empty());
}

#[test]
fn test_simple_statements_and_semicolons() {
    let module = parse_ok("a = 1; b = 2\nprint(a)\n");
    assert_eq!(module.body.len(), 3);
    assert!(matches!(module.body[0].kind, StmtKind::Assign { .. }));
    assert!(matches!(module.body[2].kind, StmtKind::Expr(_)));
    assert_eq!(module.body[2].span.start_line, 2);
}

#[test]
fn test_chained_assignment() {
    let module = parse_ok("a = b = 3");
    match &module.body[0].kind {
        StmtKind::Assign { targets, value } => {
            assert_eq!(targets.len(), 2);
            assert_eq!(value.kind, ExprKind::Int(3));
        }
        other => panic!("expected assign, got {other:?}"),
    }
}

#[test]
fn test_tuple_unpacking_assignment() {
    let module = parse_ok("a, *rest = [1, 2, 3]");
    match &module.body[0].kind {
        StmtKind::Assign { targets, .. } => match &targets[0].kind {
            ExprKind::Tuple(elts) => {
                assert_eq!(elts.len(), 2);
                assert!(matches!(elts[1].kind, ExprKind::Starred(_)));
            }
            other => panic!("expected tuple target, got {other:?}"),
        },
        other => panic!("expected assign, got {other:?}"),
    }
}

#[test]
fn test_augmented_assignment() {
    let module = parse_ok("total += x * 2");
    match &module.body[0].kind {
        StmtKind::AugAssign { op, .. } => assert_eq!(*op, BinOp::Add),
        other => panic!("expected augassign, got {other:?}"),
    }
}

#[test]
fn test_inline_def_body_takes_rest_of_line() {
    let module = parse_ok("def foo(a, b=1): pass; foo(2)");
    assert_eq!(module.body.len(), 1);
    match &module.body[0].kind {
        StmtKind::FunctionDef(def) => {
            assert_eq!(def.name.name, "foo");
            assert_eq!(def.params.len(), 2);
            assert_eq!(def.body.len(), 2);
            assert!(matches!(def.body[1].kind, StmtKind::Expr(_)));
        }
        other => panic!("expected def, got {other:?}"),
    }
}

#[test]
fn test_indented_def_then_call() {
    let module = parse_ok("def foo(a, b=1):\n    return a + b\n\nfoo(2)\n");
    assert_eq!(module.body.len(), 2);
    assert_eq!(module.body[1].span.start_line, 4);
}

#[test]
fn test_elif_nests_in_orelse() {
    let module = parse_ok("if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n");
    match &module.body[0].kind {
        StmtKind::If { orelse, .. } => {
            assert_eq!(orelse.len(), 1);
            match &orelse[0].kind {
                StmtKind::If { orelse: inner, .. } => assert_eq!(inner.len(), 1),
                other => panic!("expected nested if, got {other:?}"),
            }
        }
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn test_for_target_tuple_and_else() {
    let module = parse_ok("for i, v in enumerate(xs):\n    pass\nelse:\n    done()\n");
    match &module.body[0].kind {
        StmtKind::For { target, orelse, .. } => {
            assert!(matches!(target.kind, ExprKind::Tuple(_)));
            assert_eq!(orelse.len(), 1);
        }
        other => panic!("expected for, got {other:?}"),
    }
}

#[test]
fn test_class_with_method() {
    let module = parse_ok("class A(Base):\n    def m(self, x):\n        return x\n");
    match &module.body[0].kind {
        StmtKind::ClassDef(class) => {
            assert_eq!(class.name.name, "A");
            assert_eq!(class.bases.len(), 1);
            assert_eq!(class.body.len(), 1);
        }
        other => panic!("expected class, got {other:?}"),
    }
}

#[test]
fn test_imports() {
    let module = parse_ok("import numpy as np, os.path\nfrom math import sqrt, pi as PI\n");
    match &module.body[0].kind {
        StmtKind::Import(names) => {
            assert_eq!(names.len(), 2);
            assert_eq!(names[0].name, "numpy");
            assert_eq!(names[0].asname.as_ref().map(|a| a.name.as_str()), Some("np"));
            assert_eq!(names[1].name, "os.path");
        }
        other => panic!("expected import, got {other:?}"),
    }
    match &module.body[1].kind {
        StmtKind::ImportFrom { module, names } => {
            assert_eq!(module, "math");
            assert_eq!(names.len(), 2);
        }
        other => panic!("expected from-import, got {other:?}"),
    }
}

#[test]
fn test_assert_and_raise() {
    let module = parse_ok("assert x > 0, 'positive'\nraise ValueError('bad')\n");
    assert!(matches!(
        module.body[0].kind,
        StmtKind::Assert { msg: Some(_), .. }
    ));
    assert!(matches!(module.body[1].kind, StmtKind::Raise(Some(_))));
}

// ─────────────────────────────────────────────────────────────────────
// Expression precedence
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_prec_mul_binds_tighter_than_add() {
    match expr("1 + 2 * 3").kind {
        ExprKind::BinOp { op, right, .. } => {
            assert_eq!(op, BinOp::Add);
            assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Mul, .. }));
        }
        other => panic!("expected binop, got {other:?}"),
    }
}

#[test]
fn test_prec_left_assoc_same_level() {
    match expr("1 - 2 - 3").kind {
        ExprKind::BinOp { left, right, .. } => {
            assert!(matches!(left.kind, ExprKind::BinOp { .. }));
            assert_eq!(right.kind, ExprKind::Int(3));
        }
        other => panic!("expected binop, got {other:?}"),
    }
}

#[test]
fn test_prec_parentheses_group() {
    match expr("1 + (2 + 2)").kind {
        ExprKind::BinOp { left, right, .. } => {
            assert_eq!(left.kind, ExprKind::Int(1));
            assert!(matches!(right.kind, ExprKind::BinOp { .. }));
        }
        other => panic!("expected binop, got {other:?}"),
    }
}

#[test]
fn test_prec_power_right_assoc_and_unary() {
    // -2 ** 2 is -(2 ** 2)
    match expr("-2 ** 2").kind {
        ExprKind::UnaryOp { op, operand } => {
            assert_eq!(op, UnaryOp::Neg);
            assert!(matches!(operand.kind, ExprKind::BinOp { op: BinOp::Pow, .. }));
        }
        other => panic!("expected unary, got {other:?}"),
    }
    match expr("2 ** 3 ** 2").kind {
        ExprKind::BinOp { left, right, .. } => {
            assert_eq!(left.kind, ExprKind::Int(2));
            assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Pow, .. }));
        }
        other => panic!("expected binop, got {other:?}"),
    }
}

#[test]
fn test_bool_ops_flatten() {
    match expr("a or b or c").kind {
        ExprKind::BoolOp { op, values } => {
            assert_eq!(op, BoolOp::Or);
            assert_eq!(values.len(), 3);
        }
        other => panic!("expected boolop, got {other:?}"),
    }
    match expr("a and not b or c").kind {
        ExprKind::BoolOp { op, values } => {
            assert_eq!(op, BoolOp::Or);
            assert!(matches!(values[0].kind, ExprKind::BoolOp { op: BoolOp::And, .. }));
        }
        other => panic!("expected boolop, got {other:?}"),
    }
}

#[test]
fn test_comparison_chain_and_two_token_ops() {
    match expr("a < b <= c").kind {
        ExprKind::Compare { ops, comparators, .. } => {
            assert_eq!(ops, vec![CmpOp::Lt, CmpOp::LtE]);
            assert_eq!(comparators.len(), 2);
        }
        other => panic!("expected compare, got {other:?}"),
    }
    match expr("x not in ys").kind {
        ExprKind::Compare { ops, .. } => assert_eq!(ops, vec![CmpOp::NotIn]),
        other => panic!("expected compare, got {other:?}"),
    }
    match expr("x is not None").kind {
        ExprKind::Compare { ops, .. } => assert_eq!(ops, vec![CmpOp::IsNot]),
        other => panic!("expected compare, got {other:?}"),
    }
}

#[test]
fn test_conditional_expression_and_lambda() {
    assert!(matches!(expr("a if c else b").kind, ExprKind::IfExp { .. }));
    match expr("lambda x, y=2: x + y").kind {
        ExprKind::Lambda { params, .. } => {
            assert_eq!(params.len(), 2);
            assert!(params[1].default.is_some());
        }
        other => panic!("expected lambda, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Atoms & trailers
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_displays() {
    assert_eq!(expr("()").kind, ExprKind::Tuple(vec![]));
    assert!(matches!(expr("(1,)").kind, ExprKind::Tuple(ref e) if e.len() == 1));
    assert!(matches!(expr("[1, 2,]").kind, ExprKind::List(ref e) if e.len() == 2));
    assert!(matches!(expr("{1, 2}").kind, ExprKind::Set(ref e) if e.len() == 2));
    assert!(matches!(expr("{}").kind, ExprKind::Dict { ref keys, .. } if keys.is_empty()));
    assert!(matches!(expr("{'a': 1, 'b': 2}").kind, ExprKind::Dict { ref keys, .. } if keys.len() == 2));
}

#[test]
fn test_adjacent_strings_concatenate() {
    assert_eq!(expr("'ab' \"cd\"").kind, ExprKind::Str("abcd".into()));
}

#[test]
fn test_attribute_subscript_and_slice() {
    match expr("df.head()[1:3]").kind {
        ExprKind::Subscript { value, index } => {
            assert!(matches!(value.kind, ExprKind::Call(_)));
            match index.kind {
                ExprKind::Slice { lower, upper, step } => {
                    assert!(lower.is_some());
                    assert!(upper.is_some());
                    assert!(step.is_none());
                }
                other => panic!("expected slice, got {other:?}"),
            }
        }
        other => panic!("expected subscript, got {other:?}"),
    }
    assert!(matches!(expr("xs[::2]").kind, ExprKind::Subscript { .. }));
}

#[test]
fn test_call_arguments() {
    let c = call("f(1, *rest, k=2, **extra)");
    assert_eq!(c.args.len(), 2);
    assert!(matches!(c.args[1].kind, ExprKind::Starred(_)));
    assert_eq!(c.keywords.len(), 2);
    assert_eq!(c.keywords[0].arg.as_ref().map(|a| a.name.as_str()), Some("k"));
    assert!(c.keywords[1].arg.is_none());
    assert!(c.has_unpacking());
}

#[test]
fn test_keyword_value_can_be_comparison() {
    let c = call("f(a=x == 1)");
    assert!(matches!(c.keywords[0].value.kind, ExprKind::Compare { .. }));
}

#[test]
fn test_parameter_kinds() {
    let module = parse_ok("def f(a, /, b, *args, c, d=1, **kw): pass");
    match &module.body[0].kind {
        StmtKind::FunctionDef(def) => {
            let kinds: Vec<ParamKind> = def.params.iter().map(|p| p.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    ParamKind::PositionalOnly,
                    ParamKind::PositionalOrKeyword,
                    ParamKind::VarPositional,
                    ParamKind::KeywordOnly,
                    ParamKind::KeywordOnly,
                    ParamKind::VarKeyword,
                ]
            );
        }
        other => panic!("expected def, got {other:?}"),
    }
}

#[test]
fn test_annotations_discarded() {
    let module = parse_ok("def f(x: int, y: str = 'a') -> bool:\n    return True\n");
    match &module.body[0].kind {
        StmtKind::FunctionDef(def) => assert_eq!(def.params.len(), 2),
        other => panic!("expected def, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_repeated_keyword_argument() {
    let errors = parse_source("test.py", "f(a=1, a=2)").expect_err("repeated keyword");
    let err = errors.first().expect("one error");
    assert_eq!(err.code, ErrorCode::REPEATED_KEYWORD);
    assert_eq!(err.subject.as_deref(), Some("a"));
    assert_eq!(err.span.start_line, 1);
}

#[test]
fn test_positional_after_keyword() {
    assert_eq!(
        first_error_code("f(a=1, 2)"),
        ErrorCode::POSITIONAL_AFTER_KEYWORD
    );
}

#[test]
fn test_invalid_parameters() {
    assert_eq!(
        first_error_code("def f(a=1, b): pass"),
        ErrorCode::INVALID_PARAMETERS
    );
    assert_eq!(
        first_error_code("def f(a, a): pass"),
        ErrorCode::INVALID_PARAMETERS
    );
}

#[test]
fn test_invalid_assignment_target() {
    assert_eq!(first_error_code("f() = 1"), ErrorCode::INVALID_TARGET);
    assert_eq!(first_error_code("a + 1 = 2"), ErrorCode::INVALID_TARGET);
}

#[test]
fn test_unclosed_bracket() {
    let errors = parse_source("test.py", "print(1, 2\n").expect_err("unclosed");
    let err = errors.first().expect("one error");
    assert_eq!(err.code, ErrorCode::UNCLOSED_BRACKET);
    assert!(err.message.contains("never closed"), "{}", err.message);
}

#[test]
fn test_unexpected_indent() {
    assert_eq!(first_error_code("x = 1\n    y = 2\n"), ErrorCode::UNEXPECTED_INDENT);
}

#[test]
fn test_expected_indent() {
    assert_eq!(first_error_code("if x:\ny = 1\n"), ErrorCode::EXPECTED_INDENT);
}

#[test]
fn test_unsupported_syntax() {
    assert_eq!(
        first_error_code("[x for x in y]"),
        ErrorCode::UNSUPPORTED_SYNTAX
    );
    assert_eq!(first_error_code("with f: pass"), ErrorCode::UNSUPPORTED_SYNTAX);
}

#[test]
fn test_error_recovery_collects_multiple_lines() {
    let result = parse("a = )\nb = 2\nc = (\n");
    assert!(result.errors.total_errors >= 2);
    let module = result.module.expect("module");
    assert!(module
        .body
        .iter()
        .any(|s| matches!(&s.kind, StmtKind::Assign { value, .. } if value.kind == ExprKind::Int(2))));
}

#[test]
fn test_expression_nesting_limit() {
    let src = format!("x = {}1{}", "(".repeat(200), ")".repeat(200));
    assert_eq!(first_error_code(&src), ErrorCode::NESTING_LIMIT);
}

// ─────────────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_parser_determinism_100_iterations() {
    let src = "def foo(a, b=1):\n    return a + b\n\nfoo(2, b=3)\n";
    let first = parse_ok(src);
    for i in 0..100 {
        assert_eq!(first, parse_ok(src), "Determinism failure at iteration {i}");
    }
}
