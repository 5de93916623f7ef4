//! Rendering nodes as short, source-like text for feedback messages.
//!
//! [`source`] re-renders an expression with minimal parentheses.
//! [`format_node`] is what messages quote: the same text, except that a
//! bare attribute access reads `"attr" on <receiver>`. [`describe`] names a
//! node's kind in prose ("a number", "a function call").

use pygrade_types::ast::{
    Alias, BinOp, BoolOp, Call, Expr, ExprKind, Keyword, Param, ParamKind, Stmt, StmtKind, UnaryOp,
};
use pygrade_types::node::{format_float, NodeRef};

// ══════════════════════════════════════════════════════════════════════════════
// Precedence
// ══════════════════════════════════════════════════════════════════════════════

const LAMBDA: u8 = 0;
const CONDITIONAL: u8 = 1;
const OR: u8 = 2;
const AND: u8 = 3;
const NOT: u8 = 4;
const COMPARISON: u8 = 5;
const BIT_OR: u8 = 6;
const BIT_XOR: u8 = 7;
const BIT_AND: u8 = 8;
const SHIFT: u8 = 9;
const ARITH: u8 = 10;
const TERM: u8 = 11;
const UNARY: u8 = 12;
const POWER: u8 = 13;
const PRIMARY: u8 = 14;
const ATOM: u8 = 15;

fn binop_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::BitOr => BIT_OR,
        BinOp::BitXor => BIT_XOR,
        BinOp::BitAnd => BIT_AND,
        BinOp::LShift | BinOp::RShift => SHIFT,
        BinOp::Add | BinOp::Sub => ARITH,
        BinOp::Mul | BinOp::MatMul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => TERM,
        BinOp::Pow => POWER,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Lambda { .. } => LAMBDA,
        ExprKind::IfExp { .. } => CONDITIONAL,
        ExprKind::BoolOp { op: BoolOp::Or, .. } => OR,
        ExprKind::BoolOp { op: BoolOp::And, .. } => AND,
        ExprKind::UnaryOp {
            op: UnaryOp::Not, ..
        } => NOT,
        ExprKind::Compare { .. } => COMPARISON,
        ExprKind::BinOp { op, .. } => binop_precedence(*op),
        ExprKind::UnaryOp { .. } => UNARY,
        ExprKind::Starred(_) => BIT_OR,
        ExprKind::Attribute { .. } | ExprKind::Subscript { .. } | ExprKind::Call(_) => PRIMARY,
        _ => ATOM,
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// Render an expression as source text.
pub fn source(expr: &Expr) -> String {
    render(expr, LAMBDA)
}

fn render(expr: &Expr, min: u8) -> String {
    let text = render_bare(expr);
    if precedence(expr) < min {
        format!("({text})")
    } else {
        text
    }
}

fn render_bare(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Int(v) => v.to_string(),
        ExprKind::Float(v) => format_float(*v),
        ExprKind::Str(s) => quote(s),
        ExprKind::Bool(true) => "True".to_string(),
        ExprKind::Bool(false) => "False".to_string(),
        ExprKind::NoneLit => "None".to_string(),
        ExprKind::Name(id) => id.clone(),

        ExprKind::List(elts) => format!("[{}]", join(elts)),
        ExprKind::Tuple(elts) if elts.len() == 1 => format!("({},)", source(&elts[0])),
        ExprKind::Tuple(elts) => format!("({})", join(elts)),
        ExprKind::Set(elts) => format!("{{{}}}", join(elts)),
        ExprKind::Dict { keys, values } => {
            let pairs: Vec<String> = keys
                .iter()
                .zip(values)
                .map(|(k, v)| format!("{}: {}", source(k), source(v)))
                .collect();
            format!("{{{}}}", pairs.join(", "))
        }

        ExprKind::Attribute { value, attr } => format!("{}.{}", render(value, PRIMARY), attr.name),
        ExprKind::Subscript { value, index } => {
            let index = match &index.kind {
                ExprKind::Tuple(elts) if !elts.is_empty() => join(elts),
                _ => source(index),
            };
            format!("{}[{index}]", render(value, PRIMARY))
        }
        ExprKind::Slice { lower, upper, step } => {
            let part = |e: &Option<Box<Expr>>| e.as_deref().map(source).unwrap_or_default();
            match step {
                Some(_) => format!("{}:{}:{}", part(lower), part(upper), part(step)),
                None => format!("{}:{}", part(lower), part(upper)),
            }
        }
        ExprKind::Call(call) => render_call(call),
        ExprKind::Starred(value) => format!("*{}", render(value, BIT_OR)),

        ExprKind::BinOp { left, op, right } => {
            let p = binop_precedence(*op);
            let (lmin, rmin) = if *op == BinOp::Pow {
                (PRIMARY, UNARY)
            } else {
                (p, p + 1)
            };
            format!("{} {} {}", render(left, lmin), op.as_str(), render(right, rmin))
        }
        ExprKind::UnaryOp {
            op: UnaryOp::Not,
            operand,
        } => format!("not {}", render(operand, NOT)),
        ExprKind::UnaryOp { op, operand } => format!("{}{}", op.as_str(), render(operand, UNARY)),
        ExprKind::BoolOp { op, values } => {
            let p = precedence(expr);
            let parts: Vec<String> = values.iter().map(|v| render(v, p + 1)).collect();
            parts.join(&format!(" {} ", op.as_str()))
        }
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => {
            let mut text = render(left, BIT_OR);
            for (op, right) in ops.iter().zip(comparators) {
                text.push_str(&format!(" {} {}", op.as_str(), render(right, BIT_OR)));
            }
            text
        }
        ExprKind::IfExp { test, body, orelse } => format!(
            "{} if {} else {}",
            render(body, OR),
            render(test, OR),
            render(orelse, CONDITIONAL)
        ),
        ExprKind::Lambda { params, body } if params.is_empty() => {
            format!("lambda: {}", source(body))
        }
        ExprKind::Lambda { params, body } => {
            format!("lambda {}: {}", render_params(params), source(body))
        }
    }
}

fn join(elts: &[Expr]) -> String {
    elts.iter().map(source).collect::<Vec<_>>().join(", ")
}

/// Quote a string the way it would be written in source.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn render_call(call: &Call) -> String {
    let mut args: Vec<String> = call.args.iter().map(source).collect();
    args.extend(call.keywords.iter().map(render_keyword));
    format!("{}({})", render(&call.func, PRIMARY), args.join(", "))
}

fn render_keyword(keyword: &Keyword) -> String {
    match &keyword.arg {
        Some(name) => format!("{}={}", name.name, source(&keyword.value)),
        None => format!("**{}", source(&keyword.value)),
    }
}

fn render_param(param: &Param) -> String {
    let name = &param.name.name;
    match (param.kind, &param.default) {
        (ParamKind::VarPositional, _) => format!("*{name}"),
        (ParamKind::VarKeyword, _) => format!("**{name}"),
        (_, Some(default)) => format!("{name}={}", source(default)),
        (_, None) => name.clone(),
    }
}

/// A parameter list with its `/` and bare `*` markers restored.
fn render_params(params: &[Param]) -> String {
    let mut parts = Vec::with_capacity(params.len() + 2);
    let has_var_positional = params.iter().any(|p| p.kind == ParamKind::VarPositional);
    let mut keyword_marker = false;
    for (i, param) in params.iter().enumerate() {
        if param.kind == ParamKind::KeywordOnly && !has_var_positional && !keyword_marker {
            parts.push("*".to_string());
            keyword_marker = true;
        }
        parts.push(render_param(param));
        let next_is_positional_only = params
            .get(i + 1)
            .is_some_and(|p| p.kind == ParamKind::PositionalOnly);
        if param.kind == ParamKind::PositionalOnly && !next_is_positional_only {
            parts.push("/".to_string());
        }
    }
    parts.join(", ")
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements & other nodes
// ══════════════════════════════════════════════════════════════════════════════

/// The header line of a statement: `x = 1`, `def f(a)`, `for x in xs`.
fn render_stmt(stmt: &Stmt) -> String {
    match &stmt.kind {
        StmtKind::Expr(value) => source(value),
        StmtKind::Assign { targets, value } => {
            let mut parts: Vec<String> = targets.iter().map(render_target).collect();
            parts.push(render_target(value));
            parts.join(" = ")
        }
        StmtKind::AugAssign { target, op, value } => {
            format!("{} {}= {}", source(target), op.as_str(), render_target(value))
        }
        StmtKind::FunctionDef(def) => {
            format!("def {}({})", def.name.name, render_params(&def.params))
        }
        StmtKind::ClassDef(class) if class.bases.is_empty() => format!("class {}", class.name.name),
        StmtKind::ClassDef(class) => format!("class {}({})", class.name.name, join(&class.bases)),
        StmtKind::Return(Some(value)) => format!("return {}", render_target(value)),
        StmtKind::Return(None) => "return".to_string(),
        StmtKind::If { test, .. } => format!("if {}", source(test)),
        StmtKind::While { test, .. } => format!("while {}", source(test)),
        StmtKind::For { target, iter, .. } => {
            format!("for {} in {}", render_target(target), render_target(iter))
        }
        StmtKind::Import(names) => format!("import {}", render_aliases(names)),
        StmtKind::ImportFrom { module, names } => {
            format!("from {module} import {}", render_aliases(names))
        }
        StmtKind::Raise(Some(exc)) => format!("raise {}", source(exc)),
        StmtKind::Raise(None) => "raise".to_string(),
        StmtKind::Assert { test, msg: None } => format!("assert {}", source(test)),
        StmtKind::Assert {
            test,
            msg: Some(msg),
        } => format!("assert {}, {}", source(test), source(msg)),
        StmtKind::Pass => "pass".to_string(),
        StmtKind::Break => "break".to_string(),
        StmtKind::Continue => "continue".to_string(),
    }
}

/// Tuples in target and value position are written without parentheses.
fn render_target(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Tuple(elts) if elts.len() > 1 => join(elts),
        _ => source(expr),
    }
}

fn render_alias(alias: &Alias) -> String {
    match &alias.asname {
        Some(asname) => format!("{} as {}", alias.name, asname.name),
        None => alias.name.clone(),
    }
}

fn render_aliases(names: &[Alias]) -> String {
    names.iter().map(render_alias).collect::<Vec<_>>().join(", ")
}

/// Render any node for quoting in a message.
pub fn format_node(node: NodeRef<'_>) -> String {
    match node {
        NodeRef::Expr(expr) => match &expr.kind {
            ExprKind::Attribute { value, attr } => {
                format!("\"{}\" on {}", attr.name, format_node(NodeRef::Expr(value)))
            }
            _ => source(expr),
        },
        NodeRef::Stmt(stmt) => render_stmt(stmt),
        NodeRef::Module(module) => module.body.first().map(render_stmt).unwrap_or_default(),
        NodeRef::Keyword(keyword) => render_keyword(keyword),
        NodeRef::Param(param) => render_param(param),
        NodeRef::Alias(alias) => render_alias(alias),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Kind descriptions
// ══════════════════════════════════════════════════════════════════════════════

/// Prose name for what a node is, used when the kinds of two nodes differ.
pub fn describe(node: NodeRef<'_>) -> &'static str {
    match node {
        NodeRef::Module(_) => "a module",
        NodeRef::Keyword(_) => "a keyword argument",
        NodeRef::Param(_) => "a parameter",
        NodeRef::Alias(_) => "an imported name",
        NodeRef::Stmt(stmt) => match &stmt.kind {
            StmtKind::Expr(value) => describe(NodeRef::Expr(value)),
            StmtKind::Assign { .. } => "an assignment",
            StmtKind::AugAssign { .. } => "an augmented assignment",
            StmtKind::FunctionDef(_) => "a function definition",
            StmtKind::ClassDef(_) => "a class definition",
            StmtKind::Return(_) => "a return statement",
            StmtKind::If { .. } => "an if statement",
            StmtKind::While { .. } => "a while loop",
            StmtKind::For { .. } => "a for loop",
            StmtKind::Import(_) | StmtKind::ImportFrom { .. } => "an import",
            StmtKind::Raise(_) => "a raise statement",
            StmtKind::Assert { .. } => "an assertion",
            StmtKind::Pass => "a pass statement",
            StmtKind::Break => "a break statement",
            StmtKind::Continue => "a continue statement",
        },
        NodeRef::Expr(expr) => match &expr.kind {
            ExprKind::Int(_) | ExprKind::Float(_) => "a number",
            ExprKind::Str(_) => "a string",
            ExprKind::Bool(_) => "a boolean",
            ExprKind::NoneLit => "the value None",
            ExprKind::List(_) => "a list",
            ExprKind::Tuple(_) => "a tuple",
            ExprKind::Set(_) => "a set",
            ExprKind::Dict { .. } => "a dictionary",
            ExprKind::Name(_) => "a variable",
            ExprKind::Attribute { .. } => "an attribute",
            ExprKind::Subscript { .. } => "a subscript",
            ExprKind::Slice { .. } => "a slice",
            ExprKind::Call(_) => "a function call",
            ExprKind::Starred(_) => "an unpacking",
            ExprKind::BinOp { .. } => "an arithmetic expression",
            ExprKind::UnaryOp {
                op: UnaryOp::Not, ..
            }
            | ExprKind::BoolOp { .. } => "a boolean expression",
            ExprKind::UnaryOp {
                op: UnaryOp::Neg | UnaryOp::Pos,
                operand,
            } if matches!(operand.kind, ExprKind::Int(_) | ExprKind::Float(_)) => "a number",
            ExprKind::UnaryOp { .. } => "an arithmetic expression",
            ExprKind::Compare { .. } => "a comparison",
            ExprKind::IfExp { .. } => "a conditional expression",
            ExprKind::Lambda { .. } => "a lambda function",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pygrade_parser::parse_source;

    fn first_expr(src: &str) -> Expr {
        let module = parse_source("<test>", src).unwrap();
        match module.body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(e)) => e,
            other => panic!("expected an expression statement, got {other:?}"),
        }
    }

    fn roundtrip(src: &str) -> String {
        source(&first_expr(src))
    }

    #[test]
    fn test_literals_and_displays() {
        assert_eq!(roundtrip("[1, 2]"), "[1, 2]");
        assert_eq!(roundtrip("(1,)"), "(1,)");
        assert_eq!(roundtrip("{'a': 1.5}"), "{\"a\": 1.5}");
        assert_eq!(roundtrip("{1, 2}"), "{1, 2}");
        assert_eq!(roundtrip("'it\"s'"), "\"it\\\"s\"");
        assert_eq!(roundtrip("None"), "None");
    }

    #[test]
    fn test_precedence_is_preserved() {
        assert_eq!(roundtrip("(1 + 2) * 3"), "(1 + 2) * 3");
        assert_eq!(roundtrip("1 + 2 * 3"), "1 + 2 * 3");
        assert_eq!(roundtrip("1 - (2 - 3)"), "1 - (2 - 3)");
        assert_eq!(roundtrip("-x ** 2"), "-x ** 2");
        assert_eq!(roundtrip("(-x) ** 2"), "(-x) ** 2");
        assert_eq!(roundtrip("not (a and b)"), "not (a and b)");
        assert_eq!(roundtrip("a if b else c"), "a if b else c");
    }

    #[test]
    fn test_calls_and_access() {
        assert_eq!(roundtrip("f(1, *a, k=v, **kw)"), "f(1, *a, k=v, **kw)");
        assert_eq!(roundtrip("df.head(3)"), "df.head(3)");
        assert_eq!(roundtrip("xs[1:2]"), "xs[1:2]");
        assert_eq!(roundtrip("xs[::2]"), "xs[::2]");
        assert_eq!(roundtrip("m[1, 2]"), "m[1, 2]");
        assert_eq!(roundtrip("lambda x, y=1: x"), "lambda x, y=1: x");
    }

    #[test]
    fn test_attribute_message_form() {
        let expr = first_expr("df.shape");
        assert_eq!(format_node(NodeRef::Expr(&expr)), "\"shape\" on df");
    }

    #[test]
    fn test_statement_headers() {
        let module = parse_source(
            "<test>",
            "def f(a, /, b, *, c=1):\n    pass\nx, y = 1, 2\nfor i in range(3):\n    pass\n",
        )
        .unwrap();
        let rendered: Vec<String> = module
            .body
            .iter()
            .map(|s| format_node(NodeRef::Stmt(s)))
            .collect();
        assert_eq!(
            rendered,
            vec!["def f(a, /, b, *, c=1)", "x, y = 1, 2", "for i in range(3)"]
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(NodeRef::Expr(&first_expr("2"))), "a number");
        assert_eq!(describe(NodeRef::Expr(&first_expr("'2'"))), "a string");
        assert_eq!(describe(NodeRef::Expr(&first_expr("f()"))), "a function call");
        assert_eq!(describe(NodeRef::Expr(&first_expr("-1"))), "a number");
        assert_eq!(describe(NodeRef::Expr(&first_expr("+2.5"))), "a number");
        assert_eq!(describe(NodeRef::Expr(&first_expr("-x"))), "an arithmetic expression");
    }

    #[test]
    fn test_format_determinism_100_iterations() {
        let expr = first_expr("f(a, [1, 2.5, 'x'], k=-y ** 2) if p else {1: (2,)}");
        let first = source(&expr);
        for _ in 0..100 {
            assert_eq!(source(&expr), first);
        }
    }
}
