//! Generic, kind-agnostic view over the typed AST.
//!
//! The comparator and formatter walk trees through [`NodeRef`]: each node
//! has a static kind name and a fixed, ordered list of named [`Slot`]s.
//! Two nodes of the same kind always expose the same slot names in the
//! same order.

use crate::ast::{Alias, Expr, ExprKind, Keyword, Module, Param, Stmt, StmtKind};
use crate::Span;

/// A borrowed reference to any AST node.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Module(&'a Module),
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    Keyword(&'a Keyword),
    Param(&'a Param),
    Alias(&'a Alias),
}

/// A primitive value stored directly in a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leaf<'a> {
    Int(i64),
    Float(f64),
    Str(&'a str),
    Bool(bool),
    None,
    /// A bare identifier (variable, attribute, parameter name).
    Ident(&'a str),
    /// An operator symbol or other fixed tag.
    Symbol(&'static str),
}

/// The content of one named slot.
#[derive(Debug, Clone)]
pub enum Slot<'a> {
    Node(NodeRef<'a>),
    Optional(Option<NodeRef<'a>>),
    Nodes(Vec<NodeRef<'a>>),
    Leaf(Leaf<'a>),
    Leaves(Vec<Leaf<'a>>),
}

fn exprs(list: &[Expr]) -> Vec<NodeRef<'_>> {
    list.iter().map(NodeRef::Expr).collect()
}

fn stmts(list: &[Stmt]) -> Vec<NodeRef<'_>> {
    list.iter().map(NodeRef::Stmt).collect()
}

fn params(list: &[Param]) -> Vec<NodeRef<'_>> {
    list.iter().map(NodeRef::Param).collect()
}

fn aliases(list: &[Alias]) -> Vec<NodeRef<'_>> {
    list.iter().map(NodeRef::Alias).collect()
}

fn opt_expr(expr: &Option<Expr>) -> Slot<'_> {
    Slot::Optional(expr.as_ref().map(NodeRef::Expr))
}

fn opt_boxed(expr: &Option<Box<Expr>>) -> Slot<'_> {
    Slot::Optional(expr.as_deref().map(NodeRef::Expr))
}

impl<'a> NodeRef<'a> {
    /// Static kind name, identical for all nodes of one shape.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeRef::Module(_) => "Module",
            NodeRef::Keyword(_) => "Keyword",
            NodeRef::Param(_) => "Param",
            NodeRef::Alias(_) => "Alias",
            NodeRef::Stmt(s) => match &s.kind {
                StmtKind::Expr(_) => "Expr",
                StmtKind::Assign { .. } => "Assign",
                StmtKind::AugAssign { .. } => "AugAssign",
                StmtKind::FunctionDef(_) => "FunctionDef",
                StmtKind::ClassDef(_) => "ClassDef",
                StmtKind::Return(_) => "Return",
                StmtKind::If { .. } => "If",
                StmtKind::While { .. } => "While",
                StmtKind::For { .. } => "For",
                StmtKind::Import(_) => "Import",
                StmtKind::ImportFrom { .. } => "ImportFrom",
                StmtKind::Raise(_) => "Raise",
                StmtKind::Assert { .. } => "Assert",
                StmtKind::Pass => "Pass",
                StmtKind::Break => "Break",
                StmtKind::Continue => "Continue",
            },
            NodeRef::Expr(e) => match &e.kind {
                ExprKind::Int(_) => "Int",
                ExprKind::Float(_) => "Float",
                ExprKind::Str(_) => "Str",
                ExprKind::Bool(_) => "Bool",
                ExprKind::NoneLit => "None",
                ExprKind::List(_) => "List",
                ExprKind::Tuple(_) => "Tuple",
                ExprKind::Set(_) => "Set",
                ExprKind::Dict { .. } => "Dict",
                ExprKind::Name(_) => "Name",
                ExprKind::Attribute { .. } => "Attribute",
                ExprKind::Subscript { .. } => "Subscript",
                ExprKind::Slice { .. } => "Slice",
                ExprKind::Call(_) => "Call",
                ExprKind::Starred(_) => "Starred",
                ExprKind::BinOp { .. } => "BinOp",
                ExprKind::UnaryOp { .. } => "UnaryOp",
                ExprKind::BoolOp { .. } => "BoolOp",
                ExprKind::Compare { .. } => "Compare",
                ExprKind::IfExp { .. } => "IfExp",
                ExprKind::Lambda { .. } => "Lambda",
            },
        }
    }

    pub fn span(&self) -> Span {
        match self {
            NodeRef::Module(m) => m.span,
            NodeRef::Stmt(s) => s.span,
            NodeRef::Expr(e) => e.span,
            NodeRef::Keyword(k) => k.span,
            NodeRef::Param(p) => p.span,
            NodeRef::Alias(a) => a.span,
        }
    }

    /// Starting line, if the node carries a real source position.
    ///
    /// Modules and synthesized nodes have none.
    pub fn line(&self) -> Option<u32> {
        match self {
            NodeRef::Module(_) => None,
            other => {
                let span = other.span();
                (!span.is_synthetic()).then_some(span.start_line)
            }
        }
    }

    /// The node's named children in fixed order.
    pub fn slots(&self) -> Vec<(&'static str, Slot<'a>)> {
        match *self {
            NodeRef::Module(m) => vec![("body", Slot::Nodes(stmts(&m.body)))],
            NodeRef::Keyword(k) => vec![
                (
                    "arg",
                    Slot::Leaf(match &k.arg {
                        Some(id) => Leaf::Ident(&id.name),
                        None => Leaf::None,
                    }),
                ),
                ("value", Slot::Node(NodeRef::Expr(&k.value))),
            ],
            NodeRef::Param(p) => vec![
                ("name", Slot::Leaf(Leaf::Ident(&p.name.name))),
                ("kind", Slot::Leaf(Leaf::Symbol(p.kind.as_str()))),
                ("default", opt_expr(&p.default)),
            ],
            NodeRef::Alias(a) => vec![
                ("name", Slot::Leaf(Leaf::Ident(&a.name))),
                (
                    "asname",
                    Slot::Leaf(match &a.asname {
                        Some(id) => Leaf::Ident(&id.name),
                        None => Leaf::None,
                    }),
                ),
            ],
            NodeRef::Stmt(s) => stmt_slots(s),
            NodeRef::Expr(e) => expr_slots(e),
        }
    }
}

fn stmt_slots(stmt: &Stmt) -> Vec<(&'static str, Slot<'_>)> {
    match &stmt.kind {
        StmtKind::Expr(value) => vec![("value", Slot::Node(NodeRef::Expr(value)))],
        StmtKind::Assign { targets, value } => vec![
            ("targets", Slot::Nodes(exprs(targets))),
            ("value", Slot::Node(NodeRef::Expr(value))),
        ],
        StmtKind::AugAssign { target, op, value } => vec![
            ("target", Slot::Node(NodeRef::Expr(target))),
            ("op", Slot::Leaf(Leaf::Symbol(op.as_str()))),
            ("value", Slot::Node(NodeRef::Expr(value))),
        ],
        StmtKind::FunctionDef(def) => vec![
            ("name", Slot::Leaf(Leaf::Ident(&def.name.name))),
            ("params", Slot::Nodes(params(&def.params))),
            ("body", Slot::Nodes(stmts(&def.body))),
        ],
        StmtKind::ClassDef(class) => vec![
            ("name", Slot::Leaf(Leaf::Ident(&class.name.name))),
            ("bases", Slot::Nodes(exprs(&class.bases))),
            ("body", Slot::Nodes(stmts(&class.body))),
        ],
        StmtKind::Return(value) => vec![("value", opt_expr(value))],
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => vec![
            ("test", Slot::Node(NodeRef::Expr(test))),
            ("body", Slot::Nodes(stmts(body))),
            ("orelse", Slot::Nodes(stmts(orelse))),
        ],
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => vec![
            ("target", Slot::Node(NodeRef::Expr(target))),
            ("iter", Slot::Node(NodeRef::Expr(iter))),
            ("body", Slot::Nodes(stmts(body))),
            ("orelse", Slot::Nodes(stmts(orelse))),
        ],
        StmtKind::Import(names) => vec![("names", Slot::Nodes(aliases(names)))],
        StmtKind::ImportFrom { module, names } => vec![
            ("module", Slot::Leaf(Leaf::Ident(module))),
            ("names", Slot::Nodes(aliases(names))),
        ],
        StmtKind::Raise(exc) => vec![("exc", opt_expr(exc))],
        StmtKind::Assert { test, msg } => vec![
            ("test", Slot::Node(NodeRef::Expr(test))),
            ("msg", opt_expr(msg)),
        ],
        StmtKind::Pass | StmtKind::Break | StmtKind::Continue => Vec::new(),
    }
}

fn expr_slots(expr: &Expr) -> Vec<(&'static str, Slot<'_>)> {
    match &expr.kind {
        ExprKind::Int(v) => vec![("value", Slot::Leaf(Leaf::Int(*v)))],
        ExprKind::Float(v) => vec![("value", Slot::Leaf(Leaf::Float(*v)))],
        ExprKind::Str(v) => vec![("value", Slot::Leaf(Leaf::Str(v)))],
        ExprKind::Bool(v) => vec![("value", Slot::Leaf(Leaf::Bool(*v)))],
        ExprKind::NoneLit => vec![("value", Slot::Leaf(Leaf::None))],
        ExprKind::List(elts) | ExprKind::Tuple(elts) | ExprKind::Set(elts) => {
            vec![("elts", Slot::Nodes(exprs(elts)))]
        }
        ExprKind::Dict { keys, values } => vec![
            ("keys", Slot::Nodes(exprs(keys))),
            ("values", Slot::Nodes(exprs(values))),
        ],
        ExprKind::Name(id) => vec![("id", Slot::Leaf(Leaf::Ident(id)))],
        ExprKind::Attribute { value, attr } => vec![
            ("value", Slot::Node(NodeRef::Expr(value))),
            ("attr", Slot::Leaf(Leaf::Ident(&attr.name))),
        ],
        ExprKind::Subscript { value, index } => vec![
            ("value", Slot::Node(NodeRef::Expr(value))),
            ("slice", Slot::Node(NodeRef::Expr(index))),
        ],
        ExprKind::Slice { lower, upper, step } => vec![
            ("lower", opt_boxed(lower)),
            ("upper", opt_boxed(upper)),
            ("step", opt_boxed(step)),
        ],
        ExprKind::Call(call) => vec![
            ("func", Slot::Node(NodeRef::Expr(&call.func))),
            ("args", Slot::Nodes(exprs(&call.args))),
            (
                "keywords",
                Slot::Nodes(call.keywords.iter().map(NodeRef::Keyword).collect()),
            ),
        ],
        ExprKind::Starred(value) => vec![("value", Slot::Node(NodeRef::Expr(value)))],
        ExprKind::BinOp { left, op, right } => vec![
            ("left", Slot::Node(NodeRef::Expr(left))),
            ("op", Slot::Leaf(Leaf::Symbol(op.as_str()))),
            ("right", Slot::Node(NodeRef::Expr(right))),
        ],
        ExprKind::UnaryOp { op, operand } => vec![
            ("op", Slot::Leaf(Leaf::Symbol(op.as_str()))),
            ("operand", Slot::Node(NodeRef::Expr(operand))),
        ],
        ExprKind::BoolOp { op, values } => vec![
            ("op", Slot::Leaf(Leaf::Symbol(op.as_str()))),
            ("values", Slot::Nodes(exprs(values))),
        ],
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => vec![
            ("left", Slot::Node(NodeRef::Expr(left))),
            (
                "ops",
                Slot::Leaves(ops.iter().map(|op| Leaf::Symbol(op.as_str())).collect()),
            ),
            ("comparators", Slot::Nodes(exprs(comparators))),
        ],
        ExprKind::IfExp { test, body, orelse } => vec![
            ("test", Slot::Node(NodeRef::Expr(test))),
            ("body", Slot::Node(NodeRef::Expr(body))),
            ("orelse", Slot::Node(NodeRef::Expr(orelse))),
        ],
        ExprKind::Lambda { params: ps, body } => vec![
            ("params", Slot::Nodes(params(ps))),
            ("body", Slot::Node(NodeRef::Expr(body))),
        ],
    }
}

// ── Floats ────────────────────────────────────────────────────────────────────

/// Render a float the way Python's `repr` does for common values.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        let text = if v > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else if v.abs() >= 1e16 {
        let s = format!("{v:e}");
        match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        }
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, Call, Ident};

    fn e(kind: ExprKind) -> Expr {
        Expr::new(kind, Span::new(2, 1, 2, 5))
    }

    #[test]
    fn test_kind_and_line() {
        let int = e(ExprKind::Int(3));
        let node = NodeRef::Expr(&int);
        assert_eq!(node.kind(), "Int");
        assert_eq!(node.line(), Some(2));

        let synthetic = Expr::synthetic(ExprKind::Int(3));
        assert_eq!(NodeRef::Expr(&synthetic).line(), None);
    }

    #[test]
    fn test_binop_slots_are_ordered() {
        let expr = e(ExprKind::BinOp {
            left: Box::new(e(ExprKind::Int(1))),
            op: BinOp::Add,
            right: Box::new(e(ExprKind::Int(2))),
        });
        let names: Vec<_> = NodeRef::Expr(&expr)
            .slots()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["left", "op", "right"]);
    }

    #[test]
    fn test_call_slots() {
        let call = e(ExprKind::Call(Box::new(Call {
            func: e(ExprKind::Name("f".into())),
            args: vec![e(ExprKind::Int(1))],
            keywords: vec![Keyword {
                arg: Some(Ident::new("b", Span::point(2, 5))),
                value: e(ExprKind::Int(2)),
                span: Span::point(2, 5),
            }],
        })));
        let slots = NodeRef::Expr(&call).slots();
        assert_eq!(slots.len(), 3);
        match &slots[2].1 {
            Slot::Nodes(kws) => assert_eq!(kws[0].kind(), "Keyword"),
            other => panic!("unexpected slot {other:?}"),
        }
    }

    #[test]
    fn test_leaf_types_differ() {
        assert_ne!(Leaf::Int(1), Leaf::Float(1.0));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }
}
