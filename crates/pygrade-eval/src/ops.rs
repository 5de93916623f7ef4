//! Operator semantics: arithmetic, comparison, membership.

use std::cmp::Ordering;

use pygrade_types::ast::{BinOp, CmpOp, UnaryOp};

use crate::error::{EvalError, EvalResult};
use crate::value::{Value, MAX_NESTING};

/// Longest string or sequence an operation may build.
pub(crate) const MAX_SEQUENCE_LEN: usize = 1 << 20;

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn num(v: &Value) -> Option<Num> {
    match v {
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Int(n) => Some(Num::Int(*n)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn overflow() -> EvalError {
    EvalError::Overflow("integer result too large".into())
}

fn unsupported_operands(op: &str, l: &Value, r: &Value) -> EvalError {
    EvalError::type_error(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        l.type_name(),
        r.type_name()
    ))
}

// ── Binary ────────────────────────────────────────────────────────────────────

pub(crate) fn binary(op: BinOp, l: &Value, r: &Value) -> EvalResult<Value> {
    match (op, l, r) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            check_len(a.len().saturating_add(b.len()))?;
            Ok(Value::str(format!("{a}{b}")))
        }
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            check_len(a.len().saturating_add(b.len()))?;
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            check_len(a.len().saturating_add(b.len()))?;
            let mut items = a.to_vec();
            items.extend(b.iter().cloned());
            Ok(Value::tuple(items))
        }
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            let count = repeat_count(s.len(), *n)?;
            Ok(Value::str(s.repeat(count)))
        }
        (BinOp::Mul, Value::List(items), Value::Int(n))
        | (BinOp::Mul, Value::Int(n), Value::List(items)) => {
            let items = items.borrow();
            let count = repeat_count(items.len(), *n)?;
            Ok(Value::list(repeat_items(&items, count)))
        }
        (BinOp::Mul, Value::Tuple(items), Value::Int(n))
        | (BinOp::Mul, Value::Int(n), Value::Tuple(items)) => {
            let count = repeat_count(items.len(), *n)?;
            Ok(Value::tuple(repeat_items(items, count)))
        }
        (BinOp::Mod, Value::Str(_), _) => Err(EvalError::Unsupported(
            "'%' string formatting".into(),
        )),
        _ => match (num(l), num(r)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => int_binary(op, a, b),
            (Some(a), Some(b)) => float_binary(op, to_f64(a), to_f64(b), l, r),
            _ => Err(unsupported_operands(op.as_str(), l, r)),
        },
    }
}

fn to_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

/// Fails once a string or sequence would grow past [`MAX_SEQUENCE_LEN`].
pub(crate) fn check_len(len: usize) -> EvalResult<()> {
    if len > MAX_SEQUENCE_LEN {
        return Err(EvalError::Overflow("sequence is too long".into()));
    }
    Ok(())
}

fn repeat_count(len: usize, n: i64) -> EvalResult<usize> {
    let count = usize::try_from(n.max(0)).map_err(|_| overflow())?;
    check_len(len.saturating_mul(count))?;
    Ok(count)
}

fn repeat_items(items: &[Value], count: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

fn int_binary(op: BinOp, a: i64, b: i64) -> EvalResult<Value> {
    let result = match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinOp::Div => {
            if b == 0 {
                return Err(EvalError::ZeroDivision("division by zero".into()));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(EvalError::ZeroDivision(
                    "integer division or modulo by zero".into(),
                ));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(EvalError::ZeroDivision(
                    "integer division or modulo by zero".into(),
                ));
            }
            let r = a.checked_rem(b).unwrap_or(0);
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(EvalError::ZeroDivision(
                        "0.0 cannot be raised to a negative power".into(),
                    ));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exp).ok_or_else(overflow)?
        }
        BinOp::LShift => {
            if b < 0 {
                return Err(EvalError::Value("negative shift count".into()));
            }
            if a == 0 {
                0
            } else {
                let shift = u32::try_from(b).ok().filter(|s| *s < 64).ok_or_else(overflow)?;
                let shifted = a << shift;
                if shifted >> shift != a {
                    return Err(overflow());
                }
                shifted
            }
        }
        BinOp::RShift => {
            if b < 0 {
                return Err(EvalError::Value("negative shift count".into()));
            }
            if b >= 64 {
                if a < 0 {
                    -1
                } else {
                    0
                }
            } else {
                a >> b
            }
        }
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::BitAnd => a & b,
        BinOp::MatMul => {
            return Err(EvalError::type_error(
                "unsupported operand type(s) for @: 'int' and 'int'",
            ))
        }
    };
    Ok(Value::Int(result))
}

fn float_binary(op: BinOp, a: f64, b: f64, l: &Value, r: &Value) -> EvalResult<Value> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(EvalError::ZeroDivision("float division by zero".into()));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(EvalError::ZeroDivision("float floor division by zero".into()));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::ZeroDivision("float modulo".into()));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::ZeroDivision(
                    "0.0 cannot be raised to a negative power".into(),
                ));
            }
            a.powf(b)
        }
        _ => return Err(unsupported_operands(op.as_str(), l, r)),
    };
    Ok(Value::Float(result))
}

// ── Unary ─────────────────────────────────────────────────────────────────────

pub(crate) fn unary(op: UnaryOp, v: &Value) -> EvalResult<Value> {
    match (op, num(v)) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Some(Num::Int(n))) => Ok(Value::Int(n.checked_neg().ok_or_else(overflow)?)),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Num::Int(n))) => Ok(Value::Int(n)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (UnaryOp::Invert, Some(Num::Int(n))) => Ok(Value::Int(!n)),
        _ => Err(EvalError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            op.as_str(),
            v.type_name()
        ))),
    }
}

// ── Comparison ────────────────────────────────────────────────────────────────

pub(crate) fn compare(op: CmpOp, l: &Value, r: &Value) -> EvalResult<bool> {
    let ordering = |expected: fn(Ordering) -> bool| -> EvalResult<bool> {
        match (num(l), num(r)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(expected(a.cmp(&b))),
            (Some(a), Some(b)) => Ok(to_f64(a)
                .partial_cmp(&to_f64(b))
                .is_some_and(expected)),
            _ => py_cmp(l, r, op.as_str()).map(expected),
        }
    };
    match op {
        CmpOp::Eq => Ok(l == r),
        CmpOp::NotEq => Ok(l != r),
        CmpOp::Is => Ok(l.is_identical(r)),
        CmpOp::IsNot => Ok(!l.is_identical(r)),
        CmpOp::In => contains(r, l),
        CmpOp::NotIn => contains(r, l).map(|found| !found),
        CmpOp::Lt => ordering(Ordering::is_lt),
        CmpOp::LtE => ordering(Ordering::is_le),
        CmpOp::Gt => ordering(Ordering::is_gt),
        CmpOp::GtE => ordering(Ordering::is_ge),
    }
}

/// Total ordering used by `<`, `sorted`, `min` and `max`.
pub(crate) fn py_cmp(l: &Value, r: &Value, symbol: &str) -> EvalResult<Ordering> {
    cmp_at(l, r, symbol, 0)
}

fn cmp_at(l: &Value, r: &Value, symbol: &str, depth: usize) -> EvalResult<Ordering> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => sequence_cmp(&a.borrow(), &b.borrow(), symbol, depth),
        (Value::Tuple(a), Value::Tuple(b)) => sequence_cmp(a, b, symbol, depth),
        _ => match (num(l), num(r)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(a.cmp(&b)),
            (Some(a), Some(b)) => Ok(to_f64(a)
                .partial_cmp(&to_f64(b))
                .unwrap_or(Ordering::Equal)),
            _ => Err(EvalError::type_error(format!(
                "'{symbol}' not supported between instances of '{}' and '{}'",
                l.type_name(),
                r.type_name()
            ))),
        },
    }
}

fn sequence_cmp(a: &[Value], b: &[Value], symbol: &str, depth: usize) -> EvalResult<Ordering> {
    if depth >= MAX_NESTING {
        return Err(EvalError::ComparisonDepth);
    }
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return cmp_at(x, y, symbol, depth + 1);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Python `item in container`.
pub(crate) fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match container {
        Value::Str(s) => match item {
            Value::Str(sub) => Ok(s.contains(&**sub)),
            other => Err(EvalError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) | Value::Set(items) => Ok(items.borrow().contains(item)),
        Value::Tuple(items) => Ok(items.contains(item)),
        Value::Dict(pairs) => Ok(pairs.borrow().iter().any(|(k, _)| k == item)),
        other => Err(EvalError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}
