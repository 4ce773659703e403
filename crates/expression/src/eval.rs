//! Walks an [`Expr`] tree against a root JSON value. Grounded on an
//! upstream `eval::Evaluator` — same recursion-depth guard constant and the
//! same split between short-circuiting boolean operators and the strictly-
//! evaluated arithmetic/comparison operators — narrowed to the operator set
//! [`crate::ast`] actually defines.

use crate::ast::{BinaryOp, Expr, PathSegment};
use crate::error::{ExpressionError, ExpressionResult};
use crate::value_utils::{can_add_as_int, is_truthy, number_as_f64, value_type_name};
use serde_json::Value;

/// Mirrors an upstream `MAX_RECURSION_DEPTH` — a pathological expression
/// (deeply nested parentheses) fails fast instead of blowing the stack.
const MAX_DEPTH: usize = 256;

/// Evaluate `expr` against `variables`, the root object field paths resolve
/// into.
pub fn eval(expr: &Expr, variables: &Value) -> ExpressionResult<Value> {
    eval_with_depth(expr, variables, 0)
}

fn eval_with_depth(expr: &Expr, variables: &Value, depth: usize) -> ExpressionResult<Value> {
    if depth > MAX_DEPTH {
        return Err(ExpressionError::RecursionLimit(MAX_DEPTH));
    }

    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Field(path) => resolve_path(variables, path),
        Expr::Negate(inner) => {
            let value = eval_with_depth(inner, variables, depth + 1)?;
            negate(&value)
        }
        Expr::Not(inner) => {
            let value = eval_with_depth(inner, variables, depth + 1)?;
            Ok(Value::Bool(!is_truthy(&value)))
        }
        Expr::Binary { left, op: BinaryOp::And, right } => {
            let l = eval_with_depth(left, variables, depth + 1)?;
            if !is_truthy(&l) {
                return Ok(Value::Bool(false));
            }
            let r = eval_with_depth(right, variables, depth + 1)?;
            Ok(Value::Bool(is_truthy(&r)))
        }
        Expr::Binary { left, op: BinaryOp::Or, right } => {
            let l = eval_with_depth(left, variables, depth + 1)?;
            if is_truthy(&l) {
                return Ok(Value::Bool(true));
            }
            let r = eval_with_depth(right, variables, depth + 1)?;
            Ok(Value::Bool(is_truthy(&r)))
        }
        Expr::Binary { left, op: BinaryOp::In, right } => {
            let l = eval_with_depth(left, variables, depth + 1)?;
            let r = eval_with_depth(right, variables, depth + 1)?;
            membership(&l, &r)
        }
        Expr::Binary { left, op, right } => {
            let l = eval_with_depth(left, variables, depth + 1)?;
            let r = eval_with_depth(right, variables, depth + 1)?;
            binary(*op, &l, &r)
        }
        Expr::Array(items) => {
            let values = items
                .iter()
                .map(|item| eval_with_depth(item, variables, depth + 1))
                .collect::<ExpressionResult<Vec<_>>>()?;
            Ok(Value::Array(values))
        }
    }
}

fn resolve_path(root: &Value, path: &[PathSegment]) -> ExpressionResult<Value> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(root.clone());
    };
    let PathSegment::Name(root_name) = head else {
        return Err(ExpressionError::TypeMismatch {
            expected: "a variable name",
            found: "an index",
        });
    };

    let mut current = root
        .get(root_name)
        .ok_or_else(|| ExpressionError::UndefinedVariable(root_name.clone()))?
        .clone();

    for segment in rest {
        current = match segment {
            PathSegment::Name(name) => current
                .get(name)
                .cloned()
                .unwrap_or(Value::Null),
            PathSegment::Index(i) => current
                .as_array()
                .and_then(|arr| usize::try_from(*i).ok().and_then(|idx| arr.get(idx)))
                .cloned()
                .unwrap_or(Value::Null),
        };
    }

    Ok(current)
}

fn negate(value: &Value) -> ExpressionResult<Value> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number((-i).into()))
            } else if let Some(f) = number_as_f64(n) {
                Ok(serde_json::json!(-f))
            } else {
                Err(ExpressionError::TypeMismatch {
                    expected: "number",
                    found: "number",
                })
            }
        }
        other => Err(ExpressionError::TypeMismatch {
            expected: "number",
            found: value_type_name(other),
        }),
    }
}

fn membership(needle: &Value, haystack: &Value) -> ExpressionResult<Value> {
    match haystack {
        Value::Array(items) => Ok(Value::Bool(items.contains(needle))),
        Value::String(s) => match needle {
            Value::String(n) => Ok(Value::Bool(s.contains(n.as_str()))),
            other => Err(ExpressionError::TypeMismatch {
                expected: "string",
                found: value_type_name(other),
            }),
        },
        Value::Object(map) => match needle {
            Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
            other => Err(ExpressionError::TypeMismatch {
                expected: "string",
                found: value_type_name(other),
            }),
        },
        other => Err(ExpressionError::TypeMismatch {
            expected: "array, string, or object",
            found: value_type_name(other),
        }),
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> ExpressionResult<Value> {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(l == r)),
        BinaryOp::NotEqual => Ok(Value::Bool(l != r)),
        BinaryOp::LessThan => compare(l, r).map(|o| Value::Bool(o.is_lt())),
        BinaryOp::GreaterThan => compare(l, r).map(|o| Value::Bool(o.is_gt())),
        BinaryOp::LessEqual => compare(l, r).map(|o| Value::Bool(o.is_le())),
        BinaryOp::GreaterEqual => compare(l, r).map(|o| Value::Bool(o.is_ge())),
        BinaryOp::Add => add(l, r),
        BinaryOp::Subtract => arithmetic(l, r, |a, b| a - b, |a, b| a.checked_sub(b)),
        BinaryOp::Multiply => arithmetic(l, r, |a, b| a * b, |a, b| a.checked_mul(b)),
        BinaryOp::Divide => divide(l, r),
        BinaryOp::Modulo => modulo(l, r),
        BinaryOp::And | BinaryOp::Or | BinaryOp::In => unreachable!("handled with short-circuiting above"),
    }
}

fn compare(l: &Value, r: &Value) -> ExpressionResult<std::cmp::Ordering> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (number_as_f64(a).unwrap_or_default(), number_as_f64(b).unwrap_or_default());
            a.partial_cmp(&b).ok_or(ExpressionError::TypeMismatch {
                expected: "comparable number",
                found: "NaN",
            })
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(ExpressionError::TypeMismatch {
            expected: "two numbers or two strings",
            found: value_type_name(l),
        }),
    }
}

fn add(l: &Value, r: &Value) -> ExpressionResult<Value> {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return Ok(Value::String(format!("{a}{b}")));
    }
    arithmetic(l, r, |a, b| a + b, |a, b| a.checked_add(b))
}

fn arithmetic(
    l: &Value,
    r: &Value,
    float_op: impl Fn(f64, f64) -> f64,
    int_op: impl Fn(i64, i64) -> Option<i64>,
) -> ExpressionResult<Value> {
    let (Value::Number(a), Value::Number(b)) = (l, r) else {
        return Err(ExpressionError::TypeMismatch {
            expected: "number",
            found: value_type_name(if matches!(l, Value::Number(_)) { r } else { l }),
        });
    };

    if can_add_as_int(a, b) {
        if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
            if let Some(result) = int_op(ai, bi) {
                return Ok(Value::Number(result.into()));
            }
        }
    }

    let af = number_as_f64(a).unwrap_or_default();
    let bf = number_as_f64(b).unwrap_or_default();
    Ok(serde_json::json!(float_op(af, bf)))
}

fn divide(l: &Value, r: &Value) -> ExpressionResult<Value> {
    let (Value::Number(a), Value::Number(b)) = (l, r) else {
        return Err(ExpressionError::TypeMismatch {
            expected: "number",
            found: value_type_name(if matches!(l, Value::Number(_)) { r } else { l }),
        });
    };
    let bf = number_as_f64(b).unwrap_or_default();
    if bf == 0.0 {
        return Err(ExpressionError::DivisionByZero);
    }
    let af = number_as_f64(a).unwrap_or_default();
    Ok(serde_json::json!(af / bf))
}

fn modulo(l: &Value, r: &Value) -> ExpressionResult<Value> {
    let (Value::Number(a), Value::Number(b)) = (l, r) else {
        return Err(ExpressionError::TypeMismatch {
            expected: "number",
            found: value_type_name(if matches!(l, Value::Number(_)) { r } else { l }),
        });
    };
    if can_add_as_int(a, b) {
        if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
            if bi == 0 {
                return Err(ExpressionError::DivisionByZero);
            }
            return Ok(Value::Number((ai % bi).into()));
        }
    }
    let bf = number_as_f64(b).unwrap_or_default();
    if bf == 0.0 {
        return Err(ExpressionError::DivisionByZero);
    }
    let af = number_as_f64(a).unwrap_or_default();
    Ok(serde_json::json!(af % bf))
}
