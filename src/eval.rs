//! Expression evaluation against a single row or a column slice.

use std::cmp::Ordering;

use crate::error::{BlockflowError, Result};
use crate::program::ast::{AggregateFn, ArithmeticOp, CompareOp, Expression};
use crate::table::{slice_values, Row, Value};

/// Mean reported for an empty (or all-missing) slice.
///
/// Summaries over empty groups stay defined instead of failing.
pub const EMPTY_MEAN: f64 = 0.0;

/// Evaluates a scalar expression against one row.
///
/// Aggregates have no row-level meaning and fail with `TypeMismatch`.
pub fn evaluate_row(expr: &Expression, row: &Row) -> Result<Value> {
    match expr {
        Expression::Literal(value) => Ok(value.clone()),
        Expression::Column(name) => row
            .get(name)
            .cloned()
            .ok_or_else(|| BlockflowError::unknown_column(name)),
        Expression::Compare { op, left, right } => {
            let l = evaluate_row(left, row)?;
            let r = evaluate_row(right, row)?;
            compare(*op, &l, &r).map(Value::Bool)
        }
        Expression::Arithmetic { op, left, right } => {
            let l = evaluate_row(left, row)?;
            let r = evaluate_row(right, row)?;
            arithmetic(*op, &l, &r)
        }
        Expression::Aggregate { func, .. } => Err(BlockflowError::TypeMismatch {
            context: func.code(),
            left: "row",
            right: "column",
        }),
    }
}

/// Evaluates an aggregate expression over a slice of rows.
pub fn evaluate_column(expr: &Expression, rows: &[Row]) -> Result<Value> {
    match expr {
        Expression::Aggregate { func, column } => aggregate(*func, &slice_values(rows, column)?),
        _ => Err(BlockflowError::TypeMismatch {
            context: "summarize",
            left: "column",
            right: "row expression",
        }),
    }
}

/// Applies a comparison operator.
///
/// A missing operand makes ordering comparisons false; `Eq` holds only when
/// both sides are missing.
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
    if left.is_null() || right.is_null() {
        let both = left.is_null() && right.is_null();
        return Ok(match op {
            CompareOp::Eq => both,
            CompareOp::Neq => !both,
            _ => false,
        });
    }
    let Some(ord) = left.try_cmp(right, "comparison")? else {
        // NaN never orders; only inequality holds.
        return Ok(op == CompareOp::Neq);
    };
    Ok(match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Neq => ord != Ordering::Equal,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Gte => ord != Ordering::Less,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Lte => ord != Ordering::Greater,
    })
}

/// Applies an arithmetic operator to two numbers.
///
/// A missing operand yields a missing result. Integer add/sub/mul/mod stay
/// integral unless they overflow; division and powers are fractional.
pub fn arithmetic(op: ArithmeticOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || BlockflowError::TypeMismatch {
        context: "arithmetic",
        left: left.type_name(),
        right: right.type_name(),
    };
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let exact = match op {
            ArithmeticOp::Add => a.checked_add(*b),
            ArithmeticOp::Sub => a.checked_sub(*b),
            ArithmeticOp::Mul => a.checked_mul(*b),
            ArithmeticOp::Mod if *b == 0 => return Err(BlockflowError::DivisionByZero),
            ArithmeticOp::Mod => a.checked_rem(*b),
            ArithmeticOp::Div | ArithmeticOp::Exp => None,
        };
        if let Some(v) = exact {
            return Ok(Value::Int(v));
        }
    }
    let a = left.as_f64().ok_or_else(mismatch)?;
    let b = right.as_f64().ok_or_else(mismatch)?;
    let v = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Sub => a - b,
        ArithmeticOp::Mul => a * b,
        ArithmeticOp::Div | ArithmeticOp::Mod if b == 0.0 => {
            return Err(BlockflowError::DivisionByZero)
        }
        ArithmeticOp::Div => a / b,
        ArithmeticOp::Mod => a % b,
        ArithmeticOp::Exp => a.powf(b),
    };
    Ok(Value::Float(v))
}

/// Reduces a column slice.
///
/// Missing values are skipped. For an empty slice `sum` and `count` give
/// `0`, `mean` gives [`EMPTY_MEAN`], `min` and `max` give a missing value.
pub fn aggregate(func: AggregateFn, values: &[Value]) -> Result<Value> {
    let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
    match func {
        AggregateFn::Count => Ok(Value::Int(present.len() as i64)),
        AggregateFn::Sum => sum(func, &present),
        AggregateFn::Mean => {
            if present.is_empty() {
                return Ok(Value::Float(EMPTY_MEAN));
            }
            let total = sum(func, &present)?.as_f64().unwrap_or(0.0);
            Ok(Value::Float(total / present.len() as f64))
        }
        AggregateFn::Min => extreme(func, &present, Ordering::Less),
        AggregateFn::Max => extreme(func, &present, Ordering::Greater),
    }
}

fn sum(func: AggregateFn, values: &[&Value]) -> Result<Value> {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0;
    for value in values {
        match value {
            Value::Int(v) => {
                int_total = int_total.and_then(|t| t.checked_add(*v));
                float_total += *v as f64;
            }
            Value::Float(v) => {
                int_total = None;
                float_total += v;
            }
            other => {
                return Err(BlockflowError::TypeMismatch {
                    context: func.code(),
                    left: "number",
                    right: other.type_name(),
                })
            }
        }
    }
    Ok(match int_total {
        Some(total) => Value::Int(total),
        None => Value::Float(float_total),
    })
}

fn extreme(func: AggregateFn, values: &[&Value], keep: Ordering) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for value in values {
        best = match best {
            None => Some(*value),
            Some(current) => {
                let ord = value.try_cmp(current, func.code())?;
                if ord == Some(keep) {
                    Some(*value)
                } else {
                    Some(current)
                }
            }
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}
