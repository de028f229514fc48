//! Binary operators on runtime values
//!
//! One function per operator. Int arithmetic is checked; mixing Int and
//! Float promotes to Float. `??` is handled by the evaluator because its
//! right operand is only evaluated when needed.

use super::value::{values_equal, Value};
use crate::ast::BinaryOp;
use crate::errors::{DangError, Result};
use std::cmp::Ordering;

pub fn apply_binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        // Arithmetic
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => numeric(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => numeric(op, left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => {
            if matches!((left, right), (Value::Int(_), Value::Int(0))) {
                return Err(DangError::runtime("division by zero", None));
            }
            numeric(op, left, right, i64::checked_div, |a, b| a / b)
        }
        BinaryOp::Mod => {
            if matches!((left, right), (Value::Int(_), Value::Int(0))) {
                return Err(DangError::runtime("modulo by zero", None));
            }
            numeric(op, left, right, i64::checked_rem, |a, b| a % b)
        }

        // Comparison
        BinaryOp::Lt => compare(op, left, right, |o| o == Ordering::Less),
        BinaryOp::Le => compare(op, left, right, |o| o != Ordering::Greater),
        BinaryOp::Gt => compare(op, left, right, |o| o == Ordering::Greater),
        BinaryOp::Ge => compare(op, left, right, |o| o != Ordering::Less),

        // Equality
        BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!values_equal(left, right))),

        BinaryOp::Default => Ok(if left.is_null() { right.clone() } else { left.clone() }),
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> DangError {
    DangError::runtime(
        format!(
            "operator {} cannot be applied to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
        None,
    )
}

/// `+`: numbers, string concatenation, list concatenation
pub fn add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (
            Value::List { elements: a, elem_type: at },
            Value::List { elements: b, elem_type: bt },
        ) => {
            let elem_type = if a.is_empty() { bt.clone() } else { at.clone() };
            let mut elements = Vec::with_capacity(a.len() + b.len());
            elements.extend(a.iter().cloned());
            elements.extend(b.iter().cloned());
            Ok(Value::List { elements, elem_type })
        }
        _ => numeric(BinaryOp::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

fn numeric(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| DangError::runtime(format!("integer overflow in {} {} {}", a, op.symbol(), b), None)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => Err(mismatch(op, left, right)),
        },
        _ => Err(mismatch(op, left, right)),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value, test: fn(Ordering) -> bool) -> Result<Value> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => left
            .as_float()
            .zip(right.as_float())
            .and_then(|(a, b)| a.partial_cmp(&b)),
        _ => return Err(mismatch(op, left, right)),
    };
    // NaN compares false both ways
    Ok(Value::Bool(ordering.is_some_and(test)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    #[test]
    fn test_int_arithmetic() {
        assert_eq!(apply_binary_op(BinaryOp::Add, &int(2), &int(3)).unwrap().as_int(), Some(5));
        assert_eq!(apply_binary_op(BinaryOp::Sub, &int(2), &int(3)).unwrap().as_int(), Some(-1));
        assert_eq!(apply_binary_op(BinaryOp::Mul, &int(4), &int(3)).unwrap().as_int(), Some(12));
        assert_eq!(apply_binary_op(BinaryOp::Div, &int(7), &int(2)).unwrap().as_int(), Some(3));
        assert_eq!(apply_binary_op(BinaryOp::Mod, &int(7), &int(2)).unwrap().as_int(), Some(1));
    }

    #[test]
    fn test_float_promotion() {
        let v = apply_binary_op(BinaryOp::Add, &int(1), &Value::Float(0.5)).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 1.5));
        let v = apply_binary_op(BinaryOp::Div, &Value::Float(1.0), &int(4)).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 0.25));
    }

    #[test]
    fn test_division_by_zero_error() {
        let err = apply_binary_op(BinaryOp::Div, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.error_code(), "E0850");
        assert_eq!(err.to_string(), "division by zero");
        let err = apply_binary_op(BinaryOp::Mod, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.to_string(), "modulo by zero");
    }

    #[test]
    fn test_overflow_is_an_error() {
        let err = apply_binary_op(BinaryOp::Add, &int(i64::MAX), &int(1)).unwrap_err();
        assert!(err.to_string().starts_with("integer overflow"));
    }

    #[test]
    fn test_concatenation() {
        let s = add(&Value::string("ab"), &Value::string("c")).unwrap();
        assert_eq!(s.as_str(), Some("abc"));
    }

    #[test]
    fn test_list_concat_keeps_non_empty_elem_type() {
        use crate::env::ModuleId;
        use crate::types::Type;
        let ty = Type::module(ModuleId::new(1), Some("Int")).non_null();
        let empty = Value::list(vec![], None);
        let full = Value::list(vec![int(1)], Some(ty.clone()));
        match add(&empty, &full).unwrap() {
            Value::List { elements, elem_type } => {
                assert_eq!(elements.len(), 1);
                assert_eq!(elem_type, Some(ty));
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_operands() {
        let err = add(&int(1), &Value::string("x")).unwrap_err();
        assert_eq!(err.to_string(), "operator + cannot be applied to Int and String");
        let err = apply_binary_op(BinaryOp::Lt, &Value::Bool(true), &int(1)).unwrap_err();
        assert_eq!(err.to_string(), "operator < cannot be applied to Boolean and Int");
    }

    #[test]
    fn test_comparisons() {
        let lt = apply_binary_op(BinaryOp::Lt, &int(1), &Value::Float(1.5)).unwrap();
        assert_eq!(lt.as_bool(), Some(true));
        let ge = apply_binary_op(BinaryOp::Ge, &Value::string("b"), &Value::string("a")).unwrap();
        assert_eq!(ge.as_bool(), Some(true));
        let eq = apply_binary_op(BinaryOp::Eq, &int(2), &Value::Float(2.0)).unwrap();
        assert_eq!(eq.as_bool(), Some(true));
    }
}
