//! Operator semantics
//!
//! `&&` and `||` short-circuit and are handled by the evaluator; everything
//! else works on two already-evaluated operands.

use crate::value::Value;
use sixgu_core::{BinaryOperator, UnaryOperator};
use std::cmp::Ordering;

/// Evaluate a binary operation
pub fn apply_binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value, String> {
    match op {
        // Logical (operand-returning, when not short-circuited)
        BinaryOperator::Or => Ok(if left.is_truthy() { left } else { right }),
        BinaryOperator::And => Ok(if left.is_truthy() { right } else { left }),

        // Arithmetic operators
        BinaryOperator::Add => match (&left, &right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", left, right)))
            }
            _ => arithmetic(&left, &right, |l, r| Ok(l + r)),
        },
        BinaryOperator::Subtract => arithmetic(&left, &right, |l, r| Ok(l - r)),
        BinaryOperator::Multiply => arithmetic(&left, &right, |l, r| Ok(l * r)),
        BinaryOperator::Divide => arithmetic(&left, &right, |l, r| {
            if r == 0.0 {
                Err("Division by zero".to_string())
            } else {
                Ok(l / r)
            }
        }),
        BinaryOperator::Remainder => arithmetic(&left, &right, |l, r| {
            if r == 0.0 {
                Err("Division by zero".to_string())
            } else {
                Ok(l % r)
            }
        }),
        BinaryOperator::Power => arithmetic(&left, &right, |l, r| Ok(l.powf(r))),

        // Bitwise operators work on 32-bit integers
        BinaryOperator::BitOr => bitwise(&left, &right, |l, r| l | r),
        BinaryOperator::BitXor => bitwise(&left, &right, |l, r| l ^ r),
        BinaryOperator::BitAnd => bitwise(&left, &right, |l, r| l & r),
        BinaryOperator::ShiftLeft => bitwise(&left, &right, |l, r| l.wrapping_shl(r as u32 & 31)),
        BinaryOperator::ShiftRight => {
            bitwise(&left, &right, |l, r| l.wrapping_shr(r as u32 & 31))
        }

        // Comparison operators
        BinaryOperator::Equal => Ok(Value::Boolean(left.deep_eq(&right))),
        BinaryOperator::NotEqual => Ok(Value::Boolean(!left.deep_eq(&right))),
        BinaryOperator::LessThan => compare(&left, &right, |o| o == Ordering::Less),
        BinaryOperator::LessEqual => compare(&left, &right, |o| o != Ordering::Greater),
        BinaryOperator::GreaterThan => compare(&left, &right, |o| o == Ordering::Greater),
        BinaryOperator::GreaterEqual => compare(&left, &right, |o| o != Ordering::Less),
    }
}

/// Evaluate a unary operation
pub fn apply_unary(op: UnaryOperator, value: Value) -> Result<Value, String> {
    match op {
        UnaryOperator::Negate => Ok(Value::Number(-value.to_number()?)),
        UnaryOperator::Plus => Ok(Value::Number(value.to_number()?)),
        UnaryOperator::Not => Ok(Value::Boolean(!value.is_truthy())),
        UnaryOperator::BitNot => Ok(Value::Number(f64::from(!to_int32(value.to_number()?)))),
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    f: impl FnOnce(f64, f64) -> Result<f64, String>,
) -> Result<Value, String> {
    let l = left.to_number()?;
    let r = right.to_number()?;
    f(l, r).map(Value::Number)
}

fn bitwise(left: &Value, right: &Value, f: impl FnOnce(i32, i32) -> i32) -> Result<Value, String> {
    let l = to_int32(left.to_number()?);
    let r = to_int32(right.to_number()?);
    Ok(Value::Number(f64::from(f(l, r))))
}

/// Wrap to a signed 32-bit integer, modulo 2^32
fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() % 4_294_967_296.0) as i64 as i32
}

/// Strings compare with strings, everything else numerically
fn compare(
    left: &Value,
    right: &Value,
    test: impl FnOnce(Ordering) -> bool,
) -> Result<Value, String> {
    let ordering = match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => {
            let l = left.as_number();
            let r = right.as_number();
            match (l, r) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => {
                    return Err(format!(
                        "Cannot compare {} with {}",
                        left.describe(),
                        right.describe()
                    ))
                }
            }
        }
    };
    // NaN compares false both ways
    Ok(Value::Boolean(ordering.map_or(false, test)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    fn s(x: &str) -> Value {
        Value::String(x.to_string())
    }

    fn bin(op: BinaryOperator, l: Value, r: Value) -> Result<Value, String> {
        apply_binary(op, l, r)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(bin(BinaryOperator::Add, n(1.0), n(2.0)), Ok(n(3.0)));
        assert_eq!(bin(BinaryOperator::Subtract, n(1.0), n(2.0)), Ok(n(-1.0)));
        assert_eq!(bin(BinaryOperator::Remainder, n(7.0), n(3.0)), Ok(n(1.0)));
        assert_eq!(bin(BinaryOperator::Power, n(2.0), n(10.0)), Ok(n(1024.0)));
        assert_eq!(bin(BinaryOperator::Multiply, Value::Boolean(true), n(4.0)), Ok(n(4.0)));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            bin(BinaryOperator::Divide, n(1.0), n(0.0)),
            Err("Division by zero".to_string())
        );
        assert_eq!(
            bin(BinaryOperator::Remainder, n(1.0), n(0.0)),
            Err("Division by zero".to_string())
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(bin(BinaryOperator::Add, s("a"), s("b")), Ok(s("ab")));
        assert_eq!(bin(BinaryOperator::Add, s("n = "), n(1.5)), Ok(s("n = 1.5")));
        assert!(bin(BinaryOperator::Subtract, s("a"), n(1.0)).is_err());
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(bin(BinaryOperator::BitOr, n(5.0), n(2.0)), Ok(n(7.0)));
        assert_eq!(bin(BinaryOperator::BitAnd, n(6.0), n(3.0)), Ok(n(2.0)));
        assert_eq!(bin(BinaryOperator::BitXor, n(6.0), n(3.0)), Ok(n(5.0)));
        assert_eq!(bin(BinaryOperator::ShiftLeft, n(1.0), n(4.0)), Ok(n(16.0)));
        assert_eq!(bin(BinaryOperator::ShiftRight, n(-16.0), n(2.0)), Ok(n(-4.0)));
        assert_eq!(apply_unary(UnaryOperator::BitNot, n(0.0)), Ok(n(-1.0)));
        // Wraps like a 32-bit integer
        assert_eq!(bin(BinaryOperator::BitOr, n(4_294_967_297.0), n(0.0)), Ok(n(1.0)));
    }

    #[test]
    fn test_comparison() {
        assert_eq!(bin(BinaryOperator::LessThan, n(1.0), n(2.0)), Ok(Value::Boolean(true)));
        assert_eq!(bin(BinaryOperator::GreaterEqual, s("b"), s("a")), Ok(Value::Boolean(true)));
        assert_eq!(
            bin(BinaryOperator::LessThan, n(f64::NAN), n(1.0)),
            Ok(Value::Boolean(false))
        );
        assert!(bin(BinaryOperator::LessThan, Value::Array(vec![]), n(1.0)).is_err());
        assert_eq!(bin(BinaryOperator::Equal, s("1"), n(1.0)), Ok(Value::Boolean(false)));
    }

    #[test]
    fn test_logical_return_operands() {
        assert_eq!(bin(BinaryOperator::Or, n(0.0), s("x")), Ok(s("x")));
        assert_eq!(bin(BinaryOperator::And, n(2.0), s("x")), Ok(s("x")));
        assert_eq!(bin(BinaryOperator::And, n(0.0), s("x")), Ok(n(0.0)));
        assert_eq!(apply_unary(UnaryOperator::Not, s("")), Ok(Value::Boolean(true)));
    }
}
