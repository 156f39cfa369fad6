//! Operator semantics: the numeric tower and Python's dispatch rules.
//!
//! Binary dispatch priority: complex operands first, then `None`, then
//! strings, then the numeric pair rules (bool coerces to int, float
//! contaminates, true division and negative exponents promote to float).
//! Division and modulo follow the sign-of-divisor law via
//! `num_integer`'s `div_floor`/`mod_floor`.

use std::cmp::Ordering;
use std::rc::Rc;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    ast::{BinaryOperator, CmpOperator, UnaryOperator},
    complex::PyComplex,
    errors::{Error, ErrorKind, EvalResult},
    machine::control::BinOp,
    numeric::compare_int_float,
    token::CodeRange,
    value::Value,
};

/// Applies a unary operator to a popped value.
pub(crate) fn unary_op(op: UnaryOperator, value: &Value, range: CodeRange) -> EvalResult<Value> {
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOperator::Minus => match value {
            Value::Bool(b) => Ok(Value::Int(-BigInt::from(i32::from(*b)))),
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Complex(z) => Ok(Value::Complex(-*z)),
            other => Err(unary_type_error(op.symbol(), other, range)),
        },
        UnaryOperator::Plus => match value {
            Value::Bool(b) => Ok(Value::Int(BigInt::from(i32::from(*b)))),
            Value::Int(_) | Value::Float(_) | Value::Complex(_) => Ok(value.clone()),
            other => Err(unary_type_error(op.symbol(), other, range)),
        },
    }
}

/// Applies a binary (arithmetic or comparison) operator to popped
/// operands, left beneath right.
pub(crate) fn binary_op(op: BinOp, left: &Value, right: &Value, range: CodeRange) -> EvalResult<Value> {
    match op {
        BinOp::Arith(op) => arith_op(op, left, right, range),
        BinOp::Cmp(op) => compare_op(op, left, right, range),
    }
}

fn arith_op(op: BinaryOperator, left: &Value, right: &Value, range: CodeRange) -> EvalResult<Value> {
    // 1. Complex contaminates everything numeric.
    if matches!(left, Value::Complex(_)) || matches!(right, Value::Complex(_)) {
        let (Some(lhs), Some(rhs)) = (as_complex(left), as_complex(right)) else {
            return Err(binary_type_error(op.symbol(), left, right, range));
        };
        return complex_arith(op, lhs, rhs, left, right, range);
    }

    // 2. None supports no arithmetic.
    if matches!(left, Value::Undefined) || matches!(right, Value::Undefined) {
        return Err(binary_type_error(op.symbol(), left, right, range));
    }

    // 3. Strings: only concatenation, and only with another string.
    if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
        if let (BinaryOperator::Add, Value::Str(a), Value::Str(b)) = (op, left, right) {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            return Ok(Value::Str(Rc::from(joined.as_str())));
        }
        return Err(binary_type_error(op.symbol(), left, right, range));
    }

    // 4. The numeric pair rules: bool coerces to int, float contaminates.
    match (as_int(left), as_int(right)) {
        (Some(a), Some(b)) => int_arith(op, &a, &b, range),
        _ => {
            let (Some(a), Some(b)) = (as_f64(left), as_f64(right)) else {
                return Err(binary_type_error(op.symbol(), left, right, range));
            };
            float_arith(op, a, b, range)
        }
    }
}

fn int_arith(op: BinaryOperator, a: &BigInt, b: &BigInt, range: CodeRange) -> EvalResult<Value> {
    let value = match op {
        BinaryOperator::Add => Value::Int(a + b),
        BinaryOperator::Sub => Value::Int(a - b),
        BinaryOperator::Mult => Value::Int(a * b),
        // True division always promotes to float.
        BinaryOperator::Div => {
            if b.is_zero() {
                return Err(zero_division("division by zero", range));
            }
            Value::Float(big_to_f64(a) / big_to_f64(b))
        }
        BinaryOperator::FloorDiv => {
            if b.is_zero() {
                return Err(zero_division("integer division or modulo by zero", range));
            }
            Value::Int(a.div_floor(b))
        }
        BinaryOperator::Mod => {
            if b.is_zero() {
                return Err(zero_division("integer division or modulo by zero", range));
            }
            Value::Int(a.mod_floor(b))
        }
        BinaryOperator::Pow => {
            if b.is_negative() {
                if a.is_zero() {
                    return Err(zero_division("0.0 cannot be raised to a negative power", range));
                }
                return float_arith(op, big_to_f64(a), big_to_f64(b), range);
            }
            let Some(exponent) = b.to_u32() else {
                return Err(Error::new(
                    ErrorKind::UnsupportedArgumentError,
                    "integer exponent too large to evaluate",
                    range,
                ));
            };
            Value::Int(a.pow(exponent))
        }
    };
    Ok(value)
}

fn float_arith(op: BinaryOperator, a: f64, b: f64, range: CodeRange) -> EvalResult<Value> {
    let value = match op {
        BinaryOperator::Add => Value::Float(a + b),
        BinaryOperator::Sub => Value::Float(a - b),
        BinaryOperator::Mult => Value::Float(a * b),
        BinaryOperator::Div => {
            if b == 0.0 {
                return Err(zero_division("float division by zero", range));
            }
            Value::Float(a / b)
        }
        BinaryOperator::FloorDiv => {
            if b == 0.0 {
                return Err(zero_division("float floor division by zero", range));
            }
            Value::Float((a / b).floor())
        }
        BinaryOperator::Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo", range));
            }
            let mut r = a % b;
            if r != 0.0 {
                if (r < 0.0) != (b < 0.0) {
                    r += b;
                }
            } else {
                // Python gives the zero result the divisor's sign.
                r = 0.0_f64.copysign(b);
            }
            Value::Float(r)
        }
        BinaryOperator::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(zero_division("0.0 cannot be raised to a negative power", range));
            }
            // A negative base with a fractional exponent lands in the
            // complex plane, exactly as CPython's float.__pow__ does.
            if a < 0.0 && b.is_finite() && b.fract() != 0.0 {
                let z = PyComplex::from(a)
                    .checked_pow(PyComplex::from(b))
                    .expect("nonzero base cannot fail complex pow");
                return Ok(Value::Complex(z));
            }
            Value::Float(a.powf(b))
        }
    };
    Ok(value)
}

fn complex_arith(
    op: BinaryOperator,
    lhs: PyComplex,
    rhs: PyComplex,
    left: &Value,
    right: &Value,
    range: CodeRange,
) -> EvalResult<Value> {
    let value = match op {
        BinaryOperator::Add => Value::Complex(lhs + rhs),
        BinaryOperator::Sub => Value::Complex(lhs - rhs),
        BinaryOperator::Mult => Value::Complex(lhs * rhs),
        BinaryOperator::Div => match lhs.checked_div(rhs) {
            Some(z) => Value::Complex(z),
            None => return Err(zero_division("complex division by zero", range)),
        },
        BinaryOperator::Pow => match lhs.checked_pow(rhs) {
            Some(z) => Value::Complex(z),
            None => return Err(zero_division("0.0 to a negative or complex power", range)),
        },
        BinaryOperator::Mod | BinaryOperator::FloorDiv => {
            return Err(binary_type_error(op.symbol(), left, right, range));
        }
    };
    Ok(value)
}

fn compare_op(op: CmpOperator, left: &Value, right: &Value, range: CodeRange) -> EvalResult<Value> {
    let result = match op {
        CmpOperator::Is => values_identical(left, right),
        CmpOperator::IsNot => !values_identical(left, right),
        CmpOperator::Eq => values_equal(left, right),
        CmpOperator::NotEq => !values_equal(left, right),
        CmpOperator::In | CmpOperator::NotIn => {
            return Err(Error::new(
                ErrorKind::UnsupportedOperandTypeError,
                format!("argument of type '{}' is not iterable", right.type_name()),
                range,
            ));
        }
        CmpOperator::Lt | CmpOperator::LtE | CmpOperator::Gt | CmpOperator::GtE => {
            let Some(ordering) = compare_values(left, right) else {
                // NaN operands produce false, not an error.
                if is_nan_comparison(left, right) {
                    return Ok(Value::Bool(false));
                }
                return Err(Error::new(
                    ErrorKind::UnsupportedOperandTypeError,
                    format!(
                        "'{}' not supported between instances of '{}' and '{}'",
                        op.symbol(),
                        left.type_name(),
                        right.type_name()
                    ),
                    range,
                ));
            };
            match op {
                CmpOperator::Lt => ordering == Ordering::Less,
                CmpOperator::LtE => ordering != Ordering::Greater,
                CmpOperator::Gt => ordering == Ordering::Greater,
                CmpOperator::GtE => ordering != Ordering::Less,
                _ => unreachable!("outer match covers the ordering operators"),
            }
        }
    };
    Ok(Value::Bool(result))
}

/// Equality across the numeric tower plus strings and function values.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    // Numeric equality ignores representation: True == 1 == 1.0 == 1+0j.
    if let (Some(lhs), Some(rhs)) = (as_complex(left), as_complex(right)) {
        return match (left_int(left), left_int(right)) {
            // Keep exactness for big ints by comparing via the digit law.
            (Some(a), None) if rhs.imag == 0.0 => compare_int_float(&a, rhs.real) == Some(Ordering::Equal),
            (None, Some(b)) if lhs.imag == 0.0 => compare_int_float(&b, lhs.real) == Some(Ordering::Equal),
            (Some(a), Some(b)) => a == b,
            _ => lhs == rhs,
        };
    }
    match (left, right) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Closure(a), Value::Closure(b)) => a == b,
        (Value::Foreign(a), Value::Foreign(b)) => a == b,
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        _ => false,
    }
}

/// Ordering across ints, bools, floats, and string pairs; `None` for
/// everything else (including any complex operand and NaN).
pub(crate) fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    match (left_int(left), left_int(right)) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        (Some(a), None) => match right {
            Value::Float(f) => compare_int_float(&a, *f),
            _ => None,
        },
        (None, Some(b)) => match left {
            Value::Float(f) => compare_int_float(&b, *f).map(Ordering::reverse),
            _ => None,
        },
        (None, None) => match (left, right) {
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            _ => None,
        },
    }
}

/// `is` identity. Numbers and strings are immediate values here, so
/// identity degrades to type-strict equality; function values compare by
/// arena index.
fn values_identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
        (Value::Complex(a), Value::Complex(b)) => a == b,
        (Value::Closure(a), Value::Closure(b)) => a == b,
        (Value::Foreign(a), Value::Foreign(b)) => a == b,
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        _ => false,
    }
}

fn is_nan_comparison(left: &Value, right: &Value) -> bool {
    let nan = |v: &Value| matches!(v, Value::Float(f) if f.is_nan());
    let numeric = |v: &Value| matches!(v, Value::Bool(_) | Value::Int(_) | Value::Float(_));
    (nan(left) && numeric(right)) || (nan(right) && numeric(left))
}

// === coercion helpers ===

/// Bool/Int as a `BigInt`, for the integer fast path.
fn left_int(value: &Value) -> Option<BigInt> {
    match value {
        Value::Bool(b) => Some(BigInt::from(i32::from(*b))),
        Value::Int(i) => Some(i.clone()),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<BigInt> {
    left_int(value)
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Int(i) => Some(big_to_f64(i)),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn as_complex(value: &Value) -> Option<PyComplex> {
    match value {
        Value::Complex(z) => Some(*z),
        _ => as_f64(value).map(PyComplex::from),
    }
}

/// Widens a `BigInt` to `f64`, saturating to the matching infinity.
pub(crate) fn big_to_f64(i: &BigInt) -> f64 {
    i.to_f64().unwrap_or_else(|| {
        if i.is_negative() {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    })
}

fn zero_division(message: &str, range: CodeRange) -> Error {
    Error::new(ErrorKind::ZeroDivisionError, message, range)
}

fn unary_type_error(symbol: &str, value: &Value, range: CodeRange) -> Error {
    Error::new(
        ErrorKind::UnsupportedOperandTypeError,
        format!("bad operand type for unary {symbol}: '{}'", value.type_name()),
        range,
    )
}

fn binary_type_error(symbol: &str, left: &Value, right: &Value, range: CodeRange) -> Error {
    Error::new(
        ErrorKind::UnsupportedOperandTypeError,
        format!(
            "unsupported operand type(s) for {symbol}: '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ),
        range,
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn int(i: i64) -> Value {
        Value::Int(BigInt::from(i))
    }

    fn apply(op: BinaryOperator, left: &Value, right: &Value) -> Value {
        binary_op(BinOp::Arith(op), left, right, CodeRange::default()).unwrap()
    }

    fn apply_err(op: BinaryOperator, left: &Value, right: &Value) -> Error {
        binary_op(BinOp::Arith(op), left, right, CodeRange::default()).unwrap_err()
    }

    fn as_big(value: &Value) -> BigInt {
        match value {
            Value::Int(i) => i.clone(),
            other => panic!("expected int, got {other:?}"),
        }
    }

    #[test]
    fn floor_division_follows_divisor_sign() {
        assert_eq!(as_big(&apply(BinaryOperator::FloorDiv, &int(10), &int(-3))), BigInt::from(-4));
        assert_eq!(as_big(&apply(BinaryOperator::FloorDiv, &int(-10), &int(3))), BigInt::from(-4));
        assert_eq!(as_big(&apply(BinaryOperator::Mod, &int(10), &int(-3))), BigInt::from(-2));
        assert_eq!(as_big(&apply(BinaryOperator::Mod, &int(-10), &int(3))), BigInt::from(2));
    }

    #[test]
    fn floor_division_identity() {
        for a in [-17i64, -5, 0, 3, 23] {
            for b in [-7i64, -2, 4, 9] {
                let q = as_big(&apply(BinaryOperator::FloorDiv, &int(a), &int(b)));
                let r = as_big(&apply(BinaryOperator::Mod, &int(a), &int(b)));
                assert_eq!(q * b + &r, BigInt::from(a));
                // sign(a % b) is zero or the divisor's sign
                assert!(r.is_zero() || (r.sign() == BigInt::from(b).sign()));
            }
        }
    }

    #[test]
    fn true_division_promotes_to_float() {
        assert!(matches!(apply(BinaryOperator::Div, &int(7), &int(2)), Value::Float(f) if f == 3.5));
    }

    #[test]
    fn negative_exponent_promotes_to_float() {
        assert!(matches!(apply(BinaryOperator::Pow, &int(2), &int(-2)), Value::Float(f) if f == 0.25));
    }

    #[test]
    fn zero_to_negative_power_fails() {
        let err = apply_err(BinaryOperator::Pow, &int(0), &int(-1));
        assert_eq!(err.kind, ErrorKind::ZeroDivisionError);
    }

    #[test]
    fn division_by_zero_kinds() {
        assert_eq!(apply_err(BinaryOperator::Div, &int(1), &int(0)).kind, ErrorKind::ZeroDivisionError);
        assert_eq!(
            apply_err(BinaryOperator::Div, &int(1), &int(0)).message,
            "division by zero"
        );
        assert_eq!(
            apply_err(BinaryOperator::Mod, &Value::Float(1.0), &Value::Float(0.0)).message,
            "float modulo"
        );
    }

    #[test]
    fn bool_coerces_to_int() {
        assert_eq!(as_big(&apply(BinaryOperator::Add, &Value::Bool(true), &int(2))), BigInt::from(3));
    }

    #[test]
    fn string_concatenation_only() {
        let a = Value::Str(Rc::from("ab"));
        let b = Value::Str(Rc::from("cd"));
        assert!(matches!(apply(BinaryOperator::Add, &a, &b), Value::Str(s) if &*s == "abcd"));
        assert_eq!(
            apply_err(BinaryOperator::Add, &a, &int(1)).kind,
            ErrorKind::UnsupportedOperandTypeError
        );
        assert_eq!(
            apply_err(BinaryOperator::Mult, &a, &int(3)).kind,
            ErrorKind::UnsupportedOperandTypeError
        );
    }

    #[test]
    fn complex_contaminates() {
        let z = Value::Complex(PyComplex::new(1.0, 2.0));
        let Value::Complex(sum) = apply(BinaryOperator::Add, &z, &int(1)) else {
            panic!("expected complex result");
        };
        assert_eq!(sum, PyComplex::new(2.0, 2.0));
        assert_eq!(
            apply_err(BinaryOperator::FloorDiv, &z, &int(1)).kind,
            ErrorKind::UnsupportedOperandTypeError
        );
    }

    #[test]
    fn negative_base_fractional_exponent_is_complex() {
        let result = apply(BinaryOperator::Pow, &Value::Float(-8.0), &Value::Float(0.5));
        assert!(matches!(result, Value::Complex(_)));
    }

    #[test]
    fn cross_type_equality() {
        assert!(values_equal(&int(1), &Value::Float(1.0)));
        assert!(values_equal(&Value::Bool(true), &int(1)));
        assert!(values_equal(&Value::Complex(PyComplex::new(2.0, 0.0)), &int(2)));
        assert!(!values_equal(&int(1), &Value::Str(Rc::from("1"))));
        let big = Value::Int(BigInt::from(2).pow(53));
        assert!(values_equal(&big, &Value::Float(2f64.powi(53))));
    }

    #[test]
    fn nan_comparisons_are_false_not_errors() {
        let nan = Value::Float(f64::NAN);
        let result = binary_op(BinOp::Cmp(CmpOperator::Lt), &nan, &int(1), CodeRange::default()).unwrap();
        assert!(matches!(result, Value::Bool(false)));
        assert!(!values_equal(&nan, &nan));
    }

    #[test]
    fn ordering_mixed_types_fails() {
        let err = binary_op(
            BinOp::Cmp(CmpOperator::Lt),
            &int(1),
            &Value::Str(Rc::from("a")),
            CodeRange::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperandTypeError);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(as_big(&unary_op(UnaryOperator::Minus, &Value::Bool(true), CodeRange::default()).unwrap()), BigInt::from(-1));
        assert!(matches!(
            unary_op(UnaryOperator::Not, &int(0), CodeRange::default()).unwrap(),
            Value::Bool(true)
        ));
        assert!(unary_op(UnaryOperator::Minus, &Value::Str(Rc::from("x")), CodeRange::default()).is_err());
    }
}
