//! Implementation of the abs() builtin function.

use num_traits::Signed;

use crate::{
    errors::{Error, ErrorKind, EvalResult},
    token::CodeRange,
    value::Value,
};

/// Magnitude across the numeric tower; complex magnitude is a float.
pub(crate) fn builtin_abs(value: &Value, range: CodeRange) -> EvalResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Int(num_bigint::BigInt::from(i32::from(*b)))),
        Value::Int(i) => Ok(Value::Int(i.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Complex(z) => Ok(Value::Float(z.magnitude())),
        other => Err(Error::new(
            ErrorKind::UnsupportedOperandTypeError,
            format!("bad operand type for abs(): '{}'", other.type_name()),
            range,
        )),
    }
}
