//! Implementations of the str() and _int() conversion builtins.

use std::rc::Rc;
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::{
    errors::{Error, ErrorKind, EvalResult},
    machine::Context,
    token::CodeRange,
    value::Value,
};

pub(crate) fn builtin_str(ctx: &Context, value: &Value) -> Value {
    Value::Str(Rc::from(value.py_str(ctx).as_str()))
}

/// `_int(x)`: bool and int pass through, floats truncate toward zero,
/// strings parse as base-10 integers with surrounding whitespace allowed.
pub(crate) fn builtin_int(value: &Value, range: CodeRange) -> EvalResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Int(BigInt::from(i32::from(*b)))),
        Value::Int(i) => Ok(Value::Int(i.clone())),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(Error::new(
                    ErrorKind::UnsupportedArgumentError,
                    "cannot convert float NaN to integer",
                    range,
                ));
            }
            if f.is_infinite() {
                return Err(Error::new(
                    ErrorKind::UnsupportedArgumentError,
                    "cannot convert float infinity to integer",
                    range,
                ));
            }
            Ok(Value::Int(BigInt::from_f64(f.trunc()).unwrap_or_default()))
        }
        Value::Str(s) => match BigInt::from_str(s.trim()) {
            Ok(i) => Ok(Value::Int(i)),
            Err(_) => Err(Error::new(
                ErrorKind::UnsupportedArgumentError,
                format!("invalid literal for _int() with base 10: '{s}'"),
                range,
            )),
        },
        other => Err(Error::new(
            ErrorKind::UnsupportedArgumentError,
            format!("_int() argument must be a string or a number, not '{}'", other.type_name()),
            range,
        )),
    }
}
