//! Implementation of the round() builtin function.

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};

use crate::{
    errors::{Error, ErrorKind, EvalResult},
    token::CodeRange,
    value::Value,
};

/// `round(x[, ndigits])` with banker's rounding.
///
/// Without `ndigits` a float rounds to an integer; with it the result
/// stays a float. Integers pass through unchanged.
pub(crate) fn builtin_round(args: &[Value], range: CodeRange) -> EvalResult<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(Error::new(
            ErrorKind::UnsupportedArgumentError,
            format!("round() takes 1 or 2 arguments ({} given)", args.len()),
            range,
        ));
    }
    let ndigits = match args.get(1) {
        None => None,
        Some(Value::Int(n)) => Some(n.to_i32().unwrap_or(i32::MAX)),
        Some(Value::Bool(b)) => Some(i32::from(*b)),
        Some(other) => {
            return Err(Error::new(
                ErrorKind::UnsupportedArgumentError,
                format!("'{}' object cannot be interpreted as an integer", other.type_name()),
                range,
            ));
        }
    };

    match &args[0] {
        Value::Bool(b) => Ok(Value::Int(BigInt::from(i32::from(*b)))),
        Value::Int(i) => Ok(Value::Int(i.clone())),
        Value::Float(f) => match ndigits {
            None => {
                if f.is_nan() {
                    return Err(convert_error("NaN", range));
                }
                if f.is_infinite() {
                    return Err(convert_error("infinity", range));
                }
                let rounded = f.round_ties_even();
                Ok(Value::Int(BigInt::from_f64(rounded).unwrap_or_default()))
            }
            Some(n) => {
                if !f.is_finite() {
                    return Ok(Value::Float(*f));
                }
                let factor = 10f64.powi(n);
                if !factor.is_finite() || factor == 0.0 {
                    // ndigits far beyond the float's precision leaves it
                    // unchanged (or flushes it to zero for large negatives).
                    return Ok(Value::Float(if n > 0 { *f } else { 0.0 }));
                }
                Ok(Value::Float((f * factor).round_ties_even() / factor))
            }
        },
        other => Err(Error::new(
            ErrorKind::UnsupportedOperandTypeError,
            format!("type {} doesn't define a round operation", other.type_name()),
            range,
        )),
    }
}

fn convert_error(what: &str, range: CodeRange) -> Error {
    Error::new(
        ErrorKind::UnsupportedArgumentError,
        format!("cannot convert float {what} to integer"),
        range,
    )
}
