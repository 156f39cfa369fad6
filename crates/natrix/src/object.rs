//! The public, owned value type crossing the host boundary.

use std::fmt::{self, Display};

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    complex::PyComplex,
    machine::Context,
    numeric::float_repr,
    value::{Value, string_repr},
};

/// A value that can be passed to or returned from the interpreter.
///
/// This is the public-facing type: it owns all its data and can be
/// freely cloned, serialized, or stored, unlike the internal `Value`
/// which indexes into a context's arenas.
///
/// `Repr` is output-only: it carries the printed form of values (such as
/// functions) that have no host representation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Object {
    /// Python's `None` singleton.
    #[serde(alias = "none", alias = "NoneType")]
    None,
    /// `True` or `False`.
    #[serde(alias = "bool")]
    Bool(bool),
    /// An integer that fits 64 bits.
    #[serde(alias = "int")]
    Int(i64),
    /// An arbitrary-precision integer (larger than i64).
    BigInt(BigInt),
    /// A 64-bit IEEE 754 float.
    #[serde(alias = "float")]
    Float(f64),
    /// A UTF-8 string.
    #[serde(alias = "str")]
    String(String),
    /// A complex number. Output-only across the module protocol.
    #[serde(alias = "complex")]
    Complex { real: f64, imag: f64 },
    /// Output-only: the printed form of a value with no host mapping.
    Repr(String),
}

impl Object {
    /// Wraps a `BigInt`, demoting to `Int` when it fits 64 bits.
    #[must_use]
    pub fn from_bigint(i: BigInt) -> Self {
        match i.to_i64() {
            Some(small) => Self::Int(small),
            None => Self::BigInt(i),
        }
    }

    /// Converts an interpreter value, using the context for function
    /// names.
    pub(crate) fn from_value(value: &Value, ctx: &Context) -> Self {
        match value {
            Value::Undefined => Self::None,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::from_bigint(i.clone()),
            Value::Float(f) => Self::Float(*f),
            Value::Str(s) => Self::String(s.to_string()),
            Value::Complex(z) => Self::Complex {
                real: z.real,
                imag: z.imag,
            },
            Value::Closure(_) | Value::Foreign(_) | Value::Builtin(_) => Self::Repr(value.py_str(ctx)),
        }
    }
}

impl Display for Object {
    /// The `repr()` form, matching what the chunk evaluator emits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::BigInt(i) => write!(f, "{i}"),
            Self::Float(v) => f.write_str(&float_repr(*v)),
            Self::String(s) => f.write_str(&string_repr(s)),
            Self::Complex { real, imag } => write!(f, "{}", PyComplex::new(*real, *imag)),
            Self::Repr(r) => f.write_str(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn display_matches_python_repr() {
        assert_eq!(Object::Int(7).to_string(), "7");
        assert_eq!(Object::Float(7.0).to_string(), "7.0");
        assert_eq!(Object::Bool(true).to_string(), "True");
        assert_eq!(Object::None.to_string(), "None");
        assert_eq!(Object::Complex { real: 11.0, imag: 2.0 }.to_string(), "(11+2j)");
    }

    #[test]
    fn bigint_demotes_when_small() {
        assert_eq!(Object::from_bigint(BigInt::from(42)), Object::Int(42));
        let big = BigInt::from(2).pow(80);
        assert!(matches!(Object::from_bigint(big), Object::BigInt(_)));
    }

    #[test]
    fn json_round_trip() {
        let objects = vec![Object::Int(1), Object::Float(2.5), Object::String("hi".to_owned())];
        let json = serde_json::to_string(&objects).unwrap();
        let back: Vec<Object> = serde_json::from_str(&json).unwrap();
        assert_eq!(objects, back);
    }
}
