//! The `random_random` builtin.

use crate::value::Value;

/// Returns a uniform float in `[0, 1)`.
pub(crate) fn builtin_random() -> Value {
    Value::Float(rand::random::<f64>())
}
