//! Implementation of the min() and max() builtin functions.
//!
//! min and max share one implementation; they only differ in which side
//! of the ordering wins.

use crate::{
    errors::{Error, ErrorKind, EvalResult},
    machine::operators::compare_values,
    token::CodeRange,
    value::Value,
};

pub(crate) fn builtin_min_max(is_max: bool, args: &[Value], range: CodeRange) -> EvalResult<Value> {
    let name = if is_max { "max" } else { "min" };
    let Some(first) = args.first() else {
        return Err(Error::new(
            ErrorKind::UnsupportedArgumentError,
            format!("{name} expected at least 1 argument, got 0"),
            range,
        ));
    };
    let mut best = first;
    for value in &args[1..] {
        let Some(ordering) = compare_values(value, best) else {
            return Err(Error::new(
                ErrorKind::UnsupportedOperandTypeError,
                format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    if is_max { ">" } else { "<" },
                    value.type_name(),
                    best.type_name()
                ),
                range,
            ));
        };
        let wins = if is_max {
            ordering == std::cmp::Ordering::Greater
        } else {
            ordering == std::cmp::Ordering::Less
        };
        if wins {
            best = value;
        }
    }
    Ok(best.clone())
}
