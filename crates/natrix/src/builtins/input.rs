//! Implementation of the input() builtin function.

use std::rc::Rc;

use crate::{
    errors::{Error, ErrorKind, EvalResult},
    io::IoHandler,
    machine::Context,
    token::CodeRange,
    value::Value,
};

/// Writes the optional prompt (no trailing newline) and reads one line.
///
/// Hosts that provide no input source make `input()` a runtime error
/// rather than blocking forever.
pub(crate) fn builtin_input(
    ctx: &Context,
    io: &mut impl IoHandler,
    args: &[Value],
    range: CodeRange,
) -> EvalResult<Value> {
    if args.len() > 1 {
        return Err(Error::new(
            ErrorKind::UnsupportedArgumentError,
            format!("input() takes at most 1 argument ({} given)", args.len()),
            range,
        ));
    }
    if let Some(prompt) = args.first() {
        io.stdout_write(&prompt.py_str(ctx));
    }
    match io.stdin_readline() {
        Some(line) => Ok(Value::Str(Rc::from(line.as_str()))),
        None => Err(Error::new(
            ErrorKind::UnsupportedArgumentError,
            "input() is not supported by this host",
            range,
        )),
    }
}
