//! Implementation of the print() builtin function.

use crate::{io::IoHandler, machine::Context, value::Value};

/// Writes the space-joined `str()` of every argument plus a newline
/// through the handler, and returns `None`.
pub(crate) fn builtin_print(ctx: &Context, io: &mut impl IoHandler, args: &[Value]) -> Value {
    for (i, value) in args.iter().enumerate() {
        if i > 0 {
            io.stdout_push(' ');
        }
        io.stdout_write(&value.py_str(ctx));
    }
    io.stdout_push('\n');
    Value::Undefined
}
