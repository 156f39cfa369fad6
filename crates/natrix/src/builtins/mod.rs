//! Interpreter-native builtin functions.
//!
//! Each builtin has its own submodule; [`Builtin`] is the dispatch enum
//! the `Apply` instruction calls through. The curated set is deliberately
//! small: enough for teaching programs, nothing that needs a heap.

mod abs;
mod conv;
mod input;
mod min_max;
mod print;
mod round;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    errors::{Error, ErrorKind, EvalResult},
    io::IoHandler,
    machine::Context,
    modules::{math, random_mod},
    token::CodeRange,
    value::Value,
};

/// Enumerates every interpreter-native builtin function.
///
/// Uses strum derives so the variant name doubles as the Python-visible
/// name; `_int` and `random_random` spell theirs explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Builtin {
    Print,
    Abs,
    Max,
    Min,
    Round,
    #[strum(serialize = "str")]
    Str,
    #[strum(serialize = "_int")]
    Int,
    Input,
    #[strum(serialize = "random_random")]
    RandomRandom,
}

impl Builtin {
    /// Calls this builtin with already-evaluated arguments.
    pub fn call(
        self,
        ctx: &Context,
        io: &mut impl IoHandler,
        args: &[Value],
        range: CodeRange,
    ) -> EvalResult<Value> {
        match self {
            Self::Print => Ok(print::builtin_print(ctx, io, args)),
            Self::Abs => {
                expect_arity(self, 1, args, range)?;
                abs::builtin_abs(&args[0], range)
            }
            Self::Max => min_max::builtin_min_max(true, args, range),
            Self::Min => min_max::builtin_min_max(false, args, range),
            Self::Round => round::builtin_round(args, range),
            Self::Str => {
                expect_arity(self, 1, args, range)?;
                Ok(conv::builtin_str(ctx, &args[0]))
            }
            Self::Int => {
                expect_arity(self, 1, args, range)?;
                conv::builtin_int(&args[0], range)
            }
            Self::Input => input::builtin_input(ctx, io, args, range),
            Self::RandomRandom => {
                expect_arity(self, 0, args, range)?;
                Ok(random_mod::builtin_random())
            }
        }
    }
}

fn expect_arity(builtin: Builtin, expected: usize, args: &[Value], range: CodeRange) -> EvalResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::UnsupportedArgumentError,
            format!(
                "{builtin}() takes exactly {expected} argument{} ({} given)",
                if expected == 1 { "" } else { "s" },
                args.len()
            ),
            range,
        ))
    }
}

/// Every name the global frame is pre-seeded with, for the resolver.
#[must_use]
pub(crate) fn builtin_names() -> Vec<&'static str> {
    let mut names = vec![
        "print",
        "abs",
        "max",
        "min",
        "round",
        "str",
        "_int",
        "input",
        "random_random",
    ];
    names.extend(math::CONSTANTS.iter().map(|(name, _)| *name));
    names
}

/// The initial bindings of the global frame: builtin functions plus the
/// `math_*` constants.
#[must_use]
pub(crate) fn global_bindings() -> Vec<(&'static str, Value)> {
    let mut bindings = vec![
        ("print", Value::Builtin(Builtin::Print)),
        ("abs", Value::Builtin(Builtin::Abs)),
        ("max", Value::Builtin(Builtin::Max)),
        ("min", Value::Builtin(Builtin::Min)),
        ("round", Value::Builtin(Builtin::Round)),
        ("str", Value::Builtin(Builtin::Str)),
        ("_int", Value::Builtin(Builtin::Int)),
        ("input", Value::Builtin(Builtin::Input)),
        ("random_random", Value::Builtin(Builtin::RandomRandom)),
    ];
    bindings.extend(math::CONSTANTS.iter().map(|(name, v)| (*name, Value::Float(*v))));
    bindings
}
