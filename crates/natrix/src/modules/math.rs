//! The `math_*` constants seeded into the global frame.

use std::f64::consts;

/// Name/value pairs bound as `Float` constants at startup.
pub(crate) const CONSTANTS: &[(&str, f64)] = &[
    ("math_pi", consts::PI),
    ("math_e", consts::E),
    ("math_tau", consts::TAU),
    ("math_inf", f64::INFINITY),
    ("math_nan", f64::NAN),
];
