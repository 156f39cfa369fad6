//! Complex number support with CPython-faithful arithmetic.

use std::{
    fmt::{self, Display},
    ops::{Add, Mul, Neg, Sub},
};

use crate::numeric::float_repr;

/// A complex number with `f64` components.
///
/// Arithmetic mirrors CPython's `complexobject.c`: division uses the
/// scaled (Smith) algorithm to avoid premature overflow, and power goes
/// through polar form.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PyComplex {
    pub real: f64,
    pub imag: f64,
}

impl PyComplex {
    #[must_use]
    pub const fn new(real: f64, imag: f64) -> Self {
        Self { real, imag }
    }

    /// True when both components are exactly zero (of either sign).
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.real == 0.0 && self.imag == 0.0
    }

    /// The magnitude, as returned by `abs()`.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.real.hypot(self.imag)
    }

    /// Division by the branched algorithm from CPython's `_Py_c_quot`:
    /// scale by whichever component of the divisor is larger in magnitude.
    ///
    /// Returns `None` when dividing by `0+0j`.
    #[must_use]
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        let (a, b) = (self.real, self.imag);
        let (c, d) = (rhs.real, rhs.imag);
        if rhs.is_zero() {
            return None;
        }
        if d.abs() < c.abs() {
            let ratio = d / c;
            let denom = c + d * ratio;
            Some(Self::new((a + b * ratio) / denom, (b - a * ratio) / denom))
        } else {
            let ratio = c / d;
            let denom = c * ratio + d;
            Some(Self::new((a * ratio + b) / denom, (b * ratio - a) / denom))
        }
    }

    /// Power through polar form.
    ///
    /// Returns `None` for a zero base with a negative-real or complex
    /// exponent, which is a `ZeroDivisionError` in Python. `0 ** 0` is `1`.
    #[must_use]
    pub fn checked_pow(self, exp: Self) -> Option<Self> {
        let r = self.magnitude();
        if r == 0.0 {
            if exp.imag != 0.0 || exp.real < 0.0 {
                return None;
            }
            if exp.real == 0.0 {
                return Some(Self::new(1.0, 0.0));
            }
            return Some(Self::new(0.0, 0.0));
        }
        let theta = self.imag.atan2(self.real);
        let ln_r = r.ln();
        let len = (exp.real * ln_r - exp.imag * theta).exp();
        let phase = exp.real * theta + exp.imag * ln_r;
        Some(Self::new(len * phase.cos(), len * phase.sin()))
    }
}

impl Add for PyComplex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.real + rhs.real, self.imag + rhs.imag)
    }
}

impl Sub for PyComplex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.real - rhs.real, self.imag - rhs.imag)
    }
}

impl Mul for PyComplex {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::new(
            self.real * rhs.real - self.imag * rhs.imag,
            self.imag * rhs.real + self.real * rhs.imag,
        )
    }
}

impl Neg for PyComplex {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.real, -self.imag)
    }
}

impl From<f64> for PyComplex {
    fn from(real: f64) -> Self {
        Self::new(real, 0.0)
    }
}

/// Formats one component the way CPython's complex repr does: the usual
/// float repr, but integral values drop the trailing `.0`.
fn component_repr(x: f64) -> String {
    let s = float_repr(x);
    match s.strip_suffix(".0") {
        Some(stripped) => stripped.to_owned(),
        None => s,
    }
}

impl Display for PyComplex {
    /// `2j` when the real part is zero, `(1+2j)` otherwise, with the
    /// imaginary component's own sign providing the separator for
    /// negative values: `(1-2j)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.real == 0.0 && self.real.is_sign_positive() {
            return write!(f, "{}j", component_repr(self.imag));
        }
        let imag = component_repr(self.imag);
        let sep = if imag.starts_with('-') { "" } else { "+" };
        write!(f, "({}{sep}{imag}j)", component_repr(self.real))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn multiplication_matches_cpython() {
        let z = PyComplex::new(1.0, 2.0) * PyComplex::new(3.0, -4.0);
        assert_eq!(z, PyComplex::new(11.0, 2.0));
        assert_eq!(z.to_string(), "(11+2j)");
    }

    #[test]
    fn multiplicative_identity() {
        let z = PyComplex::new(2.5, -3.5);
        assert_eq!(z * PyComplex::new(1.0, 0.0), z);
    }

    #[test]
    fn division_by_self_is_one() {
        let z = PyComplex::new(3.0, 4.0);
        assert_eq!(z.checked_div(z), Some(PyComplex::new(1.0, 0.0)));
    }

    #[test]
    fn division_uses_branched_algorithm() {
        let z = PyComplex::new(1.0, 2.0).checked_div(PyComplex::new(3.0, -4.0)).unwrap();
        assert_eq!(z, PyComplex::new(-0.2, 0.4));
    }

    #[test]
    fn division_by_zero_is_none() {
        assert_eq!(PyComplex::new(1.0, 0.0).checked_div(PyComplex::new(0.0, 0.0)), None);
    }

    #[test]
    fn zero_base_power_rules() {
        let zero = PyComplex::new(0.0, 0.0);
        assert_eq!(zero.checked_pow(PyComplex::new(2.0, 0.0)), Some(zero));
        assert_eq!(zero.checked_pow(zero), Some(PyComplex::new(1.0, 0.0)));
        assert_eq!(zero.checked_pow(PyComplex::new(-1.0, 0.0)), None);
        assert_eq!(zero.checked_pow(PyComplex::new(1.0, 1.0)), None);
    }

    #[test]
    fn square_via_pow() {
        let z = PyComplex::new(0.0, 1.0).checked_pow(PyComplex::new(2.0, 0.0)).unwrap();
        assert!((z.real - -1.0).abs() < 1e-12);
        assert!(z.imag.abs() < 1e-12);
    }

    #[test]
    fn repr_forms() {
        assert_eq!(PyComplex::new(0.0, 2.0).to_string(), "2j");
        assert_eq!(PyComplex::new(0.0, -2.5).to_string(), "-2.5j");
        assert_eq!(PyComplex::new(1.0, -2.0).to_string(), "(1-2j)");
        assert_eq!(PyComplex::new(-1.5, 0.0).to_string(), "(-1.5+0j)");
        assert_eq!(PyComplex::new(1.0, f64::NAN).to_string(), "(1+nanj)");
    }
}
