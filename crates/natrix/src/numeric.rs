//! Float formatting and the cross-type integer/float ordering law.
//!
//! Both concerns track CPython closely: [`float_repr`] mirrors
//! `format_float_short`, and [`compare_int_float`] implements exact
//! comparison between arbitrary-width integers and doubles without
//! rounding either operand first.

use std::cmp::Ordering;

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive};

/// Largest integer magnitude a double represents exactly (`2^53`).
const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// Significant digits used when expanding a float for digit-wise
/// comparison against an integer.
const APPROX_PRECISION: usize = 30;

/// Returns the string representation of a float matching CPython's
/// `repr()` behavior.
///
/// - special values render `inf`, `-inf`, `nan`;
/// - values outside `[1e-4, 1e16)` in magnitude use scientific notation
///   with an explicit sign on the exponent (`1e+16`, `9.5e-5`);
/// - everything else renders in decimal with a trailing `.0` for
///   integral values (via `ryu`, which produces the shortest decimal
///   that round-trips).
#[must_use]
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f.is_sign_negative() { "-inf" } else { "inf" }.to_owned();
    }

    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        // Rust's `{:e}` is shortest-round-trip; CPython additionally
        // signs the exponent and pads it to two digits (`1e+16`, `5e-05`).
        let s = format!("{f:e}");
        let Some(e_pos) = s.find('e') else { return s };
        let (mantissa, exp) = s.split_at(e_pos);
        let exponent: i32 = exp[1..].parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        let mut buffer = ryu::Buffer::new();
        buffer.format(f).to_owned()
    }
}

/// Compares an arbitrary-width integer against a float.
///
/// Returns `None` when `f` is NaN (every comparison is false except `!=`).
/// The comparison is exact:
///
/// 1. infinities compare by their sign alone;
/// 2. differing signs decide immediately;
/// 3. magnitudes within `2^53` cast to `f64` losslessly and compare there;
/// 4. otherwise the decimal digit counts are compared, ties broken by a
///    lexicographic digit comparison against a 30-significant-digit
///    decimal expansion of `|f|`.
#[must_use]
pub fn compare_int_float(i: &BigInt, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f.is_infinite() {
        return Some(if f > 0.0 { Ordering::Less } else { Ordering::Greater });
    }

    let int_sign = match i.sign() {
        Sign::Minus => -1,
        Sign::NoSign => 0,
        Sign::Plus => 1,
    };
    let float_sign = if f > 0.0 {
        1
    } else if f < 0.0 {
        -1
    } else {
        0
    };
    if int_sign != float_sign {
        return Some(int_sign.cmp(&float_sign));
    }
    if int_sign == 0 {
        return Some(Ordering::Equal);
    }

    let abs_int = i.abs();
    if abs_int <= BigInt::from(MAX_SAFE_INTEGER) {
        // Exact cast: the integer fits the double's mantissa.
        let as_float = abs_int.to_f64().unwrap_or(f64::INFINITY) * f64::from(int_sign);
        return as_float.partial_cmp(&f);
    }

    // Same sign and the integer exceeds 2^53, so compare magnitudes and
    // flip the result for negatives.
    let magnitude_order = compare_magnitudes(&abs_int, f.abs());
    Some(if int_sign < 0 {
        magnitude_order.reverse()
    } else {
        magnitude_order
    })
}

/// Compares `|i|` against `|f|` digit-wise, `|i| > 2^53`.
fn compare_magnitudes(abs_int: &BigInt, abs_f: f64) -> Ordering {
    let int_digits = abs_int.to_string();
    #[expect(clippy::cast_possible_truncation, reason = "log10 of a finite double is tiny")]
    let float_digit_count = (abs_f.log10().floor() as i64) + 1;
    let int_digit_count = int_digits.len() as i64;
    if int_digit_count != float_digit_count {
        return int_digit_count.cmp(&float_digit_count);
    }

    let float_digits = approximate_digit_string(abs_f, APPROX_PRECISION);
    // Both strings hold the same number of digits, so lexicographic
    // comparison equals numeric comparison.
    int_digits.as_str().cmp(float_digits.as_str())
}

/// Expands `|f|` into its decimal digit string with `precision`
/// significant digits, padded with zeros out to the full digit count.
fn approximate_digit_string(abs_f: f64, precision: usize) -> String {
    let formatted = format!("{abs_f:.prec$e}", prec = precision - 1);
    let Some(e_pos) = formatted.find('e') else {
        return formatted;
    };
    let exponent: i64 = formatted[e_pos + 1..].parse().unwrap_or(0);
    let mantissa: String = formatted[..e_pos].chars().filter(char::is_ascii_digit).collect();
    let total_digits = usize::try_from(exponent + 1).unwrap_or(1);
    let mut digits = mantissa;
    if digits.len() > total_digits {
        digits.truncate(total_digits);
    } else {
        while digits.len() < total_digits {
            digits.push('0');
        }
    }
    digits
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn float_repr_decimal_forms() {
        assert_eq!(float_repr(3.0), "3.0");
        assert_eq!(float_repr(-0.5), "-0.5");
        assert_eq!(float_repr(0.0), "0.0");
        assert_eq!(float_repr(-0.0), "-0.0");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(123_456_789.25), "123456789.25");
    }

    #[test]
    fn float_repr_scientific_forms() {
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(-2.5e17), "-2.5e+17");
        assert_eq!(float_repr(0.000_05), "5e-05");
        assert_eq!(float_repr(f64::INFINITY), "inf");
        assert_eq!(float_repr(f64::NEG_INFINITY), "-inf");
        assert_eq!(float_repr(f64::NAN), "nan");
    }

    #[test]
    fn small_magnitudes_compare_exactly() {
        assert_eq!(compare_int_float(&BigInt::from(7), 7.0), Some(Ordering::Equal));
        assert_eq!(compare_int_float(&BigInt::from(7), 7.5), Some(Ordering::Less));
        assert_eq!(compare_int_float(&BigInt::from(-3), -2.5), Some(Ordering::Less));
        assert_eq!(compare_int_float(&BigInt::from(0), 0.0), Some(Ordering::Equal));
        assert_eq!(compare_int_float(&BigInt::from(0), -0.0), Some(Ordering::Equal));
    }

    #[test]
    fn signs_decide_before_magnitude() {
        assert_eq!(compare_int_float(&BigInt::from(-1), 0.5), Some(Ordering::Less));
        assert_eq!(compare_int_float(&BigInt::from(1), -0.5), Some(Ordering::Greater));
    }

    #[test]
    fn infinities_compare_by_sign() {
        let huge = BigInt::from(10).pow(400);
        assert_eq!(compare_int_float(&huge, f64::INFINITY), Some(Ordering::Less));
        assert_eq!(compare_int_float(&huge, f64::NEG_INFINITY), Some(Ordering::Greater));
    }

    #[test]
    fn nan_compares_to_nothing() {
        assert_eq!(compare_int_float(&BigInt::from(1), f64::NAN), None);
    }

    #[test]
    fn large_magnitudes_compare_digitwise() {
        // 2^60 is exactly representable; the comparison must be exact even
        // though both operands exceed 2^53.
        let pow60 = BigInt::from(2).pow(60);
        let f = 2f64.powi(60);
        assert_eq!(compare_int_float(&pow60, f), Some(Ordering::Equal));
        assert_eq!(compare_int_float(&(&pow60 + 1), f), Some(Ordering::Greater));
        assert_eq!(compare_int_float(&(&pow60 - 1), f), Some(Ordering::Less));
    }

    #[test]
    fn digit_count_differences_win() {
        let big = BigInt::from(10).pow(30);
        assert_eq!(compare_int_float(&big, 1e20), Some(Ordering::Greater));
        assert_eq!(compare_int_float(&(-&big), -1e20), Some(Ordering::Less));
    }

    #[test]
    fn approximate_digit_string_expands_floats() {
        assert_eq!(approximate_digit_string(2f64.powi(60), 30), "1152921504606846976");
        assert_eq!(approximate_digit_string(1e20, 30), "100000000000000000000");
    }
}
