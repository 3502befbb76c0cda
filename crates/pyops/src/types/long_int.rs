//! LongInt wrapper for arbitrary precision integer support.
//!
//! Named `LongInt` to avoid confusion with the external `BigInt` type. Integers use the
//! fixed-width `i64` representation when they fit and are promoted to `LongInt` on overflow;
//! whether a big result is demoted again depends on the dialect (the legacy `long` type keeps
//! its representation).

use std::fmt::{self, Display};

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive, Zero};

/// Wrapper around `num_bigint::BigInt` for arbitrary precision integers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub(crate) struct LongInt(pub BigInt);

impl LongInt {
    pub fn new(bi: BigInt) -> Self {
        Self(bi)
    }

    /// Estimates memory size in bytes.
    ///
    /// Rounds up bits to bytes to avoid underestimating (1 bit = 1 byte, not 0 bytes).
    pub fn estimate_size(&self) -> usize {
        let bits = self.0.bits();
        let bit_bytes = usize::try_from(bits).unwrap_or(usize::MAX).saturating_add(7) / 8;
        bit_bytes + std::mem::size_of::<BigInt>()
    }

    pub fn inner(&self) -> &BigInt {
        &self.0
    }

    /// Estimates the result size of `base ** exponent` in bytes.
    ///
    /// Returns `None` on overflow, which indicates an astronomically large result.
    pub fn estimate_pow_bytes(base_bits: u64, exponent: u64) -> Option<usize> {
        let result_bits = base_bits.checked_mul(exponent)?;
        usize::try_from(result_bits.div_ceil(8)).ok()
    }

    /// Estimates the result size of `value << shift_amount` in bytes.
    pub fn estimate_lshift_bytes(value_bits: u64, shift_amount: u64) -> Option<usize> {
        let result_bits = value_bits.checked_add(shift_amount)?;
        usize::try_from(result_bits.div_ceil(8)).ok()
    }

    /// Estimates the result size of `a * b` in bytes.
    pub fn estimate_mult_bytes(a_bits: u64, b_bits: u64) -> Option<usize> {
        let result_bits = a_bits.checked_add(b_bits)?;
        usize::try_from(result_bits.div_ceil(8)).ok()
    }
}

impl From<BigInt> for LongInt {
    fn from(bi: BigInt) -> Self {
        Self(bi)
    }
}

impl Display for LongInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Converts an integer to the nearest float, `None` when it exceeds the float range.
pub(crate) fn big_to_f64(value: &BigInt) -> Option<f64> {
    value.to_f64().filter(|f| f.is_finite())
}

const DBL_MANT_DIG: i64 = 53;
const DBL_MAX_EXP: i64 = 1024;
const DBL_MIN_EXP: i64 = -1021;
/// Integers up to this magnitude convert to floats exactly.
const EXACT_LIMIT: u64 = 1 << DBL_MANT_DIG;

/// Failure modes of integer true division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrueDivError {
    ZeroDivision,
    Overflow,
}

/// `a / b` for integers, correctly rounded to the nearest float.
///
/// Small operands are divided as floats, which is exact enough since both convert without
/// loss. Otherwise the quotient is computed with 55 or 56 significant bits plus a sticky bit
/// and rounded half-to-even once, so the result never suffers from double rounding, not even
/// in the subnormal range.
pub(crate) fn true_divide(a: &BigInt, b: &BigInt) -> Result<f64, TrueDivError> {
    if b.is_zero() {
        return Err(TrueDivError::ZeroDivision);
    }
    let negate = (a.sign() == Sign::Minus) != (b.sign() == Sign::Minus);
    if let (Some(x), Some(y)) = (a.abs().to_u64(), b.abs().to_u64())
        && x <= EXACT_LIMIT
        && y <= EXACT_LIMIT
    {
        let result = x as f64 / y as f64;
        return Ok(if negate { -result } else { result });
    }
    if a.is_zero() {
        return Ok(if negate { -0.0 } else { 0.0 });
    }

    let a = a.magnitude();
    let b = b.magnitude();
    let diff = i64::try_from(a.bits()).unwrap_or(i64::MAX) - i64::try_from(b.bits()).unwrap_or(i64::MAX);
    if diff > DBL_MAX_EXP {
        return Err(TrueDivError::Overflow);
    }
    if diff < DBL_MIN_EXP - DBL_MANT_DIG - 1 {
        return Ok(if negate { -0.0 } else { 0.0 });
    }

    // x = a * 2**-shift, keeping track of whether bits were lost
    let shift = diff.max(DBL_MIN_EXP) - DBL_MANT_DIG - 2;
    let mut inexact = false;
    let x = if shift <= 0 {
        a << shift.unsigned_abs()
    } else {
        let shifted = a >> shift.unsigned_abs();
        inexact = (&shifted << shift.unsigned_abs()) != *a;
        shifted
    };
    let remainder = &x % b;
    let quotient = &x / b;
    inexact |= !remainder.is_zero();

    let mut q = quotient.to_u64().ok_or(TrueDivError::Overflow)?;
    let q_bits = i64::from(u64::BITS - q.leading_zeros());
    let extra_bits = q_bits.max(DBL_MIN_EXP - shift) - DBL_MANT_DIG;
    let mask = 1u64 << (extra_bits - 1);
    let low = q | u64::from(inexact);
    if low & mask != 0 && low & (3 * mask - 1) != 0 {
        q += mask;
    }
    q &= !(2 * mask - 1);

    let dx = q as f64;
    if shift + q_bits >= DBL_MAX_EXP && (shift + q_bits > DBL_MAX_EXP || dx == ldexp(1.0, q_bits)) {
        return Err(TrueDivError::Overflow);
    }
    let result = ldexp(dx, shift);
    Ok(if negate { -result } else { result })
}

/// `x * 2**exp` without intermediate overflow or underflow.
///
/// The scaling is split into steps that stay within the normal range; only the final step can
/// round, which matters when the result is subnormal.
pub(crate) fn ldexp(mut x: f64, mut exp: i64) -> f64 {
    const MAX_STEP: i64 = 1023;
    const MIN_STEP: i64 = -1022;
    while exp > MAX_STEP {
        x *= pow2(MAX_STEP);
        exp -= MAX_STEP;
        if x.is_infinite() {
            return x;
        }
    }
    while exp < MIN_STEP {
        x *= pow2(MIN_STEP);
        exp -= MIN_STEP;
        if x == 0.0 {
            return x;
        }
    }
    x * pow2(exp)
}

/// `2**exp` for exponents in the normal range.
fn pow2(exp: i64) -> f64 {
    debug_assert!((-1022..=1023).contains(&exp));
    f64::from_bits(u64::try_from(exp + 1023).unwrap_or(0) << 52)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn div(a: impl Into<BigInt>, b: impl Into<BigInt>) -> Result<f64, TrueDivError> {
        true_divide(&a.into(), &b.into())
    }

    #[test]
    fn small_operands() {
        assert_eq!(div(1, 2), Ok(0.5));
        assert_eq!(div(-7, 2), Ok(-3.5));
        assert_eq!(div(1, 3), Ok(1.0 / 3.0));
        assert_eq!(div(1, 0), Err(TrueDivError::ZeroDivision));
    }

    #[test]
    fn negative_zero_quotient() {
        let result = div(0, -5).unwrap();
        assert_eq!(result, 0.0);
        assert!(result.is_sign_negative());
    }

    #[test]
    fn large_operands_round_correctly() {
        // (2**64 + 1) / 2 == 2**63 + 0.5, which rounds to 2**63
        let a = (BigInt::from(1) << 64u32) + 1;
        assert_eq!(div(a, 2), Ok(9_223_372_036_854_775_808.0));

        // 10**30 / 10**10 is exactly 10**20
        let a = BigInt::from(10).pow(30u32);
        let b = BigInt::from(10).pow(10u32);
        assert_eq!(div(a, b), Ok(1e20));

        let a = BigInt::from(10).pow(400u32);
        let b = BigInt::from(10).pow(390u32);
        assert_eq!(div(a, b), Ok(1e10));
    }

    #[test]
    fn overflow_and_underflow() {
        let huge = BigInt::from(1) << 2000u32;
        assert_eq!(div(huge.clone(), 1), Err(TrueDivError::Overflow));
        assert_eq!(div(1, huge), Ok(0.0));

        let tiny = div(1, BigInt::from(1) << 1074u32).unwrap();
        assert_eq!(tiny, f64::from_bits(1));
    }

    #[test]
    fn ldexp_matches_powers_of_two() {
        assert_eq!(ldexp(1.0, 10), 1024.0);
        assert_eq!(ldexp(3.0, -1), 1.5);
        assert_eq!(ldexp(1.0, -1074), f64::from_bits(1));
        assert_eq!(ldexp(1.0, 1024), f64::INFINITY);
        assert_eq!(ldexp(1.0, -1080), 0.0);
    }

    #[test]
    fn float_conversion_range() {
        assert_eq!(big_to_f64(&BigInt::from(5)), Some(5.0));
        assert_eq!(big_to_f64(&(BigInt::from(1) << 1024u32)), None);
    }
}
