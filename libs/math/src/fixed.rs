//! Unit-scale multiply/divide and integer exponentiation.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use thiserror::Error;

/// Fractional digits kept for amounts, ratios and fees.
pub const UNIT_DP: u32 = 18;

/// Fractional digits kept for exponentiation intermediates.
pub const RAY_DP: u32 = 27;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("decimal overflow in {operation}")]
    Overflow { operation: &'static str },

    #[error("root finding did not converge after {iterations} iterations")]
    NoConvergence { iterations: u32 },

    #[error("root is not bracketed by the supplied interval")]
    NotBracketed,
}

pub type Result<T> = std::result::Result<T, MathError>;

/// Round to the unit scale, half away from zero.
pub fn round_unit(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Unit-scale multiply: `a * b` rounded to 18 fractional digits.
pub fn wmul(a: Decimal, b: Decimal) -> Result<Decimal> {
    let raw = a
        .checked_mul(b)
        .ok_or(MathError::Overflow { operation: "wmul" })?;
    Ok(round_unit(raw))
}

/// Unit-scale divide: `a / b` rounded to 18 fractional digits.
pub fn wdiv(a: Decimal, b: Decimal) -> Result<Decimal> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let raw = a
        .checked_div(b)
        .ok_or(MathError::Overflow { operation: "wdiv" })?;
    Ok(round_unit(raw))
}

/// Extended-scale multiply: `a * b` rounded to 27 fractional digits.
pub fn rmul(a: Decimal, b: Decimal) -> Result<Decimal> {
    let raw = a
        .checked_mul(b)
        .ok_or(MathError::Overflow { operation: "rmul" })?;
    Ok(raw.round_dp_with_strategy(RAY_DP, RoundingStrategy::MidpointAwayFromZero))
}

/// `1 / x` at the unit scale.
pub fn reciprocal(x: Decimal) -> Result<Decimal> {
    wdiv(Decimal::ONE, x)
}

/// `x^n` by squaring, with extended-scale rounding between multiplies.
pub fn powu(x: Decimal, n: u32) -> Result<Decimal> {
    let mut result = Decimal::ONE;
    let mut base = x;
    let mut exp = n;
    while exp > 0 {
        if exp & 1 == 1 {
            result = rmul(result, base)?;
        }
        exp >>= 1;
        if exp > 0 {
            base = rmul(base, base)?;
        }
    }
    Ok(result)
}

/// Truncate toward zero to `dp` fractional digits. Used when paying out in a
/// token with fewer than 18 decimals.
pub fn quantize_floor(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wmul_rounds_to_unit_scale() {
        assert_eq!(wmul(dec!(1.5), dec!(2)).unwrap(), dec!(3));
        assert_eq!(
            wmul(dec!(0.000000000000000001), dec!(0.5)).unwrap(),
            dec!(0.000000000000000001)
        );
        assert_eq!(wmul(dec!(0.000000000000000001), dec!(0.4)).unwrap(), dec!(0));
    }

    #[test]
    fn wdiv_rounds_half_up() {
        assert_eq!(wdiv(dec!(1), dec!(3)).unwrap(), dec!(0.333333333333333333));
        assert_eq!(wdiv(dec!(2), dec!(3)).unwrap(), dec!(0.666666666666666667));
        assert_eq!(wdiv(dec!(6), dec!(2)).unwrap(), dec!(3));
    }

    #[test]
    fn wdiv_by_zero_errors() {
        assert_eq!(wdiv(dec!(1), dec!(0)), Err(MathError::DivisionByZero));
    }

    #[test]
    fn reciprocal_matches_wdiv() {
        assert_eq!(reciprocal(dec!(3)).unwrap(), dec!(0.333333333333333333));
        assert_eq!(reciprocal(dec!(0.5)).unwrap(), dec!(2));
    }

    #[test]
    fn powu_small_bases() {
        assert_eq!(powu(dec!(2), 0).unwrap(), dec!(1));
        assert_eq!(powu(dec!(2), 10).unwrap(), dec!(1024));
        assert_eq!(powu(dec!(0.6), 7).unwrap(), dec!(0.0279936));
        assert_eq!(powu(dec!(1.5), 7).unwrap(), dec!(17.0859375));
    }

    #[test]
    fn quantize_floor_truncates() {
        assert_eq!(quantize_floor(dec!(99.9588793), 6), dec!(99.958879));
        assert_eq!(quantize_floor(dec!(-1.2345678), 6), dec!(-1.234567));
    }

    #[test]
    fn overflow_is_reported() {
        let err = wmul(Decimal::MAX, dec!(2)).unwrap_err();
        assert!(matches!(err, MathError::Overflow { .. }));
    }

    proptest::proptest! {
        #[test]
        fn wmul_wdiv_round_trip(a in 1u64..1_000_000, b in 1u64..1_000_000) {
            let a = Decimal::from(a) / dec!(1000);
            let b = Decimal::from(b) / dec!(1000);
            let back = wdiv(wmul(a, b).unwrap(), b).unwrap();
            proptest::prop_assert!((back - a).abs() <= dec!(0.000000000000001));
        }

        #[test]
        fn quantize_floor_never_rounds_away_from_zero(raw in 0u64..1_000_000_000, dp in 0u32..18) {
            let value = Decimal::from(raw) / dec!(1000);
            let floored = quantize_floor(value, dp);
            proptest::prop_assert!(floored <= value);
            proptest::prop_assert!(value - floored < dec!(1));
        }
    }
}
