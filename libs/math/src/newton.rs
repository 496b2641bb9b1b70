//! Guarded Newton root finder.
//!
//! Newton steps with a numeric derivative, falling back to bisection whenever
//! a step leaves the bracketing interval or the derivative vanishes. The
//! bracket is tightened every iteration, so the solver either converges or
//! reports [`MathError::NoConvergence`] after a bounded number of steps.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixed::MathError;

const MAX_ITERATIONS: u32 = 64;
const TOLERANCE: Decimal = dec!(0.000000000000000001);

/// Find `x` in `[lo, hi]` with `f(x) == 0`, starting from `guess`.
///
/// `f(lo)` and `f(hi)` must have opposite signs. Converges when `|f(x)|`
/// drops below 1e-18 or the bracket collapses to that width. Generic over
/// the caller's error type so `f` can evaluate fallible domain logic.
pub fn solve<F, E>(f: F, lo: Decimal, hi: Decimal, guess: Decimal) -> Result<Decimal, E>
where
    F: Fn(Decimal) -> Result<Decimal, E>,
    E: From<MathError>,
{
    if lo >= hi {
        return Err(MathError::NotBracketed.into());
    }

    let mut lo = lo;
    let mut hi = hi;
    let f_lo = f(lo)?;
    if f_lo.abs() <= TOLERANCE {
        return Ok(lo);
    }
    let mut f_hi = f(hi)?;
    if f_hi.abs() <= TOLERANCE {
        return Ok(hi);
    }
    if f_lo.is_sign_positive() == f_hi.is_sign_positive() {
        return Err(MathError::NotBracketed.into());
    }

    let mut x = if guess > lo && guess < hi {
        guess
    } else {
        (lo + hi) / dec!(2)
    };

    for _ in 0..MAX_ITERATIONS {
        let fx = f(x)?;
        if fx.abs() <= TOLERANCE {
            return Ok(x);
        }

        if fx.is_sign_positive() == f_hi.is_sign_positive() {
            hi = x;
            f_hi = fx;
        } else {
            lo = x;
        }
        if hi - lo <= TOLERANCE {
            return Ok((lo + hi) / dec!(2));
        }

        // Central difference, clamped to the bracket.
        let h = (x.abs() * dec!(0.000000001)).max(dec!(0.000000000001));
        let left = (x - h).max(lo);
        let right = (x + h).min(hi);
        let span = right - left;

        let next = if span.is_zero() {
            (lo + hi) / dec!(2)
        } else {
            let df = (f(right)? - f(left)?)
                .checked_div(span)
                .ok_or(MathError::Overflow { operation: "newton" })?;
            if df.is_zero() {
                (lo + hi) / dec!(2)
            } else {
                let step = fx
                    .checked_div(df)
                    .ok_or(MathError::Overflow { operation: "newton" })?;
                let candidate = x - step;
                if candidate <= lo || candidate >= hi {
                    (lo + hi) / dec!(2)
                } else {
                    candidate
                }
            }
        };
        x = next;
    }

    Err(MathError::NoConvergence {
        iterations: MAX_ITERATIONS,
    }
    .into())
}
