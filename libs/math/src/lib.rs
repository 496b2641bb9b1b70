//! Fixed-point decimal math for pool accounting
//!
//! All pool arithmetic runs on `rust_decimal::Decimal` with explicit rounding
//! at two scales: 18 fractional digits for amounts and ratios (the unit
//! scale), 27 fractional digits for exponentiation intermediates. Rounding is
//! half-away-from-zero at both scales so results are stable regardless of the
//! incidental scale of the operands.

pub mod fixed;
pub mod newton;

pub use fixed::{
    powu, quantize_floor, reciprocal, rmul, round_unit, wdiv, wmul, MathError, RAY_DP, UNIT_DP,
};
pub use newton::solve;

// Re-export for convenience
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
