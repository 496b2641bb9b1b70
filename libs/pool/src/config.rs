//! Pool configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::curve::CurveParams;
use crate::error::{PoolError, Result};

/// Tunable parameters of a pool engine. Defaults match the production main
/// pool; secondary pools typically lower `haircut_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub curve: CurveParams,
    /// Flat fee taken from every swap output.
    pub haircut_rate: Decimal,
    /// Share of the haircut retained in the destination reserve as extra
    /// cash. The remainder is paid to the fee recipient.
    pub retention_ratio: Decimal,
    /// Maximum tolerated relative gap between the two reference prices of a
    /// swap pair.
    pub max_price_deviation: Decimal,
    /// Converted amounts below this are rejected outright.
    pub dust_threshold: Decimal,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            curve: CurveParams::default(),
            haircut_rate: dec!(0.0004),
            retention_ratio: dec!(1),
            max_price_deviation: dec!(0.02),
            dust_threshold: dec!(0.000001),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        self.curve.validate()?;
        Self::ensure_ratio("haircut_rate", self.haircut_rate)?;
        Self::ensure_ratio("retention_ratio", self.retention_ratio)?;
        Self::ensure_ratio("max_price_deviation", self.max_price_deviation)?;
        if self.dust_threshold < Decimal::ZERO {
            return Err(PoolError::InvalidParameter {
                name: "dust_threshold",
                value: self.dust_threshold,
            });
        }
        Ok(())
    }

    fn ensure_ratio(name: &'static str, value: Decimal) -> Result<()> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(PoolError::InvalidParameter { name, value });
        }
        Ok(())
    }
}
