//! Rebalancing cost curve.
//!
//! Pricing is driven by a single convex function of the coverage ratio
//! `r = cash / liability`. Above a threshold the curve is `k / r^n`; below it
//! the power form would explode, so it continues as the linear `c1 - r`. Fees
//! for deposits, withdrawals and swaps are all differences of this function
//! weighted by reserve size, which is what makes deposit-then-withdraw
//! round trips non-profitable.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tidepool_math::{powu, wdiv, wmul};

use crate::error::{PoolError, Result};

/// Parameters of the piecewise cost curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParams {
    /// Scale of the power branch.
    pub k: Decimal,
    /// Exponent of the power branch.
    pub n: u32,
    /// Intercept of the linear branch.
    pub c1: Decimal,
    /// Coverage ratio below which the linear branch applies.
    pub x_threshold: Decimal,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            k: dec!(0.00002),
            n: 7,
            c1: dec!(0.376927610599998308),
            x_threshold: dec!(0.329811659274998519),
        }
    }
}

impl CurveParams {
    /// Reject parameter sets that put the curve outside its working range.
    pub fn validate(&self) -> Result<()> {
        if self.k <= Decimal::ZERO || self.k > Decimal::ONE {
            return Err(PoolError::InvalidParameter {
                name: "k",
                value: self.k,
            });
        }
        if self.n == 0 {
            return Err(PoolError::InvalidParameter {
                name: "n",
                value: Decimal::from(self.n),
            });
        }
        if self.x_threshold <= Decimal::ZERO || self.x_threshold >= Decimal::ONE {
            return Err(PoolError::InvalidParameter {
                name: "x_threshold",
                value: self.x_threshold,
            });
        }
        // The linear branch must stay positive down to r = 0 and meet the
        // power branch from above.
        if self.c1 <= self.x_threshold || self.c1 > Decimal::ONE {
            return Err(PoolError::InvalidParameter {
                name: "c1",
                value: self.c1,
            });
        }
        Ok(())
    }

    /// Marginal rebalancing cost at coverage ratio `r`.
    pub fn cost(&self, r: Decimal) -> Result<Decimal> {
        if r < self.x_threshold {
            return Ok(self.c1 - r);
        }
        // Far above full coverage the power branch underflows the unit
        // scale; short-circuit before r^n can overflow.
        if r >= dec!(1000) {
            return Ok(Decimal::ZERO);
        }
        let r_pow = powu(r, self.n)?;
        Ok(wdiv(self.k, r_pow)?)
    }

    /// Average cost change per unit of coverage over `[r0, r1]`.
    ///
    /// This is the effective slippage applied to one side of a swap whose
    /// coverage ratio moves from `r0` to `r1`.
    pub fn segment_slippage(&self, r0: Decimal, r1: Decimal) -> Result<Decimal> {
        if r0 == r1 {
            return Ok(Decimal::ZERO);
        }
        let delta_cost = (self.cost(r1)? - self.cost(r0)?).abs();
        Ok(wdiv(delta_cost, (r1 - r0).abs())?)
    }

    /// Fee charged on a deposit of `amount` into a reserve holding `cash`
    /// against `liability`.
    ///
    /// Depositing into an over-covered reserve dilutes the cushion existing
    /// holders paid for, so the fee is the drop in total priced cost caused
    /// by pulling the coverage ratio back toward one. Reserves at or below
    /// full coverage charge nothing.
    pub fn deposit_fee(&self, cash: Decimal, liability: Decimal, amount: Decimal) -> Result<Decimal> {
        if liability.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let r_before = wdiv(cash, liability)?;
        if r_before <= Decimal::ONE {
            return Ok(Decimal::ZERO);
        }
        let liability_after = liability + amount;
        let r_after = wdiv(cash + amount, liability_after)?;
        let fee = wmul(liability_after, self.cost(r_after)?)?
            - wmul(liability, self.cost(r_before)?)?;
        Ok(fee.clamp(Decimal::ZERO, amount))
    }

    /// Fee charged on withdrawing `amount` of liability from a reserve
    /// holding `cash` against `liability`.
    ///
    /// Leaving an under-covered reserve pushes the coverage ratio further
    /// down for everyone who stays, so the leaver pays the induced cost
    /// increase. Fully covered reserves and full exits pay nothing.
    pub fn withdrawal_fee(
        &self,
        cash: Decimal,
        liability: Decimal,
        amount: Decimal,
    ) -> Result<Decimal> {
        if liability.is_zero() || amount >= liability {
            return Ok(Decimal::ZERO);
        }
        let r_before = wdiv(cash, liability)?;
        if r_before >= Decimal::ONE {
            return Ok(Decimal::ZERO);
        }
        let liability_after = liability - amount;
        let cash_after = (cash - amount).max(Decimal::ZERO);
        let r_after = wdiv(cash_after, liability_after)?;
        let fee = wmul(liability_after, self.cost(r_after)?)?
            - wmul(liability, self.cost(r_before)?)?
            + wmul(amount, self.cost(Decimal::ONE)?)?;
        Ok(fee.clamp(Decimal::ZERO, amount))
    }
}
