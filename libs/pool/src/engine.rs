//! The pool engine.
//!
//! One engine owns a set of reserve ledgers, prices every operation off the
//! rebalancing cost curve and settles token movement through the vault.
//! Mutating operations validate and quote against a snapshot of state before
//! touching anything, so a failed call leaves no partial writes behind.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tidepool_math::{newton, quantize_floor, wdiv, wmul};
use tracing::info;

use crate::clock::Clock;
use crate::config::PoolConfig;
use crate::curve::CurveParams;
use crate::error::{PoolError, Result};
use crate::events::{EventLog, PoolEvent};
use crate::feed::PriceFeed;
use crate::group::{AggregateGroup, GroupRegistry};
use crate::ledger::ReserveLedger;
use crate::types::{AccountId, GroupId, PoolId, Timestamp, TokenId};
use crate::vault::TokenVault;

/// Result of pricing a withdrawal before executing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithdrawQuote {
    /// Tokens paid out, truncated to the token's decimals.
    pub amount: Decimal,
    /// Portion of the burned liability kept by the reserve.
    pub fee: Decimal,
    /// Liability removed from the reserve.
    pub liability_to_burn: Decimal,
    /// False when the payout had to be capped at available cash.
    pub enough_cash: bool,
}

/// Result of pricing a swap before executing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapQuote {
    /// Tokens paid out, truncated to the destination token's decimals.
    pub amount_out: Decimal,
    /// Haircut taken from the gross output.
    pub haircut: Decimal,
}

/// Result of pricing a cross-reserve withdrawal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossWithdrawQuote {
    /// Target tokens paid out.
    pub amount: Decimal,
    /// Withdrawal fee on the target reserve.
    pub fee: Decimal,
    /// Source shares that will be burned.
    pub source_shares_burned: Decimal,
}

#[derive(Clone)]
pub struct PoolEngine {
    id: PoolId,
    /// Custody account in the vault.
    account: AccountId,
    admin: AccountId,
    fee_recipient: AccountId,
    config: PoolConfig,
    ledgers: HashMap<TokenId, ReserveLedger>,
    groups: GroupRegistry,
    feed: Arc<dyn PriceFeed>,
    vault: Arc<dyn TokenVault>,
    clock: Arc<dyn Clock>,
    paused: bool,
    events: EventLog<PoolEvent>,
}

impl std::fmt::Debug for PoolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolEngine")
            .field("id", &self.id)
            .field("paused", &self.paused)
            .field("assets", &self.ledgers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PoolEngine {
    pub fn new(
        id: PoolId,
        account: AccountId,
        admin: AccountId,
        config: PoolConfig,
        feed: Arc<dyn PriceFeed>,
        vault: Arc<dyn TokenVault>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id,
            account,
            admin,
            fee_recipient: admin,
            config,
            ledgers: HashMap::new(),
            groups: GroupRegistry::new(),
            feed,
            vault,
            clock,
            paused: false,
            events: EventLog::new(),
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tokens(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.ledgers.keys().copied()
    }

    pub fn has_asset(&self, token: TokenId) -> bool {
        self.ledgers.contains_key(&token)
    }

    pub fn ledger(&self, token: TokenId) -> Result<&ReserveLedger> {
        self.ledgers
            .get(&token)
            .ok_or(PoolError::AssetNotFound { token })
    }

    /// Mutable ledger access for maintenance and test setup. Ledger-level
    /// guards still apply.
    pub fn ledger_mut(&mut self, token: TokenId) -> Result<&mut ReserveLedger> {
        self.ledgers
            .get_mut(&token)
            .ok_or(PoolError::AssetNotFound { token })
    }

    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        self.events.drain()
    }

    /// Copy of this engine bound to a different vault. Used to dry-run
    /// operations against scratch custody without touching live balances.
    pub fn with_vault(&self, vault: Arc<dyn TokenVault>) -> Self {
        let mut shadow = self.clone();
        shadow.vault = vault;
        shadow
    }

    // ---- administration ----

    fn ensure_admin(&self, caller: AccountId) -> Result<()> {
        if caller != self.admin {
            return Err(PoolError::Forbidden { caller });
        }
        Ok(())
    }

    pub fn register_group(&mut self, caller: AccountId, group: AggregateGroup) -> Result<()> {
        self.ensure_admin(caller)?;
        self.groups.register(group)
    }

    pub fn add_asset(&mut self, caller: AccountId, ledger: ReserveLedger) -> Result<()> {
        self.ensure_admin(caller)?;
        if ledger.owning_pool() != self.id {
            return Err(PoolError::NotOwningPool {
                caller: ledger.owning_pool(),
                owner: self.id,
            });
        }
        if !self.groups.contains(ledger.group()) {
            return Err(PoolError::GroupNotFound {
                group: ledger.group(),
            });
        }
        let token = ledger.token();
        if self.ledgers.contains_key(&token) {
            return Err(PoolError::AssetAlreadyRegistered { token });
        }
        self.events.record(PoolEvent::AssetAdded {
            token,
            group: ledger.group(),
        });
        info!(%token, group = %ledger.group(), "asset added");
        self.ledgers.insert(token, ledger);
        Ok(())
    }

    /// Remove an empty reserve and hand its ledger back to the caller.
    pub fn remove_asset(&mut self, caller: AccountId, token: TokenId) -> Result<ReserveLedger> {
        self.ensure_admin(caller)?;
        let ledger = self.ledger(token)?;
        if !ledger.cash().is_zero() || !ledger.liability().is_zero() {
            return Err(PoolError::AssetNotEmpty { token });
        }
        let ledger = self
            .ledgers
            .remove(&token)
            .ok_or(PoolError::AssetNotFound { token })?;
        self.events.record(PoolEvent::AssetRemoved { token });
        Ok(ledger)
    }

    pub fn set_curve(&mut self, caller: AccountId, new: CurveParams) -> Result<()> {
        self.ensure_admin(caller)?;
        new.validate()?;
        let old = self.config.curve;
        self.config.curve = new;
        self.events.record(PoolEvent::CurveUpdated { old, new });
        Ok(())
    }

    pub fn set_haircut_rate(&mut self, caller: AccountId, new: Decimal) -> Result<()> {
        self.ensure_admin(caller)?;
        let old = std::mem::replace(&mut self.config.haircut_rate, new);
        if let Err(err) = self.config.validate() {
            self.config.haircut_rate = old;
            return Err(err);
        }
        self.events.record(PoolEvent::HaircutRateUpdated { old, new });
        Ok(())
    }

    pub fn set_retention_ratio(&mut self, caller: AccountId, new: Decimal) -> Result<()> {
        self.ensure_admin(caller)?;
        let old = std::mem::replace(&mut self.config.retention_ratio, new);
        if let Err(err) = self.config.validate() {
            self.config.retention_ratio = old;
            return Err(err);
        }
        self.events
            .record(PoolEvent::RetentionRatioUpdated { old, new });
        Ok(())
    }

    pub fn set_max_price_deviation(&mut self, caller: AccountId, new: Decimal) -> Result<()> {
        self.ensure_admin(caller)?;
        let old = std::mem::replace(&mut self.config.max_price_deviation, new);
        if let Err(err) = self.config.validate() {
            self.config.max_price_deviation = old;
            return Err(err);
        }
        self.events
            .record(PoolEvent::MaxPriceDeviationUpdated { old, new });
        Ok(())
    }

    pub fn set_dust_threshold(&mut self, caller: AccountId, new: Decimal) -> Result<()> {
        self.ensure_admin(caller)?;
        let old = std::mem::replace(&mut self.config.dust_threshold, new);
        if let Err(err) = self.config.validate() {
            self.config.dust_threshold = old;
            return Err(err);
        }
        self.events
            .record(PoolEvent::DustThresholdUpdated { old, new });
        Ok(())
    }

    pub fn set_fee_recipient(&mut self, caller: AccountId, new: AccountId) -> Result<()> {
        self.ensure_admin(caller)?;
        let old = std::mem::replace(&mut self.fee_recipient, new);
        self.events
            .record(PoolEvent::FeeRecipientUpdated { old, new });
        Ok(())
    }

    pub fn transfer_admin(&mut self, caller: AccountId, new: AccountId) -> Result<()> {
        self.ensure_admin(caller)?;
        let old = std::mem::replace(&mut self.admin, new);
        self.events.record(PoolEvent::AdminTransferred { old, new });
        Ok(())
    }

    pub fn pause(&mut self, caller: AccountId) -> Result<()> {
        self.ensure_admin(caller)?;
        if !self.paused {
            self.paused = true;
            self.events.record(PoolEvent::Paused);
        }
        Ok(())
    }

    pub fn unpause(&mut self, caller: AccountId) -> Result<()> {
        self.ensure_admin(caller)?;
        if self.paused {
            self.paused = false;
            self.events.record(PoolEvent::Unpaused);
        }
        Ok(())
    }

    // ---- guards ----

    fn ensure_live(&self) -> Result<()> {
        if self.paused {
            return Err(PoolError::Paused);
        }
        Ok(())
    }

    fn ensure_deadline(&self, deadline: Timestamp) -> Result<()> {
        let now = self.clock.now();
        if deadline < now {
            return Err(PoolError::Expired { deadline, now });
        }
        Ok(())
    }

    fn ensure_positive(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(PoolError::ZeroAmount);
        }
        Ok(())
    }

    /// Checks that two tokens are distinct, registered, in the same group
    /// and that their reference prices have not drifted apart.
    fn ensure_pair(&self, from: TokenId, to: TokenId) -> Result<()> {
        if from == to {
            return Err(PoolError::SameAsset { token: from });
        }
        let from_ledger = self.ledger(from)?;
        let to_ledger = self.ledger(to)?;
        if from_ledger.group() != to_ledger.group() {
            return Err(PoolError::DifferentGroup {
                from,
                to,
                from_group: from_ledger.group(),
                to_group: to_ledger.group(),
            });
        }
        let p_from = self.feed.price(from)?;
        let p_to = self.feed.price(to)?;
        let deviation = wdiv((p_from - p_to).abs(), p_from.max(p_to))?;
        if deviation > self.config.max_price_deviation {
            return Err(PoolError::PriceDeviationTooHigh {
                deviation,
                maximum: self.config.max_price_deviation,
            });
        }
        Ok(())
    }

    // ---- pricing ----

    /// Price-weighted coverage of a whole aggregate group. Above one the
    /// group as a whole is solvent even if individual reserves are not.
    pub fn equilibrium_coverage(&self, group: GroupId) -> Result<Decimal> {
        let mut cash_sum = Decimal::ZERO;
        let mut liability_sum = Decimal::ZERO;
        for ledger in self.ledgers.values().filter(|l| l.group() == group) {
            let price = self.feed.price(ledger.token())?;
            cash_sum += wmul(ledger.cash(), price)?;
            liability_sum += wmul(ledger.liability(), price)?;
        }
        if liability_sum.is_zero() {
            return Ok(Decimal::ONE);
        }
        Ok(wdiv(cash_sum, liability_sum)?)
    }

    /// Value shares of one reserve in another reserve's share terms, going
    /// through liability-per-share and the reference prices.
    pub fn convert_shares(&self, from: TokenId, to: TokenId, shares: Decimal) -> Result<Decimal> {
        let from_ledger = self.ledger(from)?;
        let to_ledger = self.ledger(to)?;
        let from_tokens = wmul(shares, from_ledger.liability_per_share()?)?;
        let common = wmul(from_tokens, self.feed.price(from)?)?;
        let to_tokens = wdiv(common, self.feed.price(to)?)?;
        Ok(wdiv(to_tokens, to_ledger.liability_per_share()?)?)
    }

    fn withdraw_quote(
        &self,
        ledger: &ReserveLedger,
        shares: Decimal,
        equilibrium: Decimal,
    ) -> Result<WithdrawQuote> {
        if ledger.total_shares().is_zero() || ledger.liability().is_zero() {
            return Err(PoolError::InsufficientLiquidityBurned);
        }
        let liability_to_burn = if shares >= ledger.total_shares() {
            ledger.liability()
        } else {
            wdiv(wmul(shares, ledger.liability())?, ledger.total_shares())?
                .min(ledger.liability())
        };
        if liability_to_burn.is_zero() {
            return Err(PoolError::InsufficientLiquidityBurned);
        }
        let fee =
            self.config
                .curve
                .withdrawal_fee(ledger.cash(), ledger.liability(), liability_to_burn)?;
        let mut amount = liability_to_burn - fee;
        if equilibrium < Decimal::ONE {
            amount = wmul(amount, equilibrium)?;
        }
        let enough_cash = amount <= ledger.cash();
        if !enough_cash {
            amount = ledger.cash();
        }
        Ok(WithdrawQuote {
            amount: quantize_floor(amount, ledger.decimals()),
            fee,
            liability_to_burn,
            enough_cash,
        })
    }

    /// Gross swap output before the haircut, allowing the destination cash
    /// to be probed past zero so the inverse quote can bracket a root.
    fn gross_swap_output(
        &self,
        from_ledger: &ReserveLedger,
        to_ledger: &ReserveLedger,
        amount_in: Decimal,
    ) -> Result<Decimal> {
        let ideal_out = amount_in;
        let curve = &self.config.curve;

        let slippage_in = if from_ledger.liability().is_zero() {
            Decimal::ZERO
        } else {
            let r0 = wdiv(from_ledger.cash(), from_ledger.liability())?;
            let r1 = wdiv(from_ledger.cash() + amount_in, from_ledger.liability())?;
            curve.segment_slippage(r0, r1)?
        };
        let slippage_out = if to_ledger.liability().is_zero() {
            Decimal::ZERO
        } else {
            let r0 = wdiv(to_ledger.cash(), to_ledger.liability())?;
            let r1 = wdiv(to_ledger.cash() - ideal_out, to_ledger.liability())?;
            curve.segment_slippage(r0, r1)?
        };

        let factor = (Decimal::ONE + slippage_in - slippage_out).max(Decimal::ZERO);
        Ok(wmul(ideal_out, factor)?)
    }

    fn swap_quote(
        &self,
        from_ledger: &ReserveLedger,
        to_ledger: &ReserveLedger,
        amount_in: Decimal,
    ) -> Result<SwapQuote> {
        let ideal_out = amount_in;
        if ideal_out > to_ledger.cash() {
            return Err(PoolError::InsufficientCash {
                token: to_ledger.token(),
                available: to_ledger.cash(),
                required: ideal_out,
            });
        }
        let gross = self.gross_swap_output(from_ledger, to_ledger, amount_in)?;
        let haircut = wmul(gross, self.config.haircut_rate)?;
        let amount_out = quantize_floor(gross - haircut, to_ledger.decimals());
        if amount_out > to_ledger.cash() {
            return Err(PoolError::InsufficientCash {
                token: to_ledger.token(),
                available: to_ledger.cash(),
                required: amount_out,
            });
        }
        Ok(SwapQuote { amount_out, haircut })
    }

    // ---- quotes (read-only) ----

    pub fn quote_potential_deposit(
        &self,
        token: TokenId,
        amount: Decimal,
    ) -> Result<(Decimal, Decimal)> {
        Self::ensure_positive(amount)?;
        let ledger = self.ledger(token)?;
        let amount = quantize_floor(amount, ledger.decimals());
        Self::ensure_positive(amount)?;
        let equilibrium = self.equilibrium_coverage(ledger.group())?;
        let fee = self
            .config
            .curve
            .deposit_fee(ledger.cash(), ledger.liability(), amount)?;
        let mut liability_to_mint = amount - fee;
        if equilibrium < Decimal::ONE {
            liability_to_mint = wdiv(liability_to_mint, equilibrium)?;
        }
        let shares = if ledger.total_shares().is_zero() || ledger.liability().is_zero() {
            liability_to_mint
        } else {
            wdiv(
                wmul(liability_to_mint, ledger.total_shares())?,
                ledger.liability(),
            )?
        };
        Ok((shares, fee))
    }

    pub fn quote_potential_withdraw(
        &self,
        token: TokenId,
        shares: Decimal,
    ) -> Result<WithdrawQuote> {
        Self::ensure_positive(shares)?;
        let ledger = self.ledger(token)?;
        let equilibrium = self.equilibrium_coverage(ledger.group())?;
        self.withdraw_quote(ledger, shares, equilibrium)
    }

    pub fn quote_potential_swap(
        &self,
        from: TokenId,
        to: TokenId,
        amount_in: Decimal,
    ) -> Result<SwapQuote> {
        Self::ensure_positive(amount_in)?;
        self.ensure_pair(from, to)?;
        let from_ledger = self.ledger(from)?;
        let amount_in = quantize_floor(amount_in, from_ledger.decimals());
        Self::ensure_positive(amount_in)?;
        self.swap_quote(from_ledger, self.ledger(to)?, amount_in)
    }

    /// Inverse swap quote: the input needed to receive `amount_out`. Solved
    /// numerically against the forward quote, rounded up to the source
    /// token's decimals so the returned input is always sufficient.
    pub fn quote_amount_in_for_exact_out(
        &self,
        from: TokenId,
        to: TokenId,
        amount_out: Decimal,
    ) -> Result<Decimal> {
        Self::ensure_positive(amount_out)?;
        self.ensure_pair(from, to)?;
        let from_ledger = self.ledger(from)?;
        let to_ledger = self.ledger(to)?;
        // Target the payout the swap would actually make, truncation included,
        // and ask for the next representable amount when the request falls
        // between ticks of the destination token.
        let amount_out = amount_out
            .round_dp_with_strategy(to_ledger.decimals(), RoundingStrategy::AwayFromZero);

        let net_output = |amount_in: Decimal| -> Result<Decimal> {
            if amount_in <= Decimal::ZERO {
                return Ok(Decimal::ZERO);
            }
            let gross = self.gross_swap_output(from_ledger, to_ledger, amount_in)?;
            let haircut = wmul(gross, self.config.haircut_rate)?;
            Ok(quantize_floor(gross - haircut, to_ledger.decimals()))
        };

        // Grow the bracket until it straddles the requested output.
        let mut hi = amount_out.max(dec!(0.000001));
        let mut attempts = 0;
        while net_output(hi)? < amount_out {
            hi *= dec!(2);
            attempts += 1;
            if attempts > 64 || hi > to_ledger.cash() * dec!(1000) {
                return Err(PoolError::InsufficientCash {
                    token: to,
                    available: to_ledger.cash(),
                    required: amount_out,
                });
            }
        }

        let root = newton::solve(
            |x| Ok::<Decimal, PoolError>(net_output(x)? - amount_out),
            Decimal::ZERO,
            hi,
            amount_out,
        )?;
        Ok(root.round_dp_with_strategy(
            from_ledger.decimals(),
            RoundingStrategy::AwayFromZero,
        ))
    }

    pub fn quote_potential_withdraw_from_other_asset(
        &self,
        source: TokenId,
        target: TokenId,
        shares: Decimal,
    ) -> Result<CrossWithdrawQuote> {
        Self::ensure_positive(shares)?;
        self.ensure_pair(source, target)?;
        let source_shares = self.convert_shares(target, source, shares)?;
        let target_ledger = self.ledger(target)?;
        let nominal = wmul(shares, target_ledger.liability_per_share()?)?;
        if nominal < self.config.dust_threshold {
            return Err(PoolError::Dust {
                amount: nominal,
                threshold: self.config.dust_threshold,
            });
        }
        let excess = target_ledger.cash() - target_ledger.liability();
        if excess <= Decimal::ZERO {
            return Err(PoolError::CoverageTooLow { token: target });
        }
        let fee = self.config.curve.withdrawal_fee(
            target_ledger.cash(),
            target_ledger.liability(),
            nominal,
        )?;
        let mut amount = nominal - fee;
        let equilibrium = self.equilibrium_coverage(target_ledger.group())?;
        if equilibrium < Decimal::ONE {
            amount = wmul(amount, equilibrium)?;
        }
        let amount = quantize_floor(amount, target_ledger.decimals());
        // The target reserve keeps full coverage after paying out.
        if amount > excess {
            return Err(PoolError::CoverageTooLow { token: target });
        }
        Ok(CrossWithdrawQuote {
            amount,
            fee,
            source_shares_burned: source_shares,
        })
    }

    /// Upper bound on `shares` for a cross-reserve withdrawal, expressed in
    /// source shares: the target's excess cash valued through both ledgers.
    pub fn quote_max_initial_asset_withdrawable(
        &self,
        source: TokenId,
        target: TokenId,
    ) -> Result<Decimal> {
        let target_ledger = self.ledger(target)?;
        self.ledger(source)?;
        let excess = target_ledger.cash() - target_ledger.liability();
        if excess <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let target_shares = wdiv(excess, target_ledger.liability_per_share()?)?;
        self.convert_shares(target, source, target_shares)
    }

    // ---- operations ----

    /// Deposit `amount` of `token` and mint shares to `receiver`.
    pub fn deposit(
        &mut self,
        sender: AccountId,
        token: TokenId,
        amount: Decimal,
        receiver: AccountId,
        deadline: Timestamp,
    ) -> Result<Decimal> {
        self.ensure_live()?;
        self.ensure_deadline(deadline)?;
        Self::ensure_positive(amount)?;

        let ledger = self.ledger(token)?;
        let amount = quantize_floor(amount, ledger.decimals());
        Self::ensure_positive(amount)?;
        let equilibrium = self.equilibrium_coverage(ledger.group())?;
        let fee = self
            .config
            .curve
            .deposit_fee(ledger.cash(), ledger.liability(), amount)?;
        let mut liability_to_mint = amount - fee;
        if equilibrium < Decimal::ONE {
            liability_to_mint = wdiv(liability_to_mint, equilibrium)?;
        }
        let shares = if ledger.total_shares().is_zero() || ledger.liability().is_zero() {
            liability_to_mint
        } else {
            wdiv(
                wmul(liability_to_mint, ledger.total_shares())?,
                ledger.liability(),
            )?
        };
        if shares <= Decimal::ZERO {
            return Err(PoolError::InsufficientLiquidityMinted);
        }
        if let Some(cap) = ledger.max_share_supply() {
            if ledger.total_shares() + shares > cap {
                return Err(PoolError::MaxSupplyReached {
                    requested: shares,
                    cap,
                });
            }
        }

        self.vault.transfer(token, sender, self.account, amount)?;
        let pool_id = self.id;
        let ledger = self.ledger_mut(token)?;
        ledger.add_cash(pool_id, amount)?;
        ledger.add_liability(pool_id, liability_to_mint)?;
        ledger.mint(pool_id, receiver, shares)?;

        self.events.record(PoolEvent::Deposit {
            sender,
            token,
            amount,
            shares,
            receiver,
        });
        info!(%sender, %token, %amount, %shares, "deposit");
        Ok(shares)
    }

    /// Burn `shares` of `token` and pay the priced amount to `receiver`.
    pub fn withdraw(
        &mut self,
        sender: AccountId,
        token: TokenId,
        shares: Decimal,
        min_amount: Decimal,
        receiver: AccountId,
        deadline: Timestamp,
    ) -> Result<Decimal> {
        self.ensure_live()?;
        self.ensure_deadline(deadline)?;
        Self::ensure_positive(shares)?;

        let ledger = self.ledger(token)?;
        let balance = ledger.balance_of(sender);
        if balance < shares {
            return Err(PoolError::InsufficientShares {
                account: sender,
                available: balance,
                required: shares,
            });
        }
        let equilibrium = self.equilibrium_coverage(ledger.group())?;
        let quote = self.withdraw_quote(ledger, shares, equilibrium)?;
        if quote.amount < min_amount {
            return Err(PoolError::AmountTooLow {
                amount: quote.amount,
                minimum: min_amount,
            });
        }

        if !quote.amount.is_zero() {
            self.vault
                .transfer(token, self.account, receiver, quote.amount)?;
        }
        let pool_id = self.id;
        let ledger = self.ledger_mut(token)?;
        ledger.burn(pool_id, sender, shares)?;
        ledger.remove_liability(pool_id, quote.liability_to_burn)?;
        if !quote.amount.is_zero() {
            ledger.remove_cash(pool_id, quote.amount)?;
        }

        self.events.record(PoolEvent::Withdraw {
            sender,
            token,
            amount: quote.amount,
            shares,
            receiver,
        });
        info!(%sender, %token, amount = %quote.amount, %shares, "withdraw");
        Ok(quote.amount)
    }

    /// Swap `amount_in` of `from` for `to`, paying output to `receiver`.
    pub fn swap(
        &mut self,
        sender: AccountId,
        from: TokenId,
        to: TokenId,
        amount_in: Decimal,
        min_amount_out: Decimal,
        receiver: AccountId,
        deadline: Timestamp,
    ) -> Result<Decimal> {
        self.ensure_live()?;
        self.ensure_deadline(deadline)?;
        Self::ensure_positive(amount_in)?;
        self.ensure_pair(from, to)?;

        let from_ledger = self.ledger(from)?;
        let to_ledger = self.ledger(to)?;
        let amount_in = quantize_floor(amount_in, from_ledger.decimals());
        Self::ensure_positive(amount_in)?;
        let quote = self.swap_quote(from_ledger, to_ledger, amount_in)?;
        if quote.amount_out < min_amount_out {
            return Err(PoolError::AmountTooLow {
                amount: quote.amount_out,
                minimum: min_amount_out,
            });
        }
        let retained = wmul(quote.haircut, self.config.retention_ratio)?;
        let dividend = quantize_floor(quote.haircut - retained, to_ledger.decimals());
        let cash_out = quote.amount_out + dividend;
        if cash_out > to_ledger.cash() {
            return Err(PoolError::InsufficientCash {
                token: to,
                available: to_ledger.cash(),
                required: cash_out,
            });
        }

        self.vault.transfer(from, sender, self.account, amount_in)?;
        self.vault
            .transfer(to, self.account, receiver, quote.amount_out)?;
        if !dividend.is_zero() {
            self.vault
                .transfer(to, self.account, self.fee_recipient, dividend)?;
        }
        let pool_id = self.id;
        self.ledger_mut(from)?.add_cash(pool_id, amount_in)?;
        self.ledger_mut(to)?.remove_cash(pool_id, cash_out)?;

        self.events.record(PoolEvent::Swap {
            sender,
            from_token: from,
            to_token: to,
            amount_in,
            amount_out: quote.amount_out,
            receiver,
        });
        info!(%sender, %from, %to, %amount_in, amount_out = %quote.amount_out, "swap");
        Ok(quote.amount_out)
    }

    /// Burn shares of `source` to withdraw `target` tokens, without touching
    /// the target's liability. Only the target's excess cash is reachable
    /// this way, so its coverage never drops below one.
    pub fn withdraw_from_other_asset(
        &mut self,
        sender: AccountId,
        source: TokenId,
        target: TokenId,
        shares: Decimal,
        min_amount: Decimal,
        receiver: AccountId,
        deadline: Timestamp,
    ) -> Result<Decimal> {
        self.ensure_live()?;
        self.ensure_deadline(deadline)?;

        let quote = self.quote_potential_withdraw_from_other_asset(source, target, shares)?;
        let source_ledger = self.ledger(source)?;
        let balance = source_ledger.balance_of(sender);
        if balance < quote.source_shares_burned {
            return Err(PoolError::InsufficientShares {
                account: sender,
                available: balance,
                required: quote.source_shares_burned,
            });
        }
        let source_liability_cut = wmul(
            quote.source_shares_burned,
            source_ledger.liability_per_share()?,
        )?
        .min(source_ledger.liability());
        if quote.amount < min_amount {
            return Err(PoolError::AmountTooLow {
                amount: quote.amount,
                minimum: min_amount,
            });
        }

        self.vault
            .transfer(target, self.account, receiver, quote.amount)?;
        let pool_id = self.id;
        let source_ledger = self.ledger_mut(source)?;
        source_ledger.burn(pool_id, sender, quote.source_shares_burned)?;
        source_ledger.remove_liability(pool_id, source_liability_cut)?;
        self.ledger_mut(target)?.remove_cash(pool_id, quote.amount)?;

        self.events.record(PoolEvent::Withdraw {
            sender,
            token: target,
            amount: quote.amount,
            shares: quote.source_shares_burned,
            receiver,
        });
        info!(
            %sender, %source, %target, amount = %quote.amount,
            shares = %quote.source_shares_burned, "cross-reserve withdraw"
        );
        Ok(quote.amount)
    }
}
