//! Per-reserve bookkeeping.
//!
//! A [`ReserveLedger`] tracks one token's reserve: `cash` (tokens actually
//! held), `liability` (what depositors are collectively owed) and the share
//! supply that divides that liability among depositors. Cash and liability
//! move independently, which is exactly what lets coverage drift away from
//! one and the cost curve price the drift.
//!
//! All bookkeeping mutations are gated on the owning pool's id. Share
//! transfers between accounts are free.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::{PoolError, Result};
use crate::events::{EventLog, LedgerEvent};
use crate::types::{AccountId, GroupId, PoolId, TokenId};

pub const MAX_TOKEN_DECIMALS: u32 = 18;

#[derive(Debug, Clone)]
pub struct ReserveLedger {
    token: TokenId,
    decimals: u32,
    group: GroupId,
    owning_pool: PoolId,
    admin: AccountId,
    cash: Decimal,
    liability: Decimal,
    total_shares: Decimal,
    max_share_supply: Option<Decimal>,
    balances: HashMap<AccountId, Decimal>,
    events: EventLog<LedgerEvent>,
}

impl ReserveLedger {
    pub fn new(
        token: TokenId,
        decimals: u32,
        group: GroupId,
        owning_pool: PoolId,
        admin: AccountId,
    ) -> Result<Self> {
        if decimals > MAX_TOKEN_DECIMALS {
            return Err(PoolError::InvalidParameter {
                name: "decimals",
                value: Decimal::from(decimals),
            });
        }
        Ok(Self {
            token,
            decimals,
            group,
            owning_pool,
            admin,
            cash: Decimal::ZERO,
            liability: Decimal::ZERO,
            total_shares: Decimal::ZERO,
            max_share_supply: None,
            balances: HashMap::new(),
            events: EventLog::new(),
        })
    }

    pub fn token(&self) -> TokenId {
        self.token
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn owning_pool(&self) -> PoolId {
        self.owning_pool
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn liability(&self) -> Decimal {
        self.liability
    }

    pub fn total_shares(&self) -> Decimal {
        self.total_shares
    }

    pub fn max_share_supply(&self) -> Option<Decimal> {
        self.max_share_supply
    }

    pub fn balance_of(&self, account: AccountId) -> Decimal {
        self.balances.get(&account).copied().unwrap_or(Decimal::ZERO)
    }

    /// Coverage ratio `cash / liability`, or `None` while the reserve has no
    /// liability.
    pub fn coverage(&self) -> Option<Decimal> {
        if self.liability.is_zero() {
            return None;
        }
        tidepool_math::wdiv(self.cash, self.liability).ok()
    }

    /// Liability owed per outstanding share.
    pub fn liability_per_share(&self) -> Result<Decimal> {
        Ok(tidepool_math::wdiv(self.liability, self.total_shares)?)
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain()
    }

    fn ensure_pool(&self, caller: PoolId) -> Result<()> {
        if caller != self.owning_pool {
            return Err(PoolError::NotOwningPool {
                caller,
                owner: self.owning_pool,
            });
        }
        Ok(())
    }

    fn ensure_admin(&self, caller: AccountId) -> Result<()> {
        if caller != self.admin {
            return Err(PoolError::Forbidden { caller });
        }
        Ok(())
    }

    fn ensure_positive(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(PoolError::ZeroAmount);
        }
        Ok(())
    }

    pub fn add_cash(&mut self, caller: PoolId, amount: Decimal) -> Result<()> {
        self.ensure_pool(caller)?;
        Self::ensure_positive(amount)?;
        self.events.record(LedgerEvent::CashAdded {
            previous: self.cash,
            amount,
        });
        self.cash += amount;
        Ok(())
    }

    pub fn remove_cash(&mut self, caller: PoolId, amount: Decimal) -> Result<()> {
        self.ensure_pool(caller)?;
        Self::ensure_positive(amount)?;
        if self.cash < amount {
            return Err(PoolError::InsufficientCash {
                token: self.token,
                available: self.cash,
                required: amount,
            });
        }
        self.events.record(LedgerEvent::CashRemoved {
            previous: self.cash,
            amount,
        });
        self.cash -= amount;
        Ok(())
    }

    pub fn add_liability(&mut self, caller: PoolId, amount: Decimal) -> Result<()> {
        self.ensure_pool(caller)?;
        Self::ensure_positive(amount)?;
        self.events.record(LedgerEvent::LiabilityAdded {
            previous: self.liability,
            amount,
        });
        self.liability += amount;
        Ok(())
    }

    pub fn remove_liability(&mut self, caller: PoolId, amount: Decimal) -> Result<()> {
        self.ensure_pool(caller)?;
        Self::ensure_positive(amount)?;
        if self.liability < amount {
            return Err(PoolError::InsufficientLiability {
                token: self.token,
                available: self.liability,
                required: amount,
            });
        }
        self.events.record(LedgerEvent::LiabilityRemoved {
            previous: self.liability,
            amount,
        });
        self.liability -= amount;
        Ok(())
    }

    pub fn mint(&mut self, caller: PoolId, to: AccountId, amount: Decimal) -> Result<()> {
        self.ensure_pool(caller)?;
        Self::ensure_positive(amount)?;
        if let Some(cap) = self.max_share_supply {
            if self.total_shares + amount > cap {
                return Err(PoolError::MaxSupplyReached {
                    requested: amount,
                    cap,
                });
            }
        }
        self.total_shares += amount;
        *self.balances.entry(to).or_insert(Decimal::ZERO) += amount;
        self.events.record(LedgerEvent::SharesMinted { to, amount });
        Ok(())
    }

    pub fn burn(&mut self, caller: PoolId, from: AccountId, amount: Decimal) -> Result<()> {
        self.ensure_pool(caller)?;
        Self::ensure_positive(amount)?;
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(PoolError::InsufficientShares {
                account: from,
                available: balance,
                required: amount,
            });
        }
        self.total_shares -= amount;
        self.balances.insert(from, balance - amount);
        self.events.record(LedgerEvent::SharesBurned { from, amount });
        Ok(())
    }

    pub fn transfer_shares(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<()> {
        Self::ensure_positive(amount)?;
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(PoolError::InsufficientShares {
                account: from,
                available: balance,
                required: amount,
            });
        }
        self.balances.insert(from, balance - amount);
        *self.balances.entry(to).or_insert(Decimal::ZERO) += amount;
        self.events
            .record(LedgerEvent::SharesTransferred { from, to, amount });
        Ok(())
    }

    pub fn set_owning_pool(&mut self, caller: AccountId, new: PoolId) -> Result<()> {
        self.ensure_admin(caller)?;
        self.events.record(LedgerEvent::OwningPoolUpdated {
            old: self.owning_pool,
            new,
        });
        self.owning_pool = new;
        Ok(())
    }

    pub fn set_group(&mut self, caller: AccountId, new: GroupId) -> Result<()> {
        self.ensure_admin(caller)?;
        self.events.record(LedgerEvent::GroupUpdated {
            old: self.group,
            new,
        });
        self.group = new;
        Ok(())
    }

    pub fn set_max_share_supply(&mut self, caller: AccountId, cap: Option<Decimal>) -> Result<()> {
        self.ensure_admin(caller)?;
        if let Some(cap) = cap {
            if cap < self.total_shares {
                return Err(PoolError::InvalidParameter {
                    name: "max_share_supply",
                    value: cap,
                });
            }
        }
        self.events.record(LedgerEvent::MaxSupplyUpdated {
            old: self.max_share_supply,
            new: cap,
        });
        self.max_share_supply = cap;
        Ok(())
    }
}
