//! Structured events recorded by the pool and its reserve ledgers.
//!
//! Every state mutation appends an event to an in-memory log and mirrors it
//! to `tracing` at debug level. Callers drain the log to observe what a
//! transaction did.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::curve::CurveParams;
use crate::types::{AccountId, GroupId, PoolId, TokenId};

/// Pool-level events, one per externally visible state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PoolEvent {
    Deposit {
        sender: AccountId,
        token: TokenId,
        amount: Decimal,
        shares: Decimal,
        receiver: AccountId,
    },
    Withdraw {
        sender: AccountId,
        token: TokenId,
        amount: Decimal,
        shares: Decimal,
        receiver: AccountId,
    },
    Swap {
        sender: AccountId,
        from_token: TokenId,
        to_token: TokenId,
        amount_in: Decimal,
        amount_out: Decimal,
        receiver: AccountId,
    },
    AssetAdded {
        token: TokenId,
        group: GroupId,
    },
    AssetRemoved {
        token: TokenId,
    },
    CurveUpdated {
        old: CurveParams,
        new: CurveParams,
    },
    HaircutRateUpdated {
        old: Decimal,
        new: Decimal,
    },
    RetentionRatioUpdated {
        old: Decimal,
        new: Decimal,
    },
    MaxPriceDeviationUpdated {
        old: Decimal,
        new: Decimal,
    },
    DustThresholdUpdated {
        old: Decimal,
        new: Decimal,
    },
    AdminTransferred {
        old: AccountId,
        new: AccountId,
    },
    FeeRecipientUpdated {
        old: AccountId,
        new: AccountId,
    },
    Paused,
    Unpaused,
}

/// Ledger-level events, one per bookkeeping mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    CashAdded {
        previous: Decimal,
        amount: Decimal,
    },
    CashRemoved {
        previous: Decimal,
        amount: Decimal,
    },
    LiabilityAdded {
        previous: Decimal,
        amount: Decimal,
    },
    LiabilityRemoved {
        previous: Decimal,
        amount: Decimal,
    },
    SharesMinted {
        to: AccountId,
        amount: Decimal,
    },
    SharesBurned {
        from: AccountId,
        amount: Decimal,
    },
    SharesTransferred {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
    OwningPoolUpdated {
        old: PoolId,
        new: PoolId,
    },
    GroupUpdated {
        old: GroupId,
        new: GroupId,
    },
    MaxSupplyUpdated {
        old: Option<Decimal>,
        new: Option<Decimal>,
    },
}

/// Append-only event log with a drain API.
#[derive(Debug, Clone, Default)]
pub struct EventLog<T> {
    entries: Vec<T>,
}

impl<T: std::fmt::Debug> EventLog<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, event: T) {
        tracing::debug!(?event, "recorded");
        self.entries.push(event);
    }

    /// Returns all events recorded since the last drain.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries)
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }
}
