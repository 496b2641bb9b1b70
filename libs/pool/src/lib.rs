//! Coverage-ratio liquidity pool.
//!
//! Single-sided liquidity: each token has its own reserve ledger tracking
//! cash, liability and shares, and every operation is priced off a convex
//! rebalancing cost curve of the reserve's coverage ratio. Swaps are only
//! allowed between tokens of the same aggregate group, and group-wide
//! solvency feeds back into deposit and withdrawal pricing.
//!
//! The engine talks to the outside world through three seams: a
//! [`vault::TokenVault`] for custody, a [`feed::PriceFeed`] for reference
//! prices and a [`clock::Clock`] for deadlines.

pub mod clock;
pub mod config;
pub mod curve;
pub mod engine;
pub mod error;
pub mod events;
pub mod feed;
pub mod group;
pub mod ledger;
pub mod types;
pub mod vault;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PoolConfig;
pub use curve::CurveParams;
pub use engine::{CrossWithdrawQuote, PoolEngine, SwapQuote, WithdrawQuote};
pub use error::{FeedError, PoolError, Result, VaultError};
pub use events::{EventLog, LedgerEvent, PoolEvent};
pub use feed::{PriceFeed, StaticPriceFeed};
pub use group::{AggregateGroup, GroupRegistry};
pub use ledger::ReserveLedger;
pub use types::{AccountId, GroupId, PoolId, Timestamp, TokenId};
pub use vault::{InMemoryVault, TokenVault};

// Re-export the numeric types callers need to drive the API.
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
