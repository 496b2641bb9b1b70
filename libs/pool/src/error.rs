//! Error types for pool operations.

use rust_decimal::Decimal;
use thiserror::Error;
use tidepool_math::MathError;

use crate::types::{AccountId, GroupId, PoolId, TokenId};

/// Errors returned by pool, ledger and group operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    #[error("deadline {deadline} has passed (now {now})")]
    Expired { deadline: i64, now: i64 },

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("pool is paused")]
    Paused,

    #[error("caller {caller} is not authorized")]
    Forbidden { caller: AccountId },

    #[error("pool {caller} does not own this reserve (owner {owner})")]
    NotOwningPool { caller: PoolId, owner: PoolId },

    #[error("token {token} is not registered with this pool")]
    AssetNotFound { token: TokenId },

    #[error("token {token} is already registered with this pool")]
    AssetAlreadyRegistered { token: TokenId },

    #[error("aggregate group {group} is not registered")]
    GroupNotFound { group: GroupId },

    #[error("aggregate group {group} is already registered")]
    GroupAlreadyRegistered { group: GroupId },

    #[error("cannot trade a token against itself")]
    SameAsset { token: TokenId },

    #[error("tokens {from} and {to} belong to different aggregate groups")]
    DifferentGroup {
        from: TokenId,
        to: TokenId,
        from_group: GroupId,
        to_group: GroupId,
    },

    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: Decimal },

    #[error("reserve cash {available} is below required {required}")]
    InsufficientCash {
        token: TokenId,
        available: Decimal,
        required: Decimal,
    },

    #[error("reserve liability {available} is below required {required}")]
    InsufficientLiability {
        token: TokenId,
        available: Decimal,
        required: Decimal,
    },

    #[error("account {account} holds {available} shares, needs {required}")]
    InsufficientShares {
        account: AccountId,
        available: Decimal,
        required: Decimal,
    },

    #[error("minting {requested} shares would exceed the supply cap {cap}")]
    MaxSupplyReached { requested: Decimal, cap: Decimal },

    #[error("deposit too small to mint any shares")]
    InsufficientLiquidityMinted,

    #[error("withdrawal would burn more liability than the reserve carries")]
    InsufficientLiquidityBurned,

    #[error("output {amount} is below the caller minimum {minimum}")]
    AmountTooLow { amount: Decimal, minimum: Decimal },

    #[error("converted amount {amount} is below the dust threshold {threshold}")]
    Dust { amount: Decimal, threshold: Decimal },

    #[error("price deviation {deviation} exceeds the configured maximum {maximum}")]
    PriceDeviationTooHigh { deviation: Decimal, maximum: Decimal },

    #[error("coverage of {token} would drop below one")]
    CoverageTooLow { token: TokenId },

    #[error("reserve for {token} still carries cash or liability")]
    AssetNotEmpty { token: TokenId },

    #[error("swap path is invalid: {reason}")]
    InvalidPath { reason: &'static str },

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Errors surfaced by a price feed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeedError {
    #[error("no price source for token {token}")]
    SourceMissing { token: TokenId },

    #[error("price {price} for token {token} is not positive")]
    InvalidPrice { token: TokenId, price: Decimal },
}

/// Errors surfaced by a token vault.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VaultError {
    #[error("account {account} holds {available} of token {token}, needs {required}")]
    InsufficientBalance {
        account: AccountId,
        token: TokenId,
        available: Decimal,
        required: Decimal,
    },
}

pub type Result<T> = std::result::Result<T, PoolError>;
