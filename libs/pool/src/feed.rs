//! Price feed seam.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::FeedError;
use crate::types::TokenId;

/// Source of reference prices used for the cross-token deviation guard and
/// for weighting reserves inside an aggregate group.
pub trait PriceFeed: Send + Sync {
    /// Current reference price for `token`, in a unit shared by every token
    /// the feed serves. Must be positive.
    fn price(&self, token: TokenId) -> Result<Decimal, FeedError>;
}

/// Fixed prices set by hand. Used in tests and for groups whose members all
/// track the same peg.
#[derive(Debug, Default)]
pub struct StaticPriceFeed {
    prices: RwLock<HashMap<TokenId, Decimal>>,
}

impl StaticPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(prices: impl IntoIterator<Item = (TokenId, Decimal)>) -> Self {
        Self {
            prices: RwLock::new(prices.into_iter().collect()),
        }
    }

    pub fn set_price(&self, token: TokenId, price: Decimal) {
        self.prices.write().insert(token, price);
    }
}

impl PriceFeed for StaticPriceFeed {
    fn price(&self, token: TokenId) -> Result<Decimal, FeedError> {
        let price = self
            .prices
            .read()
            .get(&token)
            .copied()
            .ok_or(FeedError::SourceMissing { token })?;
        if price <= Decimal::ZERO {
            return Err(FeedError::InvalidPrice { token, price });
        }
        Ok(price)
    }
}
