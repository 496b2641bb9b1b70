//! Multi-hop swap router.
//!
//! Chains swaps across registered pool engines along a token path. A call is
//! all-or-nothing: the whole path is first executed against cloned engines,
//! and only when every hop succeeds and the final output clears the caller's
//! minimum is the same sequence replayed against the live pools.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tidepool_pool::{
    AccountId, InMemoryVault, PoolEngine, PoolError, PoolId, Timestamp, TokenId,
};
use tracing::info;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouterError {
    #[error("swap path is invalid: {reason}")]
    InvalidPath { reason: &'static str },

    #[error("pool {pool} is not registered with the router")]
    PoolNotFound { pool: PoolId },

    #[error("pool {pool} is already registered with the router")]
    PoolAlreadyRegistered { pool: PoolId },

    #[error("output {amount} is below the caller minimum {minimum}")]
    AmountTooLow { amount: Decimal, minimum: Decimal },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub type Result<T> = std::result::Result<T, RouterError>;

/// Routes swaps through the pool engines it owns.
#[derive(Debug, Default)]
pub struct Router {
    pools: HashMap<PoolId, PoolEngine>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pool(&mut self, pool: PoolEngine) -> Result<()> {
        let id = pool.id();
        if self.pools.contains_key(&id) {
            return Err(RouterError::PoolAlreadyRegistered { pool: id });
        }
        self.pools.insert(id, pool);
        Ok(())
    }

    pub fn pool(&self, id: PoolId) -> Result<&PoolEngine> {
        self.pools
            .get(&id)
            .ok_or(RouterError::PoolNotFound { pool: id })
    }

    pub fn pool_mut(&mut self, id: PoolId) -> Result<&mut PoolEngine> {
        self.pools
            .get_mut(&id)
            .ok_or(RouterError::PoolNotFound { pool: id })
    }

    fn validate_path(&self, token_path: &[TokenId], pool_path: &[PoolId]) -> Result<()> {
        if token_path.len() < 2 {
            return Err(RouterError::InvalidPath {
                reason: "token path needs at least two tokens",
            });
        }
        if pool_path.len() != token_path.len() - 1 {
            return Err(RouterError::InvalidPath {
                reason: "pool path must have one pool per hop",
            });
        }
        for (hop, pool_id) in pool_path.iter().enumerate() {
            let pool = self.pool(*pool_id)?;
            if !pool.has_asset(token_path[hop]) || !pool.has_asset(token_path[hop + 1]) {
                return Err(RouterError::InvalidPath {
                    reason: "hop pool does not carry both hop tokens",
                });
            }
        }
        Ok(())
    }

    /// Run the whole path against the given engines. Intermediate outputs are
    /// paid to the sender and consumed by the next hop; the final hop pays
    /// `receiver`.
    fn run_path(
        pools: &mut HashMap<PoolId, PoolEngine>,
        token_path: &[TokenId],
        pool_path: &[PoolId],
        amount_in: Decimal,
        sender: AccountId,
        receiver: AccountId,
        deadline: Timestamp,
    ) -> Result<Decimal> {
        let mut amount = amount_in;
        let last_hop = pool_path.len() - 1;
        for (hop, pool_id) in pool_path.iter().enumerate() {
            let pool = pools
                .get_mut(pool_id)
                .ok_or(RouterError::PoolNotFound { pool: *pool_id })?;
            let hop_receiver = if hop == last_hop { receiver } else { sender };
            amount = pool.swap(
                sender,
                token_path[hop],
                token_path[hop + 1],
                amount,
                Decimal::ZERO,
                hop_receiver,
                deadline,
            )?;
        }
        Ok(amount)
    }

    /// Engines for the path, rebound to a scratch vault seeded so that
    /// custody mirrors each reserve's cash. Dry runs against these behave
    /// exactly like the live pools but cannot move real balances.
    fn shadow_pools(
        &self,
        token_path: &[TokenId],
        pool_path: &[PoolId],
        amount_in: Decimal,
        sender: AccountId,
    ) -> Result<HashMap<PoolId, PoolEngine>> {
        let scratch = Arc::new(InMemoryVault::new());
        scratch.fund(token_path[0], sender, amount_in);
        let mut seeded: HashSet<(PoolId, TokenId)> = HashSet::new();
        for (hop, pool_id) in pool_path.iter().enumerate() {
            let pool = self.pool(*pool_id)?;
            for token in [token_path[hop], token_path[hop + 1]] {
                if seeded.insert((*pool_id, token)) {
                    scratch.fund(token, pool.account(), pool.ledger(token)?.cash());
                }
            }
        }
        Ok(pool_path
            .iter()
            .map(|id| (*id, self.pools[id].with_vault(scratch.clone())))
            .collect())
    }

    /// Quote the output of swapping `amount_in` along the path, without
    /// touching live state.
    pub fn quote_potential_swaps(
        &self,
        token_path: &[TokenId],
        pool_path: &[PoolId],
        amount_in: Decimal,
        sender: AccountId,
        deadline: Timestamp,
    ) -> Result<Decimal> {
        self.validate_path(token_path, pool_path)?;
        let mut shadow = self.shadow_pools(token_path, pool_path, amount_in, sender)?;
        Self::run_path(
            &mut shadow,
            token_path,
            pool_path,
            amount_in,
            sender,
            sender,
            deadline,
        )
    }

    /// Swap along the path, failing atomically if any hop fails or the final
    /// output is below `min_amount_out`.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_tokens_for_tokens(
        &mut self,
        token_path: &[TokenId],
        pool_path: &[PoolId],
        amount_in: Decimal,
        min_amount_out: Decimal,
        sender: AccountId,
        receiver: AccountId,
        deadline: Timestamp,
    ) -> Result<Decimal> {
        self.validate_path(token_path, pool_path)?;

        // Dry run against scratch custody; live pools stay untouched on any
        // failure.
        let mut shadow = self.shadow_pools(token_path, pool_path, amount_in, sender)?;
        let quoted = Self::run_path(
            &mut shadow,
            token_path,
            pool_path,
            amount_in,
            sender,
            receiver,
            deadline,
        )?;
        if quoted < min_amount_out {
            return Err(RouterError::AmountTooLow {
                amount: quoted,
                minimum: min_amount_out,
            });
        }

        let executed = Self::run_path(
            &mut self.pools,
            token_path,
            pool_path,
            amount_in,
            sender,
            receiver,
            deadline,
        )?;
        debug_assert_eq!(executed, quoted);
        info!(
            hops = pool_path.len(),
            %amount_in,
            amount_out = %executed,
            "routed swap"
        );
        Ok(executed)
    }
}
