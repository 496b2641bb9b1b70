//! Token custody seam.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::VaultError;
use crate::types::{AccountId, TokenId};

/// Moves underlying tokens between accounts. The pool never holds token
/// balances itself; it instructs the vault and mirrors the result in its
/// ledgers.
pub trait TokenVault: Send + Sync {
    fn balance_of(&self, token: TokenId, account: AccountId) -> Decimal;

    fn transfer(
        &self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<(), VaultError>;
}

/// Simple in-memory vault for tests and local simulation.
#[derive(Debug, Default)]
pub struct InMemoryVault {
    balances: RwLock<HashMap<(TokenId, AccountId), Decimal>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account out of thin air. Test setup only.
    pub fn fund(&self, token: TokenId, account: AccountId, amount: Decimal) {
        *self
            .balances
            .write()
            .entry((token, account))
            .or_insert(Decimal::ZERO) += amount;
    }
}

impl TokenVault for InMemoryVault {
    fn balance_of(&self, token: TokenId, account: AccountId) -> Decimal {
        self.balances
            .read()
            .get(&(token, account))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn transfer(
        &self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<(), VaultError> {
        let mut balances = self.balances.write();
        let from_balance = balances.get(&(token, from)).copied().unwrap_or(Decimal::ZERO);
        if from_balance < amount {
            return Err(VaultError::InsufficientBalance {
                account: from,
                token,
                available: from_balance,
                required: amount,
            });
        }
        balances.insert((token, from), from_balance - amount);
        *balances.entry((token, to)).or_insert(Decimal::ZERO) += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn transfer_moves_balances() {
        let vault = InMemoryVault::new();
        vault.fund(TokenId(1), AccountId(1), dec!(100));
        vault
            .transfer(TokenId(1), AccountId(1), AccountId(2), dec!(40))
            .unwrap();
        assert_eq!(vault.balance_of(TokenId(1), AccountId(1)), dec!(60));
        assert_eq!(vault.balance_of(TokenId(1), AccountId(2)), dec!(40));
    }

    #[test]
    fn transfer_checks_balance() {
        let vault = InMemoryVault::new();
        vault.fund(TokenId(1), AccountId(1), dec!(10));
        let err = vault
            .transfer(TokenId(1), AccountId(1), AccountId(2), dec!(11))
            .unwrap_err();
        assert!(matches!(err, VaultError::InsufficientBalance { .. }));
    }
}
