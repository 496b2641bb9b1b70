//! Identifier newtypes shared across the pool.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// A fungible token known to the vault.
    TokenId,
    "token-"
);
id_type!(
    /// An account that can hold tokens and pool shares.
    AccountId,
    "account-"
);
id_type!(
    /// A pool engine instance. Reserve ledgers only accept mutations from
    /// their owning pool.
    PoolId,
    "pool-"
);
id_type!(
    /// An aggregate of reserves that share solvency accounting.
    GroupId,
    "group-"
);
