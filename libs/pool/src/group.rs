//! Aggregate groups.
//!
//! Reserves that are meant to trade against each other (stablecoins, liquid
//! staking variants of one asset) share an aggregate group. Swaps are only
//! allowed within a group, and group-wide solvency is what drives the
//! impairment adjustment on deposits and withdrawals.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PoolError, Result};
use crate::types::GroupId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateGroup {
    pub id: GroupId,
    pub name: String,
    /// Whether members are expected to track a common peg.
    pub stable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: HashMap<GroupId, AggregateGroup>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, group: AggregateGroup) -> Result<()> {
        if self.groups.contains_key(&group.id) {
            return Err(PoolError::GroupAlreadyRegistered { group: group.id });
        }
        self.groups.insert(group.id, group);
        Ok(())
    }

    pub fn get(&self, id: GroupId) -> Result<&AggregateGroup> {
        self.groups
            .get(&id)
            .ok_or(PoolError::GroupNotFound { group: id })
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut registry = GroupRegistry::new();
        registry
            .register(AggregateGroup {
                id: GroupId(1),
                name: "USD stablecoins".to_string(),
                stable: true,
            })
            .unwrap();
        assert!(registry.contains(GroupId(1)));
        assert_eq!(registry.get(GroupId(1)).unwrap().name, "USD stablecoins");
        assert!(matches!(
            registry.get(GroupId(2)),
            Err(PoolError::GroupNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = GroupRegistry::new();
        let group = AggregateGroup {
            id: GroupId(1),
            name: "g".to_string(),
            stable: false,
        };
        registry.register(group.clone()).unwrap();
        assert!(matches!(
            registry.register(group),
            Err(PoolError::GroupAlreadyRegistered { .. })
        ));
    }
}
