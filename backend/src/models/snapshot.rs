//! Reward snapshot model
//!
//! The fully materialized input of one calculation run, as delivered by the
//! reward-data collaborator. No partial or streaming input is accepted.

use serde::{Deserialize, Serialize};

/// One delegator's balances for the cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorBalance {
    pub address: String,

    /// Balance counted for rewards (i64 base units)
    pub staking_balance: i64,

    /// Spendable balance at payment time (i64 base units)
    pub current_balance: i64,
}

impl DelegatorBalance {
    pub fn new(address: &str, staking_balance: i64, current_balance: i64) -> Self {
        Self {
            address: address.to_string(),
            staking_balance,
            current_balance,
        }
    }
}

/// Raw reward data for one cycle
///
/// # Example
/// ```
/// use reward_distribution_core_rs::{DelegatorBalance, RewardSnapshot};
///
/// let snapshot = RewardSnapshot::new(
///     42,
///     10_000,
///     1_000,
///     vec![DelegatorBalance::new("tz1alice", 4_000, 100)],
/// );
/// assert_eq!(snapshot.delegators.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSnapshot {
    /// Reward cycle
    pub cycle: u32,

    /// Delegate's total staking balance (own stake + delegations)
    pub total_staking_balance: i64,

    /// Reward pool to distribute (i64 base units)
    pub total_reward_pool: i64,

    pub delegators: Vec<DelegatorBalance>,
}

impl RewardSnapshot {
    pub fn new(
        cycle: u32,
        total_staking_balance: i64,
        total_reward_pool: i64,
        delegators: Vec<DelegatorBalance>,
    ) -> Self {
        Self {
            cycle,
            total_staking_balance,
            total_reward_pool,
            delegators,
        }
    }

    /// Parse a snapshot from JSON
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sum of all delegators' staking balances, `None` on overflow
    pub fn delegated_balance(&self) -> Option<i64> {
        self.delegators
            .iter()
            .try_fold(0i64, |sum, d| sum.checked_add(d.staking_balance))
    }
}
