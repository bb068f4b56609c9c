//! Initial ratio phase (phase 0)
//!
//! Turns the raw snapshot into records: one delegator record per snapshot entry
//! with `ratio0 = staking / delegate staking`, followed by the owners
//! placeholder holding the complement so that all ratios sum to 1.0.

use crate::models::record::{PhaseId, RecordKind, RewardRecord, OWNERS_PARENT_ADDRESS};
use crate::models::snapshot::RewardSnapshot;
use crate::phases::{Phase, PhaseError, PhaseOutput};
use std::collections::HashSet;
use tracing::debug;

pub struct InitialRatioPhase {
    snapshot: RewardSnapshot,
}

impl InitialRatioPhase {
    pub fn new(snapshot: RewardSnapshot) -> Self {
        Self { snapshot }
    }

    /// Validate the snapshot and return the delegated balance
    fn validate(&self) -> Result<i64, PhaseError> {
        let snapshot = &self.snapshot;

        if snapshot.total_staking_balance <= 0 {
            return Err(PhaseError::InvalidSnapshot(format!(
                "total staking balance must be positive, got {}",
                snapshot.total_staking_balance
            )));
        }
        if snapshot.total_reward_pool < 0 {
            return Err(PhaseError::InvalidSnapshot(format!(
                "total reward pool must be non-negative, got {}",
                snapshot.total_reward_pool
            )));
        }

        let mut seen = HashSet::new();
        for delegator in &snapshot.delegators {
            if delegator.address.is_empty() {
                return Err(PhaseError::InvalidSnapshot(
                    "delegator with empty address".to_string(),
                ));
            }
            if !seen.insert(delegator.address.as_str()) {
                return Err(PhaseError::InvalidSnapshot(format!(
                    "duplicate delegator {}",
                    delegator.address
                )));
            }
            if delegator.staking_balance < 0 || delegator.current_balance < 0 {
                return Err(PhaseError::InvalidSnapshot(format!(
                    "negative balance for delegator {}",
                    delegator.address
                )));
            }
        }

        let delegated = snapshot.delegated_balance().ok_or_else(|| {
            PhaseError::InvalidSnapshot("delegated balance overflows i64".to_string())
        })?;
        if delegated > snapshot.total_staking_balance {
            return Err(PhaseError::InvalidSnapshot(format!(
                "delegated balance {} exceeds total staking balance {}",
                delegated, snapshot.total_staking_balance
            )));
        }

        Ok(delegated)
    }
}

impl Phase for InitialRatioPhase {
    fn id(&self) -> PhaseId {
        PhaseId::InitialRatio
    }

    /// Build the initial records
    ///
    /// `records` is ignored: the records come from the snapshot. The returned
    /// total is `total_amount` unchanged.
    fn calculate(&self, _records: &[RewardRecord], total_amount: i64) -> Result<PhaseOutput, PhaseError> {
        let delegated = self.validate()?;

        let snapshot = &self.snapshot;
        let delegate_staking = snapshot.total_staking_balance as f64;

        let mut records = Vec::with_capacity(snapshot.delegators.len() + 1);
        let mut ratio_sum = 0.0;

        for delegator in &snapshot.delegators {
            let ratio = delegator.staking_balance as f64 / delegate_staking;
            ratio_sum += ratio;

            records.push(
                RewardRecord::new(
                    delegator.address.clone(),
                    RecordKind::Delegator,
                    delegator.staking_balance,
                    delegator.current_balance,
                )
                .with_cycle(snapshot.cycle)
                .with_ratio(PhaseId::InitialRatio, ratio),
            );
        }

        // Owners keep whatever the delegators do not earn
        let owners_staking = snapshot.total_staking_balance - delegated;
        let owners_ratio = (1.0 - ratio_sum).max(0.0);
        records.push(
            RewardRecord::new(
                OWNERS_PARENT_ADDRESS.to_string(),
                RecordKind::OwnersParent,
                owners_staking,
                0,
            )
            .with_cycle(snapshot.cycle)
            .with_ratio(PhaseId::InitialRatio, owners_ratio),
        );

        debug!(
            cycle = snapshot.cycle,
            delegators = snapshot.delegators.len(),
            owners_ratio,
            "initial ratios computed"
        );

        Ok((records, total_amount))
    }
}
