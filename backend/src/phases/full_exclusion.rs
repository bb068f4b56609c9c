//! Full exclusion phase (phase 1)
//!
//! Records excluded under the `ToBaker` policy leave the distribution: their
//! share stays with the baker, so the running total shrinks by the excluded
//! mass and the survivors are renormalized.
//!
//! ```text
//! excluded  = sum(ratio0 of newly excluded)
//! newTotal  = floor(oldTotal * remainingStake / stake)
//! ratio1    = ratio0 / (1 - excluded)
//! ```
//!
//! The new total is computed from integer staking balances (`ratio0` is
//! `staking / stake` by construction), so an exact result is never shaved by
//! float noise. Records carrying no stake at all fall back to
//! `floor(oldTotal * (1 - excluded))`.

use crate::core::ALMOST_ZERO;
use crate::models::record::{PhaseId, RewardRecord};
use crate::orchestrator::config::{ExclusionPolicy, ExclusionRules};
use crate::phases::{Phase, PhaseError, PhaseOutput};
use tracing::debug;

pub struct FullExclusionPhase {
    rules: ExclusionRules,
}

impl FullExclusionPhase {
    pub fn new(rules: ExclusionRules) -> Self {
        Self { rules }
    }
}

impl Phase for FullExclusionPhase {
    fn id(&self) -> PhaseId {
        PhaseId::FullExclusion
    }

    fn calculate(&self, records: &[RewardRecord], total_amount: i64) -> Result<PhaseOutput, PhaseError> {
        let mut output = records.to_vec();
        let mut excluded_ratio = 0.0;
        let mut excluded_count = 0usize;
        let mut stake: i128 = 0;
        let mut excluded_stake: i128 = 0;

        for record in output.iter_mut().filter(|r| !r.is_skipped()) {
            stake += i128::from(record.staking_balance());
            if let Some(reason) = self.rules.exclusion_for(record, ExclusionPolicy::ToBaker) {
                excluded_ratio += record.ratio();
                excluded_stake += i128::from(record.staking_balance());
                excluded_count += 1;
                record.skip(reason, PhaseId::FullExclusion);
            }
        }

        let remaining = 1.0 - excluded_ratio;
        let has_survivors = output.iter().any(|r| !r.is_skipped());
        if has_survivors && remaining <= ALMOST_ZERO {
            return Err(PhaseError::NoRemainingRatio {
                phase: PhaseId::FullExclusion,
            });
        }

        for record in output.iter_mut().filter(|r| !r.is_skipped()) {
            let ratio = record.ratio() / remaining;
            record.set_ratio(PhaseId::FullExclusion, ratio);
        }

        let new_total = if excluded_count == 0 {
            total_amount
        } else if stake > 0 && (0..=stake).contains(&excluded_stake) {
            shrink_by_stake(total_amount, stake - excluded_stake, stake)?
        } else {
            (total_amount as f64 * remaining.max(0.0)).floor() as i64
        };

        debug!(
            excluded = excluded_count,
            excluded_ratio,
            old_total = total_amount,
            new_total,
            "full exclusion applied"
        );

        Ok((output, new_total))
    }
}

/// `floor(total * remaining / stake)` in integer arithmetic
fn shrink_by_stake(total_amount: i64, remaining: i128, stake: i128) -> Result<i64, PhaseError> {
    let out_of_range = || PhaseError::InvariantViolation {
        phase: PhaseId::FullExclusion,
        detail: format!("total {} cannot be shrunk by stake {}/{}", total_amount, remaining, stake),
    };
    let shrunk = i128::from(total_amount)
        .checked_mul(remaining)
        .ok_or_else(out_of_range)?
        / stake;
    i64::try_from(shrunk).map_err(|_| out_of_range())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::{RecordKind, SkipReason};

    fn delegator(address: &str, ratio: f64) -> RewardRecord {
        RewardRecord::new(address.to_string(), RecordKind::Delegator, 100, 100)
            .with_ratio(PhaseId::InitialRatio, ratio)
    }

    #[test]
    fn test_no_exclusion_keeps_total() {
        let records = vec![delegator("tz1a", 0.5), delegator("tz1b", 0.5)];
        let phase = FullExclusionPhase::new(ExclusionRules::default());
        let (out, total) = phase.calculate(&records, 1_001).unwrap();

        assert_eq!(total, 1_001);
        assert_eq!(out[0].ratio_at(PhaseId::FullExclusion), Some(0.5));
    }

    #[test]
    fn test_excluded_record_keeps_ratio0() {
        let records = vec![delegator("tz1a", 0.5), delegator("tz1b", 0.5)];
        let mut rules = ExclusionRules::default();
        rules.to_baker.insert("tz1a".to_string());

        let (out, total) = FullExclusionPhase::new(rules).calculate(&records, 1_000).unwrap();

        assert_eq!(total, 500);
        assert!(out[0].is_skipped());
        assert_eq!(out[0].skip_info().unwrap().reason, SkipReason::ByConfiguration);
        assert_eq!(out[0].ratio_at(PhaseId::FullExclusion), None);
        assert_eq!(out[0].ratio_at(PhaseId::InitialRatio), Some(0.5));
        assert_eq!(out[1].ratio_at(PhaseId::FullExclusion), Some(1.0));
    }

    #[test]
    fn test_exact_shrink_keeps_every_unit() {
        // stakes 2 + 4 excluded out of 10: exactly 40% of the pool remains
        let records = vec![
            RewardRecord::new("tz1a".to_string(), RecordKind::Delegator, 2, 2)
                .with_ratio(PhaseId::InitialRatio, 0.2),
            RewardRecord::new("tz1b".to_string(), RecordKind::Delegator, 4, 4)
                .with_ratio(PhaseId::InitialRatio, 0.4),
            RewardRecord::new("tz1c".to_string(), RecordKind::Delegator, 3, 3)
                .with_ratio(PhaseId::InitialRatio, 0.3),
            RewardRecord::new("OWNERS_PARENT".to_string(), RecordKind::OwnersParent, 1, 0)
                .with_ratio(PhaseId::InitialRatio, 0.1),
        ];
        let mut rules = ExclusionRules::default();
        rules.to_baker.insert("tz1a".to_string());
        rules.to_baker.insert("tz1b".to_string());

        let (_, total) = FullExclusionPhase::new(rules).calculate(&records, 10_000).unwrap();
        assert_eq!(total, 4_000);
    }

    #[test]
    fn test_excluding_everything_is_an_error() {
        let records = vec![delegator("tz1a", 1.0), delegator("tz1b", 0.0)];
        let mut rules = ExclusionRules::default();
        rules.to_baker.insert("tz1a".to_string());

        let result = FullExclusionPhase::new(rules).calculate(&records, 1_000);
        assert_eq!(
            result,
            Err(PhaseError::NoRemainingRatio {
                phase: PhaseId::FullExclusion
            })
        );
    }
}
