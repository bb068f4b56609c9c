//! Partial exclusion redistribution phase (phase 2)
//!
//! Records excluded under the `ToEveryone` policy are skipped, but their share
//! is not removed from the pool. It is spread over the remaining records in
//! proportion to their current ratio, so the total reward amount is unchanged:
//!
//! ```text
//! excluded = sum(ratio1 of records newly excluded here)
//! ratio2   = ratio1 * (1 + excluded / (1 - excluded))
//! ```
//!
//! Records skipped by an earlier phase keep their ratios and contribute
//! nothing to `excluded`.

use crate::core::ALMOST_ZERO;
use crate::models::record::{PhaseId, RewardRecord};
use crate::orchestrator::config::{ExclusionPolicy, ExclusionRules};
use crate::phases::{Phase, PhaseError, PhaseOutput};
use tracing::debug;

pub struct PartialExclusionRedistributionPhase {
    rules: ExclusionRules,
}

impl PartialExclusionRedistributionPhase {
    pub fn new(rules: ExclusionRules) -> Self {
        Self { rules }
    }
}

impl Phase for PartialExclusionRedistributionPhase {
    fn id(&self) -> PhaseId {
        PhaseId::Redistribution
    }

    fn calculate(&self, records: &[RewardRecord], total_amount: i64) -> Result<PhaseOutput, PhaseError> {
        let mut output = records.to_vec();
        let mut excluded_ratio = 0.0;
        let mut excluded_count = 0usize;

        for record in output.iter_mut().filter(|r| !r.is_skipped()) {
            if let Some(reason) = self.rules.exclusion_for(record, ExclusionPolicy::ToEveryone) {
                excluded_ratio += record.ratio();
                excluded_count += 1;
                record.skip(reason, PhaseId::Redistribution);
            }
        }

        let remaining = 1.0 - excluded_ratio;
        let has_survivors = output.iter().any(|r| !r.is_skipped());
        if has_survivors && remaining <= ALMOST_ZERO {
            return Err(PhaseError::NoRemainingRatio {
                phase: PhaseId::Redistribution,
            });
        }

        let boost = 1.0 + excluded_ratio / remaining;
        for record in output.iter_mut().filter(|r| !r.is_skipped()) {
            let ratio = record.ratio() * boost;
            record.set_ratio(PhaseId::Redistribution, ratio);
        }

        debug!(
            excluded = excluded_count,
            excluded_ratio,
            total = total_amount,
            "excluded share redistributed"
        );

        Ok((output, total_amount))
    }
}
