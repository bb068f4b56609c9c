//! Hierarchical split phase (phase 4)
//!
//! Expands the two placeholders into concrete beneficiaries:
//! - `OwnersParent` with ratio `r` becomes one `Owner` per owners-map entry,
//!   `ratio4 = r * share`, staking balance `share * parent staking`
//! - `FoundersParent` with ratio `r` becomes one `Founder` per founders-map
//!   entry, `ratio4 = r * share`
//! - Delegators carry `ratio4 = ratio3`
//!
//! When a map is empty the placeholder stays in place with `ratio4 = ratio3`.
//! It is never payable, so that share stays with the baker.

use crate::models::record::{PhaseId, RecordKind, RewardRecord};
use crate::phases::{Phase, PhaseError, PhaseOutput};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub struct HierarchicalSplitPhase {
    owners_map: BTreeMap<String, f64>,
    founders_map: BTreeMap<String, f64>,
}

impl HierarchicalSplitPhase {
    pub fn new(owners_map: BTreeMap<String, f64>, founders_map: BTreeMap<String, f64>) -> Self {
        Self {
            owners_map,
            founders_map,
        }
    }

    fn expand(
        parent: &RewardRecord,
        shares: &BTreeMap<String, f64>,
        kind: RecordKind,
        output: &mut Vec<RewardRecord>,
    ) {
        if shares.is_empty() {
            warn!(
                parent = %parent.kind(),
                ratio = parent.ratio(),
                "no members configured, share stays with the baker"
            );
            let mut kept = parent.clone();
            kept.set_ratio(PhaseId::HierarchicalSplit, parent.ratio());
            output.push(kept);
            return;
        }

        for (address, share) in shares {
            let staking_balance = (parent.staking_balance() as f64 * share).floor() as i64;
            output.push(
                RewardRecord::new(address.clone(), kind, staking_balance, 0)
                    .with_cycle(parent.cycle())
                    .with_ratio(PhaseId::HierarchicalSplit, parent.ratio() * share),
            );
        }
    }
}

impl Phase for HierarchicalSplitPhase {
    fn id(&self) -> PhaseId {
        PhaseId::HierarchicalSplit
    }

    fn calculate(&self, records: &[RewardRecord], total_amount: i64) -> Result<PhaseOutput, PhaseError> {
        let mut output =
            Vec::with_capacity(records.len() + self.owners_map.len() + self.founders_map.len());

        for record in records {
            if record.is_skipped() {
                output.push(record.clone());
                continue;
            }

            match record.kind() {
                RecordKind::Delegator => {
                    let mut carried = record.clone();
                    carried.set_ratio(PhaseId::HierarchicalSplit, record.ratio());
                    output.push(carried);
                }
                RecordKind::OwnersParent => {
                    Self::expand(record, &self.owners_map, RecordKind::Owner, &mut output);
                }
                RecordKind::FoundersParent => {
                    Self::expand(record, &self.founders_map, RecordKind::Founder, &mut output);
                }
                kind => {
                    return Err(PhaseError::UnexpectedRecordKind {
                        phase: PhaseId::HierarchicalSplit,
                        kind,
                        address: record.address().to_string(),
                    });
                }
            }
        }

        debug!(
            input = records.len(),
            output = output.len(),
            "placeholders expanded"
        );

        Ok((output, total_amount))
    }
}
