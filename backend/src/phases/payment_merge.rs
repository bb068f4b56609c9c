//! Payment address merge phase (phase 5)
//!
//! Applies payment redirects and merges payments to the same destination:
//!
//! 1. Every non-skipped payable record whose address is in the redirect map
//!    gets the mapped payment address
//! 2. Payable records are grouped by payment address
//! 3. Groups of size > 1 collapse into one `Merged` record:
//!    `ratio5 = sum(ratio4)`, balances and fee ratios summed
//! 4. Singletons carry `ratio5 = ratio4`
//!
//! Placeholders left unexpanded are never merged. The merged record takes the
//! position of the group's first member.

use crate::models::record::{PhaseId, RecordKind, RewardRecord};
use crate::phases::{Phase, PhaseError, PhaseOutput};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub struct PaymentAddressMergePhase {
    redirects: BTreeMap<String, String>,
}

impl PaymentAddressMergePhase {
    pub fn new(redirects: BTreeMap<String, String>) -> Self {
        Self { redirects }
    }

    fn merge_group(
        payment_address: &str,
        members: Vec<RewardRecord>,
    ) -> Result<RewardRecord, PhaseError> {
        let staking_balance =
            Self::checked_total(payment_address, &members, RewardRecord::staking_balance)?;
        let current_balance =
            Self::checked_total(payment_address, &members, RewardRecord::current_balance)?;
        let ratio: f64 = members.iter().map(|r| r.ratio()).sum();
        let fee_ratio: f64 = members.iter().map(|r| r.service_fee_ratio()).sum();
        let cycle = members[0].cycle();

        let mut merged = RewardRecord::new(
            payment_address.to_string(),
            RecordKind::Merged,
            staking_balance,
            current_balance,
        )
        .with_cycle(cycle)
        .with_ratio(PhaseId::PaymentMerge, ratio);
        merged.set_service_fee(0.0, fee_ratio);
        merged.set_merged_from(members.iter().map(|r| r.address().to_string()).collect());
        Ok(merged)
    }

    fn checked_total(
        payment_address: &str,
        members: &[RewardRecord],
        balance: fn(&RewardRecord) -> i64,
    ) -> Result<i64, PhaseError> {
        members
            .iter()
            .try_fold(0i64, |sum, r| sum.checked_add(balance(r)))
            .ok_or_else(|| PhaseError::InvariantViolation {
                phase: PhaseId::PaymentMerge,
                detail: format!("merged balance for {} overflows i64", payment_address),
            })
    }
}

impl Phase for PaymentAddressMergePhase {
    fn id(&self) -> PhaseId {
        PhaseId::PaymentMerge
    }

    fn calculate(&self, records: &[RewardRecord], total_amount: i64) -> Result<PhaseOutput, PhaseError> {
        // Group payable records by payment address, in order of first appearance
        let mut groups: Vec<(String, Vec<RewardRecord>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for record in records.iter().filter(|r| !r.is_skipped()) {
            match record.kind() {
                RecordKind::Delegator | RecordKind::Owner | RecordKind::Founder => {
                    let mut redirected = record.clone();
                    if let Some(target) = self.redirects.get(record.address()) {
                        redirected.set_payment_address(target.clone());
                    }
                    let key = redirected.payment_address().to_string();
                    let idx = *group_index.entry(key.clone()).or_insert_with(|| {
                        groups.push((key, Vec::new()));
                        groups.len() - 1
                    });
                    groups[idx].1.push(redirected);
                }
                RecordKind::OwnersParent | RecordKind::FoundersParent => {}
                RecordKind::Merged => {
                    return Err(PhaseError::UnexpectedRecordKind {
                        phase: PhaseId::PaymentMerge,
                        kind: RecordKind::Merged,
                        address: record.address().to_string(),
                    });
                }
            }
        }

        // Resolve each group into a single record
        let mut resolved: Vec<Option<RewardRecord>> = groups
            .into_iter()
            .map(|(payment_address, mut members)| {
                if members.len() > 1 {
                    Self::merge_group(&payment_address, members).map(Some)
                } else {
                    let mut single = members.remove(0);
                    let ratio = single.ratio();
                    single.set_ratio(PhaseId::PaymentMerge, ratio);
                    Ok(Some(single))
                }
            })
            .collect::<Result<_, _>>()?;

        let mut output = Vec::with_capacity(records.len());
        let mut merged_count = 0usize;

        for record in records {
            if record.is_skipped() {
                output.push(record.clone());
                continue;
            }

            if record.kind().is_parent() {
                let mut kept = record.clone();
                kept.set_ratio(PhaseId::PaymentMerge, record.ratio());
                output.push(kept);
                continue;
            }

            let payment_address = self
                .redirects
                .get(record.address())
                .map(String::as_str)
                .unwrap_or(record.payment_address());
            if let Some(idx) = group_index.get(payment_address) {
                if let Some(group_record) = resolved[*idx].take() {
                    if group_record.kind() == RecordKind::Merged {
                        merged_count += 1;
                    }
                    output.push(group_record);
                }
            }
        }

        debug!(
            input = records.len(),
            output = output.len(),
            merged = merged_count,
            "payment addresses merged"
        );

        Ok((output, total_amount))
    }
}
