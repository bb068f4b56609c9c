//! Service fee phase (phase 3)
//!
//! Builds the founders' share of the pool:
//! - Records excluded under the `ToFounders` policy are skipped and their
//!   share is handed to the founders
//! - Every remaining delegator pays its service fee out of its share
//! - A `FoundersParent` placeholder collects both, when non-zero
//!
//! ```text
//! serviceFeeRatio = feeRate * ratio2
//! ratio3          = ratio2 - serviceFeeRatio
//! founders ratio3 = excludedToFounders + sum(serviceFeeRatio)
//! ```
//!
//! The owners placeholder never pays a fee.

use crate::core::ALMOST_ZERO;
use crate::models::record::{PhaseId, RecordKind, RewardRecord, FOUNDERS_PARENT_ADDRESS};
use crate::orchestrator::config::{ExclusionPolicy, ExclusionRules, ServiceFeeConfig};
use crate::phases::{Phase, PhaseError, PhaseOutput};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Resolves the fee rate of a delegator
///
/// Supporters pay nothing, specials pay their own rate, everyone else pays
/// the standard rate. Rates are fractions (5% = 0.05).
///
/// # Example
/// ```
/// use reward_distribution_core_rs::phases::ServiceFeeCalculator;
/// use reward_distribution_core_rs::orchestrator::ServiceFeeConfig;
///
/// let mut config = ServiceFeeConfig::default();
/// config.standard_fee = 10.0;
/// config.supporters.insert("tz1friend".to_string());
///
/// let calc = ServiceFeeCalculator::new(&config);
/// assert_eq!(calc.rate("tz1friend"), 0.0);
/// assert_eq!(calc.rate("tz1other"), 0.1);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceFeeCalculator {
    standard_rate: f64,
    supporters: BTreeSet<String>,
    special_rates: BTreeMap<String, f64>,
}

impl ServiceFeeCalculator {
    pub fn new(config: &ServiceFeeConfig) -> Self {
        Self {
            standard_rate: config.standard_fee / 100.0,
            supporters: config.supporters.clone(),
            special_rates: config
                .specials
                .iter()
                .map(|(address, fee)| (address.clone(), fee / 100.0))
                .collect(),
        }
    }

    /// Fee rate for `address`
    pub fn rate(&self, address: &str) -> f64 {
        if self.supporters.contains(address) {
            0.0
        } else if let Some(rate) = self.special_rates.get(address) {
            *rate
        } else {
            self.standard_rate
        }
    }
}

pub struct ServiceFeePhase {
    fee_calculator: ServiceFeeCalculator,
    rules: ExclusionRules,
}

impl ServiceFeePhase {
    pub fn new(fee_calculator: ServiceFeeCalculator, rules: ExclusionRules) -> Self {
        Self {
            fee_calculator,
            rules,
        }
    }
}

impl Phase for ServiceFeePhase {
    fn id(&self) -> PhaseId {
        PhaseId::ServiceFee
    }

    fn calculate(&self, records: &[RewardRecord], total_amount: i64) -> Result<PhaseOutput, PhaseError> {
        let mut output = records.to_vec();
        let mut excluded_ratio = 0.0;
        let mut fee_ratio_sum = 0.0;
        let mut cycle = 0;

        for record in output.iter_mut().filter(|r| !r.is_skipped()) {
            cycle = record.cycle();

            match record.kind() {
                RecordKind::Delegator => {
                    if let Some(reason) = self.rules.exclusion_for(record, ExclusionPolicy::ToFounders) {
                        excluded_ratio += record.ratio();
                        record.skip(reason, PhaseId::ServiceFee);
                        continue;
                    }

                    let rate = self.fee_calculator.rate(record.address());
                    let fee_ratio = rate * record.ratio();
                    let ratio = record.ratio() - fee_ratio;
                    record.set_service_fee(rate, fee_ratio);
                    record.set_ratio(PhaseId::ServiceFee, ratio);
                    fee_ratio_sum += fee_ratio;
                }
                RecordKind::OwnersParent => {
                    let ratio = record.ratio();
                    record.set_service_fee(0.0, 0.0);
                    record.set_ratio(PhaseId::ServiceFee, ratio);
                }
                kind => {
                    return Err(PhaseError::UnexpectedRecordKind {
                        phase: PhaseId::ServiceFee,
                        kind,
                        address: record.address().to_string(),
                    });
                }
            }
        }

        let founders_ratio = excluded_ratio + fee_ratio_sum;
        if founders_ratio > ALMOST_ZERO {
            output.push(
                RewardRecord::new(
                    FOUNDERS_PARENT_ADDRESS.to_string(),
                    RecordKind::FoundersParent,
                    0,
                    0,
                )
                .with_cycle(cycle)
                .with_ratio(PhaseId::ServiceFee, founders_ratio),
            );
        }

        debug!(
            excluded_ratio,
            fee_ratio = fee_ratio_sum,
            founders_ratio,
            "service fees applied"
        );

        Ok((output, total_amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_rate_overrides_standard() {
        let mut config = ServiceFeeConfig {
            standard_fee: 5.0,
            ..Default::default()
        };
        config.specials.insert("tz1vip".to_string(), 2.5);

        let calc = ServiceFeeCalculator::new(&config);
        assert_eq!(calc.rate("tz1vip"), 0.025);
        assert_eq!(calc.rate("tz1any"), 0.05);
    }

    #[test]
    fn test_no_founders_parent_without_fees() {
        let records = vec![
            RewardRecord::new("tz1a".to_string(), RecordKind::Delegator, 100, 100)
                .with_ratio(PhaseId::Redistribution, 0.5),
            RewardRecord::new("OWNERS_PARENT".to_string(), RecordKind::OwnersParent, 100, 0)
                .with_ratio(PhaseId::Redistribution, 0.5),
        ];
        let phase = ServiceFeePhase::new(
            ServiceFeeCalculator::new(&ServiceFeeConfig::default()),
            ExclusionRules::default(),
        );

        let (out, _) = phase.calculate(&records, 1_000).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.kind() != RecordKind::FoundersParent));
    }

    #[test]
    fn test_existing_founders_parent_is_rejected() {
        let records = vec![RewardRecord::new(
            "FOUNDERS_PARENT".to_string(),
            RecordKind::FoundersParent,
            0,
            0,
        )
        .with_ratio(PhaseId::Redistribution, 1.0)];
        let phase = ServiceFeePhase::new(
            ServiceFeeCalculator::new(&ServiceFeeConfig::default()),
            ExclusionRules::default(),
        );

        assert!(matches!(
            phase.calculate(&records, 1_000),
            Err(PhaseError::UnexpectedRecordKind { .. })
        ));
    }
}
