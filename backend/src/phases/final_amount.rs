//! Final amount phase (phase 7)
//!
//! Converts terminal ratios into integer amounts:
//!
//! ```text
//! amount           = floor(paymentRounding(ratio * total))
//! serviceFeeAmount = floor(feeRounding(serviceFeeRatio * total))
//! adjustment       = -min(deduction[address], amount)
//! adjustedAmount   = amount + adjustment
//! ```
//!
//! Rounding happens on the amount, never on the ratio, and only truncates.
//! Deductions (e.g. recovering an earlier overpayment) can bring a payout down
//! to zero but never below. Skipped records are appended after all other
//! records, unchanged.
//!
//! # Critical Invariants
//!
//! - An amount is set exactly once: a record arriving with an amount is rejected
//! - Sum of payable amounts <= total, checked and surfaced, never corrected
//! - Same input, same amounts: the phase holds no state between calls

use crate::core::rounding::RoundingPolicy;
use crate::models::record::{PhaseId, RewardRecord};
use crate::phases::{active, skipped, Phase, PhaseError, PhaseOutput};
use std::collections::BTreeMap;
use tracing::debug;

pub struct FinalAmountPhase {
    payment_rounding: RoundingPolicy,
    fee_rounding: RoundingPolicy,
    adjustments: BTreeMap<String, i64>,
}

impl FinalAmountPhase {
    pub fn new(payment_rounding: RoundingPolicy, fee_rounding: RoundingPolicy) -> Self {
        Self {
            payment_rounding,
            fee_rounding,
            adjustments: BTreeMap::new(),
        }
    }

    /// Deduct `amount` base units from the payout of each listed address
    pub fn with_adjustments(mut self, adjustments: BTreeMap<String, i64>) -> Self {
        self.adjustments = adjustments;
        self
    }

    fn to_amount(rounding: &RoundingPolicy, ratio: f64, total_amount: i64) -> i64 {
        let amount = rounding.round(ratio * total_amount as f64).floor();
        if amount <= 0.0 {
            0
        } else {
            amount as i64
        }
    }

    fn adjustment_for(&self, address: &str, amount: i64) -> i64 {
        match self.adjustments.get(address) {
            Some(deduction) => -(*deduction).clamp(0, amount),
            None => 0,
        }
    }
}

impl Phase for FinalAmountPhase {
    fn id(&self) -> PhaseId {
        PhaseId::FinalAmount
    }

    fn calculate(&self, records: &[RewardRecord], total_amount: i64) -> Result<PhaseOutput, PhaseError> {
        let mut output = Vec::with_capacity(records.len());
        let mut payable_sum: i64 = 0;

        for record in active(records) {
            if record.amount().is_some() {
                return Err(PhaseError::InvariantViolation {
                    phase: PhaseId::FinalAmount,
                    detail: format!("amount already set for {}", record.address()),
                });
            }

            let amount = Self::to_amount(&self.payment_rounding, record.ratio(), total_amount);
            let fee_amount =
                Self::to_amount(&self.fee_rounding, record.service_fee_ratio(), total_amount);
            let adjustment = self.adjustment_for(record.address(), amount);
            let payable = record.kind().is_payable_kind() && amount + adjustment > 0;

            let mut paid = record.clone();
            paid.set_amounts(amount, adjustment, fee_amount, payable);
            if payable {
                payable_sum = payable_sum.saturating_add(amount);
            }
            output.push(paid);
        }

        if payable_sum > total_amount {
            return Err(PhaseError::InvariantViolation {
                phase: PhaseId::FinalAmount,
                detail: format!(
                    "payable amounts {} exceed total {}",
                    payable_sum, total_amount
                ),
            });
        }

        let skipped_count = records.len() - output.len();
        output.extend(skipped(records).cloned());

        debug!(
            payable_sum,
            total = total_amount,
            skipped = skipped_count,
            adjusted = self.adjustments.len(),
            "final amounts computed"
        );

        Ok((output, total_amount))
    }
}
