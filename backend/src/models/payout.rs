//! Payout model
//!
//! The per-record output handed to the payment-execution and reporting
//! collaborators. Every beneficiary of the run appears exactly once, either
//! payable or skipped with its reason.

use crate::models::record::{RecordKind, RewardRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub address: String,
    pub payment_address: String,
    pub kind: RecordKind,

    /// Computed share (i64 base units, 0 for skipped records)
    pub amount: i64,

    /// Deduction applied to `amount` (zero or negative)
    pub adjustment: i64,

    /// Amount to transfer: `amount + adjustment`
    pub adjusted_amount: i64,

    pub service_fee_amount: i64,
    pub payable: bool,
    pub skipped: bool,

    /// Skip reason (empty when not skipped)
    pub desc: String,

    pub needs_activation: bool,
    pub cycle: u32,
}

impl From<&RewardRecord> for Payout {
    fn from(record: &RewardRecord) -> Self {
        Payout {
            address: record.address().to_string(),
            payment_address: record.payment_address().to_string(),
            kind: record.kind(),
            amount: record.amount().unwrap_or(0),
            adjustment: record.adjustment(),
            adjusted_amount: record.adjusted_amount().unwrap_or(0),
            service_fee_amount: record.service_fee_amount(),
            payable: record.is_payable(),
            skipped: record.is_skipped(),
            desc: record.desc().to_string(),
            needs_activation: record.needs_activation(),
            cycle: record.cycle(),
        }
    }
}
