//! Zero balance phase (phase 6)
//!
//! A delegator whose current balance is zero needs its payout address
//! reactivated by the transfer. Depending on configuration the record is
//! either flagged `needs_activation` or skipped. Contract addresses (`KT1…`)
//! never need reactivation.
//!
//! The skipped share is not redistributed: ratios are final at this point.

use crate::models::record::{PhaseId, RecordKind, RewardRecord, SkipReason};
use crate::phases::{Phase, PhaseError, PhaseOutput};
use tracing::info;

/// Prefix of contract-style addresses
pub const CONTRACT_ADDRESS_PREFIX: &str = "KT1";

/// Whether `address` is a contract-style address
pub fn is_contract_address(address: &str) -> bool {
    address.starts_with(CONTRACT_ADDRESS_PREFIX)
}

pub struct ZeroBalancePhase {
    reactivate_zero_balances: bool,
}

impl ZeroBalancePhase {
    pub fn new(reactivate_zero_balances: bool) -> Self {
        Self {
            reactivate_zero_balances,
        }
    }
}

impl Phase for ZeroBalancePhase {
    fn id(&self) -> PhaseId {
        PhaseId::ZeroBalance
    }

    fn calculate(&self, records: &[RewardRecord], total_amount: i64) -> Result<PhaseOutput, PhaseError> {
        let mut output = records.to_vec();

        for record in output.iter_mut().filter(|r| {
            !r.is_skipped()
                && r.kind() == RecordKind::Delegator
                && r.current_balance() == 0
                && !is_contract_address(r.payment_address())
        }) {
            if self.reactivate_zero_balances {
                record.set_needs_activation();
                info!(address = record.address(), "zero balance, will be reactivated");
            } else {
                record.skip(SkipReason::ByZeroBalance, PhaseId::ZeroBalance);
                info!(address = record.address(), "zero balance, will NOT be reactivated");
            }
        }

        Ok((output, total_amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_addresses_exempt() {
        assert!(is_contract_address("KT1PWx2mnDueood7fEmfbBDKx1D9BAnnXitn"));
        assert!(!is_contract_address("tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx"));

        let records = vec![RewardRecord::new("KT1abc".to_string(), RecordKind::Delegator, 100, 0)
            .with_ratio(PhaseId::PaymentMerge, 1.0)];
        let (out, _) = ZeroBalancePhase::new(false).calculate(&records, 10).unwrap();

        assert!(!out[0].is_skipped());
        assert!(!out[0].needs_activation());
    }

    #[test]
    fn test_owners_are_not_checked() {
        let records = vec![RewardRecord::new("tz1owner".to_string(), RecordKind::Owner, 0, 0)
            .with_ratio(PhaseId::PaymentMerge, 1.0)];
        let (out, _) = ZeroBalancePhase::new(false).calculate(&records, 10).unwrap();

        assert!(!out[0].is_skipped());
    }
}
