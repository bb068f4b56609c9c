//! Final Amount Phase Tests
//!
//! Amounts are `floor(round(ratio * total))` with truncating roundings, so
//! the payable sum never exceeds the total.

use reward_distribution_core_rs::phases::{FinalAmountPhase, Phase, PhaseError};
use reward_distribution_core_rs::{PhaseId, RecordKind, RewardRecord, RoundingPolicy, SkipReason};

fn passthrough_phase() -> FinalAmountPhase {
    FinalAmountPhase::new(RoundingPolicy::passthrough(), RoundingPolicy::passthrough())
}

fn thirds() -> Vec<RewardRecord> {
    ["tz1a", "tz1b", "tz1c"]
        .iter()
        .map(|addr| {
            RewardRecord::new(addr.to_string(), RecordKind::Delegator, 100, 100)
                .with_ratio(PhaseId::PaymentMerge, 1.0 / 3.0)
        })
        .collect()
}

#[test]
fn test_truncation_never_overpays() {
    let (records, total) = passthrough_phase().calculate(&thirds(), 1_000).unwrap();

    assert_eq!(total, 1_000);
    for record in &records {
        assert_eq!(record.amount(), Some(333));
        assert!(record.is_payable());
    }
    let sum: i64 = records.iter().filter_map(|r| r.amount()).sum();
    assert_eq!(sum, 999);
}

#[test]
fn test_payment_rounding_applies_to_amount() {
    let phase = FinalAmountPhase::new(RoundingPolicy::new(Some(2)), RoundingPolicy::passthrough());
    let records = vec![
        RewardRecord::new("tz1a".to_string(), RecordKind::Delegator, 100, 100)
            .with_ratio(PhaseId::PaymentMerge, 0.0567),
        RewardRecord::new("tz1b".to_string(), RecordKind::Delegator, 100, 100)
            .with_ratio(PhaseId::PaymentMerge, 1.0 / 3.0),
    ];

    let (out, _) = phase.calculate(&records, 1_000).unwrap();

    // 0.0567 * 1000 = 56.7 -> 56, not round(0.0567) * 1000 = 50
    assert_eq!(out[0].amount(), Some(56));
    assert_eq!(out[1].amount(), Some(333));
}

#[test]
fn test_service_fee_amounts() {
    let records = vec![
        RewardRecord::new("tz1a".to_string(), RecordKind::Delegator, 100, 100)
            .with_ratio(PhaseId::PaymentMerge, 0.375)
            .with_service_fee_ratio(0.0123456),
        RewardRecord::new("tz1f".to_string(), RecordKind::Founder, 0, 0)
            .with_ratio(PhaseId::PaymentMerge, 0.625),
    ];
    let phase = FinalAmountPhase::new(RoundingPolicy::new(Some(1)), RoundingPolicy::new(Some(2)));

    let (out, _) = phase.calculate(&records, 1_000).unwrap();

    // fee: 12.3456 -> 12.34 -> 12
    assert_eq!(out[0].amount(), Some(375));
    assert_eq!(out[0].service_fee_amount(), 12);
    assert_eq!(out[1].amount(), Some(625));
    assert!(out[1].is_payable());
}

#[test]
fn test_zero_amount_is_not_payable() {
    let records = vec![
        RewardRecord::new("tz1dust".to_string(), RecordKind::Delegator, 1, 1)
            .with_ratio(PhaseId::PaymentMerge, 0.0001),
        RewardRecord::new("tz1big".to_string(), RecordKind::Delegator, 100, 100)
            .with_ratio(PhaseId::PaymentMerge, 0.9999),
    ];

    let (out, _) = passthrough_phase().calculate(&records, 1_000).unwrap();

    assert_eq!(out[0].amount(), Some(0));
    assert!(!out[0].is_payable());
    assert!(out[1].is_payable());
}

#[test]
fn test_skipped_records_keep_no_amount() {
    let records = vec![
        RewardRecord::new("tz1empty".to_string(), RecordKind::Delegator, 50, 0)
            .with_ratio(PhaseId::PaymentMerge, 0.5)
            .skipped_at(SkipReason::ByZeroBalance, PhaseId::ZeroBalance),
        RewardRecord::new("tz1a".to_string(), RecordKind::Delegator, 50, 50)
            .with_ratio(PhaseId::PaymentMerge, 0.5),
    ];

    let (out, _) = passthrough_phase().calculate(&records, 1_000).unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].address(), "tz1a");
    assert_eq!(out[0].amount(), Some(500));
    assert_eq!(out[1].address(), "tz1empty");
    assert_eq!(out[1].amount(), None);
    assert!(!out[1].is_payable());
}

#[test]
fn test_second_application_rejected() {
    let phase = passthrough_phase();
    let (records, total) = phase.calculate(&thirds(), 1_000).unwrap();

    let result = phase.calculate(&records, total);
    assert!(matches!(
        result,
        Err(PhaseError::InvariantViolation {
            phase: PhaseId::FinalAmount,
            ..
        })
    ));
}

#[test]
fn test_overshooting_ratios_rejected() {
    let records = vec![
        RewardRecord::new("tz1a".to_string(), RecordKind::Delegator, 1, 1)
            .with_ratio(PhaseId::PaymentMerge, 0.75),
        RewardRecord::new("tz1b".to_string(), RecordKind::Delegator, 1, 1)
            .with_ratio(PhaseId::PaymentMerge, 0.75),
    ];

    assert!(matches!(
        passthrough_phase().calculate(&records, 1_000),
        Err(PhaseError::InvariantViolation { .. })
    ));
}

#[test]
fn test_same_input_same_amounts() {
    let phase = FinalAmountPhase::new(RoundingPolicy::new(Some(6)), RoundingPolicy::new(Some(2)));
    let mut records = thirds();
    records.push(
        RewardRecord::new("tz1gone".to_string(), RecordKind::Delegator, 10, 0)
            .with_ratio(PhaseId::PaymentMerge, 0.2)
            .skipped_at(SkipReason::ByZeroBalance, PhaseId::ZeroBalance),
    );

    let (first, first_total) = phase.calculate(&records, 987_654).unwrap();
    let (second, second_total) = phase.calculate(&records, 987_654).unwrap();

    assert_eq!(first_total, second_total);
    assert_eq!(first, second);
}

#[test]
fn test_adjustment_reduces_payout() {
    let phase = passthrough_phase().with_adjustments(
        [("tz1a".to_string(), 33), ("tz1b".to_string(), 1_000)]
            .into_iter()
            .collect(),
    );

    let (out, _) = phase.calculate(&thirds(), 1_000).unwrap();

    assert_eq!(out[0].amount(), Some(333));
    assert_eq!(out[0].adjustment(), -33);
    assert_eq!(out[0].adjusted_amount(), Some(300));
    assert!(out[0].is_payable());

    // deduction larger than the payout brings it to zero, never below
    assert_eq!(out[1].adjustment(), -333);
    assert_eq!(out[1].adjusted_amount(), Some(0));
    assert!(!out[1].is_payable());

    assert_eq!(out[2].adjustment(), 0);
    assert!(out[2].is_payable());
}
