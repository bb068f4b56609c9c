//! Reward record model
//!
//! One record per beneficiary, carried through every phase of a calculation run.
//! Each record has:
//! - Beneficiary address and the address funds are actually sent to
//! - Record kind (delegator, owner, founder, parent placeholder, merged)
//! - Staking and current balances as reported by the data source
//! - One ratio slot per ratio-producing phase, plus the current ratio
//! - Service fee bookkeeping
//! - Final amount and payability
//! - Skip disposition (reason + phase)
//!
//! CRITICAL: All money values are i64 (base units, e.g. mutez)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of the synthetic owners placeholder record
pub const OWNERS_PARENT_ADDRESS: &str = "OWNERS_PARENT";

/// Address of the synthetic founders placeholder record
pub const FOUNDERS_PARENT_ADDRESS: &str = "FOUNDERS_PARENT";

/// Number of ratio slots (`ratio0..ratio5`)
pub const RATIO_SLOTS: usize = 6;

/// Kind of beneficiary a record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Delegator staking with the baker
    Delegator,

    /// Member of the owners pool (expanded from `OwnersParent`)
    Owner,

    /// Member of the founders pool (expanded from `FoundersParent`)
    Founder,

    /// Placeholder for the baker-owner share, expanded by the split phase
    OwnersParent,

    /// Placeholder for the founders' share, expanded by the split phase
    FoundersParent,

    /// Several beneficiaries sharing one payment address
    Merged,
}

impl RecordKind {
    /// Whether records of this kind may receive a transfer
    pub fn is_payable_kind(&self) -> bool {
        matches!(
            self,
            RecordKind::Delegator | RecordKind::Owner | RecordKind::Founder | RecordKind::Merged
        )
    }

    /// Whether this kind is a synthetic placeholder
    pub fn is_parent(&self) -> bool {
        matches!(self, RecordKind::OwnersParent | RecordKind::FoundersParent)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Delegator => "D",
            RecordKind::Owner => "O",
            RecordKind::Founder => "F",
            RecordKind::OwnersParent => "OWNERS_PARENT",
            RecordKind::FoundersParent => "FOUNDERS_PARENT",
            RecordKind::Merged => "MERGED",
        };
        write!(f, "{}", s)
    }
}

/// Pipeline phase identifiers, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseId {
    InitialRatio,
    FullExclusion,
    Redistribution,
    ServiceFee,
    HierarchicalSplit,
    PaymentMerge,
    ZeroBalance,
    FinalAmount,
}

impl PhaseId {
    /// Phase number (0-based)
    pub fn number(&self) -> u8 {
        match self {
            PhaseId::InitialRatio => 0,
            PhaseId::FullExclusion => 1,
            PhaseId::Redistribution => 2,
            PhaseId::ServiceFee => 3,
            PhaseId::HierarchicalSplit => 4,
            PhaseId::PaymentMerge => 5,
            PhaseId::ZeroBalance => 6,
            PhaseId::FinalAmount => 7,
        }
    }

    /// Ratio slot written by this phase, if it produces ratios
    ///
    /// Phases 0 through 5 each own one slot. Zero-balance and final-amount
    /// phases never touch ratios.
    pub fn ratio_slot(&self) -> Option<usize> {
        match self {
            PhaseId::ZeroBalance | PhaseId::FinalAmount => None,
            other => Some(other.number() as usize),
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseId::InitialRatio => "initial-ratio",
            PhaseId::FullExclusion => "full-exclusion",
            PhaseId::Redistribution => "redistribution",
            PhaseId::ServiceFee => "service-fee",
            PhaseId::HierarchicalSplit => "hierarchical-split",
            PhaseId::PaymentMerge => "payment-merge",
            PhaseId::ZeroBalance => "zero-balance",
            PhaseId::FinalAmount => "final-amount",
        };
        write!(f, "phase {} ({})", self.number(), s)
    }
}

/// Why a record was removed from ratio math
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Address listed in an exclusion set
    ByConfiguration,

    /// Staking balance below the minimum delegation threshold
    ByMinDelegation,

    /// Current balance is zero and reactivation is disabled
    ByZeroBalance,
}

impl SkipReason {
    /// Human-readable description stored in `desc`
    pub fn description(&self) -> &'static str {
        match self {
            SkipReason::ByConfiguration => "Excluded by configuration",
            SkipReason::ByMinDelegation => "Excluded by min delegation",
            SkipReason::ByZeroBalance => "Excluded by zero balance",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Skip disposition of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipInfo {
    pub reason: SkipReason,
    pub phase: PhaseId,
}

/// One beneficiary's state across the phases of a calculation run
///
/// # Example
/// ```
/// use reward_distribution_core_rs::{PhaseId, RecordKind, RewardRecord};
///
/// let record = RewardRecord::new("tz1abc".to_string(), RecordKind::Delegator, 500, 20)
///     .with_ratio(PhaseId::InitialRatio, 0.25);
///
/// assert_eq!(record.payment_address(), "tz1abc");
/// assert_eq!(record.ratio(), 0.25);
/// assert!(!record.is_skipped());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    /// Beneficiary identity (immutable)
    address: String,

    /// Address funds are sent to
    payment_address: String,

    kind: RecordKind,

    /// Staking balance (i64 base units)
    staking_balance: i64,

    /// Current spendable balance (i64 base units)
    current_balance: i64,

    /// `ratio0..ratio5`, one slot per ratio-producing phase
    ratios: [Option<f64>; RATIO_SLOTS],

    /// Most recent ratio written by any phase
    ratio: f64,

    /// Fee rate applied to this record's share (fraction, 0..1)
    service_fee_rate: f64,

    /// Fee share of the total reward pool
    service_fee_ratio: f64,

    /// Fee amount (i64 base units)
    service_fee_amount: i64,

    /// Final payout, set once by the final-amount phase
    amount: Option<i64>,

    /// Deduction applied to `amount` (zero or negative)
    adjustment: i64,

    payable: bool,

    skip: Option<SkipInfo>,

    /// Zero-balance address that must be reactivated by the payment
    needs_activation: bool,

    cycle: u32,

    /// Constituent beneficiary addresses of a merged record
    merged_from: Vec<String>,
}

impl RewardRecord {
    /// Create a fresh record paying to its own address
    pub fn new(address: String, kind: RecordKind, staking_balance: i64, current_balance: i64) -> Self {
        Self {
            payment_address: address.clone(),
            address,
            kind,
            staking_balance,
            current_balance,
            ratios: [None; RATIO_SLOTS],
            ratio: 0.0,
            service_fee_rate: 0.0,
            service_fee_ratio: 0.0,
            service_fee_amount: 0,
            amount: None,
            adjustment: 0,
            payable: false,
            skip: None,
            needs_activation: false,
            cycle: 0,
            merged_from: Vec::new(),
        }
    }

    /// Set the reward cycle (builder)
    pub fn with_cycle(mut self, cycle: u32) -> Self {
        self.cycle = cycle;
        self
    }

    /// Set a ratio slot and the current ratio (builder)
    ///
    /// Phases without a ratio slot only update the current ratio.
    pub fn with_ratio(mut self, phase: PhaseId, ratio: f64) -> Self {
        self.set_ratio(phase, ratio);
        self
    }

    /// Redirect payments (builder)
    pub fn with_payment_address(mut self, payment_address: String) -> Self {
        self.payment_address = payment_address;
        self
    }

    /// Set the service fee ratio (builder)
    pub fn with_service_fee_ratio(mut self, service_fee_ratio: f64) -> Self {
        self.service_fee_ratio = service_fee_ratio;
        self
    }

    /// Mark as skipped (builder)
    pub fn skipped_at(mut self, reason: SkipReason, phase: PhaseId) -> Self {
        self.skip(reason, phase);
        self
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn payment_address(&self) -> &str {
        &self.payment_address
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn staking_balance(&self) -> i64 {
        self.staking_balance
    }

    pub fn current_balance(&self) -> i64 {
        self.current_balance
    }

    /// Current ratio (the last one written)
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Ratio written by `phase`, if any
    pub fn ratio_at(&self, phase: PhaseId) -> Option<f64> {
        phase.ratio_slot().and_then(|slot| self.ratios[slot])
    }

    pub fn service_fee_rate(&self) -> f64 {
        self.service_fee_rate
    }

    pub fn service_fee_ratio(&self) -> f64 {
        self.service_fee_ratio
    }

    pub fn service_fee_amount(&self) -> i64 {
        self.service_fee_amount
    }

    /// Final payout (None until the final-amount phase ran)
    pub fn amount(&self) -> Option<i64> {
        self.amount
    }

    pub fn adjustment(&self) -> i64 {
        self.adjustment
    }

    /// Amount actually transferred: `amount + adjustment`
    pub fn adjusted_amount(&self) -> Option<i64> {
        self.amount.map(|amount| amount + self.adjustment)
    }

    pub fn is_payable(&self) -> bool {
        self.payable
    }

    pub fn is_skipped(&self) -> bool {
        self.skip.is_some()
    }

    pub fn skip_info(&self) -> Option<SkipInfo> {
        self.skip
    }

    /// Phase that skipped this record
    pub fn skipped_phase(&self) -> Option<PhaseId> {
        self.skip.map(|s| s.phase)
    }

    /// Skip description (empty when not skipped)
    pub fn desc(&self) -> &'static str {
        self.skip.map(|s| s.reason.description()).unwrap_or("")
    }

    pub fn needs_activation(&self) -> bool {
        self.needs_activation
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn merged_from(&self) -> &[String] {
        &self.merged_from
    }

    // ========================================================================
    // Phase-side mutation (applied to fresh copies only)
    // ========================================================================

    pub(crate) fn set_ratio(&mut self, phase: PhaseId, ratio: f64) {
        if let Some(slot) = phase.ratio_slot() {
            self.ratios[slot] = Some(ratio);
        }
        self.ratio = ratio;
    }

    pub(crate) fn set_payment_address(&mut self, payment_address: String) {
        self.payment_address = payment_address;
    }

    pub(crate) fn set_service_fee(&mut self, rate: f64, ratio: f64) {
        self.service_fee_rate = rate;
        self.service_fee_ratio = ratio;
    }

    pub(crate) fn set_amounts(
        &mut self,
        amount: i64,
        adjustment: i64,
        service_fee_amount: i64,
        payable: bool,
    ) {
        self.amount = Some(amount);
        self.adjustment = adjustment;
        self.service_fee_amount = service_fee_amount;
        self.payable = payable;
    }

    pub(crate) fn set_needs_activation(&mut self) {
        self.needs_activation = true;
    }

    pub(crate) fn set_merged_from(&mut self, addresses: Vec<String>) {
        self.merged_from = addresses;
    }

    /// Skip this record; a record already skipped keeps its first disposition
    pub(crate) fn skip(&mut self, reason: SkipReason, phase: PhaseId) {
        if self.skip.is_some() {
            return;
        }
        self.skip = Some(SkipInfo { reason, phase });
        self.payable = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_pays_own_address() {
        let rec = RewardRecord::new("tz1a".to_string(), RecordKind::Delegator, 100, 50);
        assert_eq!(rec.address(), "tz1a");
        assert_eq!(rec.payment_address(), "tz1a");
        assert_eq!(rec.amount(), None);
        assert_eq!(rec.desc(), "");
    }

    #[test]
    fn test_ratio_slots_are_independent() {
        let rec = RewardRecord::new("tz1a".to_string(), RecordKind::Delegator, 100, 50)
            .with_ratio(PhaseId::InitialRatio, 0.5)
            .with_ratio(PhaseId::FullExclusion, 0.6);

        assert_eq!(rec.ratio_at(PhaseId::InitialRatio), Some(0.5));
        assert_eq!(rec.ratio_at(PhaseId::FullExclusion), Some(0.6));
        assert_eq!(rec.ratio_at(PhaseId::Redistribution), None);
        assert_eq!(rec.ratio(), 0.6);
    }

    #[test]
    fn test_first_skip_wins() {
        let rec = RewardRecord::new("tz1a".to_string(), RecordKind::Delegator, 100, 0)
            .skipped_at(SkipReason::ByConfiguration, PhaseId::FullExclusion)
            .skipped_at(SkipReason::ByZeroBalance, PhaseId::ZeroBalance);

        assert!(rec.is_skipped());
        assert_eq!(rec.desc(), "Excluded by configuration");
        assert_eq!(rec.skipped_phase(), Some(PhaseId::FullExclusion));
    }

    #[test]
    fn test_payable_kinds() {
        assert!(RecordKind::Delegator.is_payable_kind());
        assert!(RecordKind::Merged.is_payable_kind());
        assert!(!RecordKind::OwnersParent.is_payable_kind());
        assert!(RecordKind::FoundersParent.is_parent());
    }

    #[test]
    fn test_phase_ratio_slots() {
        assert_eq!(PhaseId::InitialRatio.ratio_slot(), Some(0));
        assert_eq!(PhaseId::PaymentMerge.ratio_slot(), Some(5));
        assert_eq!(PhaseId::ZeroBalance.ratio_slot(), None);
        assert_eq!(PhaseId::FinalAmount.ratio_slot(), None);
    }
}
