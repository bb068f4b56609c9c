//! Reward Phases
//!
//! Each phase applies exactly one business rule to the record list of a
//! calculation run.
//!
//! # Phase Interface
//!
//! All phases implement the [`Phase`] trait: records in, fresh records out,
//! together with the running reward total. A phase never mutates its input.
//!
//! ```rust
//! use reward_distribution_core_rs::phases::{Phase, PhaseError, PhaseOutput};
//! use reward_distribution_core_rs::{PhaseId, RewardRecord};
//!
//! struct Passthrough;
//!
//! impl Phase for Passthrough {
//!     fn id(&self) -> PhaseId {
//!         PhaseId::ZeroBalance
//!     }
//!
//!     fn calculate(
//!         &self,
//!         records: &[RewardRecord],
//!         total_amount: i64,
//!     ) -> Result<PhaseOutput, PhaseError> {
//!         Ok((records.to_vec(), total_amount))
//!     }
//! }
//! ```
//!
//! # Phases (in execution order)
//!
//! 0. **InitialRatio**: staking share of every delegator + owners placeholder
//! 1. **FullExclusion**: excluded share leaves the pool (total shrinks)
//! 2. **Redistribution**: excluded share is spread over everyone else
//! 3. **ServiceFee**: fees and founders-excluded shares form the founders placeholder
//! 4. **HierarchicalSplit**: placeholders expand into owners and founders
//! 5. **PaymentMerge**: payment redirects, records sharing a payout address merge
//! 6. **ZeroBalance**: zero-balance delegators are reactivated or skipped
//! 7. **FinalAmount**: ratios become integer amounts, rounded down
//!
//! # Critical Invariants
//!
//! 1. Ratios of non-skipped records sum to 1.0 after every ratio-producing phase
//! 2. Skipped records are carried forward verbatim
//! 3. Amounts are set once, and never exceed the total when summed

use crate::models::record::{PhaseId, RecordKind, RewardRecord};
use thiserror::Error;

pub mod final_amount;
pub mod full_exclusion;
pub mod hierarchical_split;
pub mod initial_ratio;
pub mod payment_merge;
pub mod redistribution;
pub mod service_fee;
pub mod zero_balance;

pub use final_amount::FinalAmountPhase;
pub use full_exclusion::FullExclusionPhase;
pub use hierarchical_split::HierarchicalSplitPhase;
pub use initial_ratio::InitialRatioPhase;
pub use payment_merge::PaymentAddressMergePhase;
pub use redistribution::PartialExclusionRedistributionPhase;
pub use service_fee::{ServiceFeeCalculator, ServiceFeePhase};
pub use zero_balance::{is_contract_address, ZeroBalancePhase};

/// Records plus running reward total, as produced by a phase
pub type PhaseOutput = (Vec<RewardRecord>, i64);

/// Errors raised inside a phase
#[derive(Debug, Error, PartialEq)]
pub enum PhaseError {
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("{phase} cannot handle {kind} record {address}")]
    UnexpectedRecordKind {
        phase: PhaseId,
        kind: RecordKind,
        address: String,
    },

    #[error("{phase}: exclusions leave no reward share to distribute")]
    NoRemainingRatio { phase: PhaseId },

    #[error("{phase}: invariant violated: {detail}")]
    InvariantViolation { phase: PhaseId, detail: String },
}

/// A single business rule over the record list
pub trait Phase: Send + Sync {
    /// Identifier (position in the pipeline, ratio slot owned)
    fn id(&self) -> PhaseId;

    /// Apply the rule
    ///
    /// # Arguments
    ///
    /// * `records` - Output of the previous phase
    /// * `total_amount` - Running reward total (i64 base units)
    ///
    /// # Returns
    ///
    /// Fresh record list and the (possibly updated) total
    fn calculate(&self, records: &[RewardRecord], total_amount: i64) -> Result<PhaseOutput, PhaseError>;
}

/// Records still taking part in ratio math
pub fn active(records: &[RewardRecord]) -> impl Iterator<Item = &RewardRecord> {
    records.iter().filter(|r| !r.is_skipped())
}

/// Records already skipped
pub fn skipped(records: &[RewardRecord]) -> impl Iterator<Item = &RewardRecord> {
    records.iter().filter(|r| r.is_skipped())
}

/// Sum of the ratios written by `phase` over non-skipped records
///
/// Records missing the slot count as zero.
pub fn ratio_sum(records: &[RewardRecord], phase: PhaseId) -> f64 {
    active(records)
        .map(|r| r.ratio_at(phase).unwrap_or(0.0))
        .sum()
}
