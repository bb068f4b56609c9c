//! Domain models for the reward pipeline

pub mod payout;
pub mod record;
pub mod snapshot;

// Re-exports
pub use payout::Payout;
pub use record::{PhaseId, RecordKind, RewardRecord, SkipInfo, SkipReason};
pub use snapshot::{DelegatorBalance, RewardSnapshot};
