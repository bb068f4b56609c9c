//! Reward Distribution Core - Rust Engine
//!
//! Distributes a baking reward pool among delegators, owners and founders with
//! exact, rounding-safe payout amounts.
//!
//! # Architecture
//!
//! - **core**: Rounding policy and numeric tolerances
//! - **models**: Domain types (RewardRecord, RewardSnapshot, Payout)
//! - **phases**: One business rule per phase (exclusions, fees, splits, merges)
//! - **orchestrator**: Configuration, phase chain, audit digests
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (base units)
//! 2. Non-skipped ratios sum to 1.0 after every ratio-producing phase
//! 3. Rounding only ever truncates: payouts never exceed the total
//! 4. Phases never mutate their input

// Module declarations
pub mod core;
pub mod models;
pub mod orchestrator;
pub mod phases;

// Re-exports for convenience
pub use crate::core::rounding::RoundingPolicy;
pub use models::{
    payout::Payout,
    record::{PhaseId, RecordKind, RewardRecord, SkipInfo, SkipReason},
    snapshot::{DelegatorBalance, RewardSnapshot},
};
pub use orchestrator::{
    CalculationReport, ConfigError, ExclusionPolicy, ExclusionRules, Pipeline, PipelineConfig,
    PipelineError,
};
pub use phases::{Phase, PhaseError};
