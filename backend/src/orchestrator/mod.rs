//! Orchestrator - runs the phase chain for one reward cycle
//!
//! See `engine.rs` for the run loop and `config.rs` for business rules.

pub mod audit;
pub mod config;
pub mod engine;

// Re-export main types for convenience
pub use audit::compute_digest;
pub use config::{
    ConfigError, ExclusionPolicy, ExclusionRules, MinDelegationRule, PipelineConfig,
    ServiceFeeConfig,
};
pub use engine::{check_ratio_invariant, CalculationReport, Pipeline, PipelineError};
