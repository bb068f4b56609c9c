//! Pipeline Engine
//!
//! Runs one calculation per reward cycle:
//!
//! ```text
//! snapshot
//!   → 0 InitialRatio        (ratio0)
//!   → 1 FullExclusion       (ratio1, total shrinks)
//!   → 2 Redistribution      (ratio2)
//!   → 3 ServiceFee          (ratio3, founders placeholder)
//!   → 4 HierarchicalSplit   (ratio4, owners/founders expanded)
//!   → 5 PaymentMerge        (ratio5, redirects + merges)
//!   → 6 ZeroBalance         (activation / skip)
//!   → 7 FinalAmount         (integer amounts)
//!   → payouts
//! ```
//!
//! The engine owns no business rule. It feeds each phase the previous phase's
//! output and checks the ratio invariant after every ratio-producing phase.
//! A violation halts the run: operators rerun the cycle rather than risk a
//! mis-payment.
//!
//! # Example
//!
//! ```rust
//! use reward_distribution_core_rs::{DelegatorBalance, Pipeline, PipelineConfig, RewardSnapshot};
//!
//! let config = PipelineConfig::default().with_owner("tz1baker", 1.0);
//! let pipeline = Pipeline::new(config).unwrap();
//!
//! let snapshot = RewardSnapshot::new(
//!     500,
//!     10_000,
//!     1_000,
//!     vec![
//!         DelegatorBalance::new("tz1alice", 5_000, 10),
//!         DelegatorBalance::new("tz1bob", 2_500, 10),
//!     ],
//! );
//!
//! let report = pipeline.run(&snapshot).unwrap();
//! assert_eq!(report.payable_total(), 1_000);
//! ```

use crate::core::rounding::RoundingPolicy;
use crate::core::ALMOST_ZERO;
use crate::models::payout::Payout;
use crate::models::record::{PhaseId, RewardRecord};
use crate::models::snapshot::RewardSnapshot;
use crate::orchestrator::audit::compute_digest;
use crate::orchestrator::config::{ConfigError, PipelineConfig};
use crate::phases::{
    active, FinalAmountPhase, FullExclusionPhase, HierarchicalSplitPhase, InitialRatioPhase,
    PartialExclusionRedistributionPhase, PaymentAddressMergePhase, Phase, PhaseError,
    ServiceFeeCalculator, ServiceFeePhase, ZeroBalancePhase,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors that halt a calculation run
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("Phase error: {0}")]
    Phase(#[from] PhaseError),

    #[error("{phase}: ratios of non-skipped records sum to {sum}, expected 1.0")]
    RatioSumViolation { phase: PhaseId, sum: f64 },

    #[error("{phase}: non-skipped record {address} has no ratio for this phase")]
    MissingRatio { phase: PhaseId, address: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Result of one calculation run
///
/// `payouts` carries every beneficiary exactly once: payable records first,
/// skipped records last. `digest` is a SHA-256 over the payouts so the
/// persistence collaborator can recognize a cycle it already paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationReport {
    /// Unique identifier of this run
    pub run_id: Uuid,

    pub cycle: u32,

    /// Reward pool as delivered by the snapshot
    pub total_reward_pool: i64,

    /// Total after exclusions that shrink the pool
    pub total_amount: i64,

    /// SHA-256 of the configuration used
    pub config_hash: String,

    /// SHA-256 of `payouts`
    pub digest: String,

    pub payouts: Vec<Payout>,

    /// Full record state for audit
    pub records: Vec<RewardRecord>,
}

impl CalculationReport {
    /// Records that will receive a transfer
    pub fn payable(&self) -> impl Iterator<Item = &Payout> {
        self.payouts.iter().filter(|p| p.payable)
    }

    /// Records skipped by some phase
    pub fn skipped(&self) -> impl Iterator<Item = &Payout> {
        self.payouts.iter().filter(|p| p.skipped)
    }

    /// Sum of payable transfers (never above `total_amount`)
    pub fn payable_total(&self) -> i64 {
        self.payable().map(|p| p.adjusted_amount).sum()
    }
}

/// Ordered phase chain plus configuration
pub struct Pipeline {
    config: PipelineConfig,
    config_hash: String,
    phases: Vec<Box<dyn Phase>>,
}

impl Pipeline {
    /// Create a pipeline with the standard phase order
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Configuration valid
    /// * `Err(PipelineError::Config)` - Validation failed; no phase will run
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let rules = config.exclusions.clone();
        let phases: Vec<Box<dyn Phase>> = vec![
            Box::new(FullExclusionPhase::new(rules.clone())),
            Box::new(PartialExclusionRedistributionPhase::new(rules.clone())),
            Box::new(ServiceFeePhase::new(
                ServiceFeeCalculator::new(&config.service_fee),
                rules,
            )),
            Box::new(HierarchicalSplitPhase::new(
                config.owners_map.clone(),
                config.founders_map.clone(),
            )),
            Box::new(PaymentAddressMergePhase::new(config.payment_redirects.clone())),
            Box::new(ZeroBalancePhase::new(config.reactivate_zero_balances)),
            Box::new(
                FinalAmountPhase::new(
                    RoundingPolicy::new(config.rounding_scale),
                    RoundingPolicy::new(config.fee_scale),
                )
                .with_adjustments(config.adjustments.clone()),
            ),
        ];

        Self::with_phases(config, phases)
    }

    /// Create a pipeline with a custom phase chain (after the initial phase)
    pub fn with_phases(config: PipelineConfig, phases: Vec<Box<dyn Phase>>) -> Result<Self, PipelineError> {
        config.validate()?;
        let config_hash = compute_digest(&config)?;

        Ok(Self {
            config,
            config_hash,
            phases,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Phase identifiers in execution order, initial phase included
    pub fn phase_ids(&self) -> Vec<PhaseId> {
        std::iter::once(PhaseId::InitialRatio)
            .chain(self.phases.iter().map(|p| p.id()))
            .collect()
    }

    /// Run every phase over `snapshot`
    ///
    /// # Errors
    ///
    /// Any phase error, and any ratio-sum deviation beyond 1e-6, aborts the run.
    pub fn run(&self, snapshot: &RewardSnapshot) -> Result<CalculationReport, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, cycle = snapshot.cycle, delegators = snapshot.delegators.len(), "calculation started");

        let initial = InitialRatioPhase::new(snapshot.clone());
        let (mut records, mut total_amount) = initial.calculate(&[], snapshot.total_reward_pool)?;
        check_ratio_invariant(PhaseId::InitialRatio, &records)?;

        for phase in &self.phases {
            let (next_records, next_total) = phase.calculate(&records, total_amount)?;
            records = next_records;
            total_amount = next_total;

            check_ratio_invariant(phase.id(), &records)?;
            debug!(phase = %phase.id(), records = records.len(), total_amount, "phase completed");
        }

        let payouts: Vec<Payout> = records.iter().map(Payout::from).collect();
        let digest = compute_digest(&payouts)?;

        let report = CalculationReport {
            run_id,
            cycle: snapshot.cycle,
            total_reward_pool: snapshot.total_reward_pool,
            total_amount,
            config_hash: self.config_hash.clone(),
            digest,
            payouts,
            records,
        };

        info!(
            %run_id,
            cycle = report.cycle,
            payable = report.payable().count(),
            skipped = report.skipped().count(),
            payable_total = report.payable_total(),
            total_amount,
            "calculation finished"
        );

        Ok(report)
    }
}

/// Check that non-skipped ratios of `phase` sum to 1.0
///
/// Phases without a ratio slot and record lists with no non-skipped record
/// pass trivially.
pub fn check_ratio_invariant(phase: PhaseId, records: &[RewardRecord]) -> Result<(), PipelineError> {
    if phase.ratio_slot().is_none() {
        return Ok(());
    }

    let mut sum = 0.0;
    let mut any = false;
    for record in active(records) {
        any = true;
        match record.ratio_at(phase) {
            Some(ratio) => sum += ratio,
            None => {
                return Err(PipelineError::MissingRatio {
                    phase,
                    address: record.address().to_string(),
                })
            }
        }
    }

    if any && (sum - 1.0).abs() > ALMOST_ZERO {
        return Err(PipelineError::RatioSumViolation { phase, sum });
    }
    Ok(())
}
