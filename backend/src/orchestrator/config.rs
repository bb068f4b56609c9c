//! Pipeline configuration
//!
//! Business rules for one baker, passed explicitly to the pipeline at
//! construction time. Validation runs before any phase so a bad configuration
//! never produces a partial payout.

use crate::core::ALMOST_ZERO;
use crate::models::record::{
    RecordKind, RewardRecord, SkipReason, FOUNDERS_PARENT_ADDRESS, OWNERS_PARENT_ADDRESS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Largest digit scale accepted for rounding (f64 keeps ~15 significant digits)
pub const MAX_ROUNDING_SCALE: u32 = 15;

/// Errors detected while validating a configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{map} shares sum to {sum}, expected 1.0")]
    ShareSumMismatch { map: &'static str, sum: f64 },

    #[error("{map} share {share} for {address} must be within [0, 1]")]
    InvalidShare {
        map: &'static str,
        address: String,
        share: f64,
    },

    #[error("address {address} is excluded but also listed in {map}")]
    ExcludedBeneficiary { address: String, map: &'static str },

    #[error("address {address} is listed under more than one exclusion policy")]
    ConflictingExclusion { address: String },

    #[error("service fee {fee} for {target} must be within [0, 100]")]
    InvalidServiceFee { target: String, fee: f64 },

    #[error("minimum delegation amount must be non-negative, got {0}")]
    InvalidMinDelegation(i64),

    #[error("{name} scale {scale} exceeds maximum {max}")]
    InvalidScale {
        name: &'static str,
        scale: u32,
        max: u32,
    },

    #[error("reserved address {address} cannot appear in {field}")]
    ReservedAddress { address: String, field: &'static str },

    #[error("adjustment for {address} must be a non-negative deduction, got {amount}")]
    InvalidAdjustment { address: String, amount: i64 },

    #[error("Config parse failed: {0}")]
    Parse(String),
}

/// Where an excluded record's share goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionPolicy {
    /// Share stays with the baker; the distributed pool shrinks
    #[default]
    ToBaker,

    /// Share is redistributed to every remaining beneficiary
    ToEveryone,

    /// Share is handed to the founders
    ToFounders,
}

/// Minimum staking balance a delegator needs to be paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinDelegationRule {
    /// Threshold (i64 base units); strictly smaller balances are excluded
    pub amount: i64,

    #[serde(default)]
    pub policy: ExclusionPolicy,
}

/// Exclusion sets, one per policy, plus the min-delegation rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExclusionRules {
    #[serde(default)]
    pub to_baker: BTreeSet<String>,

    #[serde(default)]
    pub to_everyone: BTreeSet<String>,

    #[serde(default)]
    pub to_founders: BTreeSet<String>,

    #[serde(default)]
    pub min_delegation: Option<MinDelegationRule>,
}

impl ExclusionRules {
    /// Skip reason if `record` is excluded under `policy`
    ///
    /// Explicit address listings win over the min-delegation rule. The
    /// threshold only applies to delegators.
    pub fn exclusion_for(&self, record: &RewardRecord, policy: ExclusionPolicy) -> Option<SkipReason> {
        let listed = match policy {
            ExclusionPolicy::ToBaker => &self.to_baker,
            ExclusionPolicy::ToEveryone => &self.to_everyone,
            ExclusionPolicy::ToFounders => &self.to_founders,
        };
        if listed.contains(record.address()) {
            return Some(SkipReason::ByConfiguration);
        }

        match self.min_delegation {
            Some(rule)
                if rule.policy == policy
                    && record.kind() == RecordKind::Delegator
                    && !self.is_listed(record.address())
                    && record.staking_balance() < rule.amount =>
            {
                Some(SkipReason::ByMinDelegation)
            }
            _ => None,
        }
    }

    /// Whether `address` appears in any exclusion set
    pub fn is_listed(&self, address: &str) -> bool {
        self.to_baker.contains(address)
            || self.to_everyone.contains(address)
            || self.to_founders.contains(address)
    }

    fn all_listed(&self) -> impl Iterator<Item = &String> {
        self.to_baker
            .iter()
            .chain(self.to_everyone.iter())
            .chain(self.to_founders.iter())
    }
}

/// Baker's service fee schedule (percentages)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceFeeConfig {
    /// Fee charged to every delegator not listed below (percent)
    #[serde(default)]
    pub standard_fee: f64,

    /// Delegators exempt from any fee
    #[serde(default)]
    pub supporters: BTreeSet<String>,

    /// Per-delegator fee overrides (percent)
    #[serde(default)]
    pub specials: BTreeMap<String, f64>,
}

/// Complete pipeline configuration
///
/// # Example
/// ```
/// use reward_distribution_core_rs::PipelineConfig;
///
/// let config = PipelineConfig::default()
///     .with_owner("tz1owner", 1.0)
///     .with_founder("tz1founder", 1.0)
///     .with_standard_fee(5.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Owner address -> share of the owners pool
    #[serde(default)]
    pub owners_map: BTreeMap<String, f64>,

    /// Founder address -> share of the founders pool
    #[serde(default)]
    pub founders_map: BTreeMap<String, f64>,

    #[serde(default)]
    pub exclusions: ExclusionRules,

    /// Beneficiary address -> payout address
    #[serde(default)]
    pub payment_redirects: BTreeMap<String, String>,

    /// Reactivate zero-balance delegators instead of skipping them
    #[serde(default)]
    pub reactivate_zero_balances: bool,

    /// Digits kept when rounding payout amounts (None = pass-through)
    #[serde(default)]
    pub rounding_scale: Option<u32>,

    /// Digits kept when rounding service fee amounts (None = pass-through)
    #[serde(default)]
    pub fee_scale: Option<u32>,

    #[serde(default)]
    pub service_fee: ServiceFeeConfig,

    /// Address -> amount deducted from its payout (base units)
    #[serde(default)]
    pub adjustments: BTreeMap<String, i64>,
}

impl PipelineConfig {
    /// Parse a configuration from JSON (not validated)
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn with_owner(mut self, address: &str, share: f64) -> Self {
        self.owners_map.insert(address.to_string(), share);
        self
    }

    pub fn with_founder(mut self, address: &str, share: f64) -> Self {
        self.founders_map.insert(address.to_string(), share);
        self
    }

    /// Exclude addresses entirely (share stays with the baker)
    pub fn with_excluded_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions
            .to_baker
            .extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Exclude addresses and redistribute their share to everyone
    pub fn with_redistributed_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions
            .to_everyone
            .extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Exclude addresses and hand their share to the founders
    pub fn with_founder_redirected_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions
            .to_founders
            .extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn with_min_delegation(mut self, amount: i64, policy: ExclusionPolicy) -> Self {
        self.exclusions.min_delegation = Some(MinDelegationRule { amount, policy });
        self
    }

    pub fn with_payment_redirect(mut self, from: &str, to: &str) -> Self {
        self.payment_redirects
            .insert(from.to_string(), to.to_string());
        self
    }

    pub fn with_reactivate_zero_balances(mut self, reactivate: bool) -> Self {
        self.reactivate_zero_balances = reactivate;
        self
    }

    pub fn with_rounding_scale(mut self, scale: Option<u32>) -> Self {
        self.rounding_scale = scale;
        self
    }

    pub fn with_fee_scale(mut self, scale: Option<u32>) -> Self {
        self.fee_scale = scale;
        self
    }

    pub fn with_standard_fee(mut self, percent: f64) -> Self {
        self.service_fee.standard_fee = percent;
        self
    }

    /// Deduct `amount` from the payout of `address`
    pub fn with_adjustment(mut self, address: &str, amount: i64) -> Self {
        self.adjustments.insert(address.to_string(), amount);
        self
    }

    /// Validate configuration
    ///
    /// Checks:
    /// - owners/founders shares are within [0, 1] and sum to 1.0 (empty maps allowed)
    /// - no address is both excluded and an owner/founder
    /// - no address is listed under two exclusion policies
    /// - placeholder addresses are never configured as beneficiaries
    /// - adjustments are non-negative deductions
    /// - service fees are percentages within [0, 100]
    /// - min delegation amount and rounding scales are sane
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::validate_shares("owners_map", &self.owners_map)?;
        Self::validate_shares("founders_map", &self.founders_map)?;
        self.validate_reserved()?;

        let mut seen = BTreeSet::new();
        for address in self.exclusions.all_listed() {
            if !seen.insert(address.as_str()) {
                return Err(ConfigError::ConflictingExclusion {
                    address: address.clone(),
                });
            }
            if self.owners_map.contains_key(address) {
                return Err(ConfigError::ExcludedBeneficiary {
                    address: address.clone(),
                    map: "owners_map",
                });
            }
            if self.founders_map.contains_key(address) {
                return Err(ConfigError::ExcludedBeneficiary {
                    address: address.clone(),
                    map: "founders_map",
                });
            }
        }

        if let Some(rule) = self.exclusions.min_delegation {
            if rule.amount < 0 {
                return Err(ConfigError::InvalidMinDelegation(rule.amount));
            }
        }

        Self::validate_fee("standard", self.service_fee.standard_fee)?;
        for (address, fee) in &self.service_fee.specials {
            Self::validate_fee(address, *fee)?;
        }

        for (address, amount) in &self.adjustments {
            if *amount < 0 {
                return Err(ConfigError::InvalidAdjustment {
                    address: address.clone(),
                    amount: *amount,
                });
            }
        }

        for (name, scale) in [("rounding", self.rounding_scale), ("fee", self.fee_scale)] {
            if let Some(scale) = scale {
                if scale > MAX_ROUNDING_SCALE {
                    return Err(ConfigError::InvalidScale {
                        name,
                        scale,
                        max: MAX_ROUNDING_SCALE,
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_reserved(&self) -> Result<(), ConfigError> {
        let fields: [(&'static str, Vec<&String>); 7] = [
            ("owners_map", self.owners_map.keys().collect()),
            ("founders_map", self.founders_map.keys().collect()),
            ("exclusions.to_baker", self.exclusions.to_baker.iter().collect()),
            ("exclusions.to_everyone", self.exclusions.to_everyone.iter().collect()),
            ("exclusions.to_founders", self.exclusions.to_founders.iter().collect()),
            (
                "payment_redirects",
                self.payment_redirects
                    .iter()
                    .flat_map(|(from, to)| [from, to])
                    .collect(),
            ),
            ("adjustments", self.adjustments.keys().collect()),
        ];

        for (field, addresses) in fields {
            if let Some(address) = addresses
                .into_iter()
                .find(|a| a.as_str() == OWNERS_PARENT_ADDRESS || a.as_str() == FOUNDERS_PARENT_ADDRESS)
            {
                return Err(ConfigError::ReservedAddress {
                    address: address.clone(),
                    field,
                });
            }
        }
        Ok(())
    }

    fn validate_shares(map: &'static str, shares: &BTreeMap<String, f64>) -> Result<(), ConfigError> {
        if shares.is_empty() {
            return Ok(());
        }

        for (address, share) in shares {
            if !share.is_finite() || *share < 0.0 || *share > 1.0 {
                return Err(ConfigError::InvalidShare {
                    map,
                    address: address.clone(),
                    share: *share,
                });
            }
        }

        let sum: f64 = shares.values().sum();
        if (sum - 1.0).abs() > ALMOST_ZERO {
            return Err(ConfigError::ShareSumMismatch { map, sum });
        }
        Ok(())
    }

    fn validate_fee(target: &str, fee: f64) -> Result<(), ConfigError> {
        if !fee.is_finite() || !(0.0..=100.0).contains(&fee) {
            return Err(ConfigError::InvalidServiceFee {
                target: target.to_string(),
                fee,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_share_sum_mismatch() {
        let config = PipelineConfig::default()
            .with_owner("tz1a", 0.6)
            .with_owner("tz1b", 0.3);

        match config.validate() {
            Err(ConfigError::ShareSumMismatch { map, .. }) => assert_eq!(map, "owners_map"),
            other => panic!("expected ShareSumMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_excluded_founder_rejected() {
        let config = PipelineConfig::default()
            .with_founder("tz1f", 1.0)
            .with_excluded_addresses(["tz1f"]);

        assert_eq!(
            config.validate(),
            Err(ConfigError::ExcludedBeneficiary {
                address: "tz1f".to_string(),
                map: "founders_map",
            })
        );
    }

    #[test]
    fn test_address_under_two_policies_rejected() {
        let config = PipelineConfig::default()
            .with_excluded_addresses(["tz1x"])
            .with_redistributed_addresses(["tz1x"]);

        assert_eq!(
            config.validate(),
            Err(ConfigError::ConflictingExclusion {
                address: "tz1x".to_string()
            })
        );
    }

    #[test]
    fn test_placeholder_address_cannot_be_excluded() {
        let config = PipelineConfig::default().with_excluded_addresses([OWNERS_PARENT_ADDRESS]);

        assert_eq!(
            config.validate(),
            Err(ConfigError::ReservedAddress {
                address: OWNERS_PARENT_ADDRESS.to_string(),
                field: "exclusions.to_baker",
            })
        );
    }

    #[test]
    fn test_placeholder_address_cannot_be_redirect_target() {
        let config = PipelineConfig::default().with_payment_redirect("tz1a", FOUNDERS_PARENT_ADDRESS);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ReservedAddress {
                field: "payment_redirects",
                ..
            })
        ));
    }

    #[test]
    fn test_negative_adjustment_rejected() {
        let config = PipelineConfig::default().with_adjustment("tz1a", -5);

        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidAdjustment {
                address: "tz1a".to_string(),
                amount: -5,
            })
        );
    }

    #[test]
    fn test_min_delegation_only_applies_to_its_policy() {
        let rules = ExclusionRules {
            min_delegation: Some(MinDelegationRule {
                amount: 1_000,
                policy: ExclusionPolicy::ToEveryone,
            }),
            ..Default::default()
        };
        let small = RewardRecord::new("tz1small".to_string(), RecordKind::Delegator, 10, 10);

        assert_eq!(rules.exclusion_for(&small, ExclusionPolicy::ToBaker), None);
        assert_eq!(
            rules.exclusion_for(&small, ExclusionPolicy::ToEveryone),
            Some(SkipReason::ByMinDelegation)
        );
    }

    #[test]
    fn test_min_delegation_ignores_parents() {
        let rules = ExclusionRules {
            min_delegation: Some(MinDelegationRule {
                amount: 1_000,
                policy: ExclusionPolicy::ToBaker,
            }),
            ..Default::default()
        };
        let parent = RewardRecord::new("OWNERS_PARENT".to_string(), RecordKind::OwnersParent, 0, 0);

        assert_eq!(rules.exclusion_for(&parent, ExclusionPolicy::ToBaker), None);
    }
}
