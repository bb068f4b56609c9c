//! Rounding policy for ratios and fee ratios
//!
//! Every rounding step in the pipeline truncates toward zero. Cumulative
//! rounding can therefore only under-pay the funding source, never over-pay it.

use serde::{Deserialize, Serialize};

/// Truncates values to a configured number of decimal digits
///
/// # Example
/// ```
/// use reward_distribution_core_rs::RoundingPolicy;
///
/// let policy = RoundingPolicy::new(Some(2));
/// assert_eq!(policy.round(0.125), 0.12);
///
/// let passthrough = RoundingPolicy::new(None);
/// assert_eq!(passthrough.round(0.125), 0.125);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundingPolicy {
    /// Number of decimal digits kept (None = pass-through)
    scale: Option<u32>,
}

impl RoundingPolicy {
    /// Create a policy keeping `scale` decimal digits
    pub fn new(scale: Option<u32>) -> Self {
        Self { scale }
    }

    /// Pass-through policy
    pub fn passthrough() -> Self {
        Self { scale: None }
    }

    /// Configured digit scale
    pub fn scale(&self) -> Option<u32> {
        self.scale
    }

    /// Round `value` toward zero at the configured scale
    ///
    /// # Example
    /// ```
    /// use reward_distribution_core_rs::RoundingPolicy;
    ///
    /// let policy = RoundingPolicy::new(Some(0));
    /// assert_eq!(policy.round(7.99), 7.0);
    /// assert_eq!(policy.round(-7.99), -7.0);
    /// ```
    pub fn round(&self, value: f64) -> f64 {
        match self.scale {
            Some(digits) => {
                let factor = 10f64.powi(digits as i32);
                (value * factor).trunc() / factor
            }
            None => value,
        }
    }
}
