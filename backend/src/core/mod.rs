//! Core numeric primitives shared by every phase

pub mod rounding;

/// Tolerance used for every ratio-sum comparison in the pipeline
pub const ALMOST_ZERO: f64 = 1e-6;
