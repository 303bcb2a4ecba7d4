//! Quadratic vote weighting.
//!
//! `weight = min(sqrt(credits) × multiplier, maxWeightCap × average)`
//!
//! Everything is integer fixed-point with a single rounding rule (toward
//! zero), so an offline preview and the authoritative ledger computation
//! produce the same bits for the same inputs.
//!
//! This crate handles:
//! - Fixed-point square root and widening multiply/divide
//! - Credit and multiplier validation
//! - The running-average weight cap

pub mod calculator;
pub mod error;
pub mod fixed;

pub use calculator::{TallySnapshot, WeightCalculator, WeightOutcome};
pub use error::WeightError;
pub use fixed::{isqrt, mul_div_floor, sqrt_wad};
