//! Verdict derivation
//!
//! Output normalization and result aggregation, both pure functions over
//! already collected evidence.

pub mod aggregate;
pub mod normalize;
