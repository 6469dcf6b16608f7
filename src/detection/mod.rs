//! Anomaly scoring building blocks.
//!
//! - Residual scoring rules: interval exceedance, same-hour z-score, MAD
//!   and sigma bounds
//! - Isolation forest for classifier-based residual scoring

mod isolation_forest;
mod scoring;

pub use isolation_forest::{ForestState, IsolationForest};
pub use scoring::{
    interval_exceedance, same_hour_zscore, sigma_bound, MadThreshold, SameHourConfig,
};
