//! Numeric helpers shared by the detectors.

pub mod linalg;
pub mod optimization;
pub mod stats;

pub use linalg::{dot, ridge_least_squares, solve_spd};
pub use optimization::{Minimum, NelderMead};
pub use stats::{abs_max, mad, mean, median, population_std, quantile, std_dev, variance};
