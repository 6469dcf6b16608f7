//! ARIMA models shared by the hybrid and decomposition detectors.

mod diff;
mod model;

pub use diff::{difference, integrate, level_tails};
pub use model::{Arima, ArimaOrder, ArimaState};
