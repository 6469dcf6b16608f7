//! Core data structures: series, forecasts and scored output.

mod forecast;
mod scored;
mod time_series;

pub use forecast::Forecast;
pub use scored::{AnomalyLabel, ScoredPoint, ScoredSeries};
pub use time_series::TimeSeries;
