//! # anofox-anomaly
//!
//! Anomaly detection for periodic operational counters (hourly KPIs).
//!
//! Each model forecasts expected behaviour and scores the deviation of every
//! observation as a signed label: above, normal or below expectation.
//!
//! - Additive trend + seasonality + holiday forecaster with interval or
//!   same-hour z-score scoring
//! - ARIMA with isolation-forest residual classification
//! - MSTL decomposition with an ARMA remainder and a sigma bound
//!
//! Around the models sit series preparation (gap filling, splitting),
//! Gregorian/Persian date handling, versioned model artifacts, YAML KPI
//! configuration and a CSV data connector.
//!
//! # Example
//!
//! ```
//! use anofox_anomaly::prelude::*;
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let timestamps: Vec<_> = (0..48).map(|i| base + Duration::hours(i)).collect();
//! let values: Vec<f64> = (0..48).map(|i| if i % 2 == 0 { 11.0 } else { 9.0 }).collect();
//! let series = TimeSeries::new(timestamps, values).unwrap();
//!
//! let ctx = RunContext::new("kpi_a");
//! let mut model = select(Some("prophet")).unwrap();
//! model.fit(&series, &ctx).unwrap();
//! let scored = model.predict(&series, &ctx).unwrap();
//! assert_eq!(scored.len(), 48);
//! ```

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::manual_memcpy)]

pub mod calendar;
pub mod config;
pub mod connector;
pub mod context;
pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod persistence;
pub mod preprocess;
pub mod seasonality;
pub mod service;
pub mod utils;

pub use error::{AnomalyError, ErrorKind, Result};

pub mod prelude {
    pub use crate::calendar::Calendar;
    pub use crate::context::RunContext;
    pub use crate::core::{AnomalyLabel, Forecast, ScoredPoint, ScoredSeries, TimeSeries};
    pub use crate::error::{AnomalyError, ErrorKind, Result};
    pub use crate::models::{select, AnomalyModel, KpiModel, ModelArtifact, ModelKind};
    pub use crate::preprocess::{fill_gaps, split, ColumnMapping};
}
