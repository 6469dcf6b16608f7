//! Anomaly models.
//!
//! - [`AdditiveSeasonalForecaster`]: trend, Fourier seasonality and holiday
//!   regression with interval or same-hour z-score scoring
//! - [`HybridResidualClassifier`]: ARIMA with isolation-forest residual scoring
//! - [`MultiSeasonalDecompositionDetector`]: MSTL with an ARMA remainder and a
//!   sigma bound
//!
//! [`select`] maps a configured identifier to a [`KpiModel`].

mod traits;

pub mod additive;
pub mod arima;
pub mod decomposition;
pub mod hybrid;
pub mod selector;

pub use additive::{AdditivePolicy, AdditiveSeasonalForecaster, AdditiveState, FourierTerm};
pub use decomposition::{DecompositionState, MultiSeasonalDecompositionDetector, SeasonalCycle};
pub use hybrid::{HybridResidualClassifier, HybridState, ResidualRule};
pub use selector::{parse_model_kind, select, KpiModel};
pub use traits::{AnomalyModel, ModelArtifact, ModelKind, ModelState, ARTIFACT_FORMAT_VERSION};
