//! Mapping from configured model identifiers to concrete models.
//!
//! # Example
//!
//! ```
//! use anofox_anomaly::models::{select, AnomalyModel, ModelKind};
//!
//! let model = select(Some("mstl")).unwrap();
//! assert_eq!(model.kind(), ModelKind::Decomposition);
//! assert!(select(Some("lstm")).is_err());
//! ```

use super::additive::AdditiveSeasonalForecaster;
use super::decomposition::MultiSeasonalDecompositionDetector;
use super::hybrid::HybridResidualClassifier;
use super::traits::{AnomalyModel, ModelArtifact, ModelKind};
use crate::context::RunContext;
use crate::core::{ScoredSeries, TimeSeries};
use crate::error::{AnomalyError, Result};

/// One of the three anomaly models, chosen at construction time.
#[derive(Debug, Clone)]
pub enum KpiModel {
    Additive(AdditiveSeasonalForecaster),
    Hybrid(HybridResidualClassifier),
    Decomposition(MultiSeasonalDecompositionDetector),
}

impl KpiModel {
    /// Default-configured model of the given kind.
    pub fn from_kind(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Additive => KpiModel::Additive(AdditiveSeasonalForecaster::new()),
            ModelKind::Hybrid => KpiModel::Hybrid(HybridResidualClassifier::new()),
            ModelKind::Decomposition => {
                KpiModel::Decomposition(MultiSeasonalDecompositionDetector::new())
            }
        }
    }

    fn inner(&self) -> &dyn AnomalyModel {
        match self {
            KpiModel::Additive(m) => m,
            KpiModel::Hybrid(m) => m,
            KpiModel::Decomposition(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AnomalyModel {
        match self {
            KpiModel::Additive(m) => m,
            KpiModel::Hybrid(m) => m,
            KpiModel::Decomposition(m) => m,
        }
    }
}

impl Default for KpiModel {
    fn default() -> Self {
        KpiModel::from_kind(ModelKind::Additive)
    }
}

impl From<AdditiveSeasonalForecaster> for KpiModel {
    fn from(model: AdditiveSeasonalForecaster) -> Self {
        KpiModel::Additive(model)
    }
}

impl From<HybridResidualClassifier> for KpiModel {
    fn from(model: HybridResidualClassifier) -> Self {
        KpiModel::Hybrid(model)
    }
}

impl From<MultiSeasonalDecompositionDetector> for KpiModel {
    fn from(model: MultiSeasonalDecompositionDetector) -> Self {
        KpiModel::Decomposition(model)
    }
}

impl AnomalyModel for KpiModel {
    fn fit(&mut self, train: &TimeSeries, ctx: &RunContext) -> Result<()> {
        self.inner_mut().fit(train, ctx)
    }

    fn predict(&self, series: &TimeSeries, ctx: &RunContext) -> Result<ScoredSeries> {
        self.inner().predict(series, ctx)
    }

    fn save(&self, ctx: &RunContext) -> Result<ModelArtifact> {
        self.inner().save(ctx)
    }

    fn load(&mut self, artifact: ModelArtifact, ctx: &RunContext) -> Result<()> {
        self.inner_mut().load(artifact, ctx)
    }

    fn kind(&self) -> ModelKind {
        self.inner().kind()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}

/// Resolve a model identifier to its kind.
///
/// Identifiers are case-insensitive: `prophet`/`additive`,
/// `hybrid`/`arima_iforest` and `stl`/`mstl`/`decomposition`.
pub fn parse_model_kind(identifier: &str) -> Result<ModelKind> {
    match identifier.trim().to_ascii_lowercase().as_str() {
        "prophet" | "additive" => Ok(ModelKind::Additive),
        "hybrid" | "arima_iforest" => Ok(ModelKind::Hybrid),
        "stl" | "mstl" | "decomposition" => Ok(ModelKind::Decomposition),
        _ => Err(AnomalyError::UnknownModel(identifier.to_string())),
    }
}

/// Instantiate the configured model.
///
/// `None` selects the additive forecaster; unknown identifiers fail with
/// `UnknownModel`.
pub fn select(model_type: Option<&str>) -> Result<KpiModel> {
    let kind = match model_type {
        Some(id) => parse_model_kind(id)?,
        None => ModelKind::Additive,
    };
    Ok(KpiModel::from_kind(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_case_insensitively() {
        assert_eq!(parse_model_kind("Prophet").unwrap(), ModelKind::Additive);
        assert_eq!(parse_model_kind("ARIMA_IFOREST").unwrap(), ModelKind::Hybrid);
        assert_eq!(parse_model_kind(" stl ").unwrap(), ModelKind::Decomposition);
        assert_eq!(parse_model_kind("mstl").unwrap(), ModelKind::Decomposition);
    }

    #[test]
    fn unspecified_model_defaults_to_additive() {
        let model = select(None).unwrap();
        assert_eq!(model.kind(), ModelKind::Additive);
        assert!(!model.is_fitted());
        assert_eq!(KpiModel::default().name(), "AdditiveSeasonal");
    }

    #[test]
    fn unknown_model_fails_fast() {
        let err = select(Some("lstm")).unwrap_err();
        assert!(matches!(err, AnomalyError::UnknownModel(id) if id == "lstm"));
        assert!(select(Some("")).is_err());
    }

    #[test]
    fn selected_variant_matches_kind() {
        for kind in [ModelKind::Additive, ModelKind::Hybrid, ModelKind::Decomposition] {
            let model = select(Some(kind.as_str())).unwrap();
            assert_eq!(model.kind(), kind);
        }
        let model: KpiModel = HybridResidualClassifier::new().into();
        assert_eq!(model.name(), "HybridResidual");
    }
}
