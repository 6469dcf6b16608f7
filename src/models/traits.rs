//! The interface shared by every anomaly model and its saved artifact.

use super::additive::AdditiveState;
use super::decomposition::DecompositionState;
use super::hybrid::HybridState;
use crate::context::RunContext;
use crate::core::{ScoredSeries, TimeSeries};
use crate::error::{AnomalyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current artifact layout version.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Model families known to the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Additive,
    Hybrid,
    Decomposition,
}

impl ModelKind {
    /// Stable identifier, also used as the artifact directory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Additive => "additive",
            ModelKind::Hybrid => "hybrid",
            ModelKind::Decomposition => "decomposition",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric state of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelState {
    Additive(AdditiveState),
    Hybrid(HybridState),
    Decomposition(DecompositionState),
}

impl ModelState {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelState::Additive(_) => ModelKind::Additive,
            ModelState::Hybrid(_) => ModelKind::Hybrid,
            ModelState::Decomposition(_) => ModelKind::Decomposition,
        }
    }
}

/// Versioned, serialisable snapshot of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub kind: ModelKind,
    pub created_at: DateTime<Utc>,
    pub state: ModelState,
}

impl ModelArtifact {
    pub fn new(state: ModelState) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            kind: state.kind(),
            created_at: Utc::now(),
            state,
        }
    }

    /// Check version and kind before a model consumes the artifact.
    pub fn validate(&self, expected: ModelKind) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(AnomalyError::ArtifactMismatch(format!(
                "unsupported artifact format version {}",
                self.format_version
            )));
        }
        if self.kind != expected || self.state.kind() != expected {
            return Err(AnomalyError::ArtifactMismatch(format!(
                "expected a {} artifact, found {}",
                expected,
                self.state.kind()
            )));
        }
        Ok(())
    }
}

/// Common interface of the anomaly models.
///
/// `predict` returns a new scored series and never mutates its input.
/// Calling it before `fit` or `load` fails with `ModelNotTrained`.
pub trait AnomalyModel: Send {
    /// Fit the model on a gap-free training series.
    fn fit(&mut self, train: &TimeSeries, ctx: &RunContext) -> Result<()>;

    /// Score `series` against the fitted model.
    fn predict(&self, series: &TimeSeries, ctx: &RunContext) -> Result<ScoredSeries>;

    /// Snapshot the fitted state.
    fn save(&self, ctx: &RunContext) -> Result<ModelArtifact>;

    /// Restore state produced by `save`.
    fn load(&mut self, artifact: ModelArtifact, ctx: &RunContext) -> Result<()>;

    fn kind(&self) -> ModelKind;

    fn name(&self) -> &str;

    fn is_fitted(&self) -> bool;
}
