//! Error types for the anofox-anomaly library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for anomaly detection operations.
pub type Result<T> = std::result::Result<T, AnomalyError>;

/// Boxed error used to carry a collaborator's original failure.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable classification of an [`AnomalyError`], suitable for mapping onto
/// caller-facing status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An identifier (KPI, model artifact) does not exist.
    NotFound,
    /// A model was used before being trained or loaded.
    NotTrained,
    /// Input data or parameters violate the contract.
    InvalidInput,
    /// Malformed calendar input.
    Calendar,
    /// A statistical fit or computation failed.
    Model,
    /// Reading or writing persisted state failed.
    Storage,
    /// The data connector failed.
    DataSource,
}

/// Errors that can occur while preparing series, fitting models or scoring.
#[derive(Error, Debug)]
pub enum AnomalyError {
    /// The KPI identifier is not registered.
    #[error("kpi not found: {0}")]
    KpiNotFound(String),

    /// Model used before `fit` or `load`, or no artifact to load.
    #[error("model not trained: {0}")]
    ModelNotTrained(String),

    /// Series violates the input contract (missing columns, empty, duplicates).
    #[error("invalid series: {0}")]
    InvalidSeries(String),

    /// Calendar name is not recognized.
    #[error("unsupported calendar: {0}")]
    UnsupportedCalendar(String),

    /// Date text does not match the token pattern.
    #[error("date '{input}' does not match pattern '{pattern}': {reason}")]
    DateFormat {
        input: String,
        pattern: String,
        reason: String,
    },

    /// Model identifier is not recognized.
    #[error("unknown model type: {0}")]
    UnknownModel(String),

    /// Data source type is not recognized.
    #[error("unsupported data source type: {0}")]
    UnsupportedDataSource(String),

    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Numerical fit failure (singular system, non-finite estimate).
    #[error("{model} fit failed: {reason}")]
    FitFailed { model: String, reason: String },

    /// Artifact does not belong to this model or has an unknown format.
    #[error("artifact mismatch: {0}")]
    ArtifactMismatch(String),

    /// Filesystem failure while persisting or reading state.
    #[error("persistence error at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_yaml_ng::Error),

    /// The data connector failed; the original cause is preserved.
    #[error("data source for kpi '{kpi}' failed: {source}")]
    DataSource {
        kpi: String,
        #[source]
        source: BoxedSource,
    },

    /// A failure inside a KPI workflow stage.
    #[error("kpi '{kpi}' failed during {stage}: {source}")]
    Stage {
        kpi: String,
        stage: &'static str,
        #[source]
        source: Box<AnomalyError>,
    },
}

impl AnomalyError {
    /// Wrap this error with the KPI and workflow stage it occurred in.
    pub fn in_stage(self, kpi: &str, stage: &'static str) -> Self {
        AnomalyError::Stage {
            kpi: kpi.to_string(),
            stage,
            source: Box::new(self),
        }
    }

    /// Stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnomalyError::KpiNotFound(_) => ErrorKind::NotFound,
            AnomalyError::ModelNotTrained(_) => ErrorKind::NotTrained,
            AnomalyError::InvalidSeries(_)
            | AnomalyError::UnknownModel(_)
            | AnomalyError::UnsupportedDataSource(_)
            | AnomalyError::EmptyData
            | AnomalyError::InsufficientData { .. }
            | AnomalyError::InvalidParameter(_)
            | AnomalyError::Config(_) => ErrorKind::InvalidInput,
            AnomalyError::UnsupportedCalendar(_) | AnomalyError::DateFormat { .. } => {
                ErrorKind::Calendar
            }
            AnomalyError::FitFailed { .. } => ErrorKind::Model,
            AnomalyError::ArtifactMismatch(_)
            | AnomalyError::Persistence { .. }
            | AnomalyError::Serialization(_) => ErrorKind::Storage,
            AnomalyError::DataSource { .. } => ErrorKind::DataSource,
            AnomalyError::Stage { source, .. } => source.kind(),
        }
    }

    pub(crate) fn fit_failed(model: &str, reason: impl Into<String>) -> Self {
        AnomalyError::FitFailed {
            model: model.to_string(),
            reason: reason.into(),
        }
    }
}
