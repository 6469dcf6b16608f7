//! KPI workflows: train from the configured source, detect on request rows.
//!
//! Every failure after the KPI lookup is wrapped with the stage it happened
//! in (`select`, `read`, `prepare`, `fit`, `save`, `load`, `detect`). Data
//! source failures keep the connector's original error as their source.

use crate::config::{KpiConfig, KpiRegistry};
use crate::connector::{connector_for, DataConnector};
use crate::context::RunContext;
use crate::core::{ScoredSeries, TimeSeries};
use crate::error::{AnomalyError, Result};
use crate::models::{AnomalyModel, ModelKind};
use crate::persistence::ArtifactStore;
use crate::preprocess::{fill_gaps_with, series_from_records, split, GapFillSpan, Record};
use std::collections::HashMap;
use std::path::PathBuf;

/// Acknowledgement of a completed training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingAck {
    pub kpi: String,
    pub model: ModelKind,
    pub artifact: PathBuf,
    /// Rows read from the data source.
    pub rows: usize,
    /// Points the model was fitted on, after gap filling and splitting.
    pub train_points: usize,
}

/// Train and detect entry points over a KPI registry.
///
/// Calls are blocking. A caller that must stay responsive runs `train` on a
/// worker and treats submission as the acknowledgement.
pub struct KpiService {
    registry: KpiRegistry,
    store: ArtifactStore,
    data_dir: PathBuf,
    connectors: HashMap<String, Box<dyn DataConnector>>,
}

impl KpiService {
    pub fn new(registry: KpiRegistry, store: ArtifactStore, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            store,
            data_dir: data_dir.into(),
            connectors: HashMap::new(),
        }
    }

    /// Use `connector` for `kpi` instead of the configured data source.
    pub fn with_connector(mut self, kpi: impl Into<String>, connector: Box<dyn DataConnector>) -> Self {
        self.connectors.insert(kpi.into(), connector);
        self
    }

    pub fn registry(&self) -> &KpiRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn read_rows(&self, kpi: &str, config: &KpiConfig) -> Result<Vec<Record>> {
        let configured;
        let connector: &dyn DataConnector = match self.connectors.get(kpi) {
            Some(connector) => &**connector,
            None => {
                configured = connector_for(&config.data, &self.data_dir)
                    .map_err(|e| e.in_stage(kpi, "read"))?;
                &*configured
            }
        };
        tracing::debug!(source = %connector.describe(), "reading kpi data");
        connector.read().map_err(|source| AnomalyError::DataSource {
            kpi: kpi.to_string(),
            source,
        })
    }

    fn training_series(&self, kpi: &str, config: &KpiConfig, rows: &[Record]) -> Result<TimeSeries> {
        let series = series_from_records(rows, &config.columns)?;
        let filled = fill_gaps_with(&series, config.grid.frequency(), config.grid.span)?;
        let train = match config.split_cutoff()? {
            Some(cutoff) => split(&filled, cutoff).0,
            None => filled,
        };
        if train.is_empty() {
            return Err(AnomalyError::InvalidSeries(format!(
                "no training rows for kpi '{}' before the configured cutoff",
                kpi
            )));
        }
        Ok(train)
    }

    /// Fit the KPI's configured model and persist it.
    pub fn train(&self, kpi: &str) -> Result<TrainingAck> {
        let config = self.registry.get(kpi)?;
        let ctx = RunContext::new(kpi);
        ctx.in_scope(|| tracing::info!("training started"));

        let mut model = config.build_model().map_err(|e| e.in_stage(kpi, "select"))?;
        let rows = self.read_rows(kpi, config)?;
        let train = self
            .training_series(kpi, config, &rows)
            .map_err(|e| e.in_stage(kpi, "prepare"))?;
        model.fit(&train, &ctx).map_err(|e| e.in_stage(kpi, "fit"))?;

        let artifact = model
            .save(&ctx)
            .and_then(|artifact| self.store.save(kpi, &artifact))
            .map_err(|e| e.in_stage(kpi, "save"))?;
        ctx.in_scope(|| {
            tracing::info!(
                model = %model.kind(),
                rows = rows.len(),
                train_points = train.len(),
                "training finished"
            )
        });
        Ok(TrainingAck {
            kpi: kpi.to_string(),
            model: model.kind(),
            artifact,
            rows: rows.len(),
            train_points: train.len(),
        })
    }

    /// Score `rows` with the KPI's latest trained model.
    ///
    /// Rows use the KPI's configured column names and are filled onto the
    /// configured grid between the first and last row.
    pub fn detect(&self, kpi: &str, rows: &[Record]) -> Result<ScoredSeries> {
        let config = self.registry.get(kpi)?;
        let ctx = RunContext::new(kpi);

        let mut model = config.build_model().map_err(|e| e.in_stage(kpi, "select"))?;
        let artifact = self
            .store
            .load_latest(kpi, model.kind())
            .map_err(|e| e.in_stage(kpi, "load"))?;
        model
            .load(artifact, &ctx)
            .map_err(|e| e.in_stage(kpi, "load"))?;

        let series = series_from_records(rows, &config.columns)
            .and_then(|s| fill_gaps_with(&s, config.grid.frequency(), GapFillSpan::Observed))
            .map_err(|e| e.in_stage(kpi, "prepare"))?;
        let scored = model
            .predict(&series, &ctx)
            .map_err(|e| e.in_stage(kpi, "detect"))?;
        ctx.in_scope(|| {
            tracing::info!(
                points = scored.len(),
                anomalies = scored.anomaly_count(),
                "detection finished"
            )
        });
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataSection;
    use crate::error::{BoxedSource, ErrorKind};

    struct Refused;

    impl DataConnector for Refused {
        fn read(&self) -> std::result::Result<Vec<Record>, BoxedSource> {
            Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }

        fn describe(&self) -> String {
            "refused".to_string()
        }
    }

    fn registry(data_type: &str) -> KpiRegistry {
        let mut registry = KpiRegistry::new();
        registry.register(
            "kpi_a",
            KpiConfig {
                model: Default::default(),
                data: DataSection {
                    data_type: data_type.to_string(),
                    data_source: "kpi_a.csv".to_string(),
                },
                columns: Default::default(),
                split: None,
                grid: Default::default(),
            },
        );
        registry
    }

    #[test]
    fn unregistered_kpi_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = KpiService::new(registry("csv"), ArtifactStore::new(dir.path()), dir.path());
        let err = service.train("kpi_z").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(service.detect("kpi_z", &[]).is_err());
    }

    #[test]
    fn connector_failure_keeps_cause_and_kpi() {
        let dir = tempfile::tempdir().unwrap();
        let service = KpiService::new(registry("csv"), ArtifactStore::new(dir.path()), dir.path())
            .with_connector("kpi_a", Box::new(Refused));
        let err = service.train("kpi_a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataSource);
        assert!(err.to_string().contains("kpi_a"));
        let cause = std::error::Error::source(&err).unwrap();
        assert_eq!(
            cause.downcast_ref::<std::io::Error>().unwrap().kind(),
            std::io::ErrorKind::ConnectionRefused
        );
    }

    #[test]
    fn unsupported_data_type_is_reported_with_stage() {
        let dir = tempfile::tempdir().unwrap();
        let service = KpiService::new(registry("oracle"), ArtifactStore::new(dir.path()), dir.path());
        let err = service.train("kpi_a").unwrap_err();
        assert!(matches!(
            &err,
            AnomalyError::Stage { stage: "read", source, .. }
                if matches!(**source, AnomalyError::UnsupportedDataSource(_))
        ));
    }

    #[test]
    fn detect_before_training_is_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let service = KpiService::new(registry("csv"), ArtifactStore::new(dir.path()), dir.path());
        let err = service.detect("kpi_a", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotTrained);
    }
}
