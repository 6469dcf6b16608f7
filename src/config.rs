//! KPI configuration.
//!
//! Each KPI is described by a YAML document:
//!
//! ```yaml
//! model:
//!   model: prophet
//! data:
//!   data_type: csv
//!   data_source: data_v1.csv
//! columns:
//!   timestamp: DATE_H
//!   value: CNT
//! split:
//!   date: "14040320"
//!   pattern: yyyymmdd
//!   calendar: persian
//! ```
//!
//! A [`KpiRegistry`] maps KPI names to configurations; on disk it is a
//! directory with one `<kpi>/config.yaml` per KPI.

use crate::calendar::Calendar;
use crate::error::{AnomalyError, Result};
use crate::models::{parse_model_kind, KpiModel, ModelKind};
use crate::preprocess::{ColumnMapping, GapFillSpan};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const CONFIG_FILE: &str = "config.yaml";

/// Model selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Model identifier; absent selects the additive forecaster.
    pub model: Option<String>,
}

/// Where the KPI's rows come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSection {
    pub data_type: String,
    /// Location of the data, relative to the service data directory.
    pub data_source: String,
}

/// Training cutoff written in any supported calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSection {
    pub date: String,
    #[serde(default = "default_split_pattern")]
    pub pattern: String,
    #[serde(default = "default_calendar")]
    pub calendar: String,
}

fn default_split_pattern() -> String {
    "yyyy-mm-dd".to_string()
}

fn default_calendar() -> String {
    Calendar::Gregorian.to_string()
}

/// Grid the series is filled onto before training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSection {
    pub frequency_minutes: u32,
    pub span: GapFillSpan,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            frequency_minutes: 60,
            span: GapFillSpan::WholeDays,
        }
    }
}

impl GridSection {
    pub fn frequency(&self) -> Duration {
        Duration::minutes(i64::from(self.frequency_minutes))
    }
}

/// Configuration of one KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiConfig {
    #[serde(default)]
    pub model: ModelSection,
    pub data: DataSection,
    #[serde(default)]
    pub columns: ColumnMapping,
    #[serde(default)]
    pub split: Option<SplitSection>,
    #[serde(default)]
    pub grid: GridSection,
}

impl KpiConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: KpiConfig = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| AnomalyError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Check identifiers eagerly so misconfiguration surfaces at load time.
    pub fn validate(&self) -> Result<()> {
        self.model_kind()?;
        self.split_cutoff()?;
        if self.grid.frequency_minutes == 0 {
            return Err(AnomalyError::InvalidParameter(
                "grid frequency must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn model_kind(&self) -> Result<ModelKind> {
        match &self.model.model {
            Some(id) => parse_model_kind(id),
            None => Ok(ModelKind::Additive),
        }
    }

    /// Default-configured model of the configured kind.
    pub fn build_model(&self) -> Result<KpiModel> {
        Ok(KpiModel::from_kind(self.model_kind()?))
    }

    /// Training cutoff as a canonical instant, if configured.
    pub fn split_cutoff(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(split) = &self.split else {
            return Ok(None);
        };
        let calendar: Calendar = split.calendar.parse()?;
        calendar.parse(&split.date, &split.pattern).map(Some)
    }
}

/// Registered KPIs by name.
#[derive(Debug, Clone, Default)]
pub struct KpiRegistry {
    kpis: BTreeMap<String, KpiConfig>,
}

impl KpiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<root>/<kpi>/config.yaml`.
    ///
    /// Directories without a config file are skipped.
    pub fn from_dir(root: &Path) -> Result<Self> {
        let io_error = |source| AnomalyError::Persistence {
            path: root.to_path_buf(),
            source,
        };
        let mut registry = Self::new();
        for entry in fs::read_dir(root).map_err(io_error)? {
            let dir = entry.map_err(io_error)?.path();
            let config_path = dir.join(CONFIG_FILE);
            if !config_path.is_file() {
                continue;
            }
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let config = KpiConfig::from_path(&config_path)
                .map_err(|e| e.in_stage(name, "config"))?;
            registry.register(name, config);
        }
        tracing::info!(kpis = registry.len(), root = %root.display(), "kpi registry loaded");
        Ok(registry)
    }

    pub fn register(&mut self, kpi: impl Into<String>, config: KpiConfig) {
        self.kpis.insert(kpi.into(), config);
    }

    pub fn get(&self, kpi: &str) -> Result<&KpiConfig> {
        self.kpis
            .get(kpi)
            .ok_or_else(|| AnomalyError::KpiNotFound(kpi.to_string()))
    }

    pub fn contains(&self, kpi: &str) -> bool {
        self.kpis.contains_key(kpi)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kpis.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.kpis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kpis.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const KPI_A: &str = r#"
model:
  model: Prophet
data:
  data_type: csv
  data_source: data_v1.csv
columns:
  timestamp: DATE_H
  value: CNT
split:
  date: "14040320"
  pattern: yyyymmdd
  calendar: persian
"#;

    #[test]
    fn parses_full_config() {
        let config = KpiConfig::from_yaml_str(KPI_A).unwrap();
        assert_eq!(config.model_kind().unwrap(), ModelKind::Additive);
        assert_eq!(config.columns, ColumnMapping::new("DATE_H", "CNT"));
        assert_eq!(config.grid, GridSection::default());
        // 20 Khordad 1404.
        assert_eq!(
            config.split_cutoff().unwrap(),
            Some(Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config =
            KpiConfig::from_yaml_str("data:\n  data_type: csv\n  data_source: a.csv\n").unwrap();
        assert_eq!(config.model_kind().unwrap(), ModelKind::Additive);
        assert_eq!(config.columns, ColumnMapping::default());
        assert!(config.split_cutoff().unwrap().is_none());
    }

    #[test]
    fn unknown_identifiers_fail_at_load() {
        let text = KPI_A.replace("Prophet", "lstm");
        assert!(matches!(
            KpiConfig::from_yaml_str(&text),
            Err(AnomalyError::UnknownModel(_))
        ));
        let text = KPI_A.replace("calendar: persian", "calendar: lunar");
        assert!(matches!(
            KpiConfig::from_yaml_str(&text),
            Err(AnomalyError::UnsupportedCalendar(_))
        ));
        assert!(matches!(
            KpiConfig::from_yaml_str("model: [1, 2"),
            Err(AnomalyError::Config(_))
        ));
    }

    #[test]
    fn registry_loads_config_directories() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("kpi_a")).unwrap();
        fs::write(root.path().join("kpi_a").join(CONFIG_FILE), KPI_A).unwrap();
        fs::create_dir_all(root.path().join("scratch")).unwrap();

        let registry = KpiRegistry::from_dir(root.path()).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["kpi_a"]);
        assert!(registry.get("kpi_a").is_ok());
        assert!(matches!(
            registry.get("kpi_b"),
            Err(AnomalyError::KpiNotFound(name)) if name == "kpi_b"
        ));
    }
}
