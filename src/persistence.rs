//! Artifact store: one timestamped JSON file per training run plus a
//! `model_latest.json` alias.
//!
//! Layout: `<root>/<kpi>/<model-kind>/model_<YYYYmmdd_HHMMSS_mmm>.json`, with
//! a numeric suffix when two runs share a millisecond.
//! Loading reads only the alias. There is no locking; callers serialise
//! concurrent access to one KPI.

use crate::error::{AnomalyError, Result};
use crate::models::{ModelArtifact, ModelKind};
use std::fs;
use std::path::{Path, PathBuf};

const LATEST_FILE: &str = "model_latest.json";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> AnomalyError + '_ {
    move |source| AnomalyError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts of one KPI and model kind.
    pub fn model_dir(&self, kpi: &str, kind: ModelKind) -> PathBuf {
        self.root.join(kpi).join(kind.as_str())
    }

    pub fn latest_path(&self, kpi: &str, kind: ModelKind) -> PathBuf {
        self.model_dir(kpi, kind).join(LATEST_FILE)
    }

    /// Write `artifact` as a new run and repoint the alias at it.
    ///
    /// Returns the path of the timestamped file.
    pub fn save(&self, kpi: &str, artifact: &ModelArtifact) -> Result<PathBuf> {
        let dir = self.model_dir(kpi, artifact.kind);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let json = serde_json::to_vec_pretty(artifact)?;
        let versioned = Self::run_path(&dir, artifact);
        fs::write(&versioned, &json).map_err(io_error(&versioned))?;

        // The alias is replaced by rename.
        let latest = dir.join(LATEST_FILE);
        let staging = dir.join(format!("{}.tmp", LATEST_FILE));
        fs::write(&staging, &json).map_err(io_error(&staging))?;
        fs::rename(&staging, &latest).map_err(io_error(&latest))?;

        tracing::info!(
            kpi,
            kind = %artifact.kind,
            path = %versioned.display(),
            "model artifact saved"
        );
        Ok(versioned)
    }

    /// First unused run file name for `artifact`, stamped to the millisecond.
    fn run_path(dir: &Path, artifact: &ModelArtifact) -> PathBuf {
        let stem = format!("model_{}", artifact.created_at.format("%Y%m%d_%H%M%S_%3f"));
        let mut path = dir.join(format!("{}.json", stem));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{}_{}.json", stem, n));
            n += 1;
        }
        path
    }

    /// Read the artifact the alias points at.
    ///
    /// A missing alias means the model was never trained.
    pub fn load_latest(&self, kpi: &str, kind: ModelKind) -> Result<ModelArtifact> {
        let latest = self.latest_path(kpi, kind);
        let bytes = match fs::read(&latest) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnomalyError::ModelNotTrained(format!(
                    "no {} artifact for kpi '{}'",
                    kind, kpi
                )));
            }
            Err(e) => return Err(io_error(&latest)(e)),
        };
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;
        artifact.validate(kind)?;
        tracing::debug!(kpi, kind = %kind, "model artifact loaded");
        Ok(artifact)
    }

    /// Timestamped artifacts of one KPI and model kind, oldest first.
    pub fn history(&self, kpi: &str, kind: ModelKind) -> Result<Vec<PathBuf>> {
        let dir = self.model_dir(kpi, kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir)(e)),
        };
        let mut runs = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error(&dir))?.path();
            let is_run = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("model_") && n.ends_with(".json") && n != LATEST_FILE);
            if is_run {
                runs.push(path);
            }
        }
        runs.sort();
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::core::TimeSeries;
    use crate::models::{AdditiveSeasonalForecaster, AnomalyModel};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn make_timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    fn artifact() -> ModelArtifact {
        let series = TimeSeries::new(
            make_timestamps(48),
            (0..48).map(|i| (i % 24) as f64).collect(),
        )
        .unwrap();
        let ctx = RunContext::detached();
        let mut model = AdditiveSeasonalForecaster::new();
        model.fit(&series, &ctx).unwrap();
        model.save(&ctx).unwrap()
    }

    #[test]
    fn save_writes_versioned_file_and_alias() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let artifact = artifact();

        let path = store.save("kpi_a", &artifact).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join("kpi_a").join("additive")));
        assert!(store.latest_path("kpi_a", ModelKind::Additive).exists());
        assert_eq!(store.history("kpi_a", ModelKind::Additive).unwrap(), vec![path]);

        let loaded = store.load_latest("kpi_a", ModelKind::Additive).unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn runs_in_the_same_instant_keep_separate_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let artifact = artifact();

        let first = store.save("kpi_a", &artifact).unwrap();
        let second = store.save("kpi_a", &artifact).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
        assert_eq!(
            store.history("kpi_a", ModelKind::Additive).unwrap(),
            vec![first, second]
        );
    }

    #[test]
    fn missing_alias_means_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store.load_latest("kpi_a", ModelKind::Hybrid).unwrap_err();
        assert!(matches!(err, AnomalyError::ModelNotTrained(_)));
        assert!(store.history("kpi_a", ModelKind::Hybrid).unwrap().is_empty());
    }

    #[test]
    fn corrupt_alias_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let latest = store.latest_path("kpi_a", ModelKind::Additive);
        fs::create_dir_all(latest.parent().unwrap()).unwrap();
        fs::write(&latest, b"{not json").unwrap();
        assert!(matches!(
            store.load_latest("kpi_a", ModelKind::Additive),
            Err(AnomalyError::Serialization(_))
        ));
    }
}
