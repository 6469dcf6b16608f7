//! Data connectors: where a KPI's raw rows come from.
//!
//! Connectors return their own error type boxed, so callers can tell a
//! missing file or refused connection apart from malformed rows.

use crate::config::DataSection;
use crate::error::{AnomalyError, BoxedSource, Result};
use crate::preprocess::Record;
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Source of tabular rows for one KPI.
pub trait DataConnector: Send + Sync {
    /// Read every row.
    fn read(&self) -> std::result::Result<Vec<Record>, BoxedSource>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// CSV file with a header row. Every field is read as a string.
#[derive(Debug, Clone)]
pub struct CsvConnector {
    path: PathBuf,
}

impl CsvConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataConnector for CsvConnector {
    fn read(&self) -> std::result::Result<Vec<Record>, BoxedSource> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Record = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    rows: Vec<Record>,
}

impl MemoryConnector {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }
}

impl DataConnector for MemoryConnector {
    fn read(&self) -> std::result::Result<Vec<Record>, BoxedSource> {
        Ok(self.rows.clone())
    }

    fn describe(&self) -> String {
        format!("memory:{} rows", self.rows.len())
    }
}

/// Build the connector a data section describes.
///
/// Relative locations resolve against `data_dir`. Unknown data types fail
/// with `UnsupportedDataSource`.
pub fn connector_for(data: &DataSection, data_dir: &Path) -> Result<Box<dyn DataConnector>> {
    match data.data_type.trim().to_ascii_lowercase().as_str() {
        "csv" => {
            let location = Path::new(&data.data_source);
            let path = if location.is_absolute() {
                location.to_path_buf()
            } else {
                data_dir.join(location)
            };
            Ok(Box::new(CsvConnector::new(path)))
        }
        other => Err(AnomalyError::UnsupportedDataSource(other.to_string())),
    }
}
