//! Series preparation: tabular rows to series, gap filling, splitting.

use crate::core::TimeSeries;
use crate::error::{AnomalyError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A tabular row as produced by connectors and request bodies.
pub type Record = Map<String, Value>;

/// Names of the timestamp and value columns in tabular input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub timestamp: String,
    pub value: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::new("timestamp", "value")
    }
}

impl ColumnMapping {
    pub fn new(timestamp: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            value: value.into(),
        }
    }
}

/// How far `fill_gaps` extends the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapFillSpan {
    /// From midnight of the first day to the last slot of the last day.
    #[default]
    WholeDays,
    /// From the first to the last observed timestamp.
    Observed,
}

/// Reindex `series` onto a regular grid spanning whole days, filling
/// missing slots with zero.
pub fn fill_gaps(series: &TimeSeries, frequency: Duration) -> Result<TimeSeries> {
    fill_gaps_with(series, frequency, GapFillSpan::WholeDays)
}

/// Reindex `series` onto a regular grid with the given span.
///
/// Missing slots are zero, meaning no activity. Observations that do not
/// fall on the grid are dropped.
pub fn fill_gaps_with(
    series: &TimeSeries,
    frequency: Duration,
    span: GapFillSpan,
) -> Result<TimeSeries> {
    if frequency <= Duration::zero() {
        return Err(AnomalyError::InvalidParameter(format!(
            "fill frequency must be positive, got {}",
            frequency
        )));
    }
    let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp()) else {
        return Ok(TimeSeries::empty().with_frequency(frequency));
    };

    // Slots run from `start` up to, but excluding, `stop`.
    let (start, stop) = match span {
        GapFillSpan::WholeDays => {
            let start = first.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
            let next_midnight = (last.date_naive() + Duration::days(1))
                .and_time(chrono::NaiveTime::MIN)
                .and_utc();
            (start, next_midnight)
        }
        GapFillSpan::Observed => (first, last + Duration::nanoseconds(1)),
    };

    let observed: HashMap<DateTime<Utc>, f64> = series.points().collect();
    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    let mut kept = 0;
    let mut slot = start;
    while slot < stop {
        timestamps.push(slot);
        match observed.get(&slot) {
            Some(&v) => {
                kept += 1;
                values.push(v);
            }
            None => values.push(0.0),
        }
        slot += frequency;
    }

    if kept < series.len() {
        tracing::warn!(
            dropped = series.len() - kept,
            "observations off the fill grid were dropped"
        );
    }

    Ok(TimeSeries::new(timestamps, values)?.with_frequency(frequency))
}

/// Split at `cutoff`: points strictly before it train, the rest test.
///
/// Both halves are independent copies; either may be empty.
pub fn split(series: &TimeSeries, cutoff: DateTime<Utc>) -> (TimeSeries, TimeSeries) {
    let train = series.filter(|ts, _| ts < cutoff);
    let test = series.filter(|ts, _| ts >= cutoff);
    (train, test)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
                return Some(dt.and_utc());
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
                return Some(dt.and_utc());
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M") {
                return Some(dt.and_utc());
            }
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

fn parse_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Build a series from tabular rows.
///
/// Rows may arrive in any order; duplicate timestamps are rejected.
pub fn series_from_records(rows: &[Record], columns: &ColumnMapping) -> Result<TimeSeries> {
    let mut points = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let raw_ts = row.get(&columns.timestamp).ok_or_else(|| {
            AnomalyError::InvalidSeries(format!(
                "row {} is missing timestamp column '{}'",
                i, columns.timestamp
            ))
        })?;
        let raw_value = row.get(&columns.value).ok_or_else(|| {
            AnomalyError::InvalidSeries(format!(
                "row {} is missing value column '{}'",
                i, columns.value
            ))
        })?;
        let ts = parse_timestamp(raw_ts).ok_or_else(|| {
            AnomalyError::InvalidSeries(format!("row {} has unparseable timestamp {}", i, raw_ts))
        })?;
        let value = parse_value(raw_value).ok_or_else(|| {
            AnomalyError::InvalidSeries(format!("row {} has non-numeric value {}", i, raw_value))
        })?;
        points.push((ts, value));
    }
    TimeSeries::from_points(points)
}
