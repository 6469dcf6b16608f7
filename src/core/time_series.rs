//! TimeSeries data structure for a single KPI counter.

use crate::error::{AnomalyError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// A univariate time series with strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    frequency: Option<Duration>,
}

impl TimeSeries {
    /// Create a series, validating ordering and lengths.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(AnomalyError::InvalidSeries(format!(
                "{} timestamps but {} values",
                timestamps.len(),
                values.len()
            )));
        }

        for i in 1..timestamps.len() {
            if timestamps[i] == timestamps[i - 1] {
                return Err(AnomalyError::InvalidSeries(format!(
                    "duplicate timestamp {}",
                    timestamps[i]
                )));
            }
            if timestamps[i] < timestamps[i - 1] {
                return Err(AnomalyError::InvalidSeries(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }

        Ok(Self {
            timestamps,
            values,
            frequency: None,
        })
    }

    /// Create an empty series.
    pub fn empty() -> Self {
        Self {
            timestamps: Vec::new(),
            values: Vec::new(),
            frequency: None,
        }
    }

    /// Attach a known sampling frequency.
    pub fn with_frequency(mut self, frequency: Duration) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Build a series from `(timestamp, value)` pairs in any order.
    pub fn from_points(mut points: Vec<(DateTime<Utc>, f64)>) -> Result<Self> {
        points.sort_by_key(|(ts, _)| *ts);
        let (timestamps, values) = points.into_iter().unzip();
        Self::new(timestamps, values)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Iterate over `(timestamp, value)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Known or declared frequency.
    pub fn frequency(&self) -> Option<Duration> {
        self.frequency
    }

    /// Declared frequency, falling back to the modal spacing.
    pub fn resolve_frequency(&self) -> Result<Duration> {
        match self.frequency {
            Some(freq) => Ok(freq),
            None => self.infer_frequency(),
        }
    }

    /// Infer frequency as the most common spacing between timestamps.
    pub fn infer_frequency(&self) -> Result<Duration> {
        if self.len() < 2 {
            return Err(AnomalyError::InsufficientData {
                needed: 2,
                got: self.len(),
            });
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for w in self.timestamps.windows(2) {
            *counts.entry((w[1] - w[0]).num_seconds()).or_insert(0) += 1;
        }

        // Ties resolve to the smaller spacing so the result is deterministic.
        let (modal, _) = counts
            .into_iter()
            .max_by(|(da, ca), (db, cb)| ca.cmp(cb).then(db.cmp(da)))
            .ok_or_else(|| AnomalyError::InvalidSeries("no spacing data".to_string()))?;

        Ok(Duration::seconds(modal))
    }

    /// Return a copy restricted to `[start, end)` positions.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end || end > self.len() {
            return Err(AnomalyError::InvalidParameter(format!(
                "slice {}..{} out of bounds for length {}",
                start,
                end,
                self.len()
            )));
        }
        Ok(TimeSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
            frequency: self.frequency,
        })
    }

    /// Return a copy containing only points matching `keep`.
    pub fn filter<F>(&self, mut keep: F) -> TimeSeries
    where
        F: FnMut(DateTime<Utc>, f64) -> bool,
    {
        let (timestamps, values) = self.points().filter(|&(ts, v)| keep(ts, v)).unzip();
        TimeSeries {
            timestamps,
            values,
            frequency: self.frequency,
        }
    }

    /// Fail with `InvalidSeries` when the series is empty.
    pub fn require_non_empty(&self, what: &str) -> Result<()> {
        if self.is_empty() {
            return Err(AnomalyError::InvalidSeries(format!("{} series is empty", what)));
        }
        Ok(())
    }

    /// Fail with `InvalidSeries` unless every spacing equals `frequency`.
    pub fn require_regular(&self, frequency: Duration, what: &str) -> Result<()> {
        if let Some(w) = self.timestamps.windows(2).find(|w| w[1] - w[0] != frequency) {
            return Err(AnomalyError::InvalidSeries(format!(
                "{} series has gaps between {} and {}; fill it first",
                what, w[0], w[1]
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hours(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let mut ts = hours(3);
        ts[2] = ts[1];
        let err = TimeSeries::new(ts, vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidSeries(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn rejects_unsorted_and_mismatched_lengths() {
        let mut ts = hours(3);
        ts.swap(0, 2);
        assert!(TimeSeries::new(ts, vec![1.0, 2.0, 3.0]).is_err());
        assert!(TimeSeries::new(hours(3), vec![1.0]).is_err());
    }

    #[test]
    fn from_points_sorts_input() {
        let ts = hours(3);
        let series =
            TimeSeries::from_points(vec![(ts[2], 3.0), (ts[0], 1.0), (ts[1], 2.0)]).unwrap();
        assert_eq!(series.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(series.first_timestamp(), Some(ts[0]));
    }

    #[test]
    fn infers_modal_frequency() {
        let mut ts = hours(10);
        ts.remove(4);
        let series = TimeSeries::new(ts, vec![1.0; 9]).unwrap();
        assert_eq!(series.infer_frequency().unwrap(), Duration::hours(1));
        assert_eq!(
            series.clone().with_frequency(Duration::minutes(30)).resolve_frequency().unwrap(),
            Duration::minutes(30)
        );
    }

    #[test]
    fn regular_grid_check_reports_gap() {
        let series = TimeSeries::new(hours(4), vec![1.0; 4]).unwrap();
        assert!(series.require_regular(Duration::hours(1), "training").is_ok());

        let mut ts = hours(10);
        ts.remove(4);
        let gapped = TimeSeries::new(ts, vec![1.0; 9]).unwrap();
        let err = gapped.require_regular(Duration::hours(1), "training").unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidSeries(msg) if msg.contains("gaps")));
    }

    #[test]
    fn filter_and_slice_copy_data() {
        let series = TimeSeries::new(hours(5), vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        let odd = series.filter(|_, v| v as i64 % 2 == 1);
        assert_eq!(odd.values(), &[1.0, 3.0]);
        let mid = series.slice(1, 3).unwrap();
        assert_eq!(mid.values(), &[1.0, 2.0]);
        assert!(series.slice(3, 9).is_err());
    }

    #[test]
    fn empty_series_is_reported() {
        let err = TimeSeries::empty().require_non_empty("training").unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidSeries(_)));
    }
}
