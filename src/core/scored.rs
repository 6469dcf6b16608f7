//! Scored output: the input series augmented with forecast, residual and label.

use crate::error::{AnomalyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signed anomaly label shared by every detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum AnomalyLabel {
    /// Observation is below the expected range.
    Below,
    /// Observation is within the expected range.
    #[default]
    Normal,
    /// Observation is above the expected range.
    Above,
}

impl AnomalyLabel {
    /// Label from a signed deviation that crossed its bound.
    pub fn from_sign(deviation: f64) -> Self {
        if deviation > 0.0 {
            AnomalyLabel::Above
        } else if deviation < 0.0 {
            AnomalyLabel::Below
        } else {
            AnomalyLabel::Normal
        }
    }

    /// Numeric encoding: -1, 0 or +1.
    pub fn as_i8(self) -> i8 {
        match self {
            AnomalyLabel::Below => -1,
            AnomalyLabel::Normal => 0,
            AnomalyLabel::Above => 1,
        }
    }

    pub fn is_anomaly(self) -> bool {
        self != AnomalyLabel::Normal
    }
}

impl From<AnomalyLabel> for i8 {
    fn from(label: AnomalyLabel) -> Self {
        label.as_i8()
    }
}

impl TryFrom<i8> for AnomalyLabel {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            -1 => Ok(AnomalyLabel::Below),
            0 => Ok(AnomalyLabel::Normal),
            1 => Ok(AnomalyLabel::Above),
            other => Err(format!("invalid anomaly label {}", other)),
        }
    }
}

/// One scored observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub expected: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    pub residual: f64,
    pub label: AnomalyLabel,
}

/// A series augmented with expected values, residuals and labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredSeries {
    points: Vec<ScoredPoint>,
}

impl ScoredSeries {
    pub fn new(points: Vec<ScoredPoint>) -> Self {
        Self { points }
    }

    /// Assemble columns into scored points, checking every column has the same length.
    pub fn from_columns(
        timestamps: &[DateTime<Utc>],
        values: &[f64],
        expected: &[f64],
        bounds: Option<(&[f64], &[f64])>,
        labels: &[AnomalyLabel],
    ) -> Result<Self> {
        let n = timestamps.len();
        let mismatch = values.len() != n
            || expected.len() != n
            || labels.len() != n
            || bounds.is_some_and(|(lo, up)| lo.len() != n || up.len() != n);
        if mismatch {
            return Err(AnomalyError::InvalidParameter(
                "scored columns have different lengths".to_string(),
            ));
        }

        let points = (0..n)
            .map(|i| ScoredPoint {
                timestamp: timestamps[i],
                value: values[i],
                expected: expected[i],
                lower: bounds.map(|(lo, _)| lo[i]),
                upper: bounds.map(|(_, up)| up[i]),
                residual: values[i] - expected[i],
                label: labels[i],
            })
            .collect();
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ScoredPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<ScoredPoint> {
        self.points
    }

    pub fn labels(&self) -> Vec<AnomalyLabel> {
        self.points.iter().map(|p| p.label).collect()
    }

    pub fn residuals(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.residual).collect()
    }

    pub fn expected(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.expected).collect()
    }

    /// Iterate over anomalous points only.
    pub fn anomalies(&self) -> impl Iterator<Item = &ScoredPoint> {
        self.points.iter().filter(|p| p.label.is_anomaly())
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn label_encoding_round_trips_through_i8() {
        for label in [AnomalyLabel::Below, AnomalyLabel::Normal, AnomalyLabel::Above] {
            assert_eq!(AnomalyLabel::try_from(label.as_i8()).unwrap(), label);
        }
        assert!(AnomalyLabel::try_from(2).is_err());
        assert_eq!(AnomalyLabel::from_sign(-0.1), AnomalyLabel::Below);
        assert_eq!(AnomalyLabel::from_sign(0.0), AnomalyLabel::Normal);
    }

    #[test]
    fn labels_serialize_as_signed_integers() {
        let json = serde_json::to_string(&vec![AnomalyLabel::Below, AnomalyLabel::Above]).unwrap();
        assert_eq!(json, "[-1,1]");
    }

    #[test]
    fn from_columns_computes_residuals() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ts = vec![base, base + Duration::hours(1)];
        let scored = ScoredSeries::from_columns(
            &ts,
            &[5.0, 1.0],
            &[4.0, 3.0],
            None,
            &[AnomalyLabel::Normal, AnomalyLabel::Below],
        )
        .unwrap();

        assert_eq!(scored.residuals(), vec![1.0, -2.0]);
        assert_eq!(scored.anomaly_count(), 1);
        assert!(scored.points()[0].lower.is_none());
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let result = ScoredSeries::from_columns(&[base], &[1.0], &[], None, &[AnomalyLabel::Normal]);
        assert!(result.is_err());
    }
}
