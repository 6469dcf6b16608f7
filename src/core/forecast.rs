//! Forecast result structure for holding expected values and intervals.

use crate::error::{AnomalyError, Result};

/// Point forecast with an optional prediction interval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forecast {
    expected: Vec<f64>,
    lower: Option<Vec<f64>>,
    upper: Option<Vec<f64>>,
}

impl Forecast {
    /// Create an empty forecast.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a forecast from point predictions only.
    pub fn from_values(expected: Vec<f64>) -> Self {
        Self {
            expected,
            lower: None,
            upper: None,
        }
    }

    /// Create a forecast with prediction intervals.
    pub fn from_values_with_intervals(
        expected: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    ) -> Result<Self> {
        if lower.len() != expected.len() || upper.len() != expected.len() {
            return Err(AnomalyError::InvalidParameter(format!(
                "interval lengths {}/{} do not match horizon {}",
                lower.len(),
                upper.len(),
                expected.len()
            )));
        }
        Ok(Self {
            expected,
            lower: Some(lower),
            upper: Some(upper),
        })
    }

    /// Build a symmetric interval of `half_width` around each expected value.
    pub fn symmetric(expected: Vec<f64>, half_width: f64) -> Self {
        let lower = expected.iter().map(|e| e - half_width).collect();
        let upper = expected.iter().map(|e| e + half_width).collect();
        Self {
            expected,
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Number of forecast steps.
    pub fn horizon(&self) -> usize {
        self.expected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    pub fn expected(&self) -> &[f64] {
        &self.expected
    }

    pub fn lower(&self) -> Option<&[f64]> {
        self.lower.as_deref()
    }

    pub fn upper(&self) -> Option<&[f64]> {
        self.upper.as_deref()
    }

    pub fn has_intervals(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    /// Clip expected values and bounds to the non-negative domain.
    ///
    /// Clipping is monotone, so `lower <= expected <= upper` is preserved.
    pub fn clip_non_negative(mut self) -> Self {
        fn clip(values: &mut [f64]) {
            for v in values.iter_mut() {
                *v = v.max(0.0);
            }
        }
        clip(&mut self.expected);
        if let Some(lower) = self.lower.as_mut() {
            clip(lower);
        }
        if let Some(upper) = self.upper.as_mut() {
            clip(upper);
        }
        self
    }
}
