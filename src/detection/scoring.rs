//! Residual scoring rules.
//!
//! Every rule maps observations and their forecasts to signed
//! [`AnomalyLabel`]s: `Above` when the observation is too high, `Below`
//! when too low.

use crate::core::AnomalyLabel;
use crate::error::{AnomalyError, Result};
use crate::utils::{mad, mean, median, population_std, std_dev};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label values outside `[lower, upper]`.
pub fn interval_exceedance(values: &[f64], lower: &[f64], upper: &[f64]) -> Result<Vec<AnomalyLabel>> {
    if lower.len() != values.len() || upper.len() != values.len() {
        return Err(AnomalyError::InvalidParameter(
            "interval bounds must match the number of values".to_string(),
        ));
    }
    Ok(values
        .iter()
        .zip(lower.iter().zip(upper))
        .map(|(&v, (&lo, &up))| {
            if v > up {
                AnomalyLabel::Above
            } else if v < lo {
                AnomalyLabel::Below
            } else {
                AnomalyLabel::Normal
            }
        })
        .collect())
}

/// Parameters of the same-hour z-score rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SameHourConfig {
    /// Most recent same-hour residuals compared against.
    pub window: usize,
    /// Fewer history residuals than this label the point normal.
    pub min_samples: usize,
    /// Absolute z-score above which a point is anomalous.
    pub threshold: f64,
}

impl Default for SameHourConfig {
    fn default() -> Self {
        Self {
            window: 10,
            min_samples: 3,
            threshold: 2.5,
        }
    }
}

/// Compare each residual with residuals at the same hour of day on strictly
/// earlier calendar dates within the batch.
///
/// Uses the sample standard deviation; a zero deviation yields a z-score of
/// zero.
pub fn same_hour_zscore(
    timestamps: &[DateTime<Utc>],
    residuals: &[f64],
    config: &SameHourConfig,
) -> Result<Vec<AnomalyLabel>> {
    if timestamps.len() != residuals.len() {
        return Err(AnomalyError::InvalidParameter(
            "timestamps and residuals must have the same length".to_string(),
        ));
    }

    // Per hour: (date, residual) in timestamp order.
    let mut by_hour: HashMap<u32, Vec<(NaiveDate, f64)>> = HashMap::new();
    for (ts, &r) in timestamps.iter().zip(residuals) {
        by_hour.entry(ts.hour()).or_default().push((ts.date_naive(), r));
    }

    let labels = timestamps
        .iter()
        .zip(residuals)
        .map(|(ts, &r)| {
            let date = ts.date_naive();
            let history: Vec<f64> = by_hour
                .get(&ts.hour())
                .map(|entries| {
                    let earlier: Vec<f64> = entries
                        .iter()
                        .filter(|(d, _)| *d < date)
                        .map(|(_, v)| *v)
                        .collect();
                    let skip = earlier.len().saturating_sub(config.window);
                    earlier[skip..].to_vec()
                })
                .unwrap_or_default();

            if history.len() < config.min_samples.max(2) {
                return AnomalyLabel::Normal;
            }
            let sd = std_dev(&history);
            let z = if sd > 0.0 { (r - mean(&history)) / sd } else { 0.0 };
            if z.abs() > config.threshold {
                AnomalyLabel::from_sign(z)
            } else {
                AnomalyLabel::Normal
            }
        })
        .collect();
    Ok(labels)
}

/// Robust bound around the median of reference residuals.
///
/// A residual is anomalous when `|r - center| > multiplier * spread`, with
/// `spread` the (unscaled) median absolute deviation. A zero spread labels
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MadThreshold {
    pub center: f64,
    pub spread: f64,
}

impl MadThreshold {
    /// Median and MAD of `reference`; `None` when it is empty.
    pub fn from_residuals(reference: &[f64]) -> Option<Self> {
        if reference.is_empty() {
            return None;
        }
        Some(Self {
            center: median(reference),
            spread: mad(reference),
        })
    }

    pub fn label(&self, residual: f64, multiplier: f64) -> AnomalyLabel {
        let dev = residual - self.center;
        if self.spread > 0.0 && dev.abs() > multiplier * self.spread {
            AnomalyLabel::from_sign(dev)
        } else {
            AnomalyLabel::Normal
        }
    }
}

/// Bound at `k` population standard deviations of `errors`.
///
/// Returns the labels and the bound used. A zero bound labels nothing.
pub fn sigma_bound(errors: &[f64], k: f64) -> (Vec<AnomalyLabel>, f64) {
    if errors.is_empty() {
        return (Vec::new(), 0.0);
    }
    let bound = k * population_std(errors);
    let labels = errors
        .iter()
        .map(|&e| {
            if bound > 0.0 && e.abs() > bound {
                AnomalyLabel::from_sign(e)
            } else {
                AnomalyLabel::Normal
            }
        })
        .collect();
    (labels, bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn make_timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn interval_labels_are_signed() {
        let labels =
            interval_exceedance(&[5.0, 0.0, 2.0], &[1.0, 1.0, 1.0], &[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(
            labels,
            vec![AnomalyLabel::Above, AnomalyLabel::Below, AnomalyLabel::Normal]
        );
        assert!(interval_exceedance(&[1.0], &[], &[2.0]).is_err());
    }

    #[test]
    fn same_hour_needs_three_earlier_days() {
        // Three days: at most two earlier same-hour residuals for any point.
        let ts = make_timestamps(72);
        let mut residuals = vec![0.0; 72];
        residuals[60] = 1000.0;
        let labels = same_hour_zscore(&ts, &residuals, &SameHourConfig::default()).unwrap();
        assert!(labels.iter().all(|l| *l == AnomalyLabel::Normal));
    }

    #[test]
    fn same_hour_flags_spike_with_history() {
        let ts = make_timestamps(24 * 6);
        let mut residuals: Vec<f64> = (0..24 * 6).map(|i| ((i / 24) % 2) as f64).collect();
        let spike = 24 * 5 + 7;
        residuals[spike] = 50.0;
        let dip = 24 * 5 + 9;
        residuals[dip] = -50.0;
        let labels = same_hour_zscore(&ts, &residuals, &SameHourConfig::default()).unwrap();
        assert_eq!(labels[spike], AnomalyLabel::Above);
        assert_eq!(labels[dip], AnomalyLabel::Below);
        assert_eq!(labels.iter().filter(|l| l.is_anomaly()).count(), 2);
    }

    #[test]
    fn same_hour_constant_history_gives_zero_score() {
        let ts = make_timestamps(24 * 5);
        let mut residuals = vec![2.0; 24 * 5];
        residuals[24 * 4] = 90.0;
        let labels = same_hour_zscore(&ts, &residuals, &SameHourConfig::default()).unwrap();
        assert!(labels.iter().all(|l| !l.is_anomaly()));
    }

    #[test]
    fn same_hour_window_uses_most_recent_days() {
        // Days 0-9 alternate widely, days 10-19 are tight around 100.
        let days = 21;
        let ts = make_timestamps(24 * days);
        let mut residuals: Vec<f64> = (0..24 * days)
            .map(|i| {
                let day = i / 24;
                if day < 10 {
                    if day % 2 == 0 { 0.0 } else { 200.0 }
                } else {
                    100.0 + (day % 2) as f64
                }
            })
            .collect();
        let probe = 24 * 20;
        residuals[probe] = 110.0;
        let labels = same_hour_zscore(&ts, &residuals, &SameHourConfig::default()).unwrap();
        assert_eq!(labels[probe], AnomalyLabel::Above);
    }

    #[test]
    fn mad_threshold_ignores_spread_of_zero() {
        let flat = MadThreshold::from_residuals(&[1.0, 1.0, 1.0, 9.0]).unwrap();
        assert_eq!(flat.spread, 0.0);
        assert_eq!(flat.label(100.0, 3.0), AnomalyLabel::Normal);

        let reference = [1.0, 2.0, 3.0, 2.0, 1.0, 3.0, 2.0];
        let bound = MadThreshold::from_residuals(&reference).unwrap();
        assert_eq!(bound.center, 2.0);
        assert_eq!(bound.label(-40.0, 3.0), AnomalyLabel::Below);
        assert_eq!(bound.label(5.5, 3.0), AnomalyLabel::Above);
        assert_eq!(bound.label(4.0, 3.0), AnomalyLabel::Normal);
        assert!(MadThreshold::from_residuals(&[]).is_none());
    }

    #[test]
    fn sigma_bound_uses_population_std() {
        let (labels, bound) = sigma_bound(&[1.0, -1.0, 1.0, -1.0], 4.0);
        assert_eq!(bound, 4.0);
        assert!(labels.iter().all(|l| !l.is_anomaly()));

        let (labels, bound) = sigma_bound(&[5.0], 4.0);
        assert_eq!(bound, 0.0);
        assert_eq!(labels, vec![AnomalyLabel::Normal]);
    }
}
