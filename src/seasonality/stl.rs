//! STL (Seasonal-Trend decomposition using LOESS).
//!
//! LOESS is simplified to a tricube-weighted local mean, which keeps the
//! decomposition fast on long hourly series while preserving linear trends
//! away from the edges.

use crate::error::{AnomalyError, Result};

/// Trend, seasonal and remainder parts of a single-period decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
}

/// Single-period STL decomposer.
#[derive(Debug, Clone)]
pub struct Stl {
    period: usize,
    seasonal_span: usize,
    trend_span: usize,
    inner_iterations: usize,
}

fn odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

impl Stl {
    /// Create a decomposer for `period` samples per cycle.
    pub fn new(period: usize) -> Self {
        let seasonal_span = 7;
        let trend_span =
            (1.5 * period as f64 / (1.0 - 1.5 / seasonal_span as f64)).ceil() as usize;
        Self {
            period,
            seasonal_span,
            trend_span: odd(trend_span.max(3)),
            inner_iterations: 2,
        }
    }

    /// Number of neighbouring cycles averaged per cycle-subseries point.
    pub fn with_seasonal_span(mut self, span: usize) -> Self {
        self.seasonal_span = odd(span.max(3));
        self
    }

    pub fn with_trend_span(mut self, span: usize) -> Self {
        self.trend_span = odd(span.max(3));
        self
    }

    pub fn with_inner_iterations(mut self, n: usize) -> Self {
        self.inner_iterations = n.max(1);
        self
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Decompose `series`; needs at least two full cycles.
    pub fn decompose(&self, series: &[f64]) -> Result<Decomposition> {
        let n = series.len();
        if self.period < 2 {
            return Err(AnomalyError::InvalidParameter(format!(
                "seasonal period must be at least 2, got {}",
                self.period
            )));
        }
        if n < 2 * self.period {
            return Err(AnomalyError::InsufficientData {
                needed: 2 * self.period,
                got: n,
            });
        }

        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];

        for _ in 0..self.inner_iterations {
            let detrended: Vec<f64> = series.iter().zip(&trend).map(|(y, t)| y - t).collect();
            let cycles = self.smooth_subseries(&detrended);

            let low = moving_average(&cycles, self.period);
            let low = moving_average(&low, self.period);
            let low = moving_average(&low, 3);
            let low = tricube_smooth(&low, odd(self.period));

            for i in 0..n {
                seasonal[i] = cycles[i] - low[i];
            }

            let adjusted: Vec<f64> = series.iter().zip(&seasonal).map(|(y, s)| y - s).collect();
            trend = tricube_smooth(&adjusted, self.trend_span);
        }

        let remainder = series
            .iter()
            .zip(&trend)
            .zip(&seasonal)
            .map(|((y, t), s)| y - t - s)
            .collect();

        Ok(Decomposition {
            trend,
            seasonal,
            remainder,
        })
    }

    fn smooth_subseries(&self, values: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; values.len()];
        for phase in 0..self.period {
            let sub: Vec<f64> = values.iter().skip(phase).step_by(self.period).copied().collect();
            let smoothed = tricube_smooth(&sub, self.seasonal_span);
            for (k, v) in smoothed.into_iter().enumerate() {
                out[phase + k * self.period] = v;
            }
        }
        out
    }
}

/// Tricube-weighted local mean over a centred window of `span` points.
pub(crate) fn tricube_smooth(values: &[f64], span: usize) -> Vec<f64> {
    let n = values.len();
    let half = span / 2;
    let reach = half as f64 + 1.0;

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            let (mut num, mut den) = (0.0, 0.0);
            for (j, &v) in values.iter().enumerate().take(hi).skip(lo) {
                let u = (i as f64 - j as f64).abs() / reach;
                let w = (1.0 - u.powi(3)).powi(3);
                num += w * v;
                den += w;
            }
            if den > 0.0 {
                num / den
            } else {
                values[i]
            }
        })
        .collect()
}

fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            values[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn daily_wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 10.0 + 0.01 * i as f64 + 3.0 * (2.0 * PI * i as f64 / 24.0).sin())
            .collect()
    }

    #[test]
    fn stl_requires_two_cycles() {
        let err = Stl::new(24).decompose(&[1.0; 30]).unwrap_err();
        assert!(matches!(err, AnomalyError::InsufficientData { needed: 48, got: 30 }));
        assert!(Stl::new(1).decompose(&[1.0; 30]).is_err());
    }

    #[test]
    fn components_sum_to_series() {
        let series = daily_wave(240);
        let d = Stl::new(24).decompose(&series).unwrap();
        for i in 0..series.len() {
            let total = d.trend[i] + d.seasonal[i] + d.remainder[i];
            assert!((total - series[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn recovers_daily_wave_away_from_edges() {
        let series = daily_wave(240);
        let d = Stl::new(24).decompose(&series).unwrap();
        for i in 48..192 {
            let expected = 3.0 * (2.0 * PI * i as f64 / 24.0).sin();
            assert!(
                (d.seasonal[i] - expected).abs() < 0.5,
                "seasonal[{}] = {} vs {}",
                i,
                d.seasonal[i],
                expected
            );
            assert!(d.remainder[i].abs() < 0.5);
        }
    }

    #[test]
    fn constant_series_has_flat_components() {
        let d = Stl::new(12).decompose(&[4.0; 48]).unwrap();
        assert!(d.seasonal.iter().all(|s| s.abs() < 1e-9));
        assert!(d.trend.iter().all(|t| (t - 4.0).abs() < 1e-9));
    }
}
