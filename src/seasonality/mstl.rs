//! MSTL: multiple seasonal-trend decomposition.
//!
//! Each seasonal component is re-estimated in turn by STL on the series with
//! the other components removed. The trend comes from the last STL pass.

use super::stl::Stl;
use crate::error::{AnomalyError, Result};

/// Result of a multi-period decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiDecomposition {
    pub trend: Vec<f64>,
    /// One component per period, in ascending period order.
    pub seasonals: Vec<(usize, Vec<f64>)>,
    pub remainder: Vec<f64>,
}

impl MultiDecomposition {
    /// Sum of every seasonal component.
    pub fn total_seasonal(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.trend.len()];
        for (_, component) in &self.seasonals {
            for (t, s) in total.iter_mut().zip(component) {
                *t += s;
            }
        }
        total
    }

    pub fn periods(&self) -> Vec<usize> {
        self.seasonals.iter().map(|(p, _)| *p).collect()
    }
}

/// Multi-period decomposer.
#[derive(Debug, Clone)]
pub struct Mstl {
    periods: Vec<usize>,
    iterations: usize,
}

impl Mstl {
    /// Periods are sorted and deduplicated.
    pub fn new(mut periods: Vec<usize>) -> Self {
        periods.sort_unstable();
        periods.dedup();
        Self {
            periods,
            iterations: 2,
        }
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.iterations = n.max(1);
        self
    }

    pub fn periods(&self) -> &[usize] {
        &self.periods
    }

    pub fn decompose(&self, series: &[f64]) -> Result<MultiDecomposition> {
        let longest = *self.periods.last().ok_or_else(|| {
            AnomalyError::InvalidParameter("at least one seasonal period is required".to_string())
        })?;
        if series.len() < 2 * longest {
            return Err(AnomalyError::InsufficientData {
                needed: 2 * longest,
                got: series.len(),
            });
        }

        let n = series.len();
        let mut seasonals = vec![vec![0.0; n]; self.periods.len()];
        let mut deseasonalized = series.to_vec();
        let mut trend = vec![0.0; n];

        for _ in 0..self.iterations {
            for (idx, &period) in self.periods.iter().enumerate() {
                for (d, s) in deseasonalized.iter_mut().zip(&seasonals[idx]) {
                    *d += s;
                }
                let fit = Stl::new(period).decompose(&deseasonalized)?;
                for (d, s) in deseasonalized.iter_mut().zip(&fit.seasonal) {
                    *d -= s;
                }
                seasonals[idx] = fit.seasonal;
                trend = fit.trend;
            }
        }

        let remainder = deseasonalized
            .iter()
            .zip(&trend)
            .map(|(d, t)| d - t)
            .collect();

        Ok(MultiDecomposition {
            trend,
            seasonals: self.periods.iter().copied().zip(seasonals).collect(),
            remainder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::population_std;
    use std::f64::consts::PI;

    fn two_waves(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                5.0 + 2.0 * (2.0 * PI * t / 24.0).sin() + 4.0 * (2.0 * PI * t / 168.0).sin()
            })
            .collect()
    }

    #[test]
    fn periods_are_sorted_and_deduplicated() {
        assert_eq!(Mstl::new(vec![168, 24, 24]).periods(), &[24, 168]);
    }

    #[test]
    fn requires_two_cycles_of_longest_period() {
        let err = Mstl::new(vec![24, 168]).decompose(&two_waves(300)).unwrap_err();
        assert!(matches!(err, AnomalyError::InsufficientData { needed: 336, .. }));
        assert!(Mstl::new(vec![]).decompose(&[1.0; 10]).is_err());
    }

    #[test]
    fn components_reconstruct_series() {
        let series = two_waves(672);
        let d = Mstl::new(vec![24, 168]).decompose(&series).unwrap();
        let seasonal = d.total_seasonal();
        for i in 0..series.len() {
            let total = d.trend[i] + seasonal[i] + d.remainder[i];
            assert!((total - series[i]).abs() < 1e-9);
        }
        assert_eq!(d.periods(), vec![24, 168]);
    }

    #[test]
    fn longer_wave_lands_in_longer_component() {
        let series = two_waves(672);
        let d = Mstl::new(vec![24, 168]).decompose(&series).unwrap();
        let daily = population_std(&d.seasonals[0].1[168..504]);
        let weekly = population_std(&d.seasonals[1].1[168..504]);
        assert!(weekly > daily, "weekly {} daily {}", weekly, daily);
    }
}
