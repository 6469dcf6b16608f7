//! Multi-seasonal decomposition detector.
//!
//! Training runs MSTL over the configured periods and fits an ARMA model on
//! the remainder. A point `h` steps after the end of training is expected at
//!
//! ```text
//! trend[n-1] + Σ_p cycle_p[(h-1) mod p] + remainder_forecast[h-1]
//! ```
//!
//! where `cycle_p` is the last full cycle of seasonal component `p`. Errors
//! beyond `threshold_sigma` population standard deviations of the batch
//! errors are anomalous.

use super::arima::{Arima, ArimaOrder, ArimaState};
use super::traits::{AnomalyModel, ModelArtifact, ModelKind, ModelState};
use crate::context::RunContext;
use crate::core::{ScoredSeries, TimeSeries};
use crate::detection::sigma_bound;
use crate::error::{AnomalyError, Result};
use crate::seasonality::Mstl;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Last full cycle of one seasonal component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalCycle {
    pub period: usize,
    /// Values at training positions `n - period .. n`.
    pub cycle: Vec<f64>,
}

impl SeasonalCycle {
    /// Seasonal value `steps_ahead` (≥ 1) positions after the training end.
    fn at(&self, steps_ahead: usize) -> f64 {
        self.cycle[(steps_ahead - 1) % self.period]
    }
}

/// Fitted decomposition state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionState {
    pub train_end: DateTime<Utc>,
    pub frequency_seconds: i64,
    pub last_trend: f64,
    pub seasonals: Vec<SeasonalCycle>,
    pub remainder_model: ArimaState,
    pub threshold_sigma: f64,
}

/// MSTL + ARMA anomaly detector.
#[derive(Debug, Clone)]
pub struct MultiSeasonalDecompositionDetector {
    periods: Vec<usize>,
    order: ArimaOrder,
    threshold_sigma: f64,
    iterations: usize,
    state: Option<DecompositionState>,
    remainder: Option<Arima>,
}

impl Default for MultiSeasonalDecompositionDetector {
    fn default() -> Self {
        Self {
            // Daily, weekly, monthly and yearly cycles of an hourly series.
            periods: vec![24, 168, 720, 8760],
            order: ArimaOrder::new(1, 0, 1),
            threshold_sigma: 4.0,
            iterations: 2,
            state: None,
            remainder: None,
        }
    }
}

impl MultiSeasonalDecompositionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seasonal periods in samples.
    pub fn with_periods(mut self, periods: Vec<usize>) -> Self {
        self.periods = periods;
        self
    }

    /// Order of the remainder model.
    pub fn with_order(mut self, p: usize, d: usize, q: usize) -> Self {
        self.order = ArimaOrder::new(p, d, q);
        self
    }

    pub fn with_threshold_sigma(mut self, k: f64) -> Self {
        self.threshold_sigma = k;
        self
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    /// Periods kept by the last fit, ascending.
    pub fn fitted_periods(&self) -> Vec<usize> {
        self.state
            .as_ref()
            .map(|s| s.seasonals.iter().map(|c| c.period).collect())
            .unwrap_or_default()
    }

    fn fitted(&self) -> Result<(&DecompositionState, &Arima)> {
        match (&self.state, &self.remainder) {
            (Some(state), Some(arima)) => Ok((state, arima)),
            _ => Err(AnomalyError::ModelNotTrained(self.name().to_string())),
        }
    }

    fn usable_periods(&self, n: usize) -> Result<Vec<usize>> {
        if self.periods.is_empty() {
            return Err(AnomalyError::InvalidParameter(
                "at least one seasonal period is required".to_string(),
            ));
        }
        if let Some(&bad) = self.periods.iter().find(|&&p| p < 2) {
            return Err(AnomalyError::InvalidParameter(format!(
                "seasonal periods must be at least 2, got {}",
                bad
            )));
        }
        let (kept, dropped): (Vec<usize>, Vec<usize>) =
            self.periods.iter().copied().partition(|&p| 2 * p <= n);
        if !dropped.is_empty() {
            tracing::warn!(
                ?dropped,
                points = n,
                "seasonal periods longer than half the training series were dropped"
            );
        }
        if kept.is_empty() {
            let shortest = dropped.iter().copied().min().unwrap_or(2);
            return Err(AnomalyError::InsufficientData {
                needed: 2 * shortest,
                got: n,
            });
        }
        Ok(kept)
    }

    /// Summed seasonal term for the `horizon` steps after training.
    pub fn seasonal_forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let (state, _) = self.fitted()?;
        Ok((1..=horizon)
            .map(|h| state.seasonals.iter().map(|c| c.at(h)).sum())
            .collect())
    }

    /// Reconstructed expectation for the `horizon` steps after training.
    pub fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let (state, arima) = self.fitted()?;
        let remainder = arima.forecast(horizon)?;
        let seasonal = self.seasonal_forecast(horizon)?;
        Ok(seasonal
            .iter()
            .zip(&remainder)
            .map(|(s, r)| state.last_trend + s + r)
            .collect())
    }

    fn steps_ahead(state: &DecompositionState, ts: DateTime<Utc>) -> Result<usize> {
        let offset = (ts - state.train_end).num_seconds();
        if offset <= 0 {
            return Err(AnomalyError::InvalidSeries(format!(
                "timestamp {} is not after the training end {}",
                ts, state.train_end
            )));
        }
        if offset % state.frequency_seconds != 0 {
            return Err(AnomalyError::InvalidSeries(format!(
                "timestamp {} is not on the {}s training grid",
                ts, state.frequency_seconds
            )));
        }
        Ok((offset / state.frequency_seconds) as usize)
    }
}

impl AnomalyModel for MultiSeasonalDecompositionDetector {
    fn fit(&mut self, train: &TimeSeries, ctx: &RunContext) -> Result<()> {
        ctx.in_scope(|| {
            train.require_non_empty("training")?;
            if self.threshold_sigma.is_nan() || self.threshold_sigma <= 0.0 {
                return Err(AnomalyError::InvalidParameter(format!(
                    "threshold sigma must be positive, got {}",
                    self.threshold_sigma
                )));
            }
            let frequency_seconds = train.resolve_frequency()?.num_seconds();
            if frequency_seconds <= 0 {
                return Err(AnomalyError::InvalidSeries(
                    "training frequency must be positive".to_string(),
                ));
            }
            train.require_regular(Duration::seconds(frequency_seconds), "training")?;

            let n = train.len();
            let periods = self.usable_periods(n)?;
            let decomposition = Mstl::new(periods)
                .with_iterations(self.iterations)
                .decompose(train.values())?;

            let mut remainder = Arima::from_order(self.order);
            remainder.fit(&decomposition.remainder)?;
            let remainder_model = remainder
                .state()
                .cloned()
                .ok_or_else(|| AnomalyError::fit_failed("ARMA", "no state after fit"))?;

            let seasonals: Vec<SeasonalCycle> = decomposition
                .seasonals
                .iter()
                .map(|(period, component)| SeasonalCycle {
                    period: *period,
                    cycle: component[n - period..].to_vec(),
                })
                .collect();
            let last_trend = decomposition.trend[n - 1];
            let train_end = train.timestamps()[n - 1];

            tracing::info!(
                points = n,
                periods = ?decomposition.periods(),
                last_trend,
                "decomposition model fitted"
            );
            self.state = Some(DecompositionState {
                train_end,
                frequency_seconds,
                last_trend,
                seasonals,
                remainder_model,
                threshold_sigma: self.threshold_sigma,
            });
            self.remainder = Some(remainder);
            Ok(())
        })
    }

    fn predict(&self, series: &TimeSeries, ctx: &RunContext) -> Result<ScoredSeries> {
        ctx.in_scope(|| {
            let (state, _) = self.fitted()?;
            series.require_non_empty("prediction")?;

            let steps = series
                .timestamps()
                .iter()
                .map(|&ts| Self::steps_ahead(state, ts))
                .collect::<Result<Vec<_>>>()?;
            let horizon = steps.iter().copied().max().unwrap_or(0);
            let reconstructed = self.forecast(horizon)?;
            let expected: Vec<f64> = steps.iter().map(|&h| reconstructed[h - 1]).collect();

            let errors: Vec<f64> = series
                .values()
                .iter()
                .zip(&expected)
                .map(|(v, e)| v - e)
                .collect();
            let (labels, bound) = sigma_bound(&errors, state.threshold_sigma);
            let lower: Vec<f64> = expected.iter().map(|e| e - bound).collect();
            let upper: Vec<f64> = expected.iter().map(|e| e + bound).collect();

            let scored = ScoredSeries::from_columns(
                series.timestamps(),
                series.values(),
                &expected,
                Some((&lower, &upper)),
                &labels,
            )?;
            tracing::info!(
                points = scored.len(),
                bound,
                anomalies = scored.anomaly_count(),
                "decomposition prediction completed"
            );
            Ok(scored)
        })
    }

    fn save(&self, ctx: &RunContext) -> Result<ModelArtifact> {
        let (state, _) = self.fitted()?;
        ctx.in_scope(|| tracing::debug!("decomposition state captured"));
        Ok(ModelArtifact::new(ModelState::Decomposition(state.clone())))
    }

    fn load(&mut self, artifact: ModelArtifact, ctx: &RunContext) -> Result<()> {
        artifact.validate(ModelKind::Decomposition)?;
        let ModelState::Decomposition(state) = artifact.state else {
            return Err(AnomalyError::ArtifactMismatch(
                "expected decomposition state".to_string(),
            ));
        };
        if state.frequency_seconds <= 0
            || state
                .seasonals
                .iter()
                .any(|c| c.period == 0 || c.cycle.len() != c.period)
        {
            return Err(AnomalyError::ArtifactMismatch(
                "decomposition state has inconsistent seasonal cycles".to_string(),
            ));
        }
        let remainder = Arima::from_state(state.remainder_model.clone())?;
        self.periods = state.seasonals.iter().map(|c| c.period).collect();
        self.order = state.remainder_model.order;
        self.threshold_sigma = state.threshold_sigma;
        self.state = Some(state);
        self.remainder = Some(remainder);
        ctx.in_scope(|| tracing::info!("decomposition model loaded"));
        Ok(())
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Decomposition
    }

    fn name(&self) -> &str {
        "MultiSeasonalDecomposition"
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}
