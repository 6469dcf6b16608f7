//! Additive seasonal forecaster.
//!
//! The expected value is a sum of components fitted jointly by penalised
//! least squares on the absmax-scaled target:
//!
//! - piecewise-linear trend with hinge terms at evenly spaced changepoints
//! - Fourier seasonal cycles (daily, weekly, yearly), each enabled only
//!   when the training window covers at least two cycles
//! - a holiday indicator for fixed Persian public holidays, included only
//!   when the training window touches one
//!
//! The prediction interval is `expected ± z·σ`, with σ the in-sample
//! residual standard deviation and z the normal quantile of the interval
//! width. Expected values and bounds are clipped at zero since counters
//! cannot go negative.

use super::traits::{AnomalyModel, ModelArtifact, ModelKind, ModelState};
use crate::calendar::{is_persian_holiday, persian_fixed_holidays};
use crate::context::RunContext;
use crate::core::{AnomalyLabel, Forecast, ScoredSeries, TimeSeries};
use crate::detection::{interval_exceedance, same_hour_zscore, SameHourConfig};
use crate::error::{AnomalyError, Result};
use crate::utils::{abs_max, dot, ridge_least_squares, std_dev};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How the additive forecaster turns forecasts into labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AdditivePolicy {
    /// Label observations outside the prediction interval.
    IntervalExceedance,
    /// Compare each residual with same-hour residuals of earlier days.
    SameHourZScore(SameHourConfig),
}

impl Default for AdditivePolicy {
    fn default() -> Self {
        AdditivePolicy::SameHourZScore(SameHourConfig::default())
    }
}

/// One Fourier seasonal cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FourierTerm {
    pub period_days: f64,
    pub order: usize,
}

/// Fitted additive model state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditiveState {
    pub origin: DateTime<Utc>,
    pub time_scale_seconds: f64,
    pub value_scale: f64,
    /// Changepoints in scaled time.
    pub changepoints: Vec<f64>,
    pub seasonalities: Vec<FourierTerm>,
    pub holidays: bool,
    pub coefficients: Vec<f64>,
    /// In-sample residual standard deviation on the original scale.
    pub sigma: f64,
    pub interval_width: f64,
    pub policy: AdditivePolicy,
}

impl AdditiveState {
    fn design_row(&self, ts: DateTime<Utc>) -> Vec<f64> {
        let t = (ts - self.origin).num_seconds() as f64 / self.time_scale_seconds;
        let mut row = Vec::with_capacity(self.coefficients.len());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|c| (t - c).max(0.0)));

        let days = ts.timestamp() as f64 / SECONDS_PER_DAY;
        for term in &self.seasonalities {
            for k in 1..=term.order {
                let angle = 2.0 * PI * k as f64 * days / term.period_days;
                row.push(angle.sin());
                row.push(angle.cos());
            }
        }
        if self.holidays {
            row.push(if is_persian_holiday(ts.date_naive()) { 1.0 } else { 0.0 });
        }
        row
    }

    fn expected(&self, ts: DateTime<Utc>) -> f64 {
        dot(&self.design_row(ts), &self.coefficients) * self.value_scale
    }
}

/// Additive trend + seasonality + holiday forecaster.
#[derive(Debug, Clone)]
pub struct AdditiveSeasonalForecaster {
    n_changepoints: usize,
    changepoint_range: f64,
    changepoint_penalty: f64,
    daily_order: usize,
    weekly_order: usize,
    yearly_order: usize,
    seasonality_penalty: f64,
    holidays: bool,
    interval_width: f64,
    policy: AdditivePolicy,
    state: Option<AdditiveState>,
}

impl Default for AdditiveSeasonalForecaster {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_penalty: 10.0,
            daily_order: 4,
            weekly_order: 3,
            yearly_order: 10,
            seasonality_penalty: 0.01,
            holidays: true,
            interval_width: 0.8,
            policy: AdditivePolicy::default(),
            state: None,
        }
    }
}

impl AdditiveSeasonalForecaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of potential trend changepoints.
    pub fn with_changepoints(mut self, n: usize) -> Self {
        self.n_changepoints = n;
        self
    }

    /// Share of the training window in which changepoints are placed.
    pub fn with_changepoint_range(mut self, range: f64) -> Self {
        self.changepoint_range = range;
        self
    }

    pub fn with_changepoint_penalty(mut self, penalty: f64) -> Self {
        self.changepoint_penalty = penalty;
        self
    }

    /// Fourier order of the daily cycle; zero disables it.
    pub fn with_daily_order(mut self, order: usize) -> Self {
        self.daily_order = order;
        self
    }

    pub fn with_weekly_order(mut self, order: usize) -> Self {
        self.weekly_order = order;
        self
    }

    pub fn with_yearly_order(mut self, order: usize) -> Self {
        self.yearly_order = order;
        self
    }

    pub fn with_seasonality_penalty(mut self, penalty: f64) -> Self {
        self.seasonality_penalty = penalty;
        self
    }

    pub fn with_holidays(mut self, enabled: bool) -> Self {
        self.holidays = enabled;
        self
    }

    /// Coverage of the prediction interval, in `(0, 1)`.
    pub fn with_interval_width(mut self, width: f64) -> Self {
        self.interval_width = width;
        self
    }

    pub fn with_policy(mut self, policy: AdditivePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> AdditivePolicy {
        self.state.as_ref().map_or(self.policy, |s| s.policy)
    }

    fn validate(&self) -> Result<()> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(AnomalyError::InvalidParameter(format!(
                "interval width must be in (0, 1), got {}",
                self.interval_width
            )));
        }
        if !(0.0..=1.0).contains(&self.changepoint_range) {
            return Err(AnomalyError::InvalidParameter(format!(
                "changepoint range must be in [0, 1], got {}",
                self.changepoint_range
            )));
        }
        if self.changepoint_penalty < 0.0 || self.seasonality_penalty < 0.0 {
            return Err(AnomalyError::InvalidParameter(
                "penalties must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    fn seasonalities_for(&self, span_days: f64) -> Vec<FourierTerm> {
        [
            (1.0, self.daily_order),
            (7.0, self.weekly_order),
            (365.25, self.yearly_order),
        ]
        .into_iter()
        .filter(|&(period, order)| order > 0 && span_days >= 2.0 * period)
        .map(|(period_days, order)| FourierTerm { period_days, order })
        .collect()
    }

    fn changepoints_for(&self, scaled_times: &[f64]) -> Vec<f64> {
        let eligible = (scaled_times.len() as f64 * self.changepoint_range).floor() as usize;
        let count = self.n_changepoints.min(eligible.saturating_sub(1));
        if count == 0 {
            return Vec::new();
        }
        // Evenly spaced over the eligible history, excluding its first point.
        (1..=count)
            .map(|k| {
                let idx = ((eligible - 1) as f64 * k as f64 / count as f64).round() as usize;
                scaled_times[idx]
            })
            .collect()
    }

    /// Forecast expected values and interval for `timestamps`.
    pub fn forecast(&self, timestamps: &[DateTime<Utc>]) -> Result<Forecast> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| AnomalyError::ModelNotTrained(self.name().to_string()))?;
        let z = interval_z(state.interval_width)?;
        let expected: Vec<f64> = timestamps.iter().map(|&ts| state.expected(ts)).collect();
        Ok(Forecast::symmetric(expected, z * state.sigma).clip_non_negative())
    }
}

fn interval_z(width: f64) -> Result<f64> {
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AnomalyError::InvalidParameter(format!("normal distribution: {}", e)))?;
    Ok(normal.inverse_cdf((1.0 + width) / 2.0))
}

impl AnomalyModel for AdditiveSeasonalForecaster {
    fn fit(&mut self, train: &TimeSeries, ctx: &RunContext) -> Result<()> {
        ctx.in_scope(|| {
            self.validate()?;
            train.require_non_empty("training")?;
            if train.len() < 2 {
                return Err(AnomalyError::InsufficientData {
                    needed: 2,
                    got: train.len(),
                });
            }

            let timestamps = train.timestamps();
            let origin = timestamps[0];
            let span_seconds = (timestamps[timestamps.len() - 1] - origin).num_seconds() as f64;
            let time_scale_seconds = if span_seconds > 0.0 { span_seconds } else { 1.0 };
            let scaled_times: Vec<f64> = timestamps
                .iter()
                .map(|ts| (*ts - origin).num_seconds() as f64 / time_scale_seconds)
                .collect();

            let peak = abs_max(train.values());
            let value_scale = if peak > 0.0 { peak } else { 1.0 };
            let target: Vec<f64> = train.values().iter().map(|v| v / value_scale).collect();

            let changepoints = self.changepoints_for(&scaled_times);
            let seasonalities = self.seasonalities_for(span_seconds / SECONDS_PER_DAY);
            let holidays = self.holidays
                && !persian_fixed_holidays(
                    origin.date_naive(),
                    timestamps[timestamps.len() - 1].date_naive(),
                )
                .is_empty();

            let mut penalties = vec![0.0, 0.0];
            penalties.extend(std::iter::repeat(self.changepoint_penalty).take(changepoints.len()));
            let fourier_columns: usize = seasonalities.iter().map(|s| 2 * s.order).sum();
            penalties.extend(std::iter::repeat(self.seasonality_penalty).take(fourier_columns));
            if holidays {
                penalties.push(self.seasonality_penalty);
            }

            let mut state = AdditiveState {
                origin,
                time_scale_seconds,
                value_scale,
                changepoints,
                seasonalities,
                holidays,
                coefficients: vec![0.0; penalties.len()],
                sigma: 0.0,
                interval_width: self.interval_width,
                policy: self.policy,
            };

            let rows: Vec<Vec<f64>> = timestamps.iter().map(|&ts| state.design_row(ts)).collect();
            state.coefficients = ridge_least_squares(&rows, &target, &penalties)
                .map_err(|e| AnomalyError::fit_failed("additive", e.to_string()))?;
            if state.coefficients.iter().any(|c| !c.is_finite()) {
                return Err(AnomalyError::fit_failed("additive", "non-finite coefficients"));
            }

            let residuals: Vec<f64> = train
                .points()
                .map(|(ts, v)| v - state.expected(ts))
                .collect();
            let sigma = std_dev(&residuals);
            state.sigma = if sigma.is_finite() { sigma } else { 0.0 };

            tracing::info!(
                points = train.len(),
                changepoints = state.changepoints.len(),
                seasonalities = state.seasonalities.len(),
                holidays = state.holidays,
                sigma = state.sigma,
                "additive model fitted"
            );
            self.state = Some(state);
            Ok(())
        })
    }

    fn predict(&self, series: &TimeSeries, ctx: &RunContext) -> Result<ScoredSeries> {
        ctx.in_scope(|| {
            let state = self
                .state
                .as_ref()
                .ok_or_else(|| AnomalyError::ModelNotTrained(self.name().to_string()))?;
            series.require_non_empty("prediction")?;

            let forecast = self.forecast(series.timestamps())?;
            let (lower, upper) = match (forecast.lower(), forecast.upper()) {
                (Some(lower), Some(upper)) => (lower, upper),
                _ => return Err(AnomalyError::fit_failed("additive", "forecast without interval")),
            };

            let labels: Vec<AnomalyLabel> = match &state.policy {
                AdditivePolicy::IntervalExceedance => {
                    interval_exceedance(series.values(), lower, upper)?
                }
                AdditivePolicy::SameHourZScore(config) => {
                    let residuals: Vec<f64> = series
                        .values()
                        .iter()
                        .zip(forecast.expected())
                        .map(|(v, e)| v - e)
                        .collect();
                    same_hour_zscore(series.timestamps(), &residuals, config)?
                }
            };

            let scored = ScoredSeries::from_columns(
                series.timestamps(),
                series.values(),
                forecast.expected(),
                Some((lower, upper)),
                &labels,
            )?;
            tracing::info!(
                points = scored.len(),
                anomalies = scored.anomaly_count(),
                "additive prediction completed"
            );
            Ok(scored)
        })
    }

    fn save(&self, ctx: &RunContext) -> Result<ModelArtifact> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| AnomalyError::ModelNotTrained(self.name().to_string()))?;
        ctx.in_scope(|| tracing::debug!("additive state captured"));
        Ok(ModelArtifact::new(ModelState::Additive(state.clone())))
    }

    fn load(&mut self, artifact: ModelArtifact, ctx: &RunContext) -> Result<()> {
        artifact.validate(ModelKind::Additive)?;
        match artifact.state {
            ModelState::Additive(state) => {
                interval_z(state.interval_width)?;
                self.interval_width = state.interval_width;
                self.policy = state.policy;
                self.state = Some(state);
                ctx.in_scope(|| tracing::info!("additive model loaded"));
                Ok(())
            }
            other => Err(AnomalyError::ArtifactMismatch(format!(
                "expected additive state, found {}",
                other.kind()
            ))),
        }
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Additive
    }

    fn name(&self) -> &str {
        "AdditiveSeasonal"
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}
