//! ARIMA forecaster with classifier-scored residuals.
//!
//! Stage one fits ARIMA on the raw values. Stage two trains an isolation
//! forest on the in-sample residuals. Batches are aligned to the model by
//! position on the training grid, so a batch may overlap the training
//! window (in-sample fitted values) or extend past it (multi-step forecast).
//!
//! Batch and single-point scoring share one [`ResidualRule`].

use super::arima::{Arima, ArimaOrder, ArimaState};
use super::traits::{AnomalyModel, ModelArtifact, ModelKind, ModelState};
use crate::context::RunContext;
use crate::core::{AnomalyLabel, ScoredPoint, ScoredSeries, TimeSeries};
use crate::detection::{ForestState, IsolationForest, MadThreshold};
use crate::error::{AnomalyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How residuals are turned into labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ResidualRule {
    /// Outlier decision of the trained isolation forest.
    #[default]
    Classifier,
    /// `|r - median| > multiplier * MAD` against the training residuals.
    Mad { multiplier: f64 },
}

/// Fitted hybrid state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridState {
    pub train_start: DateTime<Utc>,
    pub frequency_seconds: i64,
    pub train_len: usize,
    pub arima: ArimaState,
    pub forest: ForestState,
    pub residual_bound: MadThreshold,
    pub rule: ResidualRule,
}

#[derive(Debug, Clone)]
struct Fitted {
    arima: Arima,
    forest: IsolationForest,
    state: HybridState,
}

/// ARIMA + isolation forest residual classifier.
#[derive(Debug, Clone, Default)]
pub struct HybridResidualClassifier {
    order: ArimaOrder,
    forest: IsolationForest,
    rule: ResidualRule,
    fitted: Option<Fitted>,
}

impl HybridResidualClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(mut self, p: usize, d: usize, q: usize) -> Self {
        self.order = ArimaOrder::new(p, d, q);
        self
    }

    /// Expected share of outlying training residuals.
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.forest = self.forest.with_contamination(contamination);
        self
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.forest = self.forest.with_trees(n_trees);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.forest = self.forest.with_seed(seed);
        self
    }

    pub fn with_rule(mut self, rule: ResidualRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| AnomalyError::ModelNotTrained(self.name().to_string()))
    }

    /// Score a single observation through the batch path.
    pub fn predict_point(
        &self,
        timestamp: DateTime<Utc>,
        value: f64,
        ctx: &RunContext,
    ) -> Result<ScoredPoint> {
        let series = TimeSeries::new(vec![timestamp], vec![value])?;
        self.predict(&series, ctx)?
            .into_points()
            .pop()
            .ok_or_else(|| AnomalyError::InvalidSeries("no point was scored".to_string()))
    }
}

impl Fitted {
    fn position(&self, ts: DateTime<Utc>) -> Result<usize> {
        let offset = (ts - self.state.train_start).num_seconds();
        if offset < 0 {
            return Err(AnomalyError::InvalidSeries(format!(
                "timestamp {} precedes the training start {}",
                ts, self.state.train_start
            )));
        }
        if offset % self.state.frequency_seconds != 0 {
            return Err(AnomalyError::InvalidSeries(format!(
                "timestamp {} is not on the {}s training grid",
                ts, self.state.frequency_seconds
            )));
        }
        Ok((offset / self.state.frequency_seconds) as usize)
    }

    fn expected(&self, positions: &[usize]) -> Result<Vec<f64>> {
        let train_len = self.state.train_len;
        let horizon = positions
            .iter()
            .filter(|&&p| p >= train_len)
            .map(|&p| p - train_len + 1)
            .max()
            .unwrap_or(0);
        let ahead = self.arima.forecast(horizon)?;
        let in_sample = &self.state.arima.fitted;
        Ok(positions
            .iter()
            .map(|&p| if p < train_len { in_sample[p] } else { ahead[p - train_len] })
            .collect())
    }

    fn label(&self, residual: f64) -> Result<AnomalyLabel> {
        match self.state.rule {
            ResidualRule::Classifier => Ok(if self.forest.is_outlier(residual)? {
                AnomalyLabel::from_sign(residual - self.state.residual_bound.center)
            } else {
                AnomalyLabel::Normal
            }),
            ResidualRule::Mad { multiplier } => {
                Ok(self.state.residual_bound.label(residual, multiplier))
            }
        }
    }
}

impl AnomalyModel for HybridResidualClassifier {
    fn fit(&mut self, train: &TimeSeries, ctx: &RunContext) -> Result<()> {
        ctx.in_scope(|| {
            train.require_non_empty("training")?;
            if let ResidualRule::Mad { multiplier } = self.rule {
                if multiplier.is_nan() || multiplier <= 0.0 {
                    return Err(AnomalyError::InvalidParameter(format!(
                        "MAD multiplier must be positive, got {}",
                        multiplier
                    )));
                }
            }
            let frequency = train.resolve_frequency()?;
            if frequency.num_seconds() <= 0 {
                return Err(AnomalyError::InvalidSeries(
                    "training frequency must be positive".to_string(),
                ));
            }
            train.require_regular(frequency, "training")?;

            let mut arima = Arima::from_order(self.order);
            arima.fit(train.values())?;
            let arima_state = arima
                .state()
                .cloned()
                .ok_or_else(|| AnomalyError::fit_failed("ARIMA", "no state after fit"))?;

            let residuals: Vec<f64> = train
                .values()
                .iter()
                .zip(&arima_state.fitted)
                .map(|(v, f)| v - f)
                .collect();
            let mut forest = self.forest.clone();
            forest.fit(&residuals)?;
            let forest_state = forest
                .state()
                .cloned()
                .ok_or_else(|| AnomalyError::fit_failed("isolation forest", "no state after fit"))?;
            let residual_bound = MadThreshold::from_residuals(&residuals)
                .ok_or(AnomalyError::EmptyData)?;

            let state = HybridState {
                train_start: train.timestamps()[0],
                frequency_seconds: frequency.num_seconds(),
                train_len: train.len(),
                arima: arima_state,
                forest: forest_state,
                residual_bound,
                rule: self.rule,
            };
            tracing::info!(
                points = train.len(),
                threshold = state.forest.threshold(),
                "hybrid model fitted"
            );
            self.fitted = Some(Fitted {
                arima,
                forest,
                state,
            });
            Ok(())
        })
    }

    fn predict(&self, series: &TimeSeries, ctx: &RunContext) -> Result<ScoredSeries> {
        ctx.in_scope(|| {
            let fitted = self.fitted()?;
            series.require_non_empty("prediction")?;

            let positions = series
                .timestamps()
                .iter()
                .map(|&ts| fitted.position(ts))
                .collect::<Result<Vec<_>>>()?;
            let expected = fitted.expected(&positions)?;
            let labels = series
                .values()
                .iter()
                .zip(&expected)
                .map(|(v, e)| fitted.label(v - e))
                .collect::<Result<Vec<_>>>()?;

            let scored = ScoredSeries::from_columns(
                series.timestamps(),
                series.values(),
                &expected,
                None,
                &labels,
            )?;
            tracing::info!(
                points = scored.len(),
                anomalies = scored.anomaly_count(),
                "hybrid prediction completed"
            );
            Ok(scored)
        })
    }

    fn save(&self, ctx: &RunContext) -> Result<ModelArtifact> {
        let fitted = self.fitted()?;
        ctx.in_scope(|| tracing::debug!("hybrid state captured"));
        Ok(ModelArtifact::new(ModelState::Hybrid(fitted.state.clone())))
    }

    fn load(&mut self, artifact: ModelArtifact, ctx: &RunContext) -> Result<()> {
        artifact.validate(ModelKind::Hybrid)?;
        let ModelState::Hybrid(state) = artifact.state else {
            return Err(AnomalyError::ArtifactMismatch(
                "expected hybrid state".to_string(),
            ));
        };
        if state.frequency_seconds <= 0 || state.arima.fitted.len() != state.train_len {
            return Err(AnomalyError::ArtifactMismatch(
                "hybrid state has an inconsistent training grid".to_string(),
            ));
        }
        let arima = Arima::from_state(state.arima.clone())?;
        let forest = IsolationForest::from_state(state.forest.clone());
        self.order = state.arima.order;
        self.rule = state.rule;
        self.fitted = Some(Fitted {
            arima,
            forest,
            state,
        });
        ctx.in_scope(|| tracing::info!("hybrid model loaded"));
        Ok(())
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Hybrid
    }

    fn name(&self) -> &str {
        "HybridResidual"
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn make_timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    fn noisy_series(n: usize) -> TimeSeries {
        let values = (0..n)
            .map(|i| 10.0 + ((i as f64 * 12.9898).sin() * 43_758.545).fract().abs() - 0.5)
            .collect();
        TimeSeries::new(make_timestamps(n), values).unwrap()
    }

    fn with_value(series: &TimeSeries, idx: usize, value: f64) -> TimeSeries {
        let mut values = series.values().to_vec();
        values[idx] = value;
        TimeSeries::new(series.timestamps().to_vec(), values).unwrap()
    }

    #[test]
    fn hybrid_requires_fit() {
        let model = HybridResidualClassifier::new();
        let ctx = RunContext::detached();
        let err = model.predict(&noisy_series(10), &ctx).unwrap_err();
        assert!(matches!(err, AnomalyError::ModelNotTrained(_)));
        let ts = make_timestamps(1)[0];
        assert!(model.predict_point(ts, 1.0, &ctx).is_err());
    }

    #[test]
    fn classifier_flags_spike_inside_training_window() {
        let ctx = RunContext::detached();
        let train = noisy_series(200);
        let mut model = HybridResidualClassifier::new();
        model.fit(&train, &ctx).unwrap();

        let scored = model.predict(&with_value(&train, 100, 60.0), &ctx).unwrap();
        assert_eq!(scored.points()[100].label, AnomalyLabel::Above);
        assert!(scored.anomaly_count() <= 20, "{} anomalies", scored.anomaly_count());
    }

    #[test]
    fn mad_rule_flags_dip_below_expectation() {
        let ctx = RunContext::detached();
        let train = noisy_series(200);
        let mut model =
            HybridResidualClassifier::new().with_rule(ResidualRule::Mad { multiplier: 3.0 });
        model.fit(&train, &ctx).unwrap();

        let scored = model.predict(&with_value(&train, 50, 0.0), &ctx).unwrap();
        assert_eq!(scored.points()[50].label, AnomalyLabel::Below);
    }

    #[test]
    fn batch_past_training_uses_forecast() {
        let ctx = RunContext::detached();
        let train = noisy_series(120);
        let mut model = HybridResidualClassifier::new();
        model.fit(&train, &ctx).unwrap();

        let future = make_timestamps(126)[120..].to_vec();
        let batch = TimeSeries::new(future, vec![10.0; 6]).unwrap();
        let scored = model.predict(&batch, &ctx).unwrap();

        let mut arima = Arima::new(1, 0, 0);
        arima.fit(train.values()).unwrap();
        let forecast = arima.forecast(6).unwrap();
        for (p, f) in scored.points().iter().zip(&forecast) {
            assert_relative_eq!(p.expected, *f, epsilon = 1e-9);
        }
    }

    #[test]
    fn batch_before_training_start_is_rejected() {
        let ctx = RunContext::detached();
        let train = noisy_series(50);
        let mut model = HybridResidualClassifier::new();
        model.fit(&train, &ctx).unwrap();

        let early = train.timestamps()[0] - Duration::hours(1);
        assert!(matches!(
            model.predict_point(early, 10.0, &ctx),
            Err(AnomalyError::InvalidSeries(_))
        ));
        let off_grid = train.timestamps()[3] + Duration::minutes(30);
        assert!(model.predict_point(off_grid, 10.0, &ctx).is_err());
    }

    #[test]
    fn training_series_with_gap_is_rejected() {
        let ctx = RunContext::detached();
        let full = noisy_series(90);
        let gapped = full.filter(|ts, _| {
            let hour = (ts - full.timestamps()[0]).num_hours();
            !(40..50).contains(&hour)
        });
        assert_eq!(gapped.len(), 80);

        let mut model = HybridResidualClassifier::new();
        let err = model.fit(&gapped, &ctx).unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidSeries(msg) if msg.contains("gaps")));
        assert!(!model.is_fitted());
    }

    #[test]
    fn point_and_batch_scoring_agree() {
        let ctx = RunContext::detached();
        let train = noisy_series(200);
        let mut model = HybridResidualClassifier::new();
        model.fit(&train, &ctx).unwrap();

        let batch = with_value(&train, 100, 60.0);
        let scored = model.predict(&batch, &ctx).unwrap();
        for idx in [3, 100, 150] {
            let point = model
                .predict_point(batch.timestamps()[idx], batch.values()[idx], &ctx)
                .unwrap();
            assert_eq!(&point, &scored.points()[idx]);
        }
    }

    #[test]
    fn save_and_load_reproduce_predictions() {
        let ctx = RunContext::detached();
        let train = noisy_series(150);
        let mut model = HybridResidualClassifier::new().with_trees(30);
        model.fit(&train, &ctx).unwrap();

        let json = serde_json::to_string(&model.save(&ctx).unwrap()).unwrap();
        let mut restored = HybridResidualClassifier::new();
        restored
            .load(serde_json::from_str(&json).unwrap(), &ctx)
            .unwrap();

        let batch = with_value(&train, 10, 40.0);
        assert_eq!(
            model.predict(&batch, &ctx).unwrap(),
            restored.predict(&batch, &ctx).unwrap()
        );
    }

    #[test]
    fn loading_foreign_artifact_fails() {
        let ctx = RunContext::detached();
        let train = noisy_series(80);
        let mut model = HybridResidualClassifier::new();
        model.fit(&train, &ctx).unwrap();
        let mut artifact = model.save(&ctx).unwrap();
        artifact.kind = ModelKind::Additive;
        assert!(matches!(
            HybridResidualClassifier::new().load(artifact, &ctx),
            Err(AnomalyError::ArtifactMismatch(_))
        ));
    }
}
