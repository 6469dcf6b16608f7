//! ARIMA (Autoregressive Integrated Moving Average) model.
//!
//! Parameters are estimated by conditional sum of squares (CSS) minimised
//! with Nelder-Mead, AR and MA coefficients bounded to (-0.99, 0.99). After
//! fitting, the model keeps only what forecasting needs: coefficients and
//! the tails of the differenced series, residuals and level anchors.

use super::diff::{difference, integrate, level_tails};
use crate::error::{AnomalyError, Result};
use crate::utils::NelderMead;
use serde::{Deserialize, Serialize};

const COEF_BOUND: f64 = 0.99;

/// ARIMA order `(p, d, q)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// AR order.
    pub p: usize,
    /// Differencing order.
    pub d: usize,
    /// MA order.
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Minimum number of observations needed to fit.
    pub fn min_observations(&self) -> usize {
        self.d + self.p.max(self.q) + 2
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Fitted ARIMA state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaState {
    pub order: ArimaOrder,
    pub intercept: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    /// Last `p` values of the differenced series.
    pub diff_tail: Vec<f64>,
    /// Last `q` in-sample residuals.
    pub resid_tail: Vec<f64>,
    /// Last value at each differencing level below `d`.
    pub level_tails: Vec<f64>,
    pub residual_variance: f64,
    /// One-step in-sample predictions on the original scale.
    pub fitted: Vec<f64>,
}

/// ARIMA model.
#[derive(Debug, Clone, Default)]
pub struct Arima {
    order: ArimaOrder,
    state: Option<ArimaState>,
}

impl Arima {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self::from_order(ArimaOrder::new(p, d, q))
    }

    pub fn from_order(order: ArimaOrder) -> Self {
        Self { order, state: None }
    }

    /// Rebuild a fitted model from saved state.
    pub fn from_state(state: ArimaState) -> Result<Self> {
        let order = state.order;
        if state.ar.len() != order.p
            || state.ma.len() != order.q
            || state.diff_tail.len() != order.p
            || state.resid_tail.len() != order.q
            || state.level_tails.len() != order.d
        {
            return Err(AnomalyError::ArtifactMismatch(format!(
                "ARIMA state does not match order ({}, {}, {})",
                order.p, order.d, order.q
            )));
        }
        Ok(Self {
            order,
            state: Some(state),
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&ArimaState> {
        self.state.as_ref()
    }

    pub fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    pub fn residual_variance(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.residual_variance)
    }

    fn one_step(
        w: &[f64],
        resid: &[f64],
        t: usize,
        intercept: f64,
        ar: &[f64],
        ma: &[f64],
    ) -> f64 {
        let ar_part: f64 = ar
            .iter()
            .enumerate()
            .map(|(i, phi)| phi * (w[t - 1 - i] - intercept))
            .sum();
        let ma_part: f64 = ma
            .iter()
            .enumerate()
            .map(|(i, theta)| theta * resid[t - 1 - i])
            .sum();
        intercept + ar_part + ma_part
    }

    /// Residuals of the CSS recursion; zero before the first predictable index.
    fn css_residuals(w: &[f64], order: ArimaOrder, intercept: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
        let start = order.p.max(order.q);
        let mut resid = vec![0.0; w.len()];
        for t in start..w.len() {
            resid[t] = w[t] - Self::one_step(w, &resid, t, intercept, ar, ma);
        }
        resid
    }

    fn estimate(&self, w: &[f64]) -> (f64, Vec<f64>, Vec<f64>) {
        let ArimaOrder { p, q, .. } = self.order;
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        if p == 0 && q == 0 {
            return (mean, Vec::new(), Vec::new());
        }

        let mut start = vec![mean];
        start.extend((0..p).map(|i| 0.1 / (i + 1) as f64));
        start.extend((0..q).map(|i| 0.1 / (i + 1) as f64));

        let mut bounds = vec![(f64::NEG_INFINITY, f64::INFINITY)];
        bounds.extend(std::iter::repeat((-COEF_BOUND, COEF_BOUND)).take(p + q));

        let order = self.order;
        let objective = |params: &[f64]| {
            let resid = Self::css_residuals(w, order, params[0], &params[1..1 + p], &params[1 + p..]);
            resid.iter().map(|r| r * r).sum::<f64>()
        };
        let best = NelderMead::new().with_bounds(bounds).minimize(objective, &start);

        (
            best.point[0],
            best.point[1..1 + p].to_vec(),
            best.point[1 + p..].to_vec(),
        )
    }

    /// Fit to `values`.
    pub fn fit(&mut self, values: &[f64]) -> Result<()> {
        let needed = self.order.min_observations();
        if values.len() < needed {
            return Err(AnomalyError::InsufficientData {
                needed,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnomalyError::InvalidSeries(
                "ARIMA input contains non-finite values".to_string(),
            ));
        }

        let order = self.order;
        let w = difference(values, order.d);
        let (intercept, ar, ma) = self.estimate(&w);
        if !intercept.is_finite() || ar.iter().chain(&ma).any(|c| !c.is_finite()) {
            return Err(AnomalyError::fit_failed("ARIMA", "non-finite coefficient estimate"));
        }

        let resid = Self::css_residuals(&w, order, intercept, &ar, &ma);
        let start = order.p.max(order.q);
        let effective = &resid[start..];
        let residual_variance =
            effective.iter().map(|r| r * r).sum::<f64>() / effective.len().max(1) as f64;

        // On the original scale the one-step residual equals the
        // differenced-scale residual, so fitted = value - residual.
        let mut fitted = values.to_vec();
        for (j, &w_j) in w.iter().enumerate() {
            let r = if j < start { w_j - intercept } else { resid[j] };
            fitted[j + order.d] = values[j + order.d] - r;
        }

        tracing::debug!(
            p = order.p,
            d = order.d,
            q = order.q,
            intercept,
            residual_variance,
            "ARIMA fitted"
        );

        self.state = Some(ArimaState {
            order,
            intercept,
            diff_tail: w[w.len() - order.p..].to_vec(),
            resid_tail: resid[resid.len() - order.q..].to_vec(),
            level_tails: level_tails(values, order.d),
            ar,
            ma,
            residual_variance,
            fitted,
        });
        Ok(())
    }

    /// Forecast `horizon` steps past the end of the training series.
    pub fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| AnomalyError::ModelNotTrained("ARIMA".to_string()))?;
        if horizon == 0 {
            return Ok(Vec::new());
        }

        let ArimaOrder { p, q, .. } = state.order;
        let lag = p.max(q);
        let mut w = vec![0.0; lag - p];
        w.extend_from_slice(&state.diff_tail);
        let mut resid = vec![0.0; lag - q];
        resid.extend_from_slice(&state.resid_tail);

        for _ in 0..horizon {
            let t = w.len();
            let next = Self::one_step(&w, &resid, t, state.intercept, &state.ar, &state.ma);
            w.push(next);
            resid.push(0.0);
        }

        Ok(integrate(&w[lag..], &state.level_tails))
    }
}
