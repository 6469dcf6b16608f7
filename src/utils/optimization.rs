//! Derivative-free minimisation used by the autoregressive fit.

use std::cmp::Ordering;

/// Outcome of a Nelder-Mead run.
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Best point found.
    pub point: Vec<f64>,
    /// Objective value at `point`.
    pub value: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the simplex collapsed below the tolerance.
    pub converged: bool,
}

/// Nelder-Mead simplex minimiser with optional box bounds.
#[derive(Debug, Clone)]
pub struct NelderMead {
    max_iter: usize,
    tolerance: f64,
    initial_step: f64,
    bounds: Option<Vec<(f64, f64)>>,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            initial_step: 0.05,
            bounds: None,
        }
    }
}

// Standard reflection, expansion, contraction and shrink coefficients.
const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Clamp every candidate into `[min, max]` per dimension.
    pub fn with_bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    fn clamp(&self, mut point: Vec<f64>) -> Vec<f64> {
        if let Some(bounds) = &self.bounds {
            for (x, &(lo, hi)) in point.iter_mut().zip(bounds) {
                *x = x.clamp(lo, hi);
            }
        }
        point
    }

    /// Minimise `objective` starting from `start`.
    pub fn minimize<F>(&self, objective: F, start: &[f64]) -> Minimum
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = start.len();
        if n == 0 {
            return Minimum {
                point: Vec::new(),
                value: objective(&[]),
                iterations: 0,
                converged: true,
            };
        }

        // NaN objective values sort last so they are replaced first.
        let eval = |p: &[f64]| {
            let v = objective(p);
            if v.is_nan() {
                f64::INFINITY
            } else {
                v
            }
        };

        let mut vertices: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        let origin = self.clamp(start.to_vec());
        vertices.push((origin.clone(), eval(&origin)));
        for i in 0..n {
            let mut p = origin.clone();
            p[i] += if p[i].abs() > 1e-10 {
                self.initial_step * p[i].abs()
            } else {
                self.initial_step
            };
            let p = self.clamp(p);
            let v = eval(&p);
            vertices.push((p, v));
        }

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iter {
            iterations += 1;
            vertices.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

            let best = vertices[0].1;
            let worst = vertices[n].1;
            if (worst - best).abs() < self.tolerance {
                converged = true;
                break;
            }

            let centroid: Vec<f64> = (0..n)
                .map(|j| vertices[..n].iter().map(|(p, _)| p[j]).sum::<f64>() / n as f64)
                .collect();
            let toward = |from: &[f64], coef: f64| -> Vec<f64> {
                self.clamp(
                    centroid
                        .iter()
                        .zip(from)
                        .map(|(c, x)| c + coef * (x - c))
                        .collect(),
                )
            };

            let reflected = toward(&vertices[n].0, -REFLECT);
            let reflected_value = eval(&reflected);

            if reflected_value < best {
                let expanded = toward(&reflected, EXPAND);
                let expanded_value = eval(&expanded);
                vertices[n] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
                continue;
            }
            if reflected_value < vertices[n - 1].1 {
                vertices[n] = (reflected, reflected_value);
                continue;
            }

            let (contracted, contracted_value) = if reflected_value < worst {
                let c = toward(&reflected, CONTRACT);
                let v = eval(&c);
                (c, v)
            } else {
                let c = toward(&vertices[n].0, CONTRACT);
                let v = eval(&c);
                (c, v)
            };
            if contracted_value < reflected_value.min(worst) {
                vertices[n] = (contracted, contracted_value);
                continue;
            }

            let anchor = vertices[0].0.clone();
            for (p, v) in vertices.iter_mut().skip(1) {
                let shrunk: Vec<f64> = anchor
                    .iter()
                    .zip(p.iter())
                    .map(|(a, x)| a + SHRINK * (x - a))
                    .collect();
                *p = self.clamp(shrunk);
                *v = eval(p.as_slice());
            }
        }

        vertices.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        let (point, value) = vertices.swap_remove(0);
        Minimum {
            point,
            value,
            iterations,
            converged,
        }
    }
}
