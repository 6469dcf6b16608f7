//! Isolation forest over scalar observations.
//!
//! Points that are isolated by few random splits are anomalous. The
//! decision threshold is the training score quantile at
//! `1 - contamination`, so roughly `contamination` of the training data
//! scores above it.

use crate::error::{AnomalyError, Result};
use crate::utils::quantile;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: usize, right: usize },
}

/// One isolation tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(sample: &[f64], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut work = sample.to_vec();
        tree.build(&mut work, 0, max_depth, rng);
        tree
    }

    fn build(&mut self, points: &mut [f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: points.len() });

        let (lo, hi) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        if depth >= max_depth || points.len() <= 1 || lo >= hi {
            return id;
        }

        let threshold = rng.gen_range(lo..hi);
        let mut split = 0;
        for i in 0..points.len() {
            if points[i] < threshold {
                points.swap(i, split);
                split += 1;
            }
        }
        let (left_points, right_points) = points.split_at_mut(split);
        let left = self.build(left_points, depth + 1, max_depth, rng);
        let right = self.build(right_points, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(node) {
                Some(Node::Split {
                    threshold,
                    left,
                    right,
                }) => {
                    node = if x < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Some(Node::Leaf { size }) => return depth + average_path_length(*size),
                None => return depth,
            }
        }
    }
}

/// Trained forest: trees plus the decision threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestState {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    threshold: f64,
}

impl ForestState {
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

/// Isolation forest configuration and (once fitted) state.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_trees: usize,
    max_samples: usize,
    contamination: f64,
    seed: u64,
    state: Option<ForestState>,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.05,
            seed: 42,
            state: None,
        }
    }
}

impl IsolationForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Expected share of anomalies in the training data, in `(0, 0.5]`.
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Restore a fitted forest.
    pub fn from_state(state: ForestState) -> Self {
        Self {
            n_trees: state.trees.len(),
            max_samples: state.sample_size,
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn state(&self) -> Option<&ForestState> {
        self.state.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn fit(&mut self, data: &[f64]) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(AnomalyError::InvalidParameter(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_trees == 0 || self.max_samples < 2 {
            return Err(AnomalyError::InvalidParameter(
                "isolation forest needs at least one tree and two samples per tree".to_string(),
            ));
        }
        if data.len() < 2 {
            return Err(AnomalyError::InsufficientData {
                needed: 2,
                got: data.len(),
            });
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(AnomalyError::InvalidSeries(
                "isolation forest input contains non-finite values".to_string(),
            ));
        }

        let sample_size = self.max_samples.min(data.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees = (0..self.n_trees)
            .map(|_| {
                let sample: Vec<f64> = rand::seq::index::sample(&mut rng, data.len(), sample_size)
                    .iter()
                    .map(|i| data[i])
                    .collect();
                IsolationTree::grow(&sample, max_depth, &mut rng)
            })
            .collect();

        let mut state = ForestState {
            trees,
            sample_size,
            threshold: 0.0,
        };
        let scores: Vec<f64> = data.iter().map(|&x| score_with(&state, x)).collect();
        state.threshold = quantile(&scores, 1.0 - self.contamination);

        tracing::debug!(
            trees = self.n_trees,
            sample_size,
            threshold = state.threshold,
            "isolation forest fitted"
        );
        if scores.iter().all(|s| *s <= state.threshold) {
            tracing::warn!("isolation forest threshold isolates nothing in training data");
        }

        self.state = Some(state);
        Ok(())
    }

    /// Anomaly score in `(0, 1]`; higher is more anomalous.
    pub fn score(&self, x: f64) -> Result<f64> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| AnomalyError::ModelNotTrained("isolation forest".to_string()))?;
        Ok(score_with(state, x))
    }

    /// Whether `x` scores above the training threshold.
    pub fn is_outlier(&self, x: f64) -> Result<bool> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| AnomalyError::ModelNotTrained("isolation forest".to_string()))?;
        Ok(score_with(state, x) > state.threshold)
    }
}

fn score_with(state: &ForestState, x: f64) -> f64 {
    let c = average_path_length(state.sample_size);
    if state.trees.is_empty() || c == 0.0 {
        return 0.5;
    }
    let mean_path =
        state.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / state.trees.len() as f64;
    2f64.powf(-mean_path / c)
}
