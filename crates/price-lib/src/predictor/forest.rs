//! Random forest regression
//!
//! Bagged CART regression trees split on mean squared error. Every tree draws
//! its bootstrap sample from an RNG seeded by `seed + tree index`, so trees can
//! be built in parallel while the fitted forest stays reproducible.

use super::{check_width, Regressor};
use crate::error::{PredictorError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default number of trees
pub const DEFAULT_N_ESTIMATORS: usize = 100;

/// Default RNG seed
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    /// Maximum tree depth; unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may be split
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single fitted regression tree stored as a flat node arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, samples: Vec<usize>, config: &ForestConfig) -> Self {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![(0usize, samples, 0usize)];

        while let Some((id, idx, depth)) = stack.pop() {
            let value = idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64;

            let depth_ok = config.max_depth.map_or(true, |max| depth < max);
            let size_ok = idx.len() >= config.min_samples_split.max(2)
                && idx.len() >= 2 * config.min_samples_leaf.max(1);
            let split = if depth_ok && size_ok && !is_pure(&idx, y) {
                best_split(x, y, &idx, config.min_samples_leaf.max(1))
            } else {
                None
            };

            match split {
                Some((feature, threshold)) => {
                    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                        idx.iter().partition(|&&i| x[[i, feature]] <= threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes[id] = Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_idx, depth + 1));
                    stack.push((left, left_idx, depth + 1));
                }
                None => nodes[id] = Node::Leaf { value },
            }
        }

        Self { nodes }
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn is_pure(idx: &[usize], y: ArrayView1<'_, f64>) -> bool {
    let first = y[idx[0]];
    idx.iter().all(|&i| y[i] == first)
}

/// Best (feature, threshold) by weighted MSE reduction.
///
/// Minimising the children's squared error is equivalent to maximising
/// `sum_l^2 / n_l + sum_r^2 / n_r`.
fn best_split(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    idx: &[usize],
    min_leaf: usize,
) -> Option<(usize, f64)> {
    let n = idx.len();
    let total: f64 = idx.iter().map(|&i| y[i]).sum();
    let mut best: Option<(f64, usize, f64)> = None;
    let mut order = idx.to_vec();

    for feature in 0..x.ncols() {
        order.sort_by(|&a, &b| {
            x[[a, feature]]
                .partial_cmp(&x[[b, feature]])
                .unwrap_or(Ordering::Equal)
        });

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            left_sum += y[order[pos]];
            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let here = x[[order[pos], feature]];
            let next = x[[order[pos + 1], feature]];
            if here == next {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            if best.map_or(true, |(s, _, _)| score > s) {
                let mid = here + (next - here) / 2.0;
                let threshold = if mid < next { mid } else { here };
                best = Some((score, feature, threshold));
            }
        }
    }

    best.map(|(_, feature, threshold)| (feature, threshold))
}

/// Ensemble of regression trees averaged at prediction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(PredictorError::InsufficientData { needed: 1, got: 0 });
        }
        if y.len() != n {
            return Err(PredictorError::InvalidData(format!(
                "{} samples but {} targets",
                n,
                y.len()
            )));
        }
        if self.config.n_estimators == 0 {
            return Err(PredictorError::InvalidData(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        let config = &self.config;
        let trees: Vec<RegressionTree> = (0..config.n_estimators)
            .into_par_iter()
            .map(|t| {
                let samples = if config.bootstrap {
                    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, samples, config)
            })
            .collect();

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x.ncols())?;
        if self.trees.is_empty() {
            return Err(PredictorError::ModelNotLoaded);
        }
        let n_trees = self.trees.len() as f64;
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect();
        Ok(Array1::from(predictions))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
