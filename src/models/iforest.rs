use ndarray::{ArrayView1, ArrayView2};
use rand::prelude::*;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{AnalyzeError, Result};
use crate::models::base_model::{OutlierModel, ScoredBatch};

pub const DEFAULT_N_ESTIMATORS: usize = 200;
pub const DEFAULT_MAX_SAMPLES: usize = 256;
pub const DEFAULT_CONTAMINATION: f64 = 0.05;
pub const DEFAULT_SEED: u64 = 42;

// Isolation tree node
struct Node {
    split_feature: Option<usize>,
    split_value: f64,
    size: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn new(size: usize) -> Self {
        Node {
            split_feature: None,
            split_value: 0.0,
            size,
            left: None,
            right: None,
        }
    }
}

/// Batch isolation forest.
///
/// Fit builds `n_estimators` randomized trees, each on at most
/// `max_samples` rows drawn with replacement from the training matrix, and
/// derives a decision threshold from the training scores at the configured
/// contamination fraction. Scores are `2^(-E[path] / c(sample_size))`, so
/// higher means more anomalous; a row is labelled anomalous when its score
/// meets the threshold. Deterministic for a fixed seed.
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    seed: u64,
    trees: Vec<Node>,
    sample_size: usize,
    n_features: usize,
    threshold: Option<f64>,
}

impl IsolationForest {
    pub fn new(n_estimators: usize, max_samples: usize, contamination: f64, seed: u64) -> Self {
        IsolationForest {
            n_estimators,
            max_samples,
            contamination,
            seed,
            trees: Vec::new(),
            sample_size: 0,
            n_features: 0,
            threshold: None,
        }
    }

    /// Decision threshold derived at fit time, if fitted.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    fn validate_hyperparameters(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(AnalyzeError::ModelFit(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !self.contamination.is_finite()
            || self.contamination <= 0.0
            || self.contamination > 0.5
        {
            return Err(AnalyzeError::ModelFit(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        Ok(())
    }

    fn score_matrix(&self, x: &ArrayView2<'_, f64>) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        let n_trees = self.trees.len() as f64;
        (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let total: f64 = self.trees.iter().map(|t| path_length(t, &row, 0)).sum();
                let mean_path = total / n_trees;
                if norm > 0.0 {
                    2f64.powf(-mean_path / norm)
                } else {
                    1.0
                }
            })
            .collect()
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        IsolationForest::new(
            DEFAULT_N_ESTIMATORS,
            DEFAULT_MAX_SAMPLES,
            DEFAULT_CONTAMINATION,
            DEFAULT_SEED,
        )
    }
}

impl OutlierModel for IsolationForest {
    fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<()> {
        self.validate_hyperparameters()?;
        let n = x.nrows();
        if n == 0 {
            return Err(AnalyzeError::ModelFit(
                "training matrix has no rows".to_string(),
            ));
        }
        if x.ncols() == 0 {
            return Err(AnalyzeError::ModelFit(
                "training matrix has no columns".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.sample_size = self.max_samples.min(n);
        let height_limit = (self.sample_size as f64).log2().ceil() as usize;

        // One seed per tree so the ensemble can build in parallel and
        // still be deterministic.
        let mut rng = StdRng::seed_from_u64(self.seed);
        let seeds: Vec<u64> = (0..self.n_estimators).map(|_| rng.gen()).collect();
        let sample_size = self.sample_size;
        self.trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let indices: Vec<usize> =
                    (0..sample_size).map(|_| rng.gen_range(0..n)).collect();
                build_tree(&x, &indices, 0, height_limit, &mut rng)
            })
            .collect();

        // Decision threshold: the training score at the contamination
        // cutoff, scores sorted descending.
        let mut train_scores = self.score_matrix(&x);
        train_scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let cutoff = ((self.contamination * n as f64).floor() as usize).min(n - 1);
        self.threshold = Some(train_scores[cutoff]);
        debug!(
            trees = self.trees.len(),
            sample_size = self.sample_size,
            threshold = train_scores[cutoff],
            "isolation forest fitted"
        );
        Ok(())
    }

    fn score(&self, x: ArrayView2<'_, f64>) -> Result<ScoredBatch> {
        let threshold = self
            .threshold
            .ok_or_else(|| AnalyzeError::ModelFit("score called before fit".to_string()))?;
        if x.ncols() != self.n_features {
            return Err(AnalyzeError::ModelFit(format!(
                "feature count mismatch: expected {}, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let scores = self.score_matrix(&x);
        let labels = scores.iter().map(|&s| u8::from(s >= threshold)).collect();
        Ok(ScoredBatch { scores, labels })
    }

    fn is_fitted(&self) -> bool {
        self.threshold.is_some()
    }
}

fn build_tree(
    x: &ArrayView2<'_, f64>,
    indices: &[usize],
    height: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    let size = indices.len();
    let mut node = Node::new(size);

    // Stop criteria
    if size <= 1 || height >= height_limit {
        return node;
    }

    let split_feature = rng.gen_range(0..x.ncols());
    let mut min_val = x[[indices[0], split_feature]];
    let mut max_val = min_val;
    for &i in indices {
        let val = x[[i, split_feature]];
        min_val = min_val.min(val);
        max_val = max_val.max(val);
    }

    // Constant feature over this subsample, nothing to split on
    if (max_val - min_val).abs() < 1e-10 {
        return node;
    }

    let split_value = rng.gen::<f64>() * (max_val - min_val) + min_val;
    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| x[[i, split_feature]] < split_value);

    if !left.is_empty() && !right.is_empty() {
        node.split_feature = Some(split_feature);
        node.split_value = split_value;
        node.left = Some(Box::new(build_tree(x, &left, height + 1, height_limit, rng)));
        node.right = Some(Box::new(build_tree(x, &right, height + 1, height_limit, rng)));
    }

    node
}

fn path_length(node: &Node, x: &ArrayView1<'_, f64>, depth: usize) -> f64 {
    if let Some(feature) = node.split_feature {
        let child = if x[feature] < node.split_value {
            node.left.as_deref()
        } else {
            node.right.as_deref()
        };
        if let Some(child) = child {
            return path_length(child, x, depth + 1);
        }
    }
    // Credit unsplit leaves with the expected depth of their subsample
    depth as f64 + average_path_length(node.size)
}

fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    (n as f64).ln() + 0.5772156649 // Euler's constant
}
