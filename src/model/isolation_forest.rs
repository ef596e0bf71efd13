//! Isolation forest over `[delta_temperature, bubble_count]`.
//!
//! Each tree recursively splits a random subsample on a random feature at a
//! uniformly drawn threshold. Points far from the training distribution are
//! isolated in few splits, so a short average path length means "anomalous".
//!
//! Scores follow the usual convention: `score = -2^(-E[h(x)] / c(psi))`, in
//! `[-1, 0)`, higher is more normal. The decision offset is the
//! `contamination` percentile of the training scores.

use crate::config::TrainingConfig;
use crate::decision::classifier::{AnomalyModel, ModelLabel};
use crate::model::ModelError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Features per sample.
pub const N_FEATURES: usize = 2;

/// Artifact layout version written by [`IsolationForest::fit`].
pub const FORMAT_VERSION: u32 = 1;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful binary-search-tree lookup among
/// `n` points. Normalises path lengths across subsample sizes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile of an ascending slice, `q` in `[0, 100]`.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (q.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * weight)
}

/// Fit hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Subsample size per tree, capped at the row count.
    pub max_samples: usize,
    /// Expected outlier fraction; sets the offset percentile.
    pub contamination: f64,
    /// Seed for subsampling and split draws.
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}

impl ForestParams {
    /// Hyperparameters from the `[training]` section.
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_samples: config.max_samples,
            contamination: config.contamination,
            seed: config.seed,
        }
    }

    fn check(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParameter(
                "n_estimators must be greater than 0".to_string(),
            ));
        }
        if self.max_samples < 2 {
            return Err(ModelError::InvalidParameter(format!(
                "max_samples must be at least 2, got {}",
                self.max_samples
            )));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ModelError::InvalidParameter(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        Ok(())
    }
}

/// Arena node. Children always sit at higher indices than their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// `x[feature] <= threshold` goes left.
    Split {
        /// Feature index compared at this node.
        feature: usize,
        /// Split value.
        threshold: f64,
        /// Arena index of the left child.
        left: usize,
        /// Arena index of the right child.
        right: usize,
    },
    /// Terminal node.
    Leaf {
        /// Training points that reached this node.
        size: usize,
    },
}

/// One isolation tree stored as a node arena rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow<R: Rng + ?Sized>(
        data: &[[f64; N_FEATURES]],
        indices: &mut [usize],
        depth_limit: usize,
        rng: &mut R,
    ) -> Self {
        let mut nodes = Vec::with_capacity(2 * indices.len());
        grow_node(&mut nodes, data, indices, 0, depth_limit, rng);
        Self { nodes }
    }

    /// Depth of the leaf `x` lands in, plus the expected remaining depth
    /// for the points that shared it.
    pub fn path_length(&self, x: &[f64; N_FEATURES]) -> f64 {
        let mut id = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let goes_left = x.get(*feature).map_or(true, |v| v <= threshold);
                    id = if goes_left { *left } else { *right };
                    depth += 1.0;
                }
                Some(Node::Leaf { size }) => return depth + average_path_length(*size),
                None => return depth,
            }
        }
    }

    /// Node arena.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= N_FEATURES {
                    return Err(format!("node {id} splits on unknown feature {feature}"));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {id} has a non-finite threshold"));
                }
                for child in [left, right] {
                    if *child <= id || *child >= self.nodes.len() {
                        return Err(format!("node {id} points at invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }
}

fn grow_node<R: Rng + ?Sized>(
    nodes: &mut Vec<Node>,
    data: &[[f64; N_FEATURES]],
    indices: &mut [usize],
    depth: usize,
    depth_limit: usize,
    rng: &mut R,
) -> usize {
    let id = nodes.len();
    nodes.push(Node::Leaf {
        size: indices.len(),
    });
    if depth >= depth_limit || indices.len() <= 1 {
        return id;
    }

    let mut candidates = [(0usize, 0.0f64, 0.0f64); N_FEATURES];
    let mut n_candidates = 0;
    for feature in 0..N_FEATURES {
        let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let v = data[i][feature];
            (lo.min(v), hi.max(v))
        });
        if lo < hi {
            candidates[n_candidates] = (feature, lo, hi);
            n_candidates += 1;
        }
    }
    if n_candidates == 0 {
        return id;
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..n_candidates)];
    let threshold = rng.gen_range(lo..hi);

    let mut split = 0;
    for k in 0..indices.len() {
        if data[indices[k]][feature] <= threshold {
            indices.swap(k, split);
            split += 1;
        }
    }

    let (left_indices, right_indices) = indices.split_at_mut(split);
    let left = grow_node(nodes, data, left_indices, depth + 1, depth_limit, rng);
    let right = grow_node(nodes, data, right_indices, depth + 1, depth_limit, rng);
    nodes[id] = Node::Split {
        feature,
        threshold,
        left,
        right,
    };
    id
}

/// Trained forest. Immutable after [`IsolationForest::fit`] or loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    pub(crate) format_version: u32,
    pub(crate) n_features: usize,
    /// Subsample size actually used per tree.
    pub(crate) max_samples: usize,
    pub(crate) contamination: f64,
    /// Scores strictly below this are outliers.
    pub(crate) offset: f64,
    pub(crate) trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Fit on `data`. Needs at least two rows.
    pub fn fit(data: &[[f64; N_FEATURES]], params: &ForestParams) -> Result<Self, ModelError> {
        params.check()?;
        if data.len() < 2 {
            return Err(ModelError::InsufficientData { rows: data.len() });
        }
        if data.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidParameter(
                "training data contains non-finite values".to_string(),
            ));
        }

        let psi = params.max_samples.min(data.len());
        let depth_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut indices = rand::seq::index::sample(&mut rng, data.len(), psi).into_vec();
                IsolationTree::grow(data, &mut indices, depth_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            format_version: FORMAT_VERSION,
            n_features: N_FEATURES,
            max_samples: psi,
            contamination: params.contamination,
            offset: 0.0,
            trees,
        };

        let mut scores: Vec<f64> = data.iter().map(|x| forest.score(x)).collect();
        scores.sort_by(f64::total_cmp);
        forest.offset = percentile(&scores, 100.0 * params.contamination)
            .ok_or(ModelError::InsufficientData { rows: data.len() })?;

        debug!(
            trees = forest.trees.len(),
            psi,
            depth_limit,
            offset = forest.offset,
            "Isolation forest fitted"
        );
        Ok(forest)
    }

    /// Normality score in `[-1, 0)`; higher is more normal.
    pub fn score(&self, x: &[f64; N_FEATURES]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let normaliser = average_path_length(self.max_samples);
        if normaliser <= 0.0 {
            return -0.5;
        }
        -(2f64.powf(-mean / normaliser))
    }

    /// [`Self::score`] for every row.
    pub fn score_samples(&self, data: &[[f64; N_FEATURES]]) -> Vec<f64> {
        data.iter().map(|x| self.score(x)).collect()
    }

    /// Score shifted so that negative means outlier.
    pub fn decision_function(&self, x: &[f64; N_FEATURES]) -> f64 {
        self.score(x) - self.offset
    }

    /// `score < offset` is an outlier.
    pub fn label(&self, x: &[f64; N_FEATURES]) -> ModelLabel {
        if self.score(x) < self.offset {
            ModelLabel::Outlier
        } else {
            ModelLabel::Inlier
        }
    }

    /// Score cut-off learned at fit time.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Number of trees.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Rows drawn per tree.
    pub fn subsample_size(&self) -> usize {
        self.max_samples
    }

    /// Contamination used at fit time.
    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Structural checks for artifacts that did not come from [`Self::fit`].
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: self.format_version,
                expected: FORMAT_VERSION,
            });
        }
        if self.n_features != N_FEATURES {
            return Err(ModelError::Corrupt(format!(
                "expected {N_FEATURES} features, artifact has {}",
                self.n_features
            )));
        }
        if self.trees.is_empty() {
            return Err(ModelError::Corrupt("forest has no trees".to_string()));
        }
        if self.max_samples < 2 {
            return Err(ModelError::Corrupt(format!(
                "subsample size {} is too small",
                self.max_samples
            )));
        }
        if !self.offset.is_finite() {
            return Err(ModelError::Corrupt("offset is not finite".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|msg| ModelError::Corrupt(format!("tree {i}: {msg}")))?;
        }
        Ok(())
    }
}

impl AnomalyModel for IsolationForest {
    fn predict(&self, features: [f64; 2]) -> ModelLabel {
        self.label(&features)
    }

    fn describe(&self) -> String {
        format!(
            "isolation forest ({} trees, psi={}, offset={:.4})",
            self.trees.len(),
            self.max_samples,
            self.offset
        )
    }
}
