//! Tree-ensemble surrogate search.
//!
//! The surrogate is an ensemble of regression trees fitted on the unit-cube
//! encoding of the observed points. The ensemble mean is the prediction and
//! the spread across trees is its uncertainty. Two estimators are offered:
//!
//! - [`TreeEstimator::RandomForest`]: each tree sees a bootstrap sample and
//!   picks the best variance-reducing threshold on a random feature subset.
//! - [`TreeEstimator::ExtraTrees`]: each tree sees every observation and
//!   draws one random threshold per candidate feature.
//!
//! The forest is refit from the full history whenever a new point is asked
//! for after a `tell`, so a resumed chunk rebuilds it from its `tell`
//! replay. On resume only the random starts not yet taken by earlier chunks
//! remain.
//!
//! | Option | Default |
//! |--------|---------|
//! | `estimator` | random forest |
//! | `n_trees` | 100 |
//! | `max_depth` | unlimited |
//! | `min_samples_leaf` | 3 |
//! | `acquisition` | LCB, kappa 1.96 |
//! | `n_points` | 1000 |

use serde::{Deserialize, Serialize};

use super::Minimizer;
use super::acquisition::Acquisition;
use super::common::{MinimizerState, Surrogate, mean_std, propose};
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::space::SearchSpace;

pub(crate) const NAME: &str = "forest";

/// Which tree ensemble to fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeEstimator {
    /// Bootstrapped trees with best splits.
    #[default]
    RandomForest,
    /// Extremely randomized trees.
    ExtraTrees,
}

/// Options for [`ForestMinimizer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestOptions {
    /// Tree ensemble flavour.
    pub estimator: TreeEstimator,
    /// Number of trees.
    pub n_trees: usize,
    /// Maximum tree depth. `None` grows until leaves are pure or small.
    pub max_depth: Option<usize>,
    /// Minimum observations per leaf.
    pub min_samples_leaf: usize,
    /// Acquisition function.
    pub acquisition: Acquisition,
    /// Random candidates scored per proposal.
    pub n_points: usize,
}

impl Default for ForestOptions {
    fn default() -> Self {
        Self {
            estimator: TreeEstimator::RandomForest,
            n_trees: 100,
            max_depth: None,
            min_samples_leaf: 3,
            acquisition: Acquisition::default(),
            n_points: 1000,
        }
    }
}

impl ForestOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(Error::InvalidMinimizerOption {
                option: "n_trees",
                reason: "must be greater than 0",
            });
        }
        if self.min_samples_leaf == 0 {
            return Err(Error::InvalidMinimizerOption {
                option: "min_samples_leaf",
                reason: "must be greater than 0",
            });
        }
        if self.max_depth == Some(0) {
            return Err(Error::InvalidMinimizerOption {
                option: "max_depth",
                reason: "must be greater than 0",
            });
        }
        if self.n_points == 0 {
            return Err(Error::InvalidMinimizerOption {
                option: "n_points",
                reason: "must be greater than 0",
            });
        }
        self.acquisition.validate()
    }
}

/// Minimizer guided by a regression-tree ensemble.
pub struct ForestMinimizer {
    state: MinimizerState,
    options: ForestOptions,
    model: Option<Forest>,
}

impl ForestMinimizer {
    /// Creates a forest minimizer that samples `n_random_starts` points
    /// uniformly before fitting its first forest.
    #[must_use]
    pub fn new(
        space: SearchSpace,
        options: ForestOptions,
        n_random_starts: usize,
        seed: Option<u64>,
    ) -> Self {
        Self {
            state: MinimizerState::new(space, n_random_starts, seed),
            options,
            model: None,
        }
    }
}

impl Minimizer for ForestMinimizer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn tell(&mut self, points: &[Vec<ParamValue>], values: &[f64]) -> Result<()> {
        self.state.record(points, values)?;
        self.model = None;
        Ok(())
    }

    fn ask(&mut self) -> Result<Vec<ParamValue>> {
        if self.state.take_random_start() || self.state.func_vals.is_empty() {
            return Ok(self.state.sample());
        }
        if self.model.is_none() {
            let x = self.state.encoded_history()?;
            self.model = Some(Forest::fit(
                &x,
                &self.state.func_vals,
                &self.options,
                &mut self.state.rng,
            ));
        }
        let Some(model) = self.model.as_ref() else {
            return Err(Error::Internal("forest not fitted"));
        };
        propose(
            &mut self.state,
            model,
            self.options.acquisition,
            self.options.n_points,
        )
    }

    fn prepare_resume(&mut self, random_starts_spent: usize) {
        self.state.forget_random_starts(random_starts_spent);
    }

    fn random_starts_left(&self) -> usize {
        self.state.random_starts_left
    }

    fn x_iters(&self) -> &[Vec<ParamValue>] {
        &self.state.x_iters
    }

    fn func_vals(&self) -> &[f64] {
        &self.state.func_vals
    }

    fn seed(&self) -> Option<u64> {
        self.state.seed
    }
}

/// A fitted ensemble.
struct Forest {
    trees: Vec<DecisionTree>,
    incumbent: f64,
}

impl Forest {
    fn fit(x: &[Vec<f64>], y: &[f64], options: &ForestOptions, rng: &mut fastrand::Rng) -> Self {
        let n = y.len();
        let trees = (0..options.n_trees)
            .map(|_| {
                let indices: Vec<usize> = match options.estimator {
                    TreeEstimator::RandomForest => (0..n).map(|_| rng.usize(0..n)).collect(),
                    TreeEstimator::ExtraTrees => (0..n).collect(),
                };
                DecisionTree::build(x, y, &indices, options, rng)
            })
            .collect();
        Self {
            trees,
            incumbent: y.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

impl Surrogate for Forest {
    fn predict(&self, x: &[f64]) -> (f64, f64) {
        let predictions: Vec<f64> = self.trees.iter().map(|t| t.predict(x)).collect();
        mean_std(&predictions)
    }

    fn incumbent(&self) -> f64 {
        self.incumbent
    }
}

/// A node in the regression tree (arena-allocated).
#[derive(Debug, Clone)]
enum TreeNode {
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

#[derive(Debug, Clone)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn build(
        data: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        options: &ForestOptions,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build_node(data, targets, indices, 0, options, rng);
        tree
    }

    fn leaf(&mut self, value: f64) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value });
        idx
    }

    #[allow(clippy::cast_precision_loss)]
    fn build_node(
        &mut self,
        data: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        depth: usize,
        options: &ForestOptions,
        rng: &mut fastrand::Rng,
    ) -> usize {
        let n = indices.len();
        let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / n as f64;

        if n < 2 * options.min_samples_leaf || options.max_depth.is_some_and(|d| depth >= d) {
            return self.leaf(mean);
        }

        let total_var: f64 = indices.iter().map(|&i| (targets[i] - mean).powi(2)).sum();
        if total_var <= 0.0 {
            return self.leaf(mean);
        }

        let n_features = data[0].len();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_features = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);
        let candidates = partial_shuffle(n_features, max_features, rng);

        let split = match options.estimator {
            TreeEstimator::RandomForest => {
                best_split(data, targets, indices, &candidates, total_var, options)
            }
            TreeEstimator::ExtraTrees => {
                random_split(data, targets, indices, &candidates, total_var, options, rng)
            }
        };
        let Some((feature, threshold)) = split else {
            return self.leaf(mean);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| data[i][feature] <= threshold);

        // Reserve the split slot; children are pushed after it.
        let node_idx = self.leaf(mean);
        let left = self.build_node(data, targets, &left_indices, depth + 1, options, rng);
        let right = self.build_node(data, targets, &right_indices, depth + 1, options, rng);
        self.nodes[node_idx] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_idx
    }

    fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if x[feature] <= threshold { left } else { right },
            }
        }
    }
}

/// Variance reduction of splitting `indices` at `threshold` on `feature`,
/// or `None` when a side would be smaller than `min_samples_leaf`.
#[allow(clippy::cast_precision_loss)]
fn split_gain(
    data: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    feature: usize,
    threshold: f64,
    total_var: f64,
    min_samples_leaf: usize,
) -> Option<f64> {
    let (mut l_sum, mut l_sq, mut l_n) = (0.0, 0.0, 0_usize);
    let (mut r_sum, mut r_sq, mut r_n) = (0.0, 0.0, 0_usize);
    for &i in indices {
        let y = targets[i];
        if data[i][feature] <= threshold {
            l_sum += y;
            l_sq += y * y;
            l_n += 1;
        } else {
            r_sum += y;
            r_sq += y * y;
            r_n += 1;
        }
    }
    if l_n < min_samples_leaf || r_n < min_samples_leaf {
        return None;
    }
    let l_var = l_sq - l_sum * l_sum / l_n as f64;
    let r_var = r_sq - r_sum * r_sum / r_n as f64;
    Some(total_var - l_var - r_var)
}

fn best_split(
    data: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    candidates: &[usize],
    total_var: f64,
    options: &ForestOptions,
) -> Option<(usize, f64)> {
    let mut best: Option<(f64, usize, f64)> = None;
    for &feat in candidates {
        let mut values: Vec<f64> = indices.iter().map(|&i| data[i][feat]).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        for w in values.windows(2) {
            let threshold = f64::midpoint(w[0], w[1]);
            let gain = split_gain(
                data,
                targets,
                indices,
                feat,
                threshold,
                total_var,
                options.min_samples_leaf,
            );
            if let Some(gain) = gain
                && gain > 0.0
                && best.is_none_or(|(g, _, _)| gain > g)
            {
                best = Some((gain, feat, threshold));
            }
        }
    }
    best.map(|(_, f, t)| (f, t))
}

fn random_split(
    data: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    candidates: &[usize],
    total_var: f64,
    options: &ForestOptions,
    rng: &mut fastrand::Rng,
) -> Option<(usize, f64)> {
    let mut best: Option<(f64, usize, f64)> = None;
    for &feat in candidates {
        let (lo, hi) = indices
            .iter()
            .map(|&i| data[i][feat])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if hi <= lo {
            continue;
        }
        // Strictly inside (lo, hi) so both sides are non-empty.
        let threshold = lo + (hi - lo) * (0.5 * rng.f64() + 0.25);
        let gain = split_gain(
            data,
            targets,
            indices,
            feat,
            threshold,
            total_var,
            options.min_samples_leaf,
        );
        if let Some(gain) = gain
            && gain > 0.0
            && best.is_none_or(|(g, _, _)| gain > g)
        {
            best = Some((gain, feat, threshold));
        }
    }
    best.map(|(_, f, t)| (f, t))
}

/// Select `k` random indices from `0..n` using partial Fisher-Yates shuffle.
fn partial_shuffle(n: usize, k: usize, rng: &mut fastrand::Rng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let k = k.min(n);
    for i in 0..k {
        let j = rng.usize(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}
