//! Uniform random search.

use super::Minimizer;
use super::common::MinimizerState;
use crate::error::Result;
use crate::param::ParamValue;
use crate::space::SearchSpace;

pub(crate) const NAME: &str = "random";

/// Samples every point uniformly, ignoring history.
///
/// Prior observations are kept only so results cover the whole trial.
/// There is no model to rebuild when a chunk resumes.
///
/// ```
/// use topic_optimizer::minimizer::{Minimizer, RandomMinimizer};
/// use topic_optimizer::space::{Dimension, SearchSpace};
///
/// let space = SearchSpace::new().with("x", Dimension::real(-1.0, 1.0));
/// let mut m = RandomMinimizer::new(space, Some(42));
/// let result = m
///     .run(&mut |p| Ok(p[0].as_f64().unwrap_or(0.0).powi(2)), 20)
///     .unwrap();
/// assert_eq!(result.func_vals.len(), 20);
/// ```
pub struct RandomMinimizer {
    state: MinimizerState,
}

impl RandomMinimizer {
    /// Creates a random minimizer, seeded when `seed` is given.
    #[must_use]
    pub fn new(space: SearchSpace, seed: Option<u64>) -> Self {
        Self {
            state: MinimizerState::new(space, 0, seed),
        }
    }
}

impl Minimizer for RandomMinimizer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn tell(&mut self, points: &[Vec<ParamValue>], values: &[f64]) -> Result<()> {
        self.state.record(points, values)
    }

    fn ask(&mut self) -> Result<Vec<ParamValue>> {
        Ok(self.state.sample())
    }

    fn prepare_resume(&mut self, _random_starts_spent: usize) {}

    fn random_starts_left(&self) -> usize {
        0
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
