//! Minimizer strategies and the contract the driver relies on.
//!
//! Every strategy minimizes. It is built for one search space, takes prior
//! observations through [`Minimizer::tell`], proposes points with
//! [`Minimizer::ask`] and runs a fixed number of evaluations with
//! [`Minimizer::run`].
//!
//! The three strategies differ in what a resumed chunk must do:
//!
//! | Strategy | Surrogate | On resume |
//! |----------|-----------|-----------|
//! | [`RandomMinimizer`] | none | replay history, nothing to rebuild |
//! | [`ForestMinimizer`] | regression forest, refit from history | spent random starts dropped |
//! | [`GpMinimizer`] | Gaussian process, refit on `tell` | `tell` full history, spent random starts dropped |
//!
//! [`Minimizer::prepare_resume`] carries the strategy-specific adjustment,
//! so the driver calls the same three methods for every strategy:
//! `prepare_resume`, `tell`, `run`.

pub mod acquisition;
mod common;
pub mod forest;
pub mod gp;
pub mod random;

use serde::{Deserialize, Serialize};

pub use self::acquisition::Acquisition;
pub use self::forest::{ForestMinimizer, ForestOptions, TreeEstimator};
pub use self::gp::{GpMinimizer, GpOptions, Kernel};
pub use self::random::RandomMinimizer;
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::space::SearchSpace;

/// A black-box minimizer over a [`SearchSpace`].
///
/// Points travel as positional slices in the space's sorted name order.
pub trait Minimizer: Send {
    /// Short strategy name, recorded in checkpoints.
    fn name(&self) -> &'static str;

    /// Record observations made elsewhere (prior history or a warm start).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] or [`Error::ValueOutOfDomain`]
    /// for a point that does not fit the space, and an error when `points`
    /// and `values` differ in length or a value is not finite.
    fn tell(&mut self, points: &[Vec<ParamValue>], values: &[f64]) -> Result<()>;

    /// Propose the next point to evaluate.
    ///
    /// # Errors
    ///
    /// Returns an error if the surrogate cannot encode the history.
    fn ask(&mut self) -> Result<Vec<ParamValue>>;

    /// Adjust the strategy for a resumed chunk whose earlier chunks already
    /// took `random_starts_spent` random starts. Only the rest are left.
    fn prepare_resume(&mut self, random_starts_spent: usize);

    /// Random starts this minimizer will still take before using its surrogate.
    fn random_starts_left(&self) -> usize;

    /// Points observed so far, told and evaluated, in order.
    fn x_iters(&self) -> &[Vec<ParamValue>];

    /// Values observed so far, aligned with [`x_iters`](Minimizer::x_iters).
    fn func_vals(&self) -> &[f64];

    /// The seed this minimizer was built with.
    fn seed(&self) -> Option<u64>;

    /// Evaluate `objective` at `n_calls` proposed points.
    ///
    /// Stops at the first objective error and returns it.
    ///
    /// # Errors
    ///
    /// Returns any error from [`ask`](Minimizer::ask), the objective or
    /// [`tell`](Minimizer::tell), and [`Error::NoEvaluations`] if no
    /// observation exists at the end.
    fn run(
        &mut self,
        objective: &mut dyn FnMut(&[ParamValue]) -> Result<f64>,
        n_calls: usize,
    ) -> Result<OptimizeResult> {
        for _ in 0..n_calls {
            let x = self.ask()?;
            let y = objective(&x)?;
            self.tell(&[x], &[y])?;
        }
        self.result()
    }

    /// Summarize everything observed so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoEvaluations`] when nothing was observed.
    fn result(&self) -> Result<OptimizeResult> {
        OptimizeResult::from_history(
            self.name(),
            self.x_iters(),
            self.func_vals(),
            self.random_starts_left(),
            self.seed(),
        )
    }
}

/// Outcome of a minimizer run, in minimizer sign.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResult {
    /// Strategy name.
    pub minimizer: String,
    /// The best point (first one on ties).
    pub x: Vec<ParamValue>,
    /// The lowest observed value.
    pub fun: f64,
    /// All observed points in order.
    pub x_iters: Vec<Vec<ParamValue>>,
    /// All observed values in order.
    pub func_vals: Vec<f64>,
    /// Random starts still pending when the result was taken.
    pub random_starts_left: usize,
    /// Seed of the run.
    pub seed: Option<u64>,
}

impl OptimizeResult {
    pub(crate) fn from_history(
        minimizer: &str,
        x_iters: &[Vec<ParamValue>],
        func_vals: &[f64],
        random_starts_left: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        let best = func_vals
            .iter()
            .enumerate()
            .fold(None::<(usize, f64)>, |best, (i, &v)| match best {
                Some((_, b)) if b <= v => best,
                _ => Some((i, v)),
            })
            .ok_or(Error::NoEvaluations)?;
        Ok(Self {
            minimizer: minimizer.to_owned(),
            x: x_iters[best.0].clone(),
            fun: best.1,
            x_iters: x_iters.to_vec(),
            func_vals: func_vals.to_vec(),
            random_starts_left,
            seed,
        })
    }
}

/// Which strategy to build, with its options.
///
/// Serialized with a `kind` tag:
///
/// ```
/// use topic_optimizer::minimizer::MinimizerKind;
///
/// let kind: MinimizerKind = serde_json::from_str(r#"{"kind":"forest","n_trees":50}"#).unwrap();
/// assert_eq!(kind.name(), "forest");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MinimizerKind {
    /// Uniform random search.
    Random,
    /// Tree-ensemble surrogate search.
    Forest(ForestOptions),
    /// Gaussian-process surrogate search.
    GaussianProcess(GpOptions),
}

impl Default for MinimizerKind {
    fn default() -> Self {
        Self::GaussianProcess(GpOptions::default())
    }
}

impl MinimizerKind {
    /// Tree-ensemble search with default options.
    #[must_use]
    pub fn forest() -> Self {
        Self::Forest(ForestOptions::default())
    }

    /// Gaussian-process search with default options.
    #[must_use]
    pub fn gaussian_process() -> Self {
        Self::GaussianProcess(GpOptions::default())
    }

    /// The strategy name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Random => random::NAME,
            Self::Forest(_) => forest::NAME,
            Self::GaussianProcess(_) => gp::NAME,
        }
    }

    /// Check the strategy options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMinimizerOption`] naming the bad option.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Random => Ok(()),
            Self::Forest(options) => options.validate(),
            Self::GaussianProcess(options) => options.validate(),
        }
    }

    /// Build a fresh minimizer.
    #[must_use]
    pub fn build(
        &self,
        space: &SearchSpace,
        n_random_starts: usize,
        seed: Option<u64>,
    ) -> Box<dyn Minimizer> {
        match self {
            Self::Random => Box::new(RandomMinimizer::new(space.clone(), seed)),
            Self::Forest(options) => Box::new(ForestMinimizer::new(
                space.clone(),
                options.clone(),
                n_random_starts,
                seed,
            )),
            Self::GaussianProcess(options) => Box::new(GpMinimizer::new(
                space.clone(),
                options.clone(),
                n_random_starts,
                seed,
            )),
        }
    }
}
