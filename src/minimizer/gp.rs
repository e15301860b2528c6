//! Gaussian-process surrogate search.
//!
//! Observations are encoded into the unit cube and targets are
//! standardized (zero mean, unit variance) before a GP is fitted by
//! Cholesky decomposition. ARD length scales are set to the per-dimension
//! standard deviation of the training inputs. The next point is the best of
//! `n_points` random candidates under the acquisition function.
//!
//! `tell` invalidates the fitted model and the next `ask` refits it from
//! the whole history. A resumed chunk therefore tells the restored history
//! once and forces its random starts to zero before running.
//!
//! If the kernel matrix is not positive definite the proposal falls back to
//! a uniform sample.
//!
//! | Option | Default |
//! |--------|---------|
//! | `kernel` | Matérn 3/2 |
//! | `acquisition` | LCB, kappa 1.96 |
//! | `n_points` | 1000 |
//! | `noise_variance` | 1e-6 |

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::Minimizer;
use super::acquisition::Acquisition;
use super::common::{MinimizerState, Surrogate, propose};
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::space::SearchSpace;

pub(crate) const NAME: &str = "gaussian_process";

/// Most recent observations used to fit the GP.
const MAX_TRAIN_POINTS: usize = 200;

/// Covariance function of the GP.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    /// Squared exponential.
    Rbf,
    /// Matérn with ν = 1/2 (exponential).
    Matern12,
    /// Matérn with ν = 3/2.
    #[default]
    Matern32,
    /// Matérn with ν = 5/2.
    Matern52,
}

impl Kernel {
    /// Unit-variance correlation at scaled distance `r`.
    #[must_use]
    pub fn correlation(self, r: f64) -> f64 {
        match self {
            Self::Rbf => (-0.5 * r * r).exp(),
            Self::Matern12 => (-r).exp(),
            Self::Matern32 => {
                let s = SQRT_3 * r;
                (1.0 + s) * (-s).exp()
            }
            Self::Matern52 => {
                let s = SQRT_5 * r;
                (1.0 + s + 5.0 / 3.0 * r * r) * (-s).exp()
            }
        }
    }

    fn eval(self, x1: &[f64], x2: &[f64], lengthscales: &[f64]) -> f64 {
        let r_sq: f64 = x1
            .iter()
            .zip(x2)
            .zip(lengthscales)
            .map(|((a, b), l)| ((a - b) / l).powi(2))
            .sum();
        self.correlation(r_sq.sqrt())
    }
}

const SQRT_3: f64 = 1.732_050_807_568_877_2;
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Options for [`GpMinimizer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpOptions {
    /// Covariance function.
    pub kernel: Kernel,
    /// Acquisition function.
    pub acquisition: Acquisition,
    /// Random candidates scored per proposal.
    pub n_points: usize,
    /// Observation noise added to the kernel diagonal.
    pub noise_variance: f64,
}

impl Default for GpOptions {
    fn default() -> Self {
        Self {
            kernel: Kernel::default(),
            acquisition: Acquisition::default(),
            n_points: 1000,
            noise_variance: 1e-6,
        }
    }
}

impl GpOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_points == 0 {
            return Err(Error::InvalidMinimizerOption {
                option: "n_points",
                reason: "must be greater than 0",
            });
        }
        if !self.noise_variance.is_finite() || self.noise_variance < 0.0 {
            return Err(Error::InvalidMinimizerOption {
                option: "noise_variance",
                reason: "must be finite and non-negative",
            });
        }
        self.acquisition.validate()
    }
}

/// Minimizer guided by a Gaussian process.
///
/// ```
/// use topic_optimizer::minimizer::{GpMinimizer, GpOptions, Minimizer};
/// use topic_optimizer::space::{Dimension, SearchSpace};
///
/// let space = SearchSpace::new().with("x", Dimension::real(-2.0, 2.0));
/// let mut gp = GpMinimizer::new(space, GpOptions::default(), 5, Some(3));
/// let result = gp
///     .run(&mut |p| Ok((p[0].as_f64().unwrap_or(0.0) - 1.0).powi(2)), 15)
///     .unwrap();
/// assert_eq!(result.func_vals.len(), 15);
/// ```
pub struct GpMinimizer {
    state: MinimizerState,
    options: GpOptions,
    model: Option<GpModel>,
}

impl GpMinimizer {
    /// Creates a GP minimizer that samples `n_random_starts` points
    /// uniformly before fitting its first GP.
    #[must_use]
    pub fn new(
        space: SearchSpace,
        options: GpOptions,
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

impl Minimizer for GpMinimizer {
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
            let start = self.state.x_iters.len().saturating_sub(MAX_TRAIN_POINTS);
            let x: Vec<Vec<f64>> = self.state.x_iters[start..]
                .iter()
                .map(|p| self.state.space.encode(p))
                .collect::<Result<_>>()?;
            self.model = GpModel::fit(
                &x,
                &self.state.func_vals[start..],
                self.options.kernel,
                self.options.noise_variance,
            );
        }
        match self.model.as_ref() {
            Some(model) => propose(
                &mut self.state,
                model,
                self.options.acquisition,
                self.options.n_points,
            ),
            None => {
                trace_debug!("GP fit failed, sampling uniformly");
                Ok(self.state.sample())
            }
        }
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

/// A fitted GP ready for predictions.
struct GpModel {
    kernel: Kernel,
    /// Cholesky factor of K + σ²I.
    cholesky: nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    /// α = (K + σ²I)⁻¹ y.
    alpha: DVector<f64>,
    x_train: Vec<Vec<f64>>,
    lengthscales: Vec<f64>,
    /// Best standardized target.
    f_best: f64,
}

impl GpModel {
    /// Fit on standardized targets. `None` if the Cholesky factorization fails.
    #[allow(clippy::cast_precision_loss)]
    fn fit(x_train: &[Vec<f64>], y_train: &[f64], kernel: Kernel, noise_var: f64) -> Option<Self> {
        let n = y_train.len();
        if n == 0 || x_train.len() != n {
            return None;
        }

        let y_mean = y_train.iter().sum::<f64>() / n as f64;
        let y_var = if n > 1 {
            y_train.iter().map(|&y| (y - y_mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            1.0
        };
        let y_std = y_var.sqrt().max(1e-10);
        let y: Vec<f64> = y_train.iter().map(|&y| (y - y_mean) / y_std).collect();
        let f_best = y.iter().copied().fold(f64::INFINITY, f64::min);

        let d = x_train[0].len();
        let lengthscales: Vec<f64> = (0..d)
            .map(|j| {
                let mean_j = x_train.iter().map(|x| x[j]).sum::<f64>() / n as f64;
                let var_j = x_train.iter().map(|x| (x[j] - mean_j).powi(2)).sum::<f64>() / n as f64;
                var_j.sqrt().max(0.01)
            })
            .collect();

        let k = DMatrix::from_fn(n, n, |i, j| {
            let k = kernel.eval(&x_train[i], &x_train[j], &lengthscales);
            if i == j { k + noise_var } else { k }
        });
        let cholesky = nalgebra::linalg::Cholesky::new(k)?;
        let alpha = cholesky.solve(&DVector::from_column_slice(&y));

        Some(Self {
            kernel,
            cholesky,
            alpha,
            x_train: x_train.to_vec(),
            lengthscales,
            f_best,
        })
    }
}

impl Surrogate for GpModel {
    fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k_star = DVector::from_fn(self.x_train.len(), |i, _| {
            self.kernel.eval(x, &self.x_train[i], &self.lengthscales)
        });
        let mean = k_star.dot(&self.alpha);
        let v = self.cholesky.solve(&k_star);
        let var = (1.0 - k_star.dot(&v)).max(0.0);
        (mean, var.sqrt())
    }

    fn incumbent(&self) -> f64 {
        self.f_best
    }
}
