//! State and helpers shared by the minimizer strategies.

use super::acquisition::Acquisition;
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::space::SearchSpace;

/// Observation history, random-start bookkeeping and RNG of one minimizer.
pub(crate) struct MinimizerState {
    pub(crate) space: SearchSpace,
    pub(crate) x_iters: Vec<Vec<ParamValue>>,
    pub(crate) func_vals: Vec<f64>,
    pub(crate) random_starts_left: usize,
    pub(crate) rng: fastrand::Rng,
    pub(crate) seed: Option<u64>,
}

impl MinimizerState {
    pub(crate) fn new(space: SearchSpace, n_random_starts: usize, seed: Option<u64>) -> Self {
        Self {
            space,
            x_iters: Vec::new(),
            func_vals: Vec::new(),
            random_starts_left: n_random_starts,
            rng: seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed),
            seed,
        }
    }

    /// Validate and append observations.
    pub(crate) fn record(&mut self, points: &[Vec<ParamValue>], values: &[f64]) -> Result<()> {
        if points.len() != values.len() {
            return Err(Error::Internal("observed points and values differ in length"));
        }
        for (point, &value) in points.iter().zip(values) {
            self.space.check_point(point)?;
            if !value.is_finite() {
                return Err(Error::NonFiniteScore {
                    metric: "observation".to_owned(),
                    value,
                });
            }
        }
        self.x_iters.extend_from_slice(points);
        self.func_vals.extend_from_slice(values);
        Ok(())
    }

    /// Take one random start if any is left.
    pub(crate) fn take_random_start(&mut self) -> bool {
        if self.random_starts_left > 0 {
            self.random_starts_left -= 1;
            true
        } else {
            false
        }
    }

    /// Drop random starts that an earlier chunk already took.
    pub(crate) fn forget_random_starts(&mut self, spent: usize) {
        self.random_starts_left = self.random_starts_left.saturating_sub(spent);
    }

    pub(crate) fn sample(&mut self) -> Vec<ParamValue> {
        self.space.sample(&mut self.rng)
    }

    /// Encode every observed point into the unit cube.
    pub(crate) fn encoded_history(&self) -> Result<Vec<Vec<f64>>> {
        self.x_iters.iter().map(|x| self.space.encode(x)).collect()
    }
}

/// A fitted regression model over unit-cube inputs.
pub(crate) trait Surrogate {
    /// Predictive mean and standard deviation at `x`.
    fn predict(&self, x: &[f64]) -> (f64, f64);

    /// The best (lowest) training target, in the model's units.
    fn incumbent(&self) -> f64;
}

/// Pick the best of `n_points` random candidates under `acquisition`.
pub(crate) fn propose(
    state: &mut MinimizerState,
    surrogate: &dyn Surrogate,
    acquisition: Acquisition,
    n_points: usize,
) -> Result<Vec<ParamValue>> {
    let f_best = surrogate.incumbent();
    let mut best: Option<(f64, Vec<ParamValue>)> = None;
    for _ in 0..n_points.max(1) {
        let candidate = state.sample();
        let (mean, std) = surrogate.predict(&state.space.encode(&candidate)?);
        let score = acquisition.score(mean, std, f_best);
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, x)| x)
        .ok_or(Error::Internal("no acquisition candidate"))
}

/// Mean and population standard deviation.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
