//! Early-stop evaluator.
//!
//! After every chunk the driver asks the trial's [`EarlyStopper`] whether
//! the best-so-far trajectory has stalled. With `n` observations (in
//! minimizer sign), `e` of them charged against the budget, window `w` and
//! `r` random starts, the trial stops when
//!
//! - `e >= r + w`: the warm-up of random starts is over and a full window
//!   has been evaluated after it. Warm-start observations do not count.
//! - `n > w`: there is history before the window to compare against, and
//! - `min(values[n - w..]) >= min(values[..n - w])`: the last `w`
//!   evaluations did not strictly improve on the best found before them.
//!
//! Stopping is terminal. The evaluator itself is stateless and only reads
//! the history it is given, so it gives the same answer for a trial
//! restored from a checkpoint.

/// Patience rule over a trial's observed values.
///
/// # Examples
///
/// ```
/// use topic_optimizer::early_stop::EarlyStopper;
///
/// let stopper = EarlyStopper::new(2, 1);
/// // Best so far is 1.0 at index 1; the last two values never beat it.
/// assert!(stopper.should_stop(&[3.0, 1.0, 2.0, 1.5], 4));
/// // The last value improves on the best.
/// assert!(!stopper.should_stop(&[3.0, 1.0, 2.0, 0.5], 4));
/// // Two of the four values came from a warm start.
/// assert!(!stopper.should_stop(&[3.0, 1.0, 2.0, 1.5], 2));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EarlyStopper {
    window: usize,
    warm_up: usize,
}

impl EarlyStopper {
    /// Create a stopper with patience `window` that never fires during the
    /// first `warm_up` random-start evaluations.
    #[must_use]
    pub fn new(window: usize, warm_up: usize) -> Self {
        Self { window, warm_up }
    }

    /// The patience window.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Decide whether a trial with these observed values (minimizer sign,
    /// evaluation order) should stop. `n_evaluations` of them were charged
    /// against the budget; the rest came from a warm start.
    #[must_use]
    pub fn should_stop(&self, func_vals: &[f64], n_evaluations: usize) -> bool {
        let n = func_vals.len();
        if self.window == 0 || n_evaluations < self.warm_up + self.window || n <= self.window {
            return false;
        }
        let split = n - self.window;
        let before = func_vals[..split].iter().copied().fold(f64::INFINITY, f64::min);
        let recent = func_vals[split..].iter().copied().fold(f64::INFINITY, f64::min);
        recent >= before
    }
}

/// Running minimum of `func_vals`: entry `i` is the best value among the
/// first `i + 1` observations.
#[must_use]
pub fn best_so_far(func_vals: &[f64]) -> Vec<f64> {
    func_vals
        .iter()
        .scan(f64::INFINITY, |best, &v| {
            *best = best.min(v);
            Some(*best)
        })
        .collect()
}
