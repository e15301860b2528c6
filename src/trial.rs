//! One independent optimization run and its evaluation history.

use serde::{Deserialize, Serialize};

use crate::checkpoint::{CHECKPOINT_VERSION, Checkpoint};
use crate::error::{Error, Result};
use crate::minimizer::{MinimizerKind, OptimizeResult};
use crate::objective::{MetricValue, Objective};
use crate::param::ParamValue;
use crate::space::SearchSpace;
use crate::types::{StopReason, TrialState};

/// One evaluated point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// The evaluated point, positional in sorted parameter-name order.
    pub point: Vec<ParamValue>,
    /// The value the minimizer saw (negated score when maximizing).
    pub value: f64,
    /// Metric values of the evaluation. Empty for warm-start points.
    #[serde(default)]
    pub metrics: Vec<MetricValue>,
}

/// Append-only, evaluation-ordered history of one trial.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationHistory {
    records: Vec<EvaluationRecord>,
}

impl EvaluationHistory {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in evaluation order.
    #[must_use]
    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    /// Iterate over the records.
    pub fn iter(&self) -> core::slice::Iter<'_, EvaluationRecord> {
        self.records.iter()
    }

    /// The points, cloned, in evaluation order.
    #[must_use]
    pub fn points(&self) -> Vec<Vec<ParamValue>> {
        self.records.iter().map(|r| r.point.clone()).collect()
    }

    /// The minimizer-sign values in evaluation order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.value).collect()
    }

    fn extend(&mut self, records: impl IntoIterator<Item = EvaluationRecord>) {
        self.records.extend(records);
    }
}

impl<'a> IntoIterator for &'a EvaluationHistory {
    type Item = &'a EvaluationRecord;
    type IntoIter = core::slice::Iter<'a, EvaluationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// A single independent trial.
///
/// Created fresh (optionally warm-started) or restored from a
/// [`Checkpoint`]. Only [`run_chunk`](Trial::run_chunk) and
/// [`stop`](Trial::stop) mutate it. The history only grows, and only by
/// whole chunks: a chunk that fails leaves the trial untouched.
#[derive(Clone, Debug)]
pub struct Trial {
    index: usize,
    state: TrialState,
    stop_reason: Option<StopReason>,
    history: EvaluationHistory,
    n_evaluations: usize,
    chunks_completed: usize,
}

impl Trial {
    /// A fresh trial with empty history.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            state: TrialState::Running,
            stop_reason: None,
            history: EvaluationHistory::default(),
            n_evaluations: 0,
            chunks_completed: 0,
        }
    }

    /// A fresh trial seeded with prior observations. Values are in
    /// minimizer sign and are not charged against the call budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WarmStartMismatch`] when the lengths differ and the
    /// search space errors for points that do not fit.
    pub fn with_warm_start(
        index: usize,
        space: &SearchSpace,
        points: &[Vec<ParamValue>],
        values: &[f64],
    ) -> Result<Self> {
        if points.len() != values.len() {
            return Err(Error::WarmStartMismatch {
                points: points.len(),
                scores: values.len(),
            });
        }
        for point in points {
            space.check_point(point)?;
        }
        let mut trial = Self::new(index);
        trial
            .history
            .extend(points.iter().zip(values).map(|(p, &v)| EvaluationRecord {
                point: p.clone(),
                value: v,
                metrics: Vec::new(),
            }));
        Ok(trial)
    }

    /// Rebuild a trial from its checkpoint.
    #[must_use]
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        let Checkpoint {
            trial_index,
            x_iters,
            func_vals,
            mut metrics,
            n_evaluations,
            chunks_completed,
            stop_reason,
            ..
        } = checkpoint;
        metrics.resize_with(x_iters.len(), Vec::new);
        let mut trial = Self::new(trial_index);
        trial.history.extend(
            x_iters
                .into_iter()
                .zip(func_vals)
                .zip(metrics)
                .map(|((point, value), metrics)| EvaluationRecord {
                    point,
                    value,
                    metrics,
                }),
        );
        trial.n_evaluations = n_evaluations;
        trial.chunks_completed = chunks_completed;
        if let Some(reason) = stop_reason {
            trial.stop(reason);
        }
        trial
    }

    /// Snapshot this trial for persistence.
    #[must_use]
    pub fn to_checkpoint(&self, minimizer: &str, space: &SearchSpace) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            trial_index: self.index,
            minimizer: minimizer.to_owned(),
            param_names: space.names().into_iter().map(str::to_owned).collect(),
            x_iters: self.history.points(),
            func_vals: self.history.values(),
            metrics: self.history.iter().map(|r| r.metrics.clone()).collect(),
            n_evaluations: self.n_evaluations,
            chunks_completed: self.chunks_completed,
            stop_reason: self.stop_reason,
        }
    }

    /// The trial index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TrialState {
        self.state
    }

    /// Returns `true` while the trial takes part in chunks.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TrialState::Running
    }

    /// Why the trial stopped, once it has.
    #[must_use]
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// The evaluation history, warm-start records first.
    #[must_use]
    pub fn history(&self) -> &EvaluationHistory {
        &self.history
    }

    /// Evaluations charged against the call budget.
    #[must_use]
    pub fn n_evaluations(&self) -> usize {
        self.n_evaluations
    }

    /// Chunks completed so far.
    #[must_use]
    pub fn chunks_completed(&self) -> usize {
        self.chunks_completed
    }

    /// Budget left out of `n_calls`.
    #[must_use]
    pub fn remaining(&self, n_calls: usize) -> usize {
        n_calls.saturating_sub(self.n_evaluations)
    }

    /// Freeze the trial. The first reason wins; stopping is terminal.
    pub fn stop(&mut self, reason: StopReason) {
        if self.state == TrialState::Running {
            self.state = TrialState::Stopped;
            self.stop_reason = Some(reason);
        }
    }

    /// Summary of the history in minimizer sign.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoEvaluations`] for an empty history.
    pub fn result(&self, minimizer: &str) -> Result<OptimizeResult> {
        OptimizeResult::from_history(
            minimizer,
            &self.history.points(),
            &self.history.values(),
            0,
            None,
        )
    }

    /// Run one chunk of `n_calls` evaluations.
    ///
    /// Builds a fresh minimizer. After the first chunk it is a resumed
    /// chunk: the random starts taken by earlier chunks are dropped and the
    /// full history is told before running. On success the new records are appended and the chunk is
    /// counted; on failure the trial is left as it was.
    ///
    /// # Errors
    ///
    /// Returns the first error of the objective or the minimizer.
    pub fn run_chunk(
        &mut self,
        kind: &MinimizerKind,
        space: &SearchSpace,
        n_random_starts: usize,
        seed: Option<u64>,
        objective: &dyn Objective,
        n_calls: usize,
    ) -> Result<OptimizeResult> {
        if !self.is_running() {
            return Err(Error::Internal("chunk requested for a stopped trial"));
        }
        let mut minimizer = kind.build(space, n_random_starts, seed);
        if self.chunks_completed > 0 {
            // Random starts come first, so every charged evaluation took one
            // while any were left.
            minimizer.prepare_resume(self.n_evaluations.min(n_random_starts));
        }
        if !self.history.is_empty() {
            minimizer.tell(&self.history.points(), &self.history.values())?;
        }

        let index = self.index;
        let mut pending = Vec::with_capacity(n_calls);
        let result = minimizer.run(
            &mut |point| {
                let evaluation = objective.evaluate(index, point)?;
                pending.push(EvaluationRecord {
                    point: point.to_vec(),
                    value: evaluation.value,
                    metrics: evaluation.metrics,
                });
                Ok(evaluation.value)
            },
            n_calls,
        )?;

        if pending.len() != n_calls {
            return Err(Error::Internal("minimizer ran a different number of evaluations"));
        }
        self.history.extend(pending);
        self.n_evaluations += n_calls;
        self.chunks_completed += 1;
        Ok(result)
    }
}
