//! Per-trial results and the aggregated [`BestEvaluation`] report.
//!
//! Everything here is in the user's direction: scores are sign-corrected
//! back from the minimizer's view. The raw minimizer-sign values remain
//! available through each trial's [`EvaluationHistory`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::early_stop::best_so_far;
use crate::error::{Error, Result};
use crate::objective::IterationRecord;
use crate::space::{HyperparameterVector, SearchSpace};
use crate::trial::{EvaluationHistory, Trial};
use crate::types::{Direction, StopReason};

/// Outcome of one trial.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial index.
    pub trial: usize,
    /// Best hyperparameters of the trial (first on ties).
    pub best_hyperparameters: HyperparameterVector,
    /// Best score of the trial.
    pub best_score: f64,
    /// Scores in evaluation order, warm-start points first.
    pub scores: Vec<f64>,
    /// Full history in minimizer sign.
    pub history: EvaluationHistory,
    /// Evaluations charged against the budget.
    pub n_evaluations: usize,
    /// Chunks completed.
    pub chunks_completed: usize,
    /// Why the trial stopped.
    pub stop_reason: Option<StopReason>,
}

impl TrialResult {
    pub(crate) fn from_trial(
        trial: &Trial,
        space: &SearchSpace,
        direction: Direction,
        minimizer: &str,
    ) -> Result<Self> {
        let best = trial.result(minimizer)?;
        Ok(Self {
            trial: trial.index(),
            best_hyperparameters: space.to_map(&best.x)?,
            best_score: direction.from_minimized(best.fun),
            scores: best
                .func_vals
                .iter()
                .map(|&v| direction.from_minimized(v))
                .collect(),
            history: trial.history().clone(),
            n_evaluations: trial.n_evaluations(),
            chunks_completed: trial.chunks_completed(),
            stop_reason: trial.stop_reason(),
        })
    }

    /// Values as the minimizer saw them.
    #[must_use]
    pub fn func_vals(&self) -> Vec<f64> {
        self.history.values()
    }

    /// Returns `true` if the early-stop rule froze this trial.
    #[must_use]
    pub fn early_stopped(&self) -> bool {
        matches!(self.stop_reason, Some(StopReason::EarlyStopped { .. }))
    }
}

/// Spread of the per-trial best scores.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreStatistics {
    /// Mean of the per-trial bests.
    pub mean: f64,
    /// Sample standard deviation of the per-trial bests.
    pub std: f64,
    /// Worst per-trial best in the run's direction.
    pub worst: f64,
    /// Best per-trial best in the run's direction.
    pub best: f64,
}

/// Final report of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestEvaluation {
    /// Name of the primary metric.
    pub metric: String,
    /// Strategy that produced the results.
    pub minimizer: String,
    /// Direction the scores are expressed in.
    pub direction: Direction,
    /// Sorted hyperparameter names.
    pub hyperparameter_names: Vec<String>,
    /// Index of the winning trial (lowest index on ties).
    pub best_trial: usize,
    /// Best score over all trials.
    pub best_score: f64,
    /// Hyperparameters of the best score.
    pub best_hyperparameters: HyperparameterVector,
    /// One entry per trial, by index.
    pub trials: Vec<TrialResult>,
    /// Every evaluation with all its metric values.
    pub iterations: Vec<IterationRecord>,
}

impl BestEvaluation {
    pub(crate) fn new(
        metric: String,
        minimizer: String,
        direction: Direction,
        space: &SearchSpace,
        trials: Vec<TrialResult>,
        iterations: Vec<IterationRecord>,
    ) -> Result<Self> {
        let mut winner: Option<&TrialResult> = None;
        for result in &trials {
            if winner.is_none_or(|w| direction.is_better(result.best_score, w.best_score)) {
                winner = Some(result);
            }
        }
        let winner = winner.ok_or(Error::NoEvaluations)?;
        Ok(Self {
            best_trial: winner.trial,
            best_score: winner.best_score,
            best_hyperparameters: winner.best_hyperparameters.clone(),
            metric,
            minimizer,
            direction,
            hyperparameter_names: space.names().into_iter().map(str::to_owned).collect(),
            trials,
            iterations,
        })
    }

    /// The winning trial's result.
    #[must_use]
    pub fn best_trial_result(&self) -> Option<&TrialResult> {
        self.trials.iter().find(|t| t.trial == self.best_trial)
    }

    /// Result of trial `index`.
    #[must_use]
    pub fn trial(&self, index: usize) -> Option<&TrialResult> {
        self.trials.iter().find(|t| t.trial == index)
    }

    /// Mean, spread and range of the per-trial best scores.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score_statistics(&self) -> Option<ScoreStatistics> {
        let bests: Vec<f64> = self.trials.iter().map(|t| t.best_score).collect();
        let first = *bests.first()?;
        let n = bests.len() as f64;
        let mean = bests.iter().sum::<f64>() / n;
        let std = if bests.len() > 1 {
            (bests.iter().map(|b| (b - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let (mut worst, mut best) = (first, first);
        for &b in &bests[1..] {
            if self.direction.is_better(b, best) {
                best = b;
            }
            if self.direction.is_better(worst, b) {
                worst = b;
            }
        }
        Some(ScoreStatistics {
            mean,
            std,
            worst,
            best,
        })
    }

    /// Best-so-far score after each evaluation of trial `index`.
    #[must_use]
    pub fn convergence(&self, index: usize) -> Option<Vec<f64>> {
        let trial = self.trial(index)?;
        Some(
            best_so_far(&trial.func_vals())
                .into_iter()
                .map(|v| self.direction.from_minimized(v))
                .collect(),
        )
    }

    /// All recorded values of metric `name`, in log order.
    #[must_use]
    pub fn metric_values(&self, name: &str) -> Vec<f64> {
        self.iterations
            .iter()
            .filter_map(|r| r.metric(name))
            .collect()
    }

    /// Write the report as pretty JSON, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Report`] if the file cannot be written.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(parent)?;
            let file = std::fs::File::create(&tmp_path)?;
            serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)
                .map_err(std::io::Error::other)?;
            std::fs::rename(&tmp_path, path)
        };
        write().map_err(|e| Error::Report(format!("{}: {e}", path.display())))
    }

    /// Read a report written by [`save_json`](Self::save_json).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Report`] if the file cannot be read or parsed.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Report(format!("{}: {e}", path.display())))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::Report(format!("{}: {e}", path.display())))
    }
}
