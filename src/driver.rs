//! The optimization driver.
//!
//! [`Optimizer`] runs `n_trials` independent trials of one minimizer
//! strategy in chunks. After every chunk it checkpoints each trial that ran
//! and applies the early-stop rule; a trial leaves the loop when it is
//! early-stopped or its budget is spent. When no trial is running, the
//! results are sign-corrected and aggregated into a [`BestEvaluation`].
//!
//! ```
//! use topic_optimizer::prelude::*;
//!
//! struct Quadratic;
//!
//! impl TopicModel for Quadratic {
//!     type Dataset = ();
//!     type Error = String;
//!
//!     fn train(
//!         &self,
//!         _dataset: &(),
//!         hyperparameters: &HyperparameterVector,
//!         _options: &TrainOptions,
//!     ) -> Result<ModelOutput, String> {
//!         let x = hyperparameters["x"].as_f64().ok_or("x is not a float")?;
//!         Ok(ModelOutput::new(vec![vec!["w".to_owned()]])
//!             .with_topic_word_matrix(vec![vec![-(x - 0.3).powi(2)]]))
//!     }
//! }
//!
//! let metric = metric_fn("score", |output: &ModelOutput| {
//!     Ok(output.topic_word_matrix.as_ref().map_or(0.0, |m| m[0][0]))
//! });
//! let space = SearchSpace::new().with("x", Dimension::real(0.0, 1.0));
//! let config = OptimizerConfig::builder()
//!     .n_calls(8)
//!     .n_trials(3)
//!     .minimizer(MinimizerKind::Random)
//!     .random_state(7)
//!     .build();
//!
//! let best = Optimizer::new(&Quadratic, &(), space, metric, config)
//!     .optimize()
//!     .unwrap();
//! assert_eq!(best.trials.len(), 3);
//! assert!(best.best_score <= 0.0);
//! ```

use std::sync::Arc;

use rayon::prelude::*;

use crate::checkpoint::{CheckpointHandle, CheckpointStore, FileCheckpointStore};
use crate::config::OptimizerConfig;
use crate::early_stop::EarlyStopper;
use crate::error::{Error, Result};
use crate::objective::{
    IterationLog, IterationRecord, Metric, Objective, ObjectiveAdapter, TopicModel,
};
use crate::result::{BestEvaluation, TrialResult};
use crate::rng_util::derive_seed;
use crate::space::SearchSpace;
use crate::trial::Trial;
use crate::types::StopReason;

/// Drives a multi-trial optimization of a topic model's hyperparameters.
pub struct Optimizer<'a, M: TopicModel> {
    model: &'a M,
    dataset: &'a M::Dataset,
    space: SearchSpace,
    metric: Box<dyn Metric>,
    extra_metrics: Vec<Box<dyn Metric>>,
    config: OptimizerConfig,
    store: Option<Arc<dyn CheckpointStore>>,
}

impl<'a, M: TopicModel> Optimizer<'a, M> {
    /// Creates a driver scoring with `metric`.
    #[must_use]
    pub fn new(
        model: &'a M,
        dataset: &'a M::Dataset,
        space: SearchSpace,
        metric: impl Metric + 'static,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            model,
            dataset,
            space,
            metric: Box::new(metric),
            extra_metrics: Vec::new(),
            config,
            store: None,
        }
    }

    /// Also record `metric` for every evaluation. It does not steer the
    /// search.
    #[must_use]
    pub fn extra_metric(mut self, metric: impl Metric + 'static) -> Self {
        self.extra_metrics.push(Box::new(metric));
        self
    }

    /// Persist checkpoints in `store` instead of the file store under
    /// `checkpoint.directory`.
    #[must_use]
    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// The search space.
    #[must_use]
    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Run every trial to completion and aggregate the results.
    ///
    /// # Errors
    ///
    /// Configuration errors are returned before any evaluation. A failing
    /// evaluation or checkpoint write aborts the run with
    /// [`Error::Trial`] naming the trial and chunk; the failing chunk is
    /// not checkpointed. With `resume`, a missing or broken checkpoint is
    /// fatal.
    pub fn optimize(&self) -> Result<BestEvaluation> {
        self.config.validate()?;
        self.space.validate()?;

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "optimize",
            minimizer = self.config.minimizer.name(),
            n_trials = self.config.n_trials,
            direction = ?self.config.direction,
        )
        .entered();

        let store = self.store();
        let log = IterationLog::new();
        let mut trials = match &store {
            Some(store) if self.config.resume => self.restore_trials(store.as_ref(), &log)?,
            _ => self.fresh_trials()?,
        };

        trace_info!(
            n_calls = self.config.n_calls,
            chunk_size = self.config.chunk_size(),
            "optimization started"
        );

        let objective = ObjectiveAdapter::new(
            self.model,
            self.dataset,
            &self.space,
            self.metric.as_ref(),
            self.config.direction,
            &log,
        )
        .extra_metrics(&self.extra_metrics)
        .train_options(self.config.train_options());
        let store = store.as_deref();

        while trials.iter().any(Trial::is_running) {
            if self.config.parallel_trials {
                trials
                    .par_iter_mut()
                    .filter(|t| t.is_running())
                    .map(|t| self.step(t, &objective, store))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .collect::<Result<()>>()?;
            } else {
                for trial in trials.iter_mut().filter(|t| t.is_running()) {
                    self.step(trial, &objective, store)?;
                }
            }
        }

        self.aggregate(&trials, log.snapshot())
    }

    fn store(&self) -> Option<Arc<dyn CheckpointStore>> {
        let checkpoint = self.config.checkpoint.as_ref()?;
        Some(self.store.clone().unwrap_or_else(|| {
            Arc::new(FileCheckpointStore::new(&checkpoint.directory)) as Arc<dyn CheckpointStore>
        }))
    }

    fn fresh_trials(&self) -> Result<Vec<Trial>> {
        let Some(warm) = &self.config.warm_start else {
            return Ok((0..self.config.n_trials).map(Trial::new).collect());
        };
        let points = warm
            .points
            .iter()
            .map(|p| self.space.to_point(p))
            .collect::<Result<Vec<_>>>()?;
        let values: Vec<f64> = warm
            .scores
            .iter()
            .map(|&s| self.config.direction.to_minimized(s))
            .collect();
        (0..self.config.n_trials)
            .map(|i| Trial::with_warm_start(i, &self.space, &points, &values))
            .collect()
    }

    fn restore_trials(&self, store: &dyn CheckpointStore, log: &IterationLog) -> Result<Vec<Trial>> {
        let Some(checkpoint) = &self.config.checkpoint else {
            return Err(Error::Config("resume requires checkpointing to be enabled".to_owned()));
        };
        let mut trials = Vec::with_capacity(self.config.n_trials);
        for index in 0..self.config.n_trials {
            let handle = CheckpointHandle::new(&checkpoint.base_name, index);
            let mut saved = store.load(&handle)?;
            saved.validate(&handle, &self.space)?;
            // The state is re-derived below from the current budget and window.
            saved.stop_reason = None;
            if saved.minimizer != self.config.minimizer.name() {
                trace_debug!(
                    trial = index,
                    saved = %saved.minimizer,
                    "resuming history written by another minimizer"
                );
            }
            let mut trial = Trial::from_checkpoint(saved);
            for record in trial.history() {
                if !record.metrics.is_empty() {
                    log.push(IterationRecord {
                        trial: index,
                        hyperparameters: self.space.to_map(&record.point)?,
                        metrics: record.metrics.clone(),
                    });
                }
            }
            self.update_state(&mut trial);
            trace_info!(
                trial = index,
                n_evaluations = trial.n_evaluations(),
                chunks = trial.chunks_completed(),
                running = trial.is_running(),
                "trial restored from checkpoint"
            );
            trials.push(trial);
        }
        Ok(trials)
    }

    /// Run one chunk of a running trial, then checkpoint it.
    fn step(
        &self,
        trial: &mut Trial,
        objective: &dyn Objective,
        store: Option<&dyn CheckpointStore>,
    ) -> Result<()> {
        let index = trial.index();
        let chunk = trial.chunks_completed();
        let n_calls = self.config.chunk_size().min(trial.remaining(self.config.n_calls));
        if n_calls == 0 {
            trial.stop(StopReason::BudgetExhausted);
            return Ok(());
        }
        let seed = self
            .config
            .random_state
            .map(|base| derive_seed(base, index, chunk));

        trace_debug!(trial = index, chunk, n_calls, "chunk started");
        trial
            .run_chunk(
                &self.config.minimizer,
                &self.space,
                self.config.n_random_starts,
                seed,
                objective,
                n_calls,
            )
            .map_err(|e| e.in_trial(index, chunk))?;
        trace_debug!(
            trial = index,
            chunk,
            n_evaluations = trial.n_evaluations(),
            "chunk finished"
        );

        self.update_state(trial);

        if let (Some(store), Some(checkpoint)) = (store, &self.config.checkpoint) {
            let handle = CheckpointHandle::new(&checkpoint.base_name, index);
            store
                .save(
                    &handle,
                    &trial.to_checkpoint(self.config.minimizer.name(), &self.space),
                )
                .map_err(|e| e.in_trial(index, chunk))?;
            trace_debug!(trial = index, key = %handle.key, "checkpoint saved");
        }
        Ok(())
    }

    /// Apply the early-stop rule, then the budget.
    fn update_state(&self, trial: &mut Trial) {
        if !trial.is_running() {
            return;
        }
        if let Some(early_stop) = self.config.early_stop {
            let stopper = EarlyStopper::new(early_stop.window, self.config.n_random_starts);
            let n_evaluations = trial.n_evaluations();
            if stopper.should_stop(&trial.history().values(), n_evaluations) {
                trial.stop(StopReason::EarlyStopped { n_evaluations });
                trace_info!(trial = trial.index(), n_evaluations, "trial early-stopped");
                return;
            }
        }
        if trial.remaining(self.config.n_calls) == 0 {
            trial.stop(StopReason::BudgetExhausted);
        }
    }

    fn aggregate(&self, trials: &[Trial], iterations: Vec<IterationRecord>) -> Result<BestEvaluation> {
        let minimizer = self.config.minimizer.name();
        let direction = self.config.direction;
        let results = trials
            .iter()
            .map(|t| TrialResult::from_trial(t, &self.space, direction, minimizer))
            .collect::<Result<Vec<_>>>()?;
        for result in &results {
            trace_info!(
                trial = result.trial,
                best = result.best_score,
                n_evaluations = result.n_evaluations,
                stop_reason = ?result.stop_reason,
                "trial finished"
            );
        }

        let best = BestEvaluation::new(
            self.metric.name().to_owned(),
            minimizer.to_owned(),
            direction,
            &self.space,
            results,
            iterations,
        )?;
        trace_info!(
            best_trial = best.best_trial,
            best_score = best.best_score,
            "optimization finished"
        );

        if self.config.report.enabled {
            let path = self.config.report.path();
            best.save_json(&path)?;
            trace_info!(path = %path.display(), "report written");
        }
        Ok(best)
    }
}
