//! Run configuration.
//!
//! An [`OptimizerConfig`] is an immutable value built once per run, either
//! fluently through [`OptimizerConfig::builder`] or from JSON. Missing JSON
//! fields take their defaults.
//!
//! | Option | Default |
//! |--------|---------|
//! | `n_calls` | 100 |
//! | `n_trials` | 10 |
//! | `n_random_starts` | 10 |
//! | `minimizer` | Gaussian process |
//! | `direction` | maximize |
//! | `random_state` | none |
//! | `topk` | 10 |
//! | `topic_word_matrix`, `topic_document_matrix` | true |
//! | `checkpoint` | off (`interval` 1, `base_name` `"partial_result"`, `directory` `"."`) |
//! | `early_stop` | off (`window` 10) |
//! | `resume` | false |
//! | `parallel_trials` | false |
//! | `warm_start` | none |
//! | `report` | off (`name` `"optimization_report"`, `directory` `"."`) |
//!
//! ```
//! use topic_optimizer::config::OptimizerConfig;
//!
//! let config = OptimizerConfig::from_json_str(
//!     r#"{"n_calls": 20, "n_trials": 3, "checkpoint": {"interval": 5}, "early_stop": {"window": 4}}"#,
//! )
//! .unwrap();
//! assert_eq!(config.chunk_size(), 4);
//! assert_eq!(config.checkpoint.unwrap().base_name, "partial_result");
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::minimizer::MinimizerKind;
use crate::objective::TrainOptions;
use crate::space::HyperparameterVector;
use crate::types::Direction;

/// Fewest trials a run accepts.
pub const MIN_TRIALS: usize = 3;

/// Checkpoint persistence settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Evaluations between checkpoints.
    pub interval: usize,
    /// Keys are `<base_name>_<trial_index>`.
    pub base_name: String,
    /// Directory of the file store.
    pub directory: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 1,
            base_name: "partial_result".to_owned(),
            directory: PathBuf::from("."),
        }
    }
}

/// Early-stop settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStopConfig {
    /// Patience window in evaluations.
    pub window: usize,
}

impl Default for EarlyStopConfig {
    fn default() -> Self {
        Self { window: 10 }
    }
}

/// Final report export settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Write `<directory>/<name>.json` after a successful run.
    pub enabled: bool,
    /// File stem of the report.
    pub name: String,
    /// Output directory.
    pub directory: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "optimization_report".to_owned(),
            directory: PathBuf::from("."),
        }
    }
}

impl ReportConfig {
    /// The report file path.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.directory.join(format!("{}.json", self.name))
    }
}

/// Observations handed to every trial before its first chunk.
///
/// Scores are in the run's direction. They are not charged against the
/// call budget.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WarmStart {
    /// Evaluated hyperparameters.
    pub points: Vec<HyperparameterVector>,
    /// Their scores, aligned with `points`.
    pub scores: Vec<f64>,
}

/// Configuration of one optimization run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Evaluation budget per trial.
    pub n_calls: usize,
    /// Independent trials.
    pub n_trials: usize,
    /// Uniform evaluations before a surrogate is used; also the early-stop
    /// warm-up.
    pub n_random_starts: usize,
    /// Strategy and its options.
    pub minimizer: MinimizerKind,
    /// Optimization direction.
    pub direction: Direction,
    /// Base seed. Trial and chunk seeds are derived from it.
    pub random_state: Option<u64>,
    /// Top words requested from training.
    pub topk: usize,
    /// Ask training for the topic-word matrix.
    pub topic_word_matrix: bool,
    /// Ask training for the topic-document matrix.
    pub topic_document_matrix: bool,
    /// Checkpointing, off when `None`.
    pub checkpoint: Option<CheckpointConfig>,
    /// Early stopping, off when `None`.
    pub early_stop: Option<EarlyStopConfig>,
    /// Restore every trial from its checkpoint before running.
    pub resume: bool,
    /// Run the trials of one chunk on the rayon thread pool.
    pub parallel_trials: bool,
    /// Prior observations for every trial.
    pub warm_start: Option<WarmStart>,
    /// Report export.
    pub report: ReportConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            n_calls: 100,
            n_trials: 10,
            n_random_starts: 10,
            minimizer: MinimizerKind::default(),
            direction: Direction::Maximize,
            random_state: None,
            topk: 10,
            topic_word_matrix: true,
            topic_document_matrix: true,
            checkpoint: None,
            early_stop: None,
            resume: false,
            parallel_trials: false,
            warm_start: None,
            report: ReportConfig::default(),
        }
    }
}

impl OptimizerConfig {
    /// A builder starting from the defaults.
    #[must_use]
    pub fn builder() -> OptimizerConfigBuilder {
        OptimizerConfigBuilder::default()
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document does not parse.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check every option.
    ///
    /// # Errors
    ///
    /// Returns the configuration error for the first bad option.
    pub fn validate(&self) -> Result<()> {
        if self.n_calls == 0 {
            return Err(Error::InvalidCallBudget);
        }
        if self.n_trials < MIN_TRIALS {
            return Err(Error::TooFewTrials { got: self.n_trials });
        }
        if self.topk == 0 {
            return Err(Error::InvalidTopk);
        }
        if self.checkpoint.as_ref().is_some_and(|c| c.interval == 0) {
            return Err(Error::InvalidCheckpointInterval);
        }
        if self.early_stop.is_some_and(|e| e.window == 0) {
            return Err(Error::InvalidEarlyStopWindow);
        }
        if self.resume && self.checkpoint.is_none() {
            return Err(Error::Config(
                "resume requires checkpointing to be enabled".to_owned(),
            ));
        }
        if let Some(warm) = &self.warm_start {
            if warm.points.len() != warm.scores.len() {
                return Err(Error::WarmStartMismatch {
                    points: warm.points.len(),
                    scores: warm.scores.len(),
                });
            }
            if let Some(&score) = warm.scores.iter().find(|s| !s.is_finite()) {
                return Err(Error::NonFiniteScore {
                    metric: "warm start".to_owned(),
                    value: score,
                });
            }
        }
        self.minimizer.validate()
    }

    /// Evaluations per chunk.
    ///
    /// The smaller of the checkpoint interval and the early-stop window
    /// when either is enabled, otherwise the whole budget.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        let interval = self.checkpoint.as_ref().map(|c| c.interval);
        let window = self.early_stop.map(|e| e.window);
        match (interval, window) {
            (Some(i), Some(w)) => i.min(w),
            (Some(i), None) => i,
            (None, Some(w)) => w,
            (None, None) => self.n_calls,
        }
    }

    /// Options forwarded to training.
    #[must_use]
    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            topk: self.topk,
            topic_word_matrix: self.topic_word_matrix,
            topic_document_matrix: self.topic_document_matrix,
        }
    }
}

/// Fluent builder for [`OptimizerConfig`].
///
/// `build` does not validate; the driver does before any work starts.
///
/// ```
/// use topic_optimizer::config::OptimizerConfig;
/// use topic_optimizer::minimizer::MinimizerKind;
///
/// let config = OptimizerConfig::builder()
///     .n_calls(20)
///     .n_trials(3)
///     .minimizer(MinimizerKind::forest())
///     .checkpoint_every(5)
///     .minimize()
///     .build();
/// assert!(config.validate().is_ok());
/// assert_eq!(config.chunk_size(), 5);
/// ```
#[derive(Clone, Debug, Default)]
pub struct OptimizerConfigBuilder {
    config: OptimizerConfig,
}

impl OptimizerConfigBuilder {
    /// Evaluation budget per trial.
    #[must_use]
    pub fn n_calls(mut self, n: usize) -> Self {
        self.config.n_calls = n;
        self
    }

    /// Number of independent trials.
    #[must_use]
    pub fn n_trials(mut self, n: usize) -> Self {
        self.config.n_trials = n;
        self
    }

    /// Random starts per trial.
    #[must_use]
    pub fn n_random_starts(mut self, n: usize) -> Self {
        self.config.n_random_starts = n;
        self
    }

    /// Minimizer strategy.
    #[must_use]
    pub fn minimizer(mut self, kind: MinimizerKind) -> Self {
        self.config.minimizer = kind;
        self
    }

    /// Minimize the primary metric.
    #[must_use]
    pub fn minimize(mut self) -> Self {
        self.config.direction = Direction::Minimize;
        self
    }

    /// Maximize the primary metric (the default).
    #[must_use]
    pub fn maximize(mut self) -> Self {
        self.config.direction = Direction::Maximize;
        self
    }

    /// Set the direction explicitly.
    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.config.direction = direction;
        self
    }

    /// Base seed.
    #[must_use]
    pub fn random_state(mut self, seed: u64) -> Self {
        self.config.random_state = Some(seed);
        self
    }

    /// Top words requested from training.
    #[must_use]
    pub fn topk(mut self, topk: usize) -> Self {
        self.config.topk = topk;
        self
    }

    /// Matrices requested from training.
    #[must_use]
    pub fn matrices(mut self, topic_word: bool, topic_document: bool) -> Self {
        self.config.topic_word_matrix = topic_word;
        self.config.topic_document_matrix = topic_document;
        self
    }

    /// Enable checkpointing with full settings.
    #[must_use]
    pub fn checkpoint(mut self, checkpoint: CheckpointConfig) -> Self {
        self.config.checkpoint = Some(checkpoint);
        self
    }

    /// Enable checkpointing every `interval` evaluations with default naming.
    #[must_use]
    pub fn checkpoint_every(self, interval: usize) -> Self {
        self.checkpoint(CheckpointConfig {
            interval,
            ..CheckpointConfig::default()
        })
    }

    /// Enable early stopping with the given window.
    #[must_use]
    pub fn early_stop(mut self, window: usize) -> Self {
        self.config.early_stop = Some(EarlyStopConfig { window });
        self
    }

    /// Restore trials from checkpoints before running.
    #[must_use]
    pub fn resume(mut self, resume: bool) -> Self {
        self.config.resume = resume;
        self
    }

    /// Run the trials of one chunk in parallel.
    #[must_use]
    pub fn parallel_trials(mut self, parallel: bool) -> Self {
        self.config.parallel_trials = parallel;
        self
    }

    /// Prior observations for every trial.
    #[must_use]
    pub fn warm_start(mut self, points: Vec<HyperparameterVector>, scores: Vec<f64>) -> Self {
        self.config.warm_start = Some(WarmStart { points, scores });
        self
    }

    /// Export the final report as `<directory>/<name>.json`.
    #[must_use]
    pub fn report(mut self, directory: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        self.config.report = ReportConfig {
            enabled: true,
            name: name.into(),
            directory: directory.into(),
        };
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> OptimizerConfig {
        self.config
    }
}
