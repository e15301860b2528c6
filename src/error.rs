//! Error types for the optimizer crate.
//!
//! All fallible operations in the crate return [`Result<T>`], an alias for
//! `core::result::Result<T, Error>`. Variants fall into four groups:
//! configuration errors, collaborator failures (training or scoring),
//! checkpoint I/O failures and report export failures. A failure inside a
//! running trial is wrapped in [`Error::Trial`] so the message names the
//! trial and chunk that broke.

/// Errors returned by optimizer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The per-trial call budget is zero.
    #[error("invalid call budget: n_calls must be greater than 0")]
    InvalidCallBudget,

    /// Fewer than three independent trials were requested.
    #[error("too few trials: {got} requested, at least 3 are required")]
    TooFewTrials {
        /// The number of trials that was configured.
        got: usize,
    },

    /// The checkpoint interval is zero.
    #[error("invalid checkpoint interval: interval must be greater than 0")]
    InvalidCheckpointInterval,

    /// The early-stop window is zero.
    #[error("invalid early-stop window: window must be greater than 0")]
    InvalidEarlyStopWindow,

    /// `topk` is zero.
    #[error("invalid topk: topk must be greater than 0")]
    InvalidTopk,

    /// A minimizer option is out of range.
    #[error("invalid minimizer option '{option}': {reason}")]
    InvalidMinimizerOption {
        /// The option name.
        option: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// The lower bound of a dimension is greater than its upper bound.
    #[error("invalid bounds for '{name}': low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The dimension name.
        name: String,
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Log scale is used with non-positive bounds.
    #[error("invalid log bounds for '{name}': low must be positive for log scale")]
    InvalidLogBounds {
        /// The dimension name.
        name: String,
    },

    /// A categorical dimension has no choices.
    #[error("categorical dimension '{name}' has no choices")]
    EmptyChoices {
        /// The dimension name.
        name: String,
    },

    /// The search space declares no dimensions.
    #[error("search space has no dimensions")]
    EmptySearchSpace,

    /// A point carries a different number of values than the search space
    /// has dimensions.
    #[error("dimension mismatch: expected {expected} values, got {got}")]
    DimensionMismatch {
        /// The number of declared dimensions.
        expected: usize,
        /// The number of values in the point.
        got: usize,
    },

    /// A value does not belong to its dimension (wrong kind or out of range).
    #[error("value {value} is outside the domain of dimension '{name}'")]
    ValueOutOfDomain {
        /// The dimension name.
        name: String,
        /// The offending value, formatted.
        value: String,
    },

    /// Warm-start points and scores have different lengths.
    #[error("warm start mismatch: {points} points but {scores} scores")]
    WarmStartMismatch {
        /// Number of points.
        points: usize,
        /// Number of scores.
        scores: usize,
    },

    /// Topics carry fewer words than `topk`.
    #[error("words in topics are less than topk: topk is {topk}, topics have {available} words")]
    TooFewWords {
        /// Requested number of top words.
        topk: usize,
        /// Words available per topic.
        available: usize,
    },

    /// A configuration document could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The training collaborator failed.
    #[error("model training failed: {0}")]
    Training(String),

    /// A metric collaborator failed.
    #[error("metric '{metric}' failed: {reason}")]
    Metric {
        /// The metric name.
        metric: String,
        /// The failure description.
        reason: String,
    },

    /// The primary metric produced NaN or an infinite value.
    #[error("metric '{metric}' returned a non-finite score ({value})")]
    NonFiniteScore {
        /// The metric name.
        metric: String,
        /// The offending score.
        value: f64,
    },

    /// No checkpoint exists under the given key.
    #[error("checkpoint '{key}' not found")]
    CheckpointNotFound {
        /// The storage key.
        key: String,
    },

    /// The checkpoint contents could not be decoded or are inconsistent.
    #[error("checkpoint '{key}' is corrupt: {reason}")]
    CheckpointCorrupt {
        /// The storage key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The checkpoint was written with an unsupported schema version.
    #[error("checkpoint '{key}' has schema version {found}, expected {expected}")]
    CheckpointVersion {
        /// The storage key.
        key: String,
        /// The version found in the checkpoint.
        found: u32,
        /// The version this build reads.
        expected: u32,
    },

    /// Reading or writing a checkpoint failed.
    #[error("checkpoint '{key}' I/O error: {reason}")]
    CheckpointIo {
        /// The storage key.
        key: String,
        /// The underlying I/O error.
        reason: String,
    },

    /// The checkpoint was saved for a search space with another dimension count.
    #[error("checkpoint '{key}' has {got} dimensions, search space has {expected}")]
    CheckpointDimensionMismatch {
        /// The storage key.
        key: String,
        /// Dimensions of the current search space.
        expected: usize,
        /// Dimensions recorded in the checkpoint.
        got: usize,
    },

    /// Exporting or reading a report failed.
    #[error("report error: {0}")]
    Report(String),

    /// A trial failed while running a chunk.
    #[error("trial {trial} failed in chunk {chunk}: {source}")]
    Trial {
        /// The trial index.
        trial: usize,
        /// The zero-based chunk index within the trial.
        chunk: usize,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// A trial finished without a single recorded evaluation.
    #[error("no evaluations recorded")]
    NoEvaluations,

    /// An internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl Error {
    /// Returns `true` for configuration errors.
    ///
    /// Looks through [`Error::Trial`] so a dimension mismatch or a `topk`
    /// problem raised mid-run is still reported as a configuration error.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Self::Trial { source, .. } => source.is_configuration_error(),
            Self::InvalidCallBudget
            | Self::TooFewTrials { .. }
            | Self::InvalidCheckpointInterval
            | Self::InvalidEarlyStopWindow
            | Self::InvalidTopk
            | Self::InvalidMinimizerOption { .. }
            | Self::InvalidBounds { .. }
            | Self::InvalidLogBounds { .. }
            | Self::EmptyChoices { .. }
            | Self::EmptySearchSpace
            | Self::DimensionMismatch { .. }
            | Self::ValueOutOfDomain { .. }
            | Self::WarmStartMismatch { .. }
            | Self::TooFewWords { .. }
            | Self::Config(_) => true,
            _ => false,
        }
    }

    /// Returns `true` for checkpoint I/O and integrity errors.
    #[must_use]
    pub fn is_checkpoint_error(&self) -> bool {
        match self {
            Self::Trial { source, .. } => source.is_checkpoint_error(),
            Self::CheckpointNotFound { .. }
            | Self::CheckpointCorrupt { .. }
            | Self::CheckpointVersion { .. }
            | Self::CheckpointIo { .. }
            | Self::CheckpointDimensionMismatch { .. } => true,
            _ => false,
        }
    }

    /// Wrap this error with the trial and chunk it happened in.
    pub(crate) fn in_trial(self, trial: usize, chunk: usize) -> Self {
        Self::Trial {
            trial,
            chunk,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
