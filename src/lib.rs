#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Checkpointed, multi-trial Bayesian hyperparameter optimization for topic
//! models.
//!
//! A run trains a topic model for many hyperparameter settings, scores each
//! trained model with a metric, and lets a minimizer strategy pick the next
//! setting. Every run is repeated over at least three independent trials so
//! the spread of the best score can be reported. Trials advance in chunks;
//! between chunks they can be checkpointed to durable storage and frozen by
//! an early-stop rule, and an interrupted run can be resumed from its
//! checkpoints.
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Optimizer`] | Drive the chunked run over all trials and aggregate the result. |
//! | [`SearchSpace`](space::SearchSpace) | Named [`Dimension`](space::Dimension)s; sorted names fix the positional order of points. |
//! | [`TopicModel`](objective::TopicModel) | The training collaborator. |
//! | [`Metric`](objective::Metric) | A scoring collaborator. |
//! | [`MinimizerKind`](minimizer::MinimizerKind) | Random search, tree-ensemble surrogate or Gaussian-process surrogate. |
//! | [`CheckpointStore`](checkpoint::CheckpointStore) | Keyed durable storage of per-trial history. |
//! | [`BestEvaluation`](result::BestEvaluation) | The final report. |
//!
//! # Getting Started
//!
//! ```
//! use topic_optimizer::prelude::*;
//!
//! struct Lda;
//!
//! impl TopicModel for Lda {
//!     type Dataset = Vec<String>;
//!     type Error = String;
//!
//!     fn train(
//!         &self,
//!         _corpus: &Vec<String>,
//!         hyperparameters: &HyperparameterVector,
//!         options: &TrainOptions,
//!     ) -> Result<ModelOutput, String> {
//!         let k = hyperparameters["num_topics"].as_i64().ok_or("num_topics")?;
//!         let topics = (0..k)
//!             .map(|t| (0..options.topk).map(|w| format!("t{t}w{w}")).collect())
//!             .collect();
//!         Ok(ModelOutput::new(topics))
//!     }
//! }
//!
//! let coherence = metric_fn("coherence", |output: &ModelOutput| {
//!     output.check_topk(10)?;
//!     Ok(1.0 / output.topics.len() as f64)
//! });
//! let space = SearchSpace::new()
//!     .with("num_topics", Dimension::integer(2, 20))
//!     .with("alpha", Dimension::log_real(1e-3, 1.0));
//! let config = OptimizerConfig::builder()
//!     .n_calls(6)
//!     .n_trials(3)
//!     .n_random_starts(3)
//!     .minimizer(MinimizerKind::forest())
//!     .random_state(42)
//!     .build();
//!
//! let corpus = vec!["a document".to_owned()];
//! let best = Optimizer::new(&Lda, &corpus, space, coherence, config)
//!     .optimize()
//!     .unwrap();
//! assert_eq!(best.hyperparameter_names, ["alpha", "num_topics"]);
//! assert!(best.best_hyperparameters["num_topics"].as_i64().is_some());
//! ```
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) for run, chunk, checkpoint and early-stop milestones | on |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod checkpoint;
pub mod config;
mod driver;
pub mod early_stop;
mod error;
pub mod minimizer;
pub mod objective;
mod param;
pub mod result;
mod rng_util;
pub mod space;
pub mod trial;
mod types;

pub use driver::Optimizer;
pub use error::{Error, Result};
pub use param::ParamValue;
pub use types::{Direction, StopReason, TrialState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use topic_optimizer::prelude::*;
/// ```
pub mod prelude {
    pub use crate::checkpoint::{
        Checkpoint, CheckpointHandle, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
    };
    pub use crate::config::{
        CheckpointConfig, EarlyStopConfig, OptimizerConfig, ReportConfig, WarmStart,
    };
    pub use crate::driver::Optimizer;
    pub use crate::error::Error;
    pub use crate::minimizer::{
        Acquisition, ForestOptions, GpOptions, Kernel, MinimizerKind, TreeEstimator,
    };
    pub use crate::objective::{Metric, ModelOutput, TopicModel, TrainOptions, metric_fn};
    pub use crate::param::ParamValue;
    pub use crate::result::{BestEvaluation, TrialResult};
    pub use crate::space::{Dimension, HyperparameterVector, SearchSpace};
    pub use crate::types::{Direction, StopReason};
}
