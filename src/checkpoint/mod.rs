//! Durable snapshots of trial histories.
//!
//! A [`Checkpoint`] holds what is needed to rebuild a trial's evaluation
//! history: the evaluated points and the values the minimizer saw, plus
//! the budget already spent. It does not hold surrogate model state. A
//! restored trial rebuilds its minimizer by telling it the history.
//!
//! Checkpoints are keyed by `<base_name>_<trial_index>` through a
//! [`CheckpointHandle`] and written by a [`CheckpointStore`]. The store is
//! strategy-agnostic and only round-trips the payload. Every payload
//! carries [`CHECKPOINT_VERSION`]. A checkpoint with another version is
//! rejected before its body is decoded.
//!
//! | Store | Backing |
//! |-------|---------|
//! | [`FileCheckpointStore`] | one JSON file per key, atomic rename, `fs2` file locks |
//! | [`MemoryCheckpointStore`] | in-process map, for tests and embedding |

mod file;
mod memory;

use serde::{Deserialize, Serialize};

pub use self::file::FileCheckpointStore;
pub use self::memory::MemoryCheckpointStore;
use crate::error::{Error, Result};
use crate::objective::MetricValue;
use crate::param::ParamValue;
use crate::space::SearchSpace;
use crate::types::StopReason;

/// Schema version written into every checkpoint.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Storage key of one trial's checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointHandle {
    /// The trial this checkpoint belongs to.
    pub trial_index: usize,
    /// `<base_name>_<trial_index>`.
    pub key: String,
}

impl CheckpointHandle {
    /// The handle for `trial_index` under `base_name`.
    ///
    /// ```
    /// use topic_optimizer::checkpoint::CheckpointHandle;
    ///
    /// assert_eq!(CheckpointHandle::new("partial_result", 3).key, "partial_result_3");
    /// ```
    #[must_use]
    pub fn new(base_name: &str, trial_index: usize) -> Self {
        Self {
            trial_index,
            key: format!("{base_name}_{trial_index}"),
        }
    }
}

/// Persisted state of one trial after a whole number of chunks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Schema version, [`CHECKPOINT_VERSION`] when written by this crate.
    pub version: u32,
    /// The trial this checkpoint belongs to.
    pub trial_index: usize,
    /// Name of the strategy that produced the history.
    pub minimizer: String,
    /// Sorted parameter names the points are positional against.
    pub param_names: Vec<String>,
    /// Evaluated points in evaluation order, warm-start points first.
    pub x_iters: Vec<Vec<ParamValue>>,
    /// Values as seen by the minimizer, aligned with `x_iters`.
    pub func_vals: Vec<f64>,
    /// Metric values per point; empty lists for warm-start points.
    #[serde(default)]
    pub metrics: Vec<Vec<MetricValue>>,
    /// Evaluations charged against the call budget.
    pub n_evaluations: usize,
    /// Chunks completed so far.
    pub chunks_completed: usize,
    /// Set once the trial is stopped.
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl Checkpoint {
    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CheckpointIo`] if serialization fails.
    pub fn to_json(&self, key: &str) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::CheckpointIo {
            key: key.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Decode from JSON, checking the schema version first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CheckpointVersion`] for another schema version and
    /// [`Error::CheckpointCorrupt`] when the payload cannot be decoded or
    /// is internally inconsistent.
    pub fn from_json(key: &str, json: &str) -> Result<Self> {
        let corrupt = |reason: String| Error::CheckpointCorrupt {
            key: key.to_owned(),
            reason,
        };
        let probe: VersionProbe = serde_json::from_str(json).map_err(|e| corrupt(e.to_string()))?;
        if probe.version != CHECKPOINT_VERSION {
            return Err(Error::CheckpointVersion {
                key: key.to_owned(),
                found: probe.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        let checkpoint: Self = serde_json::from_str(json).map_err(|e| corrupt(e.to_string()))?;
        checkpoint.check_consistency(key)?;
        Ok(checkpoint)
    }

    fn check_consistency(&self, key: &str) -> Result<()> {
        let corrupt = |reason: &str| {
            Err(Error::CheckpointCorrupt {
                key: key.to_owned(),
                reason: reason.to_owned(),
            })
        };
        if self.x_iters.len() != self.func_vals.len() {
            return corrupt("points and values differ in length");
        }
        if !self.metrics.is_empty() && self.metrics.len() != self.x_iters.len() {
            return corrupt("metrics and points differ in length");
        }
        if self.n_evaluations > self.x_iters.len() {
            return corrupt("more evaluations charged than points stored");
        }
        if self.func_vals.iter().any(|v| !v.is_finite()) {
            return corrupt("non-finite value");
        }
        Ok(())
    }

    /// Check this checkpoint against the handle it was loaded from and the
    /// current search space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CheckpointDimensionMismatch`] when the dimension
    /// count differs from the space, and [`Error::CheckpointCorrupt`] when
    /// the trial index or parameter names do not match or a point does not
    /// fit the space.
    pub fn validate(&self, handle: &CheckpointHandle, space: &SearchSpace) -> Result<()> {
        let key = &handle.key;
        if self.trial_index != handle.trial_index {
            return Err(Error::CheckpointCorrupt {
                key: key.clone(),
                reason: format!(
                    "saved for trial {}, loaded for trial {}",
                    self.trial_index, handle.trial_index
                ),
            });
        }
        if self.param_names.len() != space.len() {
            return Err(Error::CheckpointDimensionMismatch {
                key: key.clone(),
                expected: space.len(),
                got: self.param_names.len(),
            });
        }
        if self.param_names.iter().map(String::as_str).ne(space.names()) {
            return Err(Error::CheckpointCorrupt {
                key: key.clone(),
                reason: "parameter names differ from the search space".to_owned(),
            });
        }
        for point in &self.x_iters {
            match space.check_point(point) {
                Ok(()) => {}
                Err(Error::DimensionMismatch { expected, got }) => {
                    return Err(Error::CheckpointDimensionMismatch {
                        key: key.clone(),
                        expected,
                        got,
                    });
                }
                Err(e) => {
                    return Err(Error::CheckpointCorrupt {
                        key: key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Keyed durable storage for [`Checkpoint`]s.
///
/// Saving replaces any previous checkpoint under the same key and must be
/// atomic: a reader sees either the old or the new checkpoint, never a mix.
/// Writes to distinct keys may run concurrently.
pub trait CheckpointStore: Send + Sync {
    /// Persist `checkpoint` under `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CheckpointIo`] when the write fails.
    fn save(&self, handle: &CheckpointHandle, checkpoint: &Checkpoint) -> Result<()>;

    /// Load the checkpoint stored under `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CheckpointNotFound`] when nothing was saved under
    /// the key, and the errors of [`Checkpoint::from_json`].
    fn load(&self, handle: &CheckpointHandle) -> Result<Checkpoint>;

    /// Returns `true` if a checkpoint exists under `handle`.
    fn exists(&self, handle: &CheckpointHandle) -> bool;
}
