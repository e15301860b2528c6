//! Core types for the optimizer library.

use serde::{Deserialize, Serialize};

/// The direction of optimization.
///
/// All minimizer strategies minimize. When the direction is
/// [`Maximize`](Direction::Maximize), scores are negated on the way into a
/// minimizer and negated back when results are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Minimize the objective value.
    Minimize,
    /// Maximize the objective value.
    #[default]
    Maximize,
}

impl Direction {
    /// Convert a score in this direction into the value a minimizer sees.
    #[must_use]
    pub fn to_minimized(self, score: f64) -> f64 {
        match self {
            Self::Minimize => score,
            Self::Maximize => -score,
        }
    }

    /// Convert a minimizer value back into a score in this direction.
    #[must_use]
    pub fn from_minimized(self, value: f64) -> f64 {
        // Negation is its own inverse.
        self.to_minimized(value)
    }

    /// Returns `true` if `a` is strictly better than `b` in this direction.
    #[must_use]
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            Self::Minimize => a < b,
            Self::Maximize => a > b,
        }
    }
}

/// The state of a trial in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialState {
    /// The trial takes part in the next chunk.
    Running,
    /// The trial is frozen. This state is terminal.
    Stopped,
}

/// Why a trial stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The whole call budget was spent.
    BudgetExhausted,
    /// The early-stop rule fired after `n_evaluations` observations.
    EarlyStopped {
        /// Observations in the trial history when the rule fired.
        n_evaluations: usize,
    },
}
