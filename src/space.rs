//! Search space descriptor.
//!
//! A [`SearchSpace`] maps parameter names to [`Dimension`]s. Names are kept
//! in sorted order, and that order is the positional contract everywhere a
//! point travels as a plain `[ParamValue]` slice: minimizers, checkpoints and
//! the objective adapter all agree on it.
//!
//! ```
//! use topic_optimizer::space::{Dimension, SearchSpace};
//!
//! let space = SearchSpace::new()
//!     .with("num_topics", Dimension::integer(5, 50))
//!     .with("alpha", Dimension::log_real(1e-3, 1.0))
//!     .with("decay", Dimension::categorical(["0.5", "0.7", "0.9"]));
//!
//! assert_eq!(space.names(), vec!["alpha", "decay", "num_topics"]);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::rng_util;

/// A concrete hyperparameter assignment, keyed by parameter name.
///
/// Iteration order is the sorted name order of the search space.
pub type HyperparameterVector = BTreeMap<String, ParamValue>;

/// One typed, bounded hyperparameter dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Dimension {
    /// A continuous range `[low, high]`.
    Real {
        /// Lower bound (inclusive).
        low: f64,
        /// Upper bound (inclusive).
        high: f64,
        /// Sample uniformly in log space.
        #[serde(default)]
        log_scale: bool,
    },
    /// An integer range `[low, high]`.
    Integer {
        /// Lower bound (inclusive).
        low: i64,
        /// Upper bound (inclusive).
        high: i64,
        /// Sample uniformly in log space.
        #[serde(default)]
        log_scale: bool,
    },
    /// A finite set of labelled choices.
    Categorical {
        /// The choice labels.
        choices: Vec<String>,
    },
}

impl Dimension {
    /// A continuous range sampled uniformly.
    #[must_use]
    pub fn real(low: f64, high: f64) -> Self {
        Self::Real {
            low,
            high,
            log_scale: false,
        }
    }

    /// A continuous range sampled uniformly in log space.
    #[must_use]
    pub fn log_real(low: f64, high: f64) -> Self {
        Self::Real {
            low,
            high,
            log_scale: true,
        }
    }

    /// An integer range sampled uniformly.
    #[must_use]
    pub fn integer(low: i64, high: i64) -> Self {
        Self::Integer {
            low,
            high,
            log_scale: false,
        }
    }

    /// A categorical set of labels.
    #[must_use]
    pub fn categorical<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Categorical {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// Check that the bounds or choices of this dimension are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`], [`Error::InvalidLogBounds`] or
    /// [`Error::EmptyChoices`] naming the dimension.
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self, name: &str) -> Result<()> {
        match self {
            Self::Real {
                low,
                high,
                log_scale,
            } => {
                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(Error::InvalidBounds {
                        name: name.to_owned(),
                        low: *low,
                        high: *high,
                    });
                }
                if *log_scale && *low <= 0.0 {
                    return Err(Error::InvalidLogBounds {
                        name: name.to_owned(),
                    });
                }
            }
            Self::Integer {
                low,
                high,
                log_scale,
            } => {
                if low > high {
                    return Err(Error::InvalidBounds {
                        name: name.to_owned(),
                        low: *low as f64,
                        high: *high as f64,
                    });
                }
                if *log_scale && *low < 1 {
                    return Err(Error::InvalidLogBounds {
                        name: name.to_owned(),
                    });
                }
            }
            Self::Categorical { choices } => {
                if choices.is_empty() {
                    return Err(Error::EmptyChoices {
                        name: name.to_owned(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if `value` has the right kind and lies inside this dimension.
    #[must_use]
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Self::Real { low, high, .. }, ParamValue::Float(v)) => {
                v.is_finite() && *low <= *v && *v <= *high
            }
            (Self::Integer { low, high, .. }, ParamValue::Int(v)) => *low <= *v && *v <= *high,
            (Self::Categorical { choices }, ParamValue::Categorical(s)) => choices.contains(s),
            _ => false,
        }
    }

    /// Draw one value uniformly (in log space where requested).
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub(crate) fn sample(&self, rng: &mut fastrand::Rng) -> ParamValue {
        match self {
            Self::Real {
                low,
                high,
                log_scale,
            } => {
                let v = if *log_scale {
                    rng_util::f64_range(rng, low.ln(), high.ln()).exp()
                } else {
                    rng_util::f64_range(rng, *low, *high)
                };
                ParamValue::Float(v.clamp(*low, *high))
            }
            Self::Integer {
                low,
                high,
                log_scale,
            } => {
                let v = if *log_scale {
                    let log_low = (*low as f64).ln();
                    let log_high = (*high as f64 + 1.0).ln();
                    (rng_util::f64_range(rng, log_low, log_high).exp().floor() as i64)
                        .clamp(*low, *high)
                } else {
                    rng.i64(*low..=*high)
                };
                ParamValue::Int(v)
            }
            Self::Categorical { choices } => {
                ParamValue::Categorical(choices[rng.usize(0..choices.len())].clone())
            }
        }
    }

    /// Map a value into `[0, 1]` for surrogate models.
    ///
    /// Categorical values map to `index / (n - 1)`. Values that do not belong
    /// to the dimension map to `None`.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn to_unit(&self, value: &ParamValue) -> Option<f64> {
        let scale = |v: f64, low: f64, high: f64| {
            if high > low {
                ((v - low) / (high - low)).clamp(0.0, 1.0)
            } else {
                0.5
            }
        };
        match (self, value) {
            (
                Self::Real {
                    low,
                    high,
                    log_scale,
                },
                ParamValue::Float(v),
            ) => Some(if *log_scale {
                scale(v.ln(), low.ln(), high.ln())
            } else {
                scale(*v, *low, *high)
            }),
            (
                Self::Integer {
                    low,
                    high,
                    log_scale,
                },
                ParamValue::Int(v),
            ) => {
                let (v, low, high) = (*v as f64, *low as f64, *high as f64);
                Some(if *log_scale {
                    scale(v.ln(), low.ln(), high.ln())
                } else {
                    scale(v, low, high)
                })
            }
            (Self::Categorical { choices }, ParamValue::Categorical(s)) => {
                let index = choices.iter().position(|c| c == s)?;
                Some(if choices.len() > 1 {
                    index as f64 / (choices.len() - 1) as f64
                } else {
                    0.0
                })
            }
            _ => None,
        }
    }
}

/// Declared hyperparameter dimensions, keyed and ordered by name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    dimensions: BTreeMap<String, Dimension>,
}

impl SearchSpace {
    /// Creates an empty search space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a dimension and returns the space.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, dimension: Dimension) -> Self {
        self.insert(name, dimension);
        self
    }

    /// Adds (or replaces) a dimension.
    pub fn insert(&mut self, name: impl Into<String>, dimension: Dimension) {
        self.dimensions.insert(name.into(), dimension);
    }

    /// The parameter names in canonical (sorted) order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.dimensions.keys().map(String::as_str).collect()
    }

    /// The dimensions in canonical order.
    #[must_use]
    pub fn dimensions(&self) -> Vec<&Dimension> {
        self.dimensions.values().collect()
    }

    /// Looks up a dimension by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.get(name)
    }

    /// Number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Returns `true` if no dimension is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Validates every dimension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySearchSpace`] for an empty space, or the first
    /// dimension error in name order.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptySearchSpace);
        }
        self.dimensions
            .iter()
            .try_for_each(|(name, dim)| dim.validate(name))
    }

    /// Checks a positional point against the declared dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when the value count differs from
    /// the dimension count and [`Error::ValueOutOfDomain`] when a value does
    /// not belong to its dimension.
    pub fn check_point(&self, point: &[ParamValue]) -> Result<()> {
        if point.len() != self.len() {
            return Err(Error::DimensionMismatch {
                expected: self.len(),
                got: point.len(),
            });
        }
        for ((name, dim), value) in self.dimensions.iter().zip(point) {
            if !dim.contains(value) {
                return Err(Error::ValueOutOfDomain {
                    name: name.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Converts a positional point into a name-keyed vector.
    ///
    /// # Errors
    ///
    /// Fails like [`check_point`](Self::check_point).
    pub fn to_map(&self, point: &[ParamValue]) -> Result<HyperparameterVector> {
        self.check_point(point)?;
        Ok(self
            .dimensions
            .keys()
            .cloned()
            .zip(point.iter().cloned())
            .collect())
    }

    /// Converts a name-keyed vector into a positional point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when names are missing or extra,
    /// and [`Error::ValueOutOfDomain`] for values outside their dimension.
    pub fn to_point(&self, vector: &HyperparameterVector) -> Result<Vec<ParamValue>> {
        if vector.len() != self.len() || !self.dimensions.keys().all(|k| vector.contains_key(k)) {
            return Err(Error::DimensionMismatch {
                expected: self.len(),
                got: vector.len(),
            });
        }
        let point: Vec<ParamValue> = vector.values().cloned().collect();
        self.check_point(&point)?;
        Ok(point)
    }

    /// Draws one point uniformly from the space.
    pub(crate) fn sample(&self, rng: &mut fastrand::Rng) -> Vec<ParamValue> {
        self.dimensions.values().map(|d| d.sample(rng)).collect()
    }

    /// Encodes a point into the unit cube.
    ///
    /// # Errors
    ///
    /// Fails like [`check_point`](Self::check_point).
    pub(crate) fn encode(&self, point: &[ParamValue]) -> Result<Vec<f64>> {
        if point.len() != self.len() {
            return Err(Error::DimensionMismatch {
                expected: self.len(),
                got: point.len(),
            });
        }
        self.dimensions
            .iter()
            .zip(point)
            .map(|((name, dim), value)| {
                dim.to_unit(value).ok_or_else(|| Error::ValueOutOfDomain {
                    name: name.clone(),
                    value: value.to_string(),
                })
            })
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, Dimension)> for SearchSpace {
    fn from_iter<T: IntoIterator<Item = (S, Dimension)>>(iter: T) -> Self {
        Self {
            dimensions: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
