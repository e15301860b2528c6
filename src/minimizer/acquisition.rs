//! Acquisition functions for surrogate-guided search.
//!
//! All functions assume a minimization problem and return a score where
//! higher means "evaluate this point next".

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default exploration margin for EI and PI.
pub const DEFAULT_XI: f64 = 0.01;
/// Default exploration weight for LCB.
pub const DEFAULT_KAPPA: f64 = 1.96;

/// How a surrogate's prediction is turned into a score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum Acquisition {
    /// Expected improvement over the incumbent minus `xi`.
    Ei {
        /// Required improvement margin.
        xi: f64,
    },
    /// Probability of improving on the incumbent by at least `xi`.
    Pi {
        /// Required improvement margin.
        xi: f64,
    },
    /// Lower confidence bound `mean - kappa * std`, negated.
    Lcb {
        /// Exploration weight.
        kappa: f64,
    },
}

impl Default for Acquisition {
    fn default() -> Self {
        Self::Lcb {
            kappa: DEFAULT_KAPPA,
        }
    }
}

impl Acquisition {
    /// Expected improvement with the default margin.
    #[must_use]
    pub fn ei() -> Self {
        Self::Ei { xi: DEFAULT_XI }
    }

    /// Probability of improvement with the default margin.
    #[must_use]
    pub fn pi() -> Self {
        Self::Pi { xi: DEFAULT_XI }
    }

    pub(crate) fn validate(self) -> Result<()> {
        let (option, v) = match self {
            Self::Ei { xi } | Self::Pi { xi } => ("xi", xi),
            Self::Lcb { kappa } => ("kappa", kappa),
        };
        if v.is_finite() && v >= 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidMinimizerOption {
                option,
                reason: "must be finite and non-negative",
            })
        }
    }

    /// Score a prediction `(mean, std)` against the incumbent `f_best`.
    #[must_use]
    pub fn score(self, mean: f64, std: f64, f_best: f64) -> f64 {
        match self {
            Self::Ei { xi } => expected_improvement(mean, std, f_best - xi),
            Self::Pi { xi } => {
                if std < 1e-12 {
                    if mean < f_best - xi { 1.0 } else { 0.0 }
                } else {
                    norm_cdf((f_best - xi - mean) / std)
                }
            }
            Self::Lcb { kappa } => -(mean - kappa * std),
        }
    }
}

/// Standard normal PDF.
fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Hart rational approximation).
fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let poly = 0.319_381_530 * t - 0.356_563_782 * t2 + 1.781_477_937 * t3 - 1.821_255_978 * t4
        + 1.330_274_429 * t5;
    let cdf = 1.0 - norm_pdf(abs_x) * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}

/// `EI(x) = (f_best - mean) Φ(z) + std φ(z)` with `z = (f_best - mean) / std`.
fn expected_improvement(mean: f64, std: f64, f_best: f64) -> f64 {
    if std < 1e-12 {
        return (f_best - mean).max(0.0);
    }
    let z = (f_best - mean) / std;
    ((f_best - mean) * norm_cdf(z) + std * norm_pdf(z)).max(0.0)
}
