//! Objective adapter: turns model training plus scoring into one function.
//!
//! The two external collaborators are a [`TopicModel`], which trains on a
//! dataset for a given [`HyperparameterVector`], and one or more [`Metric`]s,
//! which score the resulting [`ModelOutput`]. [`ObjectiveAdapter::evaluate`]
//! wires them together for one point. It trains, scores with the primary
//! metric and every extra metric, appends an [`IterationRecord`] to the
//! run's [`IterationLog`], and returns the value a minimizer should see.
//!
//! ```
//! use topic_optimizer::objective::{metric_fn, IterationLog, ModelOutput, ObjectiveAdapter, TopicModel, TrainOptions};
//! use topic_optimizer::space::{Dimension, HyperparameterVector, SearchSpace};
//! use topic_optimizer::{Direction, ParamValue};
//!
//! struct Echo;
//!
//! impl TopicModel for Echo {
//!     type Dataset = ();
//!     type Error = String;
//!
//!     fn train(&self, _: &(), hp: &HyperparameterVector, _: &TrainOptions) -> Result<ModelOutput, String> {
//!         let x = hp["x"].as_f64().ok_or("x must be numeric")?;
//!         Ok(ModelOutput::new(vec![vec!["w".into()]]).with_topic_word_matrix(vec![vec![x]]))
//!     }
//! }
//!
//! let space = SearchSpace::new().with("x", Dimension::real(0.0, 1.0));
//! let metric = metric_fn("Echo", |out: &ModelOutput| Ok(out.topic_word_matrix.as_ref().map_or(0.0, |m| m[0][0])));
//! let log = IterationLog::new();
//! let adapter = ObjectiveAdapter::new(&Echo, &(), &space, &metric, Direction::Maximize, &log);
//!
//! let eval = adapter.evaluate(0, &[ParamValue::Float(0.25)]).unwrap();
//! assert_eq!(eval.score, 0.25);
//! assert_eq!(eval.value, -0.25);
//! assert_eq!(log.len(), 1);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::space::{HyperparameterVector, SearchSpace};
use crate::types::Direction;

/// What a trained topic model hands to the metrics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Topics as ordered lists of their top words.
    pub topics: Vec<Vec<String>>,
    /// Topic-word weights, when requested.
    pub topic_word_matrix: Option<Vec<Vec<f64>>>,
    /// Topic-document weights, when requested.
    pub topic_document_matrix: Option<Vec<Vec<f64>>>,
}

impl ModelOutput {
    /// Output carrying only topics.
    #[must_use]
    pub fn new(topics: Vec<Vec<String>>) -> Self {
        Self {
            topics,
            topic_word_matrix: None,
            topic_document_matrix: None,
        }
    }

    /// Attach a topic-word matrix.
    #[must_use]
    pub fn with_topic_word_matrix(mut self, matrix: Vec<Vec<f64>>) -> Self {
        self.topic_word_matrix = Some(matrix);
        self
    }

    /// Attach a topic-document matrix.
    #[must_use]
    pub fn with_topic_document_matrix(mut self, matrix: Vec<Vec<f64>>) -> Self {
        self.topic_document_matrix = Some(matrix);
        self
    }

    /// Check that topics carry at least `topk` words.
    ///
    /// Metrics call this before scoring so a `topk` larger than what the
    /// model produced surfaces as a configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooFewWords`] when the first topic (or any topic, if
    /// they differ in length) has fewer than `topk` words, or when there are
    /// no topics at all.
    pub fn check_topk(&self, topk: usize) -> Result<()> {
        let available = self.topics.iter().map(Vec::len).min().unwrap_or(0);
        if available < topk {
            return Err(Error::TooFewWords { topk, available });
        }
        Ok(())
    }
}

/// Flags and sizes forwarded to [`TopicModel::train`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainOptions {
    /// Number of top words to extract per topic.
    pub topk: usize,
    /// Ask for the topic-word matrix.
    pub topic_word_matrix: bool,
    /// Ask for the topic-document matrix.
    pub topic_document_matrix: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            topk: 10,
            topic_word_matrix: true,
            topic_document_matrix: true,
        }
    }
}

/// The model training collaborator.
///
/// Training may be arbitrarily slow. Failures are reported through
/// `Self::Error` and surface as [`Error::Training`].
pub trait TopicModel: Send + Sync {
    /// The corpus type this model trains on.
    type Dataset: ?Sized + Sync;
    /// The error type returned by training.
    type Error: ToString;

    /// Train on `dataset` with the given hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if training fails.
    fn train(
        &self,
        dataset: &Self::Dataset,
        hyperparameters: &HyperparameterVector,
        options: &TrainOptions,
    ) -> core::result::Result<ModelOutput, Self::Error>;
}

/// A scoring collaborator.
pub trait Metric: Send + Sync {
    /// Name used as the key in iteration records.
    fn name(&self) -> &str;

    /// Score a trained model.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::TooFewWords`] (see
    /// [`ModelOutput::check_topk`]) or [`Error::Metric`].
    fn score(&self, output: &ModelOutput) -> Result<f64>;
}

/// A [`Metric`] backed by a closure. Built with [`metric_fn`].
pub struct FnMetric<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a named [`Metric`].
pub fn metric_fn<F>(name: impl Into<String>, f: F) -> FnMetric<F>
where
    F: Fn(&ModelOutput) -> Result<f64> + Send + Sync,
{
    FnMetric {
        name: name.into(),
        f,
    }
}

impl<F> Metric for FnMetric<F>
where
    F: Fn(&ModelOutput) -> Result<f64> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, output: &ModelOutput) -> Result<f64> {
        (self.f)(output)
    }
}

/// A named metric value in an [`IterationRecord`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// Metric name, disambiguated within the record.
    pub name: String,
    /// The score as returned by the metric. Non-finite values are written
    /// as `null` and read back as NaN.
    #[serde(with = "nullable_f64")]
    pub value: f64,
}

/// One evaluation as seen by the objective adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Index of the trial that ran the evaluation.
    pub trial: usize,
    /// The evaluated hyperparameters.
    pub hyperparameters: HyperparameterVector,
    /// Primary metric first, then the extra metrics in configuration order.
    pub metrics: Vec<MetricValue>,
}

impl IterationRecord {
    /// Look up a metric value by name.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|m| m.name == name).map(|m| m.value)
    }
}

/// Append-only log of every evaluation of one driver run.
///
/// Cloning shares the log. Appends from concurrently running trials are
/// serialized by an internal lock, so no record is lost; the interleaving
/// order across trials is unspecified.
#[derive(Clone, Debug, Default)]
pub struct IterationLog {
    records: Arc<Mutex<Vec<IterationRecord>>>,
}

impl IterationLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, record: IterationRecord) {
        self.records.lock().push(record);
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// A copy of all records in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<IterationRecord> {
        self.records.lock().clone()
    }
}

/// Result of one objective evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// The value handed to the minimizer (negated when maximizing).
    pub value: f64,
    /// The primary metric score in the user's direction.
    pub score: f64,
    /// All metric values in record order.
    pub metrics: Vec<MetricValue>,
}

/// Something a trial can evaluate points against.
///
/// [`ObjectiveAdapter`] is the production implementation. The trait is the
/// seam where trials meet the collaborators, and it must be `Sync` so the
/// trials of one chunk can share it across threads.
pub trait Objective: Sync {
    /// Evaluate one positional point for trial `trial`.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the evaluation is then not recorded.
    fn evaluate(&self, trial: usize, point: &[ParamValue]) -> Result<Evaluation>;
}

/// Names for the primary metric followed by each extra metric.
///
/// A repeated name gets a counter suffix: `"Name"`, `"Name 2"`, `"Name 3"`.
#[must_use]
pub fn metric_names(primary: &dyn Metric, extras: &[Box<dyn Metric>]) -> Vec<String> {
    let mut names = vec![primary.name().to_owned()];
    for extra in extras {
        let base = extra.name();
        let mut name = base.to_owned();
        let mut counter = 2;
        while names.contains(&name) {
            name = format!("{base} {counter}");
            counter += 1;
        }
        names.push(name);
    }
    names
}

/// Binds the training and scoring collaborators to a search space.
pub struct ObjectiveAdapter<'a, M: TopicModel> {
    model: &'a M,
    dataset: &'a M::Dataset,
    space: &'a SearchSpace,
    metric: &'a dyn Metric,
    extra_metrics: &'a [Box<dyn Metric>],
    names: Vec<String>,
    options: TrainOptions,
    direction: Direction,
    log: &'a IterationLog,
}

impl<'a, M: TopicModel> ObjectiveAdapter<'a, M> {
    /// Creates an adapter with default [`TrainOptions`] and no extra metrics.
    #[must_use]
    pub fn new(
        model: &'a M,
        dataset: &'a M::Dataset,
        space: &'a SearchSpace,
        metric: &'a dyn Metric,
        direction: Direction,
        log: &'a IterationLog,
    ) -> Self {
        Self {
            model,
            dataset,
            space,
            metric,
            extra_metrics: &[],
            names: metric_names(metric, &[]),
            options: TrainOptions::default(),
            direction,
            log,
        }
    }

    /// Also score every evaluation with `extra_metrics`.
    #[must_use]
    pub fn extra_metrics(mut self, extra_metrics: &'a [Box<dyn Metric>]) -> Self {
        self.names = metric_names(self.metric, extra_metrics);
        self.extra_metrics = extra_metrics;
        self
    }

    /// Set the options forwarded to training.
    #[must_use]
    pub fn train_options(mut self, options: TrainOptions) -> Self {
        self.options = options;
        self
    }

    /// The disambiguated metric names, primary first.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Evaluate one positional point for trial `trial`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] or [`Error::ValueOutOfDomain`]
    /// for a point that does not fit the space, [`Error::Training`] when
    /// training fails, [`Error::NonFiniteScore`] when the primary metric
    /// yields NaN or infinity, and any error a metric returns. Nothing is
    /// logged on error.
    pub fn evaluate(&self, trial: usize, point: &[ParamValue]) -> Result<Evaluation> {
        let hyperparameters = self.space.to_map(point)?;
        let output = self
            .model
            .train(self.dataset, &hyperparameters, &self.options)
            .map_err(|e| Error::Training(e.to_string()))?;

        let score = self.metric.score(&output)?;
        if !score.is_finite() {
            return Err(Error::NonFiniteScore {
                metric: self.names[0].clone(),
                value: score,
            });
        }

        let mut metrics = Vec::with_capacity(self.names.len());
        metrics.push(MetricValue {
            name: self.names[0].clone(),
            value: score,
        });
        for (extra, name) in self.extra_metrics.iter().zip(&self.names[1..]) {
            metrics.push(MetricValue {
                name: name.clone(),
                value: extra.score(&output)?,
            });
        }

        self.log.push(IterationRecord {
            trial,
            hyperparameters,
            metrics: metrics.clone(),
        });

        Ok(Evaluation {
            value: self.direction.to_minimized(score),
            score,
            metrics,
        })
    }
}

impl<M: TopicModel> Objective for ObjectiveAdapter<'_, M> {
    fn evaluate(&self, trial: usize, point: &[ParamValue]) -> Result<Evaluation> {
        ObjectiveAdapter::evaluate(self, trial, point)
    }
}

/// Serde adapter writing non-finite floats as `null`.
pub(crate) mod nullable_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub(crate) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
