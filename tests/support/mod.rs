//! Deterministic fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use topic_optimizer::prelude::*;

/// Words per topic produced by the fake models.
pub const WORDS_PER_TOPIC: usize = 10;

fn topics(n_topics: usize, n_words: usize) -> Vec<Vec<String>> {
    (0..n_topics)
        .map(|t| (0..n_words).map(|w| format!("topic{t}_word{w}")).collect())
        .collect()
}

/// A model whose "quality" is a closure of the hyperparameters. The value
/// travels to the metric through `topic_word_matrix[0][0]`.
pub struct FnModel<F> {
    f: F,
    calls: AtomicUsize,
}

impl<F> FnModel<F>
where
    F: Fn(&HyperparameterVector) -> f64 + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> TopicModel for FnModel<F>
where
    F: Fn(&HyperparameterVector) -> f64 + Send + Sync,
{
    type Dataset = ();
    type Error = String;

    fn train(
        &self,
        _dataset: &(),
        hyperparameters: &HyperparameterVector,
        options: &TrainOptions,
    ) -> Result<ModelOutput, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let value = (self.f)(hyperparameters);
        Ok(ModelOutput::new(topics(3, options.topk.max(WORDS_PER_TOPIC)))
            .with_topic_word_matrix(vec![vec![value]]))
    }
}

/// The quadratic bowl used by most tests: best at `x = 0.3`, `k = 6`.
pub fn bowl() -> FnModel<impl Fn(&HyperparameterVector) -> f64 + Send + Sync> {
    FnModel::new(|hp: &HyperparameterVector| {
        let x = hp["x"].as_f64().unwrap_or(0.0);
        let k = hp["k"].as_i64().unwrap_or(0) as f64;
        let prior = if hp["prior"].as_str() == Some("asymmetric") {
            0.0
        } else {
            0.05
        };
        -((x - 0.3).powi(2) + ((k - 6.0) / 10.0).powi(2) + prior)
    })
}

/// A model replaying `script` cyclically, one score per training call.
pub struct ScriptedModel {
    script: Vec<f64>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(script: Vec<f64>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TopicModel for ScriptedModel {
    type Dataset = ();
    type Error = String;

    fn train(
        &self,
        _dataset: &(),
        _hyperparameters: &HyperparameterVector,
        options: &TrainOptions,
    ) -> Result<ModelOutput, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let value = self.script[n % self.script.len()];
        Ok(ModelOutput::new(topics(2, options.topk)).with_topic_word_matrix(vec![vec![value]]))
    }
}

/// A model that fails on training call `fail_at` (zero-based) and after.
pub struct FailingModel {
    fail_at: usize,
    calls: AtomicUsize,
}

impl FailingModel {
    pub fn new(fail_at: usize) -> Self {
        Self {
            fail_at,
            calls: AtomicUsize::new(0),
        }
    }
}

impl TopicModel for FailingModel {
    type Dataset = ();
    type Error = String;

    fn train(
        &self,
        _dataset: &(),
        _hyperparameters: &HyperparameterVector,
        options: &TrainOptions,
    ) -> Result<ModelOutput, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.fail_at {
            return Err(format!("training diverged on call {n}"));
        }
        Ok(ModelOutput::new(topics(2, options.topk)).with_topic_word_matrix(vec![vec![0.5]]))
    }
}

/// A model producing topics of `n_words` words regardless of `topk`.
pub struct ShortTopicsModel {
    pub n_words: usize,
}

impl TopicModel for ShortTopicsModel {
    type Dataset = ();
    type Error = String;

    fn train(
        &self,
        _dataset: &(),
        _hyperparameters: &HyperparameterVector,
        _options: &TrainOptions,
    ) -> Result<ModelOutput, String> {
        Ok(ModelOutput::new(topics(2, self.n_words)).with_topic_word_matrix(vec![vec![0.5]]))
    }
}

/// Reads the model's value out of `topic_word_matrix[0][0]`.
pub fn matrix_score(name: &str) -> impl Metric + 'static {
    metric_fn(name, |output: &ModelOutput| {
        output
            .topic_word_matrix
            .as_ref()
            .and_then(|m| m.first())
            .and_then(|row| row.first())
            .copied()
            .ok_or_else(|| Error::Metric {
                metric: "matrix".to_owned(),
                reason: "no topic-word matrix".to_owned(),
            })
    })
}

/// A metric that needs `topk` words per topic, like a coherence score.
pub fn words_metric(topk: usize) -> impl Metric + 'static {
    metric_fn("coherence", move |output: &ModelOutput| {
        output.check_topk(topk)?;
        Ok(output.topics.len() as f64)
    })
}

/// A space with one dimension of each kind.
pub fn mixed_space() -> SearchSpace {
    SearchSpace::new()
        .with("x", Dimension::real(0.0, 1.0))
        .with("k", Dimension::integer(2, 10))
        .with("prior", Dimension::categorical(["symmetric", "asymmetric"]))
}

/// A fresh, empty directory under the system temp dir.
pub fn temp_dir(label: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let mut path = std::env::temp_dir();
    path.push(format!(
        "topic_optimizer_{label}_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::remove_dir_all(&path).ok();
    std::fs::create_dir_all(&path).unwrap();
    path
}
