//! Framework, search engine and estimator traits every adapter plugs into.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::BenchResult;
use crate::core::ProblemType;

use super::metric::MetricMapper;

/// Estimator family an engine is asked to build.
///
/// Chosen from the problem type, never by inspecting the engine at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorVariant {
    Classifier,
    Regressor,
}

impl EstimatorVariant {
    pub fn for_problem(problem: ProblemType) -> Self {
        if problem.is_classification() {
            EstimatorVariant::Classifier
        } else {
            EstimatorVariant::Regressor
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, EstimatorVariant::Classifier)
    }
}

/// Normalized construction parameters passed to `Framework::build`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    /// Parallelism after applying `_n_jobs`.
    pub n_jobs: usize,
    /// Soft budget in seconds; frameworks convert to their own unit.
    pub max_runtime_seconds: u64,
    /// Engine scoring identifier produced by the metric mapper.
    pub scoring: &'static str,
    pub seed: u64,
    /// Number of classes for classifiers, from the training targets.
    pub n_classes: Option<usize>,
    /// Unprefixed framework parameters, already validated.
    pub hyperparameters: BTreeMap<String, serde_json::Value>,
}

/// One ranked pipeline evaluated during search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub fitness: String,
    pub model: String,
    pub pipeline: String,
}

/// A fitted model able to produce predictions.
pub trait Estimator {
    /// Point predictions, one per row of `x`.
    fn predict(&self, x: &[Vec<f64>]) -> BenchResult<Vec<f64>>;

    /// Class probabilities, one row per sample of `x`.
    ///
    /// Models without probability output return
    /// `BenchError::ProbabilityUnsupported`.
    fn predict_proba(&self, x: &[Vec<f64>]) -> BenchResult<Vec<Vec<f64>>>;
}

/// A configured AutoML search, consumed by one training run.
pub trait SearchEngine {
    type Model: Estimator;

    /// Run the search procedure on the training data.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> BenchResult<()>;

    /// The best model found by `fit`.
    fn fitted(&self) -> BenchResult<&Self::Model>;

    /// Number of candidate models evaluated during search.
    fn models_count(&self) -> usize;

    /// Ranked candidates for artifact export. Introspects engine internals,
    /// so it may fail even after a successful fit.
    fn candidates(&self) -> BenchResult<Vec<Candidate>>;
}

/// Engine-specific side of the adapter contract.
pub trait Framework {
    /// Persisted form of a fitted model.
    type Model: Estimator + Serialize + DeserializeOwned;
    type Engine: SearchEngine<Model = Self::Model>;

    /// Returns the framework name (e.g., "pipeline_search", "mock").
    fn name(&self) -> &str;

    fn version(&self) -> Option<String>;

    /// Benchmark metric to engine scoring identifier table.
    fn metrics(&self) -> &MetricMapper;

    /// Hyperparameter names accepted in `framework_params`.
    fn hyperparameters(&self) -> &[&'static str];

    /// Construct an unfitted search for the given variant.
    fn build(&self, variant: EstimatorVariant, params: EngineParams) -> BenchResult<Self::Engine>;
}
