//! Mock framework for testing.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize, Serializer};

use crate::adapter::{Candidate, EngineParams, Estimator, EstimatorVariant, Framework, MetricMapper, SearchEngine};
use crate::{BenchError, BenchResult};

const MOCK_METRICS: &[(&str, &str)] = &[
    ("acc", "accuracy"),
    ("auc", "roc_auc"),
    ("logloss", "neg_log_loss"),
    ("rmse", "neg_mean_squared_error"),
];

/// Shared record of the engine calls made during a run.
pub type CallLog = Rc<RefCell<Vec<&'static str>>>;

/// Parameters handed to every `build` call, in order.
type ParamsLog = Rc<RefCell<Vec<EngineParams>>>;

/// Configuration for mock framework responses.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Name to report
    pub name: String,
    /// Version to report
    pub version: Option<String>,
    /// Constant prediction for every row
    pub prediction: f64,
    /// Number of classes reported by `predict_proba`
    pub n_classes: usize,
    /// Models count reported after search
    pub models_count: usize,
    /// Whether the fitted model has probability output
    pub probability_supported: bool,
    /// Whether the search should fail
    pub fit_fails: bool,
    /// Whether serializing the fitted model should fail
    pub save_fails: bool,
    /// Whether candidate introspection should fail
    pub candidates_fail: bool,
}

impl MockConfig {
    /// Create a new mock config with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        MockConfig {
            name: name.into(),
            version: Some("mock-1.0.0".to_string()),
            prediction: 1.0,
            n_classes: 2,
            models_count: 3,
            probability_supported: true,
            fit_fails: false,
            save_fails: false,
            candidates_fail: false,
        }
    }

    /// Set the constant prediction.
    pub fn with_prediction(mut self, prediction: f64) -> Self {
        self.prediction = prediction;
        self
    }

    /// Set the models count.
    pub fn with_models_count(mut self, count: usize) -> Self {
        self.models_count = count;
        self
    }

    /// Fitted model refuses `predict_proba`.
    pub fn without_probabilities(mut self) -> Self {
        self.probability_supported = false;
        self
    }

    /// Make the search fail.
    pub fn fit_fails(mut self) -> Self {
        self.fit_fails = true;
        self
    }

    /// Make model persistence fail.
    pub fn save_fails(mut self) -> Self {
        self.save_fails = true;
        self
    }

    /// Make candidate introspection fail.
    pub fn candidates_fail(mut self) -> Self {
        self.candidates_fail = true;
        self
    }
}

/// Mock framework for unit testing.
///
/// Returns configurable fake results without searching, and logs each engine
/// call so tests can check which lifecycle steps touched the engine.
pub struct MockFramework {
    config: MockConfig,
    metrics: MetricMapper,
    calls: CallLog,
    built_with: ParamsLog,
}

impl MockFramework {
    /// Create a new mock framework with the given configuration.
    pub fn new(config: MockConfig) -> Self {
        MockFramework {
            config,
            metrics: MetricMapper::new("mock", MOCK_METRICS),
            calls: CallLog::default(),
            built_with: ParamsLog::default(),
        }
    }

    /// Create a mock framework with default configuration.
    pub fn default_mock() -> Self {
        Self::new(MockConfig::new("mock"))
    }

    /// Engine calls made so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    /// Engine parameters received by each `build` call.
    pub fn built_with(&self) -> Vec<EngineParams> {
        self.built_with.borrow().clone()
    }
}

impl Framework for MockFramework {
    type Model = MockModel;
    type Engine = MockEngine;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn version(&self) -> Option<String> {
        self.config.version.clone()
    }

    fn metrics(&self) -> &MetricMapper {
        &self.metrics
    }

    fn hyperparameters(&self) -> &[&'static str] {
        &["mock_param"]
    }

    fn build(&self, variant: EstimatorVariant, params: EngineParams) -> BenchResult<MockEngine> {
        self.calls.borrow_mut().push("build");
        self.built_with.borrow_mut().push(params);
        Ok(MockEngine {
            config: self.config.clone(),
            variant,
            model: None,
            calls: Rc::clone(&self.calls),
        })
    }
}

pub struct MockEngine {
    config: MockConfig,
    variant: EstimatorVariant,
    model: Option<MockModel>,
    calls: CallLog,
}

impl SearchEngine for MockEngine {
    type Model = MockModel;

    fn fit(&mut self, _x: &[Vec<f64>], _y: &[f64]) -> BenchResult<()> {
        self.calls.borrow_mut().push("fit");
        if self.config.fit_fails {
            return Err(BenchError::Engine("mock search failed".into()));
        }
        self.model = Some(MockModel {
            prediction: self.config.prediction,
            n_classes: if self.variant.is_classification() { self.config.n_classes } else { 0 },
            probability_supported: self.config.probability_supported,
            save_fails: self.config.save_fails,
        });
        Ok(())
    }

    fn fitted(&self) -> BenchResult<&MockModel> {
        self.model
            .as_ref()
            .ok_or_else(|| BenchError::Engine("mock engine not fitted".into()))
    }

    fn models_count(&self) -> usize {
        self.config.models_count
    }

    fn candidates(&self) -> BenchResult<Vec<Candidate>> {
        self.calls.borrow_mut().push("candidates");
        if self.config.candidates_fail {
            return Err(BenchError::Engine("mock candidates unavailable".into()));
        }
        Ok((0..self.config.models_count)
            .map(|i| Candidate {
                fitness: format!("(1, {:.1})", 1.0 - i as f64 / 10.0),
                model: format!("MockModel{i}(input_matrix)"),
                pipeline: format!("MockModel{i}"),
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "MockModelRepr")]
pub struct MockModel {
    prediction: f64,
    n_classes: usize,
    probability_supported: bool,
    save_fails: bool,
}

#[derive(Serialize, Deserialize)]
struct MockModelRepr {
    prediction: f64,
    n_classes: usize,
    probability_supported: bool,
}

impl From<MockModelRepr> for MockModel {
    fn from(r: MockModelRepr) -> Self {
        MockModel {
            prediction: r.prediction,
            n_classes: r.n_classes,
            probability_supported: r.probability_supported,
            save_fails: false,
        }
    }
}

impl Serialize for MockModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.save_fails {
            return Err(serde::ser::Error::custom("mock model cannot be serialized"));
        }
        MockModelRepr {
            prediction: self.prediction,
            n_classes: self.n_classes,
            probability_supported: self.probability_supported,
        }
        .serialize(serializer)
    }
}

impl Estimator for MockModel {
    fn predict(&self, x: &[Vec<f64>]) -> BenchResult<Vec<f64>> {
        Ok(vec![self.prediction; x.len()])
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> BenchResult<Vec<Vec<f64>>> {
        if !self.probability_supported {
            return Err(BenchError::ProbabilityUnsupported(
                "mock model has no predict_proba".into(),
            ));
        }
        let k = self.n_classes.max(1);
        Ok(vec![vec![1.0 / k as f64; k]; x.len()])
    }
}
