//! Reference framework: evolutionary pipeline search.
//!
//! Budget is expressed to the engine in minutes (`max_time_mins`), scoring by
//! scikit-learn style identifiers. Benchmark `rmse` is optimised as mean
//! squared error; the benchmark computes the root itself from predictions.

pub mod models;
pub mod scoring;
pub mod search;

use serde_json::Value;

use crate::adapter::{EngineParams, EstimatorVariant, Framework, MetricMapper};
use crate::{BenchError, BenchResult};

pub use models::{FittedPipeline, Learner, PipelineSpec, Preprocessor};
pub use search::{PipelineSearch, SearchSettings};

pub const NAME: &str = "pipeline_search";

const METRICS: &[(&str, &str)] = &[
    ("acc", scoring::ACCURACY),
    ("auc", scoring::ROC_AUC),
    ("f1", scoring::F1),
    ("logloss", scoring::NEG_LOG_LOSS),
    ("mae", scoring::NEG_MAE),
    ("mse", scoring::NEG_MSE),
    ("msle", scoring::NEG_MSLE),
    ("r2", scoring::R2),
    ("rmse", scoring::NEG_MSE),
];

const HYPERPARAMETERS: &[&str] = &["generations", "population_size", "cv", "mutation_rate", "verbosity"];

pub struct PipelineSearchFramework {
    metrics: MetricMapper,
}

impl Default for PipelineSearchFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineSearchFramework {
    pub fn new() -> Self {
        PipelineSearchFramework {
            metrics: MetricMapper::new(NAME, METRICS),
        }
    }

    /// Engine settings from normalized parameters.
    pub fn settings(params: &EngineParams) -> BenchResult<SearchSettings> {
        let h = &params.hyperparameters;
        let settings = SearchSettings {
            generations: usize_param(h, "generations", 10)?,
            population_size: usize_param(h, "population_size", 20)?,
            cv: usize_param(h, "cv", 5)?,
            mutation_rate: f64_param(h, "mutation_rate", 0.9)?,
            max_time_mins: params.max_runtime_seconds as f64 / 60.0,
            scoring: params.scoring,
            random_state: params.seed,
            n_jobs: params.n_jobs,
            verbosity: usize_param(h, "verbosity", 0)?.min(u8::MAX as usize) as u8,
        };
        if settings.generations == 0 || settings.population_size == 0 {
            return Err(BenchError::InvalidConfiguration(
                "generations and population_size must be positive".into(),
            ));
        }
        if settings.cv < 2 {
            return Err(BenchError::InvalidConfiguration("cv must be at least 2".into()));
        }
        if !(0.0..=1.0).contains(&settings.mutation_rate) {
            return Err(BenchError::InvalidConfiguration(
                "mutation_rate must be within [0, 1]".into(),
            ));
        }
        Ok(settings)
    }
}

impl Framework for PipelineSearchFramework {
    type Model = FittedPipeline;
    type Engine = PipelineSearch;

    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> Option<String> {
        Some(env!("CARGO_PKG_VERSION").to_string())
    }

    fn metrics(&self) -> &MetricMapper {
        &self.metrics
    }

    fn hyperparameters(&self) -> &[&'static str] {
        HYPERPARAMETERS
    }

    fn build(&self, variant: EstimatorVariant, params: EngineParams) -> BenchResult<PipelineSearch> {
        if !variant.is_classification() && scoring::needs_probabilities(params.scoring) {
            return Err(BenchError::InvalidConfiguration(format!(
                "{} needs class probabilities and cannot score a regression search",
                params.scoring
            )));
        }
        let settings = Self::settings(&params)?;
        Ok(PipelineSearch::new(variant, params.n_classes, settings))
    }
}

fn usize_param(h: &std::collections::BTreeMap<String, Value>, key: &str, default: usize) -> BenchResult<usize> {
    match h.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| BenchError::InvalidConfiguration(format!("{key} must be a non-negative integer, got {v}"))),
    }
}

fn f64_param(h: &std::collections::BTreeMap<String, Value>, key: &str, default: f64) -> BenchResult<f64> {
    match h.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| BenchError::InvalidConfiguration(format!("{key} must be a number, got {v}"))),
    }
}
