//! The adapter run protocol, shared by every framework.
//!
//! `run_adapter` validates the configuration, then either trains a new model
//! (search, persist, predict, export artifacts) or reloads a persisted one
//! and predicts. Failures that make the result meaningless propagate; model
//! saving, probability output and artifact export degrade the result instead.

use tracing::{debug, error, info, info_span};

use crate::core::{Dataset, EnvironmentInfo, Probabilities, RunResult, SCHEMA_VERSION, TaskConfig, TaskType, timed};
use crate::{BenchError, BenchResult};

use super::artifacts::ArtifactSaver;
use super::lifecycle::{Lifecycle, Stage};
use super::persistence::ModelStore;
use super::probability::resolve_probabilities;
use super::traits::{EngineParams, Estimator, EstimatorVariant, Framework, SearchEngine};

/// Options that are not part of the task configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Where trained models are persisted.
    pub store: ModelStore,
    /// Attach host information to the result.
    pub detect_env: bool,
}

/// Configuration checks performed before any engine or dataset access.
///
/// Returns the task type and the engine scoring identifier.
pub fn preflight<F: Framework>(framework: &F, config: &TaskConfig) -> BenchResult<(TaskType, &'static str)> {
    let task_type = config.task_type()?;
    let scoring = framework.metrics().map(&config.metric)?;
    config
        .framework_params
        .validate(framework.name(), framework.hyperparameters())?;
    if task_type == TaskType::Predict && config.model_path.is_none() {
        return Err(BenchError::InvalidConfiguration(
            "model_path is required when task_type = predict".into(),
        ));
    }
    Ok((task_type, scoring))
}

/// Run `framework` on `dataset` with default options.
pub fn run_adapter<F: Framework>(framework: &F, dataset: &Dataset, config: &TaskConfig) -> BenchResult<RunResult> {
    run_adapter_with(framework, dataset, config, &RunOptions::default())
}

pub fn run_adapter_with<F: Framework>(
    framework: &F,
    dataset: &Dataset,
    config: &TaskConfig,
    options: &RunOptions,
) -> BenchResult<RunResult> {
    info!(
        "**** {} [v{}] ****",
        framework.name(),
        framework.version().unwrap_or_else(|| "unknown".into())
    );

    let (task_type, scoring) = preflight(framework, config)?;
    let mut lifecycle = Lifecycle::new(task_type);
    let is_classification = config.is_classification();

    let outcome = match task_type {
        TaskType::Train => train(framework, dataset, config, scoring, options, &mut lifecycle)?,
        TaskType::Predict => predict_only(framework, dataset, config, &mut lifecycle)?,
    };
    debug_assert!(lifecycle.is_finished());

    Ok(RunResult {
        schema_version: SCHEMA_VERSION,
        framework: framework.name().to_string(),
        framework_version: framework.version(),
        task_type,
        metric: config.metric.clone(),
        timestamp: crate::now_string(),
        output_file: config.output_predictions_file.clone(),
        predictions: outcome.predictions,
        truth: dataset.test.y.clone(),
        probabilities: outcome.probabilities,
        target_is_encoded: is_classification,
        classes: dataset.classes.clone(),
        models_count: outcome.models_count,
        training_duration: outcome.training_duration,
        predict_duration: outcome.predict_duration,
        model_path: outcome.model_path,
        stages: lifecycle.visited(),
        env: options.detect_env.then(EnvironmentInfo::detect),
    })
}

struct Outcome {
    predictions: Vec<f64>,
    probabilities: Option<Probabilities>,
    models_count: usize,
    training_duration: f64,
    predict_duration: f64,
    model_path: Option<std::path::PathBuf>,
}

struct Predicted {
    predictions: Vec<f64>,
    probabilities: Option<Probabilities>,
    duration: f64,
}

fn train<F: Framework>(
    framework: &F,
    dataset: &Dataset,
    config: &TaskConfig,
    scoring: &'static str,
    options: &RunOptions,
    lifecycle: &mut Lifecycle,
) -> BenchResult<Outcome> {
    lifecycle.advance(Stage::Training)?;

    let variant = EstimatorVariant::for_problem(config.problem_type);
    let params = EngineParams {
        n_jobs: config.n_jobs(),
        max_runtime_seconds: config.max_runtime_seconds,
        scoring,
        seed: config.seed,
        n_classes: variant.is_classification().then(|| n_classes(dataset)),
        hyperparameters: config.framework_params.hyperparameters.clone(),
    };
    info!(
        "Running {} with a maximum time of {}s on {} cores, optimizing {}.",
        framework.name(),
        config.max_runtime_seconds,
        params.n_jobs,
        scoring
    );

    let mut engine = framework.build(variant, params)?;
    let training = {
        let _span = info_span!("fit", framework = framework.name()).entered();
        timed(|| engine.fit(&dataset.train.x, &dataset.train.y))
    };
    training.value?;
    let models_count = engine.models_count();
    info!(
        "Search finished in {:.3}s after evaluating {} models.",
        training.duration, models_count
    );

    lifecycle.advance(Stage::Persisting)?;
    let model = engine.fitted()?;
    let model_path = match options.store.save(model) {
        Ok(dir) => Some(dir),
        Err(e) => {
            error!(error = %e, "Error saving model");
            None
        }
    };

    lifecycle.advance(Stage::Predicting)?;
    let predicted = predict(model, dataset, config.is_classification())?;

    lifecycle.advance(Stage::Reporting)?;
    if let Err(e) = ArtifactSaver::new(config).save(&engine) {
        debug!(error = %e, "Error when saving artifacts.");
    }

    Ok(Outcome {
        predictions: predicted.predictions,
        probabilities: predicted.probabilities,
        models_count,
        training_duration: training.duration,
        predict_duration: predicted.duration,
        model_path,
    })
}

fn predict_only<F: Framework>(
    _framework: &F,
    dataset: &Dataset,
    config: &TaskConfig,
    lifecycle: &mut Lifecycle,
) -> BenchResult<Outcome> {
    lifecycle.advance(Stage::Loading)?;
    let dir = config.model_path.as_deref().ok_or_else(|| {
        BenchError::InvalidConfiguration("model_path is required when task_type = predict".into())
    })?;
    let model: F::Model = ModelStore::load(dir)?;

    lifecycle.advance(Stage::Predicting)?;
    let predicted = predict(&model, dataset, config.is_classification())?;

    lifecycle.advance(Stage::Reporting)?;
    Ok(Outcome {
        predictions: predicted.predictions,
        probabilities: predicted.probabilities,
        models_count: 1,
        training_duration: 0.0,
        predict_duration: predicted.duration,
        model_path: None,
    })
}

fn predict<M: Estimator + ?Sized>(model: &M, dataset: &Dataset, is_classification: bool) -> BenchResult<Predicted> {
    let _span = info_span!("predict").entered();
    info!("Predicting on the test set.");
    let x_test = &dataset.test.x;
    let timed_predict = timed(|| model.predict(x_test));
    let predictions = timed_predict.value?;
    if predictions.len() != dataset.test.n_rows() {
        return Err(BenchError::Engine(format!(
            "model returned {} predictions for {} test rows",
            predictions.len(),
            dataset.test.n_rows()
        )));
    }
    let probabilities = resolve_probabilities(model, x_test, is_classification)?;
    Ok(Predicted {
        predictions,
        probabilities,
        duration: timed_predict.duration,
    })
}

fn n_classes(dataset: &Dataset) -> usize {
    if !dataset.classes.is_empty() {
        return dataset.classes.len();
    }
    dataset
        .train
        .y
        .iter()
        .fold(0usize, |acc, y| acc.max(y.round().max(0.0) as usize + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Split;

    #[test]
    fn test_n_classes_from_labels_or_targets() {
        let ds = Dataset::new(
            Split::new(vec![vec![0.0]; 3], vec![0.0, 2.0, 1.0]).unwrap(),
            Split::default(),
        );
        assert_eq!(n_classes(&ds), 3);
        let ds = ds.with_classes(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        assert_eq!(n_classes(&ds), 4);
    }
}
