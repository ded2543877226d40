//! End-to-end runs of the pipeline search framework on small synthetic data.

use std::path::Path;

use serde_json::{Value, json};

use automl_bench::adapter::{Estimator, ModelStore, RunOptions, run_adapter_with};
use automl_bench::core::{Dataset, Probabilities, Split, TaskConfig};
use automl_bench::frameworks::pipeline_search::FittedPipeline;
use automl_bench::frameworks::{PipelineSearchFramework, run_framework};

/// Two noisy clusters split at `x0 = 0.5`.
fn binary_dataset(rows: usize) -> Dataset {
    let row = |i: usize| {
        let t = i as f64 / rows as f64;
        let wobble = ((i * 7) % 5) as f64 / 50.0;
        vec![t + wobble, 1.0 - t, (i % 4) as f64]
    };
    let label = |i: usize| if (i as f64 / rows as f64) < 0.5 { 0.0 } else { 1.0 };
    let train_idx: Vec<usize> = (0..rows).filter(|i| i % 5 != 0).collect();
    let test_idx: Vec<usize> = (0..rows).filter(|i| i % 5 == 0).collect();
    let split = |idx: &[usize]| {
        Split::new(idx.iter().map(|i| row(*i)).collect(), idx.iter().map(|i| label(*i)).collect()).unwrap()
    };
    Dataset::new(split(&train_idx), split(&test_idx)).with_classes(vec!["no".into(), "yes".into()])
}

fn regression_dataset(rows: usize) -> Dataset {
    let row = |i: usize| vec![i as f64 / 10.0, ((i * 3) % 7) as f64];
    let target = |i: usize| 2.0 * (i as f64 / 10.0) - 0.5 * ((i * 3) % 7) as f64 + 1.0;
    let train: Vec<usize> = (0..rows).filter(|i| i % 4 != 0).collect();
    let test: Vec<usize> = (0..rows).filter(|i| i % 4 == 0).collect();
    let split = |idx: &[usize]| {
        Split::new(idx.iter().map(|i| row(*i)).collect(), idx.iter().map(|i| target(*i)).collect()).unwrap()
    };
    Dataset::new(split(&train), split(&test))
}

fn config_json(out: &Path) -> Value {
    json!({
        "name": "synthetic",
        "fold": 0,
        "task_type": "train",
        "problem_type": "binary",
        "metric": "acc",
        "max_runtime_seconds": 60,
        "seed": 0,
        "cores": 1,
        "framework_params": {"generations": 2, "population_size": 4, "cv": 3},
        "output_predictions_file": out.join("predictions.csv"),
    })
}

fn config(value: Value) -> TaskConfig {
    serde_json::from_value(value).unwrap()
}

fn options(dir: &Path) -> RunOptions {
    RunOptions {
        store: ModelStore::in_dir(dir.join("store")),
        detect_env: false,
    }
}

#[test]
fn test_binary_train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let data = binary_dataset(100);
    let fw = PipelineSearchFramework::new();

    let trained = run_adapter_with(&fw, &data, &config(config_json(dir.path())), &options(dir.path())).unwrap();
    assert!(trained.training_duration > 0.0);
    assert!(trained.predict_duration > 0.0);
    assert!(trained.models_count >= 1);
    assert_eq!(trained.predictions.len(), data.test.n_rows());
    assert!(trained.predictions.iter().all(|p| *p == 0.0 || *p == 1.0));
    match &trained.probabilities {
        Some(Probabilities::Matrix(rows)) => {
            assert_eq!(rows.len(), data.test.n_rows());
            assert!(rows.iter().all(|r| r.len() == 2 && (r.iter().sum::<f64>() - 1.0).abs() < 1e-6));
        }
        Some(Probabilities::FromPredictions) => {}
        None => panic!("classification run must report probabilities"),
    }

    let model_dir = trained.model_path.clone().expect("model saved");
    let model: FittedPipeline = ModelStore::load(&model_dir).unwrap();
    assert_eq!(model.predict(&data.test.x).unwrap(), trained.predictions);

    let mut value = config_json(dir.path());
    value["task_type"] = json!("predict");
    value["model_path"] = json!(model_dir);
    let predicted = run_adapter_with(&fw, &data, &config(value), &options(dir.path())).unwrap();
    assert_eq!(predicted.predictions, trained.predictions);
    assert_eq!(predicted.probabilities, trained.probabilities);
    assert_eq!(predicted.training_duration, 0.0);
    assert!(predicted.model_path.is_none());
}

#[test]
fn test_same_seed_same_result() {
    let dir = tempfile::tempdir().unwrap();
    let data = binary_dataset(60);
    let cfg = config(config_json(dir.path()));

    let a = run_framework("pipeline_search", &data, &cfg, &options(dir.path())).unwrap();
    let b = run_framework("pipeline_search", &data, &cfg, &options(dir.path())).unwrap();
    assert_eq!(a.predictions, b.predictions);
    assert_eq!(a.models_count, b.models_count);
}

#[test]
fn test_regression_run() {
    let dir = tempfile::tempdir().unwrap();
    let data = regression_dataset(80);
    let mut value = config_json(dir.path());
    value["problem_type"] = json!("regression");
    value["metric"] = json!("rmse");
    value["cores"] = json!(2);
    value["framework_params"] = json!({"generations": 3, "population_size": 8, "cv": 3});

    let result = run_framework("pipeline_search", &data, &config(value), &options(dir.path())).unwrap();
    assert_eq!(result.predictions.len(), data.test.n_rows());
    assert!(result.probabilities.is_none());
    assert!(!result.target_is_encoded);
    let n = result.truth.len() as f64;
    let mean = result.truth.iter().sum::<f64>() / n;
    let variance = result.truth.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    let mse = result
        .predictions
        .iter()
        .zip(&result.truth)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / n;
    // Better than predicting the mean.
    assert!(mse < variance, "mse = {mse}, variance = {variance}");
}

#[test]
fn test_models_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let data = binary_dataset(60);
    let mut value = config_json(dir.path());
    value["framework_params"]["_save_artifacts"] = json!("models");

    run_framework("pipeline_search", &data, &config(value), &options(dir.path())).unwrap();
    let models = std::fs::read_to_string(dir.path().join("models").join("models.txt")).unwrap();
    assert!(models.contains("input_matrix"));
}

#[test]
fn test_bad_hyperparameter_value_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut value = config_json(dir.path());
    value["framework_params"]["cv"] = json!(1);

    let err = run_framework("pipeline_search", &binary_dataset(20), &config(value), &options(dir.path())).unwrap_err();
    assert!(matches!(err, automl_bench::BenchError::InvalidConfiguration(_)));
}

#[test]
fn test_unbounded_runtime_budget() {
    let dir = tempfile::tempdir().unwrap();
    let data = binary_dataset(40);
    let mut value = config_json(dir.path());
    value["max_runtime_seconds"] = json!(u64::MAX);

    let result = run_framework("pipeline_search", &data, &config(value), &options(dir.path())).unwrap();
    assert_eq!(result.predictions.len(), data.test.n_rows());
}

#[test]
fn test_probability_metric_rejected_for_regression() {
    let dir = tempfile::tempdir().unwrap();
    let data = regression_dataset(20);
    for metric in ["auc", "logloss"] {
        let mut value = config_json(dir.path());
        value["problem_type"] = json!("regression");
        value["metric"] = json!(metric);

        let err = run_framework("pipeline_search", &data, &config(value), &options(dir.path())).unwrap_err();
        assert!(matches!(err, automl_bench::BenchError::InvalidConfiguration(_)), "{metric}: {err}");
        // Rejected before the search: no model directory was created.
        assert!(!dir.path().join("store").exists());
    }
}
