//! The `run` command end to end: config file, CSV splits, reported files.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;

use automl_bench::BenchError;
use automl_bench::core::RunResult;
use automl_bench::run_cmd;
use automl_bench::storage::summary_path;

fn write_splits(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let train = dir.join("train.csv");
    let test = dir.join("test.csv");
    fs::write(&train, "a,b,animal\n1.0,2.0,cat\n2.0,1.0,dog\n3.0,0.5,dog\n0.5,3.0,cat\n").unwrap();
    fs::write(&test, "a,b,animal\n1.5,2.5,cat\n2.5,0.5,dog\n").unwrap();
    (train, test)
}

#[test]
fn test_run_writes_predictions_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let (train, test) = write_splits(dir.path());
    let out = dir.path().join("results").join("predictions.csv");
    let config = dir.path().join("task.json");
    fs::write(
        &config,
        serde_json::json!({
            "task_type": "train",
            "problem_type": "binary",
            "metric": "acc",
            "max_runtime_seconds": 10,
            "output_predictions_file": out,
        })
        .to_string(),
    )
    .unwrap();

    run_cmd::run("mock".into(), config, train, test, Some("animal".into())).unwrap();

    let csv = fs::read_to_string(&out).unwrap();
    assert_eq!(csv, "cat,dog,predictions,truth\n0.5,0.5,dog,cat\n0.5,0.5,dog,dog\n");

    let summary: RunResult = serde_json::from_str(&fs::read_to_string(summary_path(&out)).unwrap()).unwrap();
    assert_eq!(summary.framework, "mock");
    assert_eq!(summary.classes, vec!["cat".to_string(), "dog".to_string()]);
    assert_eq!(summary.truth, vec![0.0, 1.0]);
    assert!(summary.env.is_some());
}

#[test]
fn test_toml_config_and_last_column_target() {
    let dir = tempfile::tempdir().unwrap();
    let (train, test) = write_splits(dir.path());
    let out = dir.path().join("predictions.csv");
    let config = dir.path().join("task.toml");
    fs::write(
        &config,
        format!(
            "task_type = \"train\"\nproblem_type = \"binary\"\nmetric = \"auc\"\nmax_runtime_seconds = 10\noutput_predictions_file = {:?}\n",
            out.display().to_string()
        ),
    )
    .unwrap();

    run_cmd::run("mock".into(), config, train, test, None).unwrap();
    assert!(out.is_file());
}

#[test]
fn test_config_checked_before_data_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("task.json");
    fs::write(
        &config,
        r#"{"task_type":"train","problem_type":"binary","metric":"unsupported_metric_xyz",
            "max_runtime_seconds":10,"output_predictions_file":"predictions.csv"}"#,
    )
    .unwrap();

    // The splits do not exist; the metric error must win.
    let err = run_cmd::run(
        "pipeline_search".into(),
        config,
        dir.path().join("missing-train.csv"),
        dir.path().join("missing-test.csv"),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, BenchError::UnsupportedMetric { .. }));
}

#[test]
fn test_unknown_framework() {
    let dir = tempfile::tempdir().unwrap();
    let (train, test) = write_splits(dir.path());
    let config = dir.path().join("task.json");
    fs::write(
        &config,
        r#"{"task_type":"train","problem_type":"binary","metric":"acc",
            "max_runtime_seconds":10,"output_predictions_file":"predictions.csv"}"#,
    )
    .unwrap();

    let err = run_cmd::run("autogluon".into(), config, train, test, None).unwrap_err();
    assert!(matches!(err, BenchError::InvalidConfiguration(_)));
}

#[test]
fn test_io_failures_outside_degradable_steps_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (train, test) = write_splits(dir.path());
    let config = dir.path().join("task.json");
    // The predictions path is an existing directory, so writing the result fails.
    let out = dir.path().join("taken");
    fs::create_dir(&out).unwrap();
    fs::write(
        &config,
        serde_json::json!({
            "task_type": "train",
            "problem_type": "binary",
            "metric": "acc",
            "max_runtime_seconds": 10,
            "output_predictions_file": out,
        })
        .to_string(),
    )
    .unwrap();

    let err = run_cmd::run("mock".into(), config.clone(), train, dir.path().join("missing.csv"), None).unwrap_err();
    assert!(matches!(err, BenchError::Message(_)), "{err}");

    let err = run_cmd::run("mock".into(), config, dir.path().join("train.csv"), test, None).unwrap_err();
    assert!(matches!(err, BenchError::Io(_)), "{err}");
}
