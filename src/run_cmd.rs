//! CLI command handlers for `run` and `frameworks`.

use std::path::PathBuf;

use tracing::info;

use crate::BenchResult;
use crate::adapter::RunOptions;
use crate::core::{Dataset, load_task_config};
use crate::frameworks::{self, FRAMEWORKS};
use crate::storage::{summary_path, write_result};

/// Run the `run` command.
///
/// The configuration is checked against the framework before the datasets are
/// read, so a bad metric or mode never touches the data.
pub fn run(
    framework: String,
    config_path: PathBuf,
    train: PathBuf,
    test: PathBuf,
    target: Option<String>,
) -> BenchResult<()> {
    let config = load_task_config(&config_path)?;
    frameworks::check_config(&framework, &config)?;

    info!("loading dataset");
    let dataset = Dataset::from_csv(&train, &test, target.as_deref(), config.problem_type)?;
    info!(
        "train: {} rows, test: {} rows, {} features",
        dataset.train.n_rows(),
        dataset.test.n_rows(),
        dataset.train.n_features()
    );

    let options = RunOptions {
        detect_env: true,
        ..RunOptions::default()
    };
    let result = frameworks::run_framework(&framework, &dataset, &config, &options)?;
    write_result(&result)?;

    println!("framework:         {}", result.framework);
    println!("task type:         {}", result.task_type);
    println!("models evaluated:  {}", result.models_count);
    println!("training duration: {:.3}s", result.training_duration);
    println!("predict duration:  {:.3}s", result.predict_duration);
    match &result.model_path {
        Some(path) => println!("model saved to:    {}", path.display()),
        None => println!("model saved to:    -"),
    }
    println!("predictions:       {}", result.output_file.display());
    println!("summary:           {}", summary_path(&result.output_file).display());
    Ok(())
}

/// Run the `frameworks` command: list registered frameworks and their metrics.
pub fn list(json: bool) -> BenchResult<()> {
    let infos = FRAMEWORKS
        .iter()
        .map(|name| frameworks::describe(name))
        .collect::<BenchResult<Vec<_>>>()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }
    for info in infos {
        println!("{} {}", info.name, info.version.as_deref().unwrap_or("unknown"));
        for (benchmark, engine) in &info.metrics {
            println!("  {benchmark:<8} -> {engine}");
        }
        if !info.hyperparameters.is_empty() {
            println!("  hyperparameters: {}", info.hyperparameters.join(", "));
        }
    }
    Ok(())
}
