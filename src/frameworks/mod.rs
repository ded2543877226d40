//! Registered frameworks, addressable by name.

pub mod mock;
pub mod pipeline_search;

use serde::Serialize;

use crate::adapter::{Framework, RunOptions, preflight, run_adapter_with};
use crate::core::{Dataset, RunResult, TaskConfig};
use crate::{BenchError, BenchResult};

pub use mock::{MockConfig, MockFramework};
pub use pipeline_search::PipelineSearchFramework;

pub const FRAMEWORKS: &[&str] = &[pipeline_search::NAME, "mock"];

/// Summary of a registered framework for listings.
#[derive(Debug, Clone, Serialize)]
pub struct FrameworkInfo {
    pub name: String,
    pub version: Option<String>,
    pub metrics: Vec<(String, String)>,
    pub hyperparameters: Vec<String>,
}

fn info_of<F: Framework>(framework: &F) -> FrameworkInfo {
    FrameworkInfo {
        name: framework.name().to_string(),
        version: framework.version(),
        metrics: framework
            .metrics()
            .entries()
            .iter()
            .map(|(b, e)| (b.to_string(), e.to_string()))
            .collect(),
        hyperparameters: framework.hyperparameters().iter().map(|h| h.to_string()).collect(),
    }
}

fn unknown(name: &str) -> BenchError {
    BenchError::InvalidConfiguration(format!(
        "unknown framework {name}, expected one of: {}",
        FRAMEWORKS.join(", ")
    ))
}

pub fn describe(name: &str) -> BenchResult<FrameworkInfo> {
    match name {
        pipeline_search::NAME => Ok(info_of(&PipelineSearchFramework::new())),
        "mock" => Ok(info_of(&MockFramework::default_mock())),
        other => Err(unknown(other)),
    }
}

/// Validate `config` against the named framework without touching data.
pub fn check_config(name: &str, config: &TaskConfig) -> BenchResult<()> {
    match name {
        pipeline_search::NAME => preflight(&PipelineSearchFramework::new(), config).map(|_| ()),
        "mock" => preflight(&MockFramework::default_mock(), config).map(|_| ()),
        other => Err(unknown(other)),
    }
}

pub fn run_framework(name: &str, dataset: &Dataset, config: &TaskConfig, options: &RunOptions) -> BenchResult<RunResult> {
    match name {
        pipeline_search::NAME => run_adapter_with(&PipelineSearchFramework::new(), dataset, config, options),
        "mock" => run_adapter_with(&MockFramework::default_mock(), dataset, config, options),
        other => Err(unknown(other)),
    }
}
