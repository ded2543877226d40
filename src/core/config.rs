//! Per-run task configuration handed to an adapter by the orchestrator.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{BenchError, BenchResult};

/// Prefix marking a framework parameter as internal to the benchmark tooling.
pub const INTERNAL_PREFIX: char = '_';

/// Lifecycle mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Train,
    Predict,
}

impl FromStr for TaskType {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(TaskType::Train),
            "predict" => Ok(TaskType::Predict),
            other => Err(BenchError::InvalidConfiguration(format!("unknown task_type: {other}"))),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Train => write!(f, "train"),
            TaskType::Predict => write!(f, "predict"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Binary,
    Multiclass,
    Regression,
}

impl ProblemType {
    pub fn is_classification(&self) -> bool {
        !matches!(self, ProblemType::Regression)
    }
}

/// Which auxiliary artifacts a framework should export after training.
///
/// Parsed from `_save_artifacts`, which may be a boolean, a single name,
/// a comma separated list of names, or an array of names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ArtifactSelection {
    #[default]
    Nothing,
    All,
    Only(BTreeSet<String>),
}

impl ArtifactSelection {
    pub fn wants(&self, artifact: &str) -> bool {
        match self {
            ArtifactSelection::Nothing => false,
            ArtifactSelection::All => true,
            ArtifactSelection::Only(names) => names.contains(artifact),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ArtifactSelection::Nothing => true,
            ArtifactSelection::All => false,
            ArtifactSelection::Only(names) => names.is_empty(),
        }
    }

    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null | Value::Bool(false) => Ok(ArtifactSelection::Nothing),
            Value::Bool(true) => Ok(ArtifactSelection::All),
            Value::String(s) => Ok(ArtifactSelection::Only(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| format!("_save_artifacts entries must be strings, got {item}"))
                })
                .collect::<Result<BTreeSet<_>, _>>()
                .map(ArtifactSelection::Only),
            other => Err(format!("_save_artifacts must be a bool, string or list, got {other}")),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            ArtifactSelection::Nothing => Value::Bool(false),
            ArtifactSelection::All => Value::Bool(true),
            ArtifactSelection::Only(names) => {
                Value::Array(names.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

/// Framework parameters split into the recognised internal keys and the
/// hyperparameters forwarded verbatim to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct FrameworkParams {
    /// `_n_jobs`: overrides `cores` for this framework only.
    pub n_jobs: Option<usize>,
    /// `_save_artifacts`
    pub save_artifacts: ArtifactSelection,
    /// Every unprefixed key.
    pub hyperparameters: BTreeMap<String, Value>,
}

impl TryFrom<BTreeMap<String, Value>> for FrameworkParams {
    type Error = String;

    fn try_from(raw: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let mut params = FrameworkParams::default();
        for (key, value) in raw {
            if !key.starts_with(INTERNAL_PREFIX) {
                params.hyperparameters.insert(key, value);
                continue;
            }
            match key.as_str() {
                "_n_jobs" => {
                    let n = value
                        .as_u64()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| format!("_n_jobs must be a positive integer, got {value}"))?;
                    params.n_jobs = Some(n as usize);
                }
                "_save_artifacts" => params.save_artifacts = ArtifactSelection::from_value(&value)?,
                other => debug!(key = other, "ignoring internal framework parameter"),
            }
        }
        Ok(params)
    }
}

impl From<FrameworkParams> for BTreeMap<String, Value> {
    fn from(params: FrameworkParams) -> Self {
        let mut map = params.hyperparameters;
        if let Some(n) = params.n_jobs {
            map.insert("_n_jobs".to_string(), Value::from(n));
        }
        if !params.save_artifacts.is_empty() {
            map.insert("_save_artifacts".to_string(), params.save_artifacts.to_value());
        }
        map
    }
}

impl FrameworkParams {
    /// Reject hyperparameters the framework does not declare.
    pub fn validate(&self, framework: &str, known: &[&str]) -> BenchResult<()> {
        let unknown: Vec<&str> = self
            .hyperparameters
            .keys()
            .map(String::as_str)
            .filter(|k| !known.contains(k))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(BenchError::InvalidConfiguration(format!(
                "unknown hyperparameters for {framework}: {}",
                unknown.join(", ")
            )))
        }
    }
}

fn default_cores() -> usize {
    1
}

/// Immutable configuration for a single adapter run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task (dataset) name, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fold: Option<u32>,
    /// Kept raw so that unknown modes are reported as a configuration error
    /// by the adapter rather than as a parse error.
    pub task_type: String,
    pub problem_type: ProblemType,
    pub metric: String,
    pub max_runtime_seconds: u64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_cores")]
    pub cores: usize,
    #[serde(default)]
    pub framework_params: FrameworkParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    pub output_predictions_file: PathBuf,
    /// Root for artifact subdirectories; defaults to the predictions file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl TaskConfig {
    pub fn task_type(&self) -> BenchResult<TaskType> {
        self.task_type.parse()
    }

    pub fn is_classification(&self) -> bool {
        self.problem_type.is_classification()
    }

    /// Parallelism handed to the engine: `_n_jobs` wins over `cores`.
    pub fn n_jobs(&self) -> usize {
        self.framework_params.n_jobs.unwrap_or(self.cores).max(1)
    }

    pub fn output_root(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .output_predictions_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    pub fn from_json_str(s: &str) -> BenchResult<Self> {
        serde_json::from_str(s).map_err(|e| BenchError::InvalidConfiguration(e.to_string()))
    }
}

/// Load a task configuration; the format follows the file extension
/// (`.toml`, `.yaml`/`.yml`, anything else is read as JSON).
pub fn load_task_config(path: &Path) -> BenchResult<TaskConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read task config {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match ext {
        "toml" => toml::from_str(&s).map_err(|e| BenchError::InvalidConfiguration(e.to_string())),
        "yaml" | "yml" => {
            serde_yaml::from_str(&s).map_err(|e| BenchError::InvalidConfiguration(e.to_string()))
        }
        _ => TaskConfig::from_json_str(&s),
    }
}
