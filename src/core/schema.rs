//! Normalized run result, identical in shape for every framework.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::TaskType;
use super::env::EnvironmentInfo;
use crate::adapter::lifecycle::Stage;

/// Schema version for forward compatibility
pub const SCHEMA_VERSION: u32 = 1;

/// Value reported in place of a probability matrix when the fitted model has
/// no probability output. Consumers derive probabilities from predictions.
pub const PROBABILITIES_SENTINEL: &str = "predictions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProbabilitiesRepr", into = "ProbabilitiesRepr")]
pub enum Probabilities {
    /// One row per test sample, one column per encoded class.
    Matrix(Vec<Vec<f64>>),
    /// Serialized as the string `"predictions"`.
    FromPredictions,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ProbabilitiesRepr {
    Sentinel(String),
    Matrix(Vec<Vec<f64>>),
}

impl TryFrom<ProbabilitiesRepr> for Probabilities {
    type Error = String;

    fn try_from(repr: ProbabilitiesRepr) -> Result<Self, Self::Error> {
        match repr {
            ProbabilitiesRepr::Matrix(m) => Ok(Probabilities::Matrix(m)),
            ProbabilitiesRepr::Sentinel(s) if s == PROBABILITIES_SENTINEL => {
                Ok(Probabilities::FromPredictions)
            }
            ProbabilitiesRepr::Sentinel(s) => Err(format!("unexpected probabilities value: {s}")),
        }
    }
}

impl From<Probabilities> for ProbabilitiesRepr {
    fn from(p: Probabilities) -> Self {
        match p {
            Probabilities::Matrix(m) => ProbabilitiesRepr::Matrix(m),
            Probabilities::FromPredictions => ProbabilitiesRepr::Sentinel(PROBABILITIES_SENTINEL.to_string()),
        }
    }
}

impl Probabilities {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Probabilities::FromPredictions)
    }

    /// Materialize a matrix. The sentinel becomes a one-hot encoding of the
    /// predicted class indices.
    pub fn to_matrix(&self, predictions: &[f64], n_classes: usize) -> Vec<Vec<f64>> {
        match self {
            Probabilities::Matrix(m) => m.clone(),
            Probabilities::FromPredictions => predictions
                .iter()
                .map(|p| {
                    let mut row = vec![0.0; n_classes];
                    let idx = p.round();
                    if idx >= 0.0 && (idx as usize) < n_classes {
                        row[idx as usize] = 1.0;
                    }
                    row
                })
                .collect(),
        }
    }
}

/// Result of one adapter run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub schema_version: u32,
    pub framework: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_version: Option<String>,
    pub task_type: TaskType,
    pub metric: String,
    /// ISO 8601 timestamp
    pub timestamp: String,
    pub output_file: PathBuf,

    /// Aligned 1:1 with `truth`.
    pub predictions: Vec<f64>,
    pub truth: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Probabilities>,
    #[serde(default)]
    pub target_is_encoded: bool,
    /// Labels for encoded targets, indexed by class value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,

    pub models_count: usize,
    /// Seconds; 0.0 when the phase did not run.
    pub training_duration: f64,
    pub predict_duration: f64,
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Lifecycle stages the run went through, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvironmentInfo>,
}
