//! Core types shared by every adapter: configuration, datasets, timing,
//! environment setup and the normalized run result.

pub mod config;
pub mod dataset;
pub mod env;
pub mod schema;
pub mod timer;

// Re-export key types for convenience
pub use config::{ArtifactSelection, FrameworkParams, ProblemType, TaskConfig, TaskType, load_task_config};
pub use dataset::{Dataset, Matrix, Split};
pub use env::{EnvironmentInfo, init_process};
pub use schema::{PROBABILITIES_SENTINEL, Probabilities, RunResult, SCHEMA_VERSION};
pub use timer::{Timed, Timer, timed};
