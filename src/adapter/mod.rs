//! Adapter execution protocol.
//!
//! A framework implements `Framework` (how to build and score its search) and
//! inherits the full run lifecycle from `runner::run_adapter`:
//!
//! - **metric**: benchmark metric to engine scoring identifier, fail-fast.
//! - **persistence**: one-file model directories.
//! - **probability**: probability output with the `"predictions"` fallback.
//! - **artifacts**: optional diagnostics export that never fails a run.
//! - **lifecycle**: the forward-only stage sequence a run follows.

pub mod artifacts;
pub mod lifecycle;
pub mod metric;
pub mod persistence;
pub mod probability;
pub mod runner;
pub mod traits;

// Re-export key types
pub use artifacts::{ArtifactSaver, output_subdir};
pub use lifecycle::{Lifecycle, Stage};
pub use metric::MetricMapper;
pub use persistence::{MODEL_FILE, ModelStore};
pub use probability::resolve_probabilities;
pub use runner::{RunOptions, preflight, run_adapter, run_adapter_with};
pub use traits::{Candidate, EngineParams, Estimator, EstimatorVariant, Framework, SearchEngine};
