//! Result reporting.
//!
//! Every run leaves a predictions CSV at `output_predictions_file` and a JSON
//! summary of the full `RunResult` next to it.

pub mod predictions;

pub use predictions::{PredictionsWriter, summary_path};

use crate::BenchResult;
use crate::core::RunResult;

pub fn write_result(result: &RunResult) -> BenchResult<()> {
    PredictionsWriter::new().write(result)
}
