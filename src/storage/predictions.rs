//! Predictions file writer.
//!
//! One row per test sample: a probability column per class (classification
//! only), then `predictions` and `truth`. Encoded targets are decoded back to
//! their labels. A JSON summary of the full result is written alongside.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::RunResult;
use crate::{BenchError, BenchResult};

/// Path of the JSON summary written next to a predictions file.
pub fn summary_path(output: &Path) -> PathBuf {
    output.with_extension("json")
}

#[derive(Debug, Clone, Default)]
pub struct PredictionsWriter;

impl PredictionsWriter {
    pub fn new() -> Self {
        PredictionsWriter
    }

    /// Write the predictions CSV to `result.output_file` and the summary next to it.
    pub fn write(&self, result: &RunResult) -> BenchResult<()> {
        let output = &result.output_file;
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(output)?;
        self.write_to(result, file)?;
        crate::write_json(&summary_path(output), result)?;
        info!("Predictions saved to {}", output.display());
        Ok(())
    }

    pub fn write_to<W: Write>(&self, result: &RunResult, writer: W) -> BenchResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let class_names = class_names(result);

        let mut headers: Vec<String> = class_names.clone();
        headers.push("predictions".into());
        headers.push("truth".into());
        csv_writer
            .write_record(&headers)
            .map_err(|e| BenchError::Message(format!("failed to write CSV headers: {e}")))?;

        let probabilities = result
            .probabilities
            .as_ref()
            .map(|p| p.to_matrix(&result.predictions, class_names.len()));

        for (i, (pred, truth)) in result.predictions.iter().zip(&result.truth).enumerate() {
            let mut row: Vec<String> = match &probabilities {
                Some(m) => (0..class_names.len())
                    .map(|c| m.get(i).and_then(|r| r.get(c)).map(|v| v.to_string()).unwrap_or_default())
                    .collect(),
                None => vec![String::new(); class_names.len()],
            };
            row.push(decode(result, *pred));
            row.push(decode(result, *truth));
            csv_writer
                .write_record(&row)
                .map_err(|e| BenchError::Message(format!("failed to write CSV row: {e}")))?;
        }

        csv_writer
            .flush()
            .map_err(|e| BenchError::Message(format!("failed to flush CSV writer: {e}")))?;
        Ok(())
    }
}

fn class_names(result: &RunResult) -> Vec<String> {
    if !result.target_is_encoded {
        return Vec::new();
    }
    if !result.classes.is_empty() {
        return result.classes.clone();
    }
    let width = match &result.probabilities {
        Some(crate::core::Probabilities::Matrix(m)) => m.first().map(Vec::len).unwrap_or(0),
        _ => 0,
    };
    let max_label = result
        .predictions
        .iter()
        .chain(&result.truth)
        .fold(0usize, |acc, v| acc.max(v.round().max(0.0) as usize + 1));
    (0..width.max(max_label)).map(|c| c.to_string()).collect()
}

fn decode(result: &RunResult, value: f64) -> String {
    if result.target_is_encoded {
        let idx = value.round();
        if idx >= 0.0 {
            if let Some(label) = result.classes.get(idx as usize) {
                return label.clone();
            }
        }
        return format!("{}", idx as i64);
    }
    value.to_string()
}
