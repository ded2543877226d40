//! In-memory train/test splits handed to adapters.
//!
//! Adapters only read `train.x`, `train.y`, `test.x` and `test.y`. Classification
//! targets are label-encoded to class indices (`0.0`, `1.0`, ...) with the
//! original labels kept in `Dataset::classes` for decoding.

use std::collections::BTreeSet;
use std::path::Path;

use crate::core::config::ProblemType;
use crate::{BenchError, BenchResult};

pub type Matrix = Vec<Vec<f64>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Split {
    pub x: Matrix,
    pub y: Vec<f64>,
}

impl Split {
    pub fn new(x: Matrix, y: Vec<f64>) -> BenchResult<Self> {
        if x.len() != y.len() {
            return Err(BenchError::Message(format!(
                "feature rows ({}) and targets ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if let Some(first) = x.first() {
            let width = first.len();
            if let Some(bad) = x.iter().position(|row| row.len() != width) {
                return Err(BenchError::Message(format!(
                    "row {bad} has {} features, expected {width}",
                    x[bad].len()
                )));
            }
        }
        Ok(Split { x, y })
    }

    pub fn n_rows(&self) -> usize {
        self.x.len()
    }

    pub fn n_features(&self) -> usize {
        self.x.first().map(Vec::len).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub train: Split,
    pub test: Split,
    /// Class labels indexed by encoded target value; empty for regression.
    pub classes: Vec<String>,
}

impl Dataset {
    pub fn new(train: Split, test: Split) -> Self {
        Dataset {
            train,
            test,
            classes: Vec::new(),
        }
    }

    pub fn with_classes(mut self, classes: Vec<String>) -> Self {
        self.classes = classes;
        self
    }

    /// Load train and test CSV files with a header row. The target column is
    /// `target` when given, otherwise the last column.
    pub fn from_csv(
        train: &Path,
        test: &Path,
        target: Option<&str>,
        problem_type: ProblemType,
    ) -> BenchResult<Self> {
        let train_raw = read_raw(train, target)?;
        let test_raw = read_raw(test, target)?;

        let (train_y, test_y, classes) = if problem_type.is_classification() {
            let classes: Vec<String> = train_raw
                .labels
                .iter()
                .chain(test_raw.labels.iter())
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let encode = |labels: &[String]| -> Vec<f64> {
                labels
                    .iter()
                    .map(|l| classes.iter().position(|c| c == l).unwrap_or(0) as f64)
                    .collect()
            };
            (encode(&train_raw.labels), encode(&test_raw.labels), classes)
        } else {
            (
                parse_numeric(&train_raw.labels, train)?,
                parse_numeric(&test_raw.labels, test)?,
                Vec::new(),
            )
        };

        Ok(Dataset {
            train: Split::new(train_raw.x, train_y)?,
            test: Split::new(test_raw.x, test_y)?,
            classes,
        })
    }
}

struct RawSplit {
    x: Matrix,
    labels: Vec<String>,
}

fn read_raw(path: &Path, target: Option<&str>) -> BenchResult<RawSplit> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| BenchError::Message(format!("failed to open {}: {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| BenchError::Message(format!("failed to read header of {}: {e}", path.display())))?
        .clone();
    if headers.is_empty() {
        return Err(BenchError::Message(format!("{} has no columns", path.display())));
    }
    let target_idx = match target {
        Some(name) => headers.iter().position(|h| h == name).ok_or_else(|| {
            BenchError::Message(format!("target column {name} not found in {}", path.display()))
        })?,
        None => headers.len() - 1,
    };

    let mut x = Vec::new();
    let mut labels = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| BenchError::Message(format!("failed to read {}: {e}", path.display())))?;
        let mut row = Vec::with_capacity(record.len().saturating_sub(1));
        for (i, field) in record.iter().enumerate() {
            if i == target_idx {
                labels.push(field.trim().to_string());
                continue;
            }
            let value = field.trim().parse::<f64>().map_err(|e| {
                BenchError::Message(format!(
                    "{}: row {} column {}: {e}",
                    path.display(),
                    line + 1,
                    headers.get(i).unwrap_or("?")
                ))
            })?;
            row.push(value);
        }
        x.push(row);
    }
    Ok(RawSplit { x, labels })
}

fn parse_numeric(labels: &[String], path: &Path) -> BenchResult<Vec<f64>> {
    labels
        .iter()
        .map(|l| {
            l.parse::<f64>().map_err(|e| {
                BenchError::Message(format!("{}: non-numeric regression target {l}: {e}", path.display()))
            })
        })
        .collect()
}
