//! Forward-only run state machine.
//!
//! Train runs go `Configured -> Training -> Persisting -> Predicting -> Reporting`,
//! predict runs go `Configured -> Loading -> Predicting -> Reporting`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::TaskType;
use crate::{BenchError, BenchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Configured,
    Training,
    Persisting,
    Loading,
    Predicting,
    Reporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Configured => "configured",
            Stage::Training => "training",
            Stage::Persisting => "persisting",
            Stage::Loading => "loading",
            Stage::Predicting => "predicting",
            Stage::Reporting => "reporting",
        };
        f.write_str(s)
    }
}

const TRAIN_PATH: &[Stage] = &[
    Stage::Configured,
    Stage::Training,
    Stage::Persisting,
    Stage::Predicting,
    Stage::Reporting,
];

const PREDICT_PATH: &[Stage] = &[Stage::Configured, Stage::Loading, Stage::Predicting, Stage::Reporting];

#[derive(Debug, Clone)]
pub struct Lifecycle {
    path: &'static [Stage],
    position: usize,
}

impl Lifecycle {
    pub fn new(task_type: TaskType) -> Self {
        Lifecycle {
            path: Self::path(task_type),
            position: 0,
        }
    }

    pub fn path(task_type: TaskType) -> &'static [Stage] {
        match task_type {
            TaskType::Train => TRAIN_PATH,
            TaskType::Predict => PREDICT_PATH,
        }
    }

    pub fn current(&self) -> Stage {
        self.path[self.position]
    }

    /// Move to `next`, which must be the stage directly after the current one.
    pub fn advance(&mut self, next: Stage) -> BenchResult<()> {
        match self.path.get(self.position + 1) {
            Some(expected) if *expected == next => {
                self.position += 1;
                Ok(())
            }
            _ => Err(BenchError::Message(format!(
                "illegal lifecycle transition {} -> {next}",
                self.current()
            ))),
        }
    }

    /// Stages visited so far, including the current one.
    pub fn visited(&self) -> Vec<Stage> {
        self.path[..=self.position].to_vec()
    }

    pub fn is_finished(&self) -> bool {
        self.position + 1 == self.path.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_path() {
        let mut lc = Lifecycle::new(TaskType::Train);
        for stage in [Stage::Training, Stage::Persisting, Stage::Predicting, Stage::Reporting] {
            lc.advance(stage).unwrap();
        }
        assert!(lc.is_finished());
        assert_eq!(lc.visited(), TRAIN_PATH.to_vec());
    }

    #[test]
    fn test_predict_cannot_train() {
        let mut lc = Lifecycle::new(TaskType::Predict);
        let err = lc.advance(Stage::Training).unwrap_err();
        assert!(err.to_string().contains("configured -> training"));
        assert_eq!(lc.current(), Stage::Configured);
    }

    #[test]
    fn test_no_backward_or_repeated_transition() {
        let mut lc = Lifecycle::new(TaskType::Predict);
        lc.advance(Stage::Loading).unwrap();
        assert!(lc.advance(Stage::Loading).is_err());
        assert!(lc.advance(Stage::Configured).is_err());
        lc.advance(Stage::Predicting).unwrap();
        lc.advance(Stage::Reporting).unwrap();
        assert!(lc.advance(Stage::Reporting).is_err());
    }
}
