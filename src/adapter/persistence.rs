//! Saving fitted models to a scratch directory and loading them back.
//!
//! A model directory holds exactly one file, `model.json`. Nothing else in the
//! directory is read.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{BenchError, BenchResult};

/// File name of the serialized model inside a model directory.
pub const MODEL_FILE: &str = "model.json";

const DIR_PREFIX: &str = "automl-model-";

#[derive(Debug, Clone, Default)]
pub struct ModelStore {
    /// Parent for new model directories; the system temp dir when `None`.
    root: Option<PathBuf>,
}

impl ModelStore {
    pub fn new() -> Self {
        ModelStore { root: None }
    }

    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        ModelStore {
            root: Some(root.into()),
        }
    }

    /// Serialize `model` into a fresh directory and return that directory.
    ///
    /// The directory is removed again if serialization or the write fails.
    pub fn save<M: Serialize>(&self, model: &M) -> BenchResult<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(DIR_PREFIX);
        let tmp = match &self.root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        info!("Saving model to {}", tmp.path().display());

        let bytes = serde_json::to_vec(model)?;
        std::fs::write(tmp.path().join(MODEL_FILE), &bytes)?;
        debug!(sha256 = %crate::sha256_hex(&bytes), size = bytes.len(), "model written");

        // Dropping `tmp` on an earlier `?` deletes the directory.
        Ok(tmp.keep())
    }

    /// Read the model stored in `dir` by `save`.
    pub fn load<M: DeserializeOwned>(dir: &Path) -> BenchResult<M> {
        info!("Loading model from {}", dir.display());
        let file = dir.join(MODEL_FILE);
        let bytes = std::fs::read(&file).map_err(|e| BenchError::ModelLoad {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| BenchError::ModelLoad {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serializer};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Weights {
        w: Vec<f64>,
        bias: f64,
    }

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not serializable"))
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let store = ModelStore::in_dir(root.path());
        let model = Weights { w: vec![0.5, -1.25], bias: 3.0 };

        let dir = store.save(&model).unwrap();
        assert!(dir.starts_with(root.path()));
        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);

        let loaded: Weights = ModelStore::load(&dir).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_save_failure_leaves_no_directory() {
        let root = tempfile::tempdir().unwrap();
        let store = ModelStore::in_dir(root.path());
        assert!(store.save(&Broken).is_err());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_load_missing_dir_is_model_load_error() {
        let root = tempfile::tempdir().unwrap();
        let err = ModelStore::load::<Weights>(&root.path().join("nope")).unwrap_err();
        assert!(matches!(err, BenchError::ModelLoad { .. }));
    }

    #[test]
    fn test_load_corrupt_file() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(MODEL_FILE), b"{not json").unwrap();
        let err = ModelStore::load::<Weights>(root.path()).unwrap_err();
        assert!(matches!(err, BenchError::ModelLoad { .. }));
    }
}
