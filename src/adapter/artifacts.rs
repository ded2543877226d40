//! Best-effort export of training diagnostics.

use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::BenchResult;
use crate::core::TaskConfig;

use super::traits::{Candidate, SearchEngine};

/// Artifact name for the ranked candidate dump.
pub const MODELS_ARTIFACT: &str = "models";

/// `<output root>/<name>`, created if missing.
pub fn output_subdir(name: &str, config: &TaskConfig) -> BenchResult<PathBuf> {
    let dir = config.output_root().join(name);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Writes the artifacts requested through `_save_artifacts`.
///
/// `save` reports failures to the caller, which logs and drops them; an
/// artifact problem never fails a run.
pub struct ArtifactSaver<'a> {
    config: &'a TaskConfig,
}

impl<'a> ArtifactSaver<'a> {
    pub fn new(config: &'a TaskConfig) -> Self {
        ArtifactSaver { config }
    }

    /// Returns the files written; empty when nothing was requested.
    pub fn save<S: SearchEngine + ?Sized>(&self, engine: &S) -> BenchResult<Vec<PathBuf>> {
        let selection = &self.config.framework_params.save_artifacts;
        if selection.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = engine.candidates()?;
        debug!(count = candidates.len(), "ranked candidates: {:?}", candidates);

        let mut written = Vec::new();
        if selection.wants(MODELS_ARTIFACT) {
            let path = output_subdir(MODELS_ARTIFACT, self.config)?.join("models.txt");
            std::fs::write(&path, render_candidates(&candidates))?;
            info!("Saved {} candidate models to {}", candidates.len(), path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn render_candidates(candidates: &[Candidate]) -> String {
    let mut out = String::new();
    for c in candidates {
        let _ = writeln!(
            out,
            "{{'fitness': '{}',\n 'model': '{}',\n 'pipeline': {}}}",
            c.fitness, c.model, c.pipeline
        );
    }
    out
}
