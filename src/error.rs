use std::path::PathBuf;

use thiserror::Error;

/// Fatal pipeline failures. Each variant names the stage that aborted the
/// run. Per-field absence is not represented here: a missing name, tag list
/// or biography is recovered locally by the normalizer via placeholder
/// substitution and never surfaces as an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("render failed after {attempts} attempts: {cause:#}")]
    Render { attempts: u32, cause: anyhow::Error },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("report write failed for {}: {cause:#}", path.display())]
    Write { path: PathBuf, cause: anyhow::Error },
}
