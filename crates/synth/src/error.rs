//! Error types for configuration synthesis.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("bucket {bucket}: base template has no `{path}` slot")]
    MissingSlot { bucket: usize, path: String },
    #[error("bucket {0} has no problems")]
    EmptyBucket(usize),
    #[error("failed to serialize configuration for bucket {bucket}: {source}")]
    Serialize {
        bucket: usize,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pass exactly one of --log or --grid, not both")]
    ConflictingInputs,
    #[error("one of --log or --grid is required")]
    MissingInput,
    #[error("device count must be at least 1")]
    NoDevices,
    #[error("failed to parse base template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
