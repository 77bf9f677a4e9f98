//! Base tuning configuration template.
//!
//! The template is an arbitrary YAML document; synthesis only relies on
//! these slots:
//!
//! ```text
//! GlobalParameters: {...}
//! BenchmarkProblems:
//!   - - {problem type}
//!     - ForkParameters: [{MatrixInstruction: ...}, {GlobalSplitU: ...}, ...]
//!       BenchmarkFinalParameters: [{ProblemSizes: ...}]
//! LibraryLogic: {...}
//! ```

use crate::error::{PipelineError, SynthError};
use anyhow::{Context, Result};
use serde_yaml::{Mapping, Sequence, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const GLOBAL_PARAMETERS: &str = "GlobalParameters";
pub const BENCHMARK_PROBLEMS: &str = "BenchmarkProblems";
pub const LIBRARY_LOGIC: &str = "LibraryLogic";
pub const FORK_PARAMETERS: &str = "ForkParameters";
pub const BENCHMARK_FINAL_PARAMETERS: &str = "BenchmarkFinalParameters";

/// Immutable base document every device configuration is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseTemplate {
    path: PathBuf,
    document: Value,
}

impl BaseTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read base template {}", path.display()))?;
        let document = serde_yaml::from_str(&text).map_err(|source| PipelineError::Template {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path, document))
    }

    pub fn new(path: impl Into<PathBuf>, document: Value) -> Self {
        Self {
            path: path.into(),
            document,
        }
    }

    pub fn from_yaml(path: impl Into<PathBuf>, text: &str) -> Result<Self, serde_yaml::Error> {
        Ok(Self::new(path, serde_yaml::from_str(text)?))
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// `<stem>.<bucket>.<extension>` of the template file name.
    pub fn output_file_name(&self, bucket: usize) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        match self.path.extension() {
            Some(ext) => format!("{stem}.{bucket}.{}", ext.to_string_lossy()),
            None => format!("{stem}.{bucket}"),
        }
    }
}

pub(crate) fn mapping_mut<'a>(
    parent: &'a mut Value,
    key: &str,
    bucket: usize,
) -> Result<&'a mut Mapping, SynthError> {
    parent
        .get_mut(key)
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| missing(bucket, key))
}

pub(crate) fn sequence_mut<'a>(
    parent: &'a mut Value,
    key: &str,
    bucket: usize,
) -> Result<&'a mut Sequence, SynthError> {
    parent
        .get_mut(key)
        .and_then(Value::as_sequence_mut)
        .ok_or_else(|| missing(bucket, key))
}

pub(crate) fn missing(bucket: usize, path: impl Into<String>) -> SynthError {
    SynthError::MissingSlot {
        bucket,
        path: path.into(),
    }
}
