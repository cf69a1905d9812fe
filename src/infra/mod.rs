// File-backed implementations of the application ports

pub mod export_source_adapter;
pub mod facts_csv_adapter;
pub mod derived_csv_adapter;
pub mod metrics_json_adapter;

use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Create the parent directory of an output file
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// A stage's required input must exist
pub(crate) fn require_input(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::MissingInput(path.display().to_string()))
    }
}

pub(crate) fn malformed(path: &Path, message: impl Into<String>) -> PipelineError {
    PipelineError::MalformedInput {
        path: path.display().to_string(),
        message: message.into(),
    }
}
