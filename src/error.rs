use thiserror::Error;

/// Structural failures that abort a pipeline run.
///
/// Per-row problems (a missing export, an unparseable field, an implausible
/// value) never surface here; they are recorded on the row and counted in
/// the run report.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Canonical schema error: {0}")]
    Schema(String),

    #[error("Required input missing: {0}")]
    MissingInput(String),

    #[error("Malformed input {path}: {message}")]
    MalformedInput { path: String, message: String },

    #[error("Metrics document violates its contract: {0}")]
    Contract(String),

    #[error("No platform profile registered for: {0}")]
    UnknownPlatform(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
