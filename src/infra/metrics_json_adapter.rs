use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use super::ensure_parent_dir;
use crate::app::ports::MetricsOutputPort;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::aggregate::MetricsSnapshot;

/// Compiled JSON Schema for the published metrics document
pub struct MetricsContract {
    compiled: JSONSchema,
}

impl MetricsContract {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| PipelineError::Schema(format!("cannot read {}: {e}", path.display())))?;
        Self::from_str(&raw)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(raw: &str) -> Result<Self> {
        let schema: Value = serde_json::from_str(raw)?;
        // jsonschema 0.17 compiles against a 'static document; contracts live for the whole run
        let schema_static: &'static Value = Box::leak(Box::new(schema));
        let compiled = JSONSchema::options()
            .compile(schema_static)
            .map_err(|e| PipelineError::Schema(format!("metrics contract does not compile: {e}")))?;
        Ok(Self { compiled })
    }

    /// Each violation as "message at /instance/path"; empty when valid
    pub fn violations(&self, instance: &Value) -> Vec<String> {
        match self.compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| format!("{} at {}", e, e.instance_path)).collect(),
        }
    }

    pub fn validate(&self, instance: &Value) -> Result<()> {
        let violations = self.violations(instance);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Contract(violations.join("; ")))
        }
    }
}

/// `metrics.json`, checked against the contract before anything is written
pub struct MetricsJsonAdapter {
    path: PathBuf,
    contract: MetricsContract,
}

impl MetricsJsonAdapter {
    pub fn new(path: impl Into<PathBuf>, contract: MetricsContract) -> Self {
        Self {
            path: path.into(),
            contract,
        }
    }
}

impl MetricsOutputPort for MetricsJsonAdapter {
    fn write_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let document = serde_json::to_value(snapshot)?;
        if let Err(e) = self.contract.validate(&document) {
            error!(error = %e, "Metrics snapshot violates its contract");
            return Err(e);
        }

        ensure_parent_dir(&self.path)?;
        fs::write(&self.path, serde_json::to_string_pretty(&document)?)?;
        debug!(path = %self.path.display(), "Wrote metrics snapshot");
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::pipeline::processing::aggregate::{Aggregator, SnapshotContext};
    use tempfile::TempDir;

    const CONTRACT: &str = include_str!("../../schemas/metrics_snapshot.v1.json");

    fn empty_snapshot() -> MetricsSnapshot {
        let context = SnapshotContext {
            run_id: "3f1c2a9e-6b7d-4e0f-9a51-2c8d7e6f1b04".to_string(),
            generated_at: "2026-01-22T09:00:00Z".to_string(),
            as_of: "2026-01-22T00:00:00Z".to_string(),
        };
        Aggregator::new(MetricsConfig::default()).snapshot(&[], &context)
    }

    #[test]
    fn writes_a_valid_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics/metrics.json");
        let adapter = MetricsJsonAdapter::new(&path, MetricsContract::from_str(CONTRACT).unwrap());

        adapter.write_snapshot(&empty_snapshot()).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["schema_version"], "metrics_snapshot.v1");
        assert_eq!(written["summary"]["raw_listings"], 0);
    }

    #[test]
    fn contract_violation_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        let strict = r#"{"type": "object", "required": ["never_present"]}"#;
        let adapter = MetricsJsonAdapter::new(&path, MetricsContract::from_str(strict).unwrap());

        let err = adapter.write_snapshot(&empty_snapshot()).unwrap_err();
        assert!(matches!(err, PipelineError::Contract(_)));
        assert!(!path.exists());
    }

    #[test]
    fn unreadable_contract_is_a_schema_error() {
        let dir = TempDir::new().unwrap();
        let err = MetricsContract::load(&dir.path().join("missing.json")).err().unwrap();
        assert!(matches!(err, PipelineError::Schema(_)));
    }
}
