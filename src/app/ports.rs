use std::path::Path;

use crate::error::Result;
use crate::pipeline::ingestion::PlatformExport;
use crate::pipeline::processing::aggregate::MetricsSnapshot;
use crate::pipeline::processing::derive::DerivedRecord;
use crate::pipeline::processing::normalize::CanonicalFact;
use crate::schema::CanonicalSchema;

/// Source of raw per-platform scraper exports
pub trait ExportSourcePort {
    /// Most recent export matching `pattern`. A missing or unreadable export
    /// yields zero rows, never an error.
    fn load_export(&self, platform: &str, pattern: &str) -> PlatformExport;
}

/// The authoritative facts table
pub trait FactsStorePort {
    fn write_facts(&self, schema: &CanonicalSchema, facts: &[CanonicalFact]) -> Result<()>;
    fn read_facts(&self, schema: &CanonicalSchema) -> Result<Vec<CanonicalFact>>;
    fn location(&self) -> &Path;
}

/// The derived view: canonical, typed, derived and tag columns
pub trait DerivedStorePort {
    fn write_derived(&self, schema: &CanonicalSchema, records: &[DerivedRecord]) -> Result<()>;
    fn read_derived(&self, schema: &CanonicalSchema) -> Result<Vec<DerivedRecord>>;
    fn location(&self) -> &Path;
}

pub trait MetricsOutputPort {
    fn write_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<()>;
    fn location(&self) -> &Path;
}
