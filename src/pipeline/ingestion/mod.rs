// Pipeline ingestion: locating and reading per-platform scraper exports

pub mod exports;

use std::collections::HashMap;

pub use exports::{latest_export, load_platform_export, PlatformExport};

/// One scraped ad as delivered by a platform export.
///
/// All values are opaque strings; nothing is interpreted at this stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    pub platform: String,
    /// 0-based position in the export, the stable tie-break downstream
    pub row_index: usize,
    pub fields: HashMap<String, String>,
}

impl RawListing {
    pub fn new(platform: impl Into<String>, row_index: usize, fields: HashMap<String, String>) -> Self {
        Self {
            platform: platform.into(),
            row_index,
            fields,
        }
    }

    /// Trimmed, non-empty value of a raw column
    pub fn value(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
