use std::path::PathBuf;

use crate::app::ports::ExportSourcePort;
use crate::pipeline::ingestion::{load_platform_export, PlatformExport};

/// Reads scraper exports from a directory on disk
pub struct DirectoryExportSource {
    raw_dir: PathBuf,
}

impl DirectoryExportSource {
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self { raw_dir: raw_dir.into() }
    }
}

impl ExportSourcePort for DirectoryExportSource {
    fn load_export(&self, platform: &str, pattern: &str) -> PlatformExport {
        load_platform_export(&self.raw_dir, platform, pattern)
    }
}
