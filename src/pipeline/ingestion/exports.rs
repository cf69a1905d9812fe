use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};

use super::RawListing;
use crate::observability::metrics;

/// Rows read from one platform's most recent export.
#[derive(Debug, Clone, Default)]
pub struct PlatformExport {
    pub platform: String,
    pub path: Option<PathBuf>,
    pub rows: Vec<RawListing>,
    /// Records the CSV reader could not decode
    pub skipped_rows: usize,
}

impl PlatformExport {
    fn missing(platform: &str) -> Self {
        Self {
            platform: platform.to_string(),
            ..Self::default()
        }
    }
}

fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).ok()
}

/// Most recent export in `dir` whose file name matches `pattern`.
///
/// Scraper exports carry a sortable timestamp suffix, so "most recent" is the
/// lexicographically last matching name.
pub fn latest_export(dir: &Path, pattern: &str) -> Option<PathBuf> {
    let matcher = wildcard_regex(pattern)?;
    let entries = fs::read_dir(dir).ok()?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| matcher.is_match(n))
                .unwrap_or(false)
        })
        .collect();

    candidates.sort();
    candidates.pop()
}

/// Load one platform's export. Never fails: an absent or unreadable export
/// contributes zero rows and a warning.
pub fn load_platform_export(dir: &Path, platform: &str, pattern: &str) -> PlatformExport {
    let Some(path) = latest_export(dir, pattern) else {
        warn!(platform, pattern, "No export found, platform contributes zero rows");
        metrics::ingestion::source_missing(platform);
        return PlatformExport::missing(platform);
    };

    let mut reader = match csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(&path)
    {
        Ok(reader) => reader,
        Err(e) => {
            warn!(platform, path = %path.display(), error = %e, "Export unreadable, skipping platform");
            metrics::ingestion::source_missing(platform);
            return PlatformExport::missing(platform);
        }
    };

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect(),
        Err(e) => {
            warn!(platform, path = %path.display(), error = %e, "Export has no readable header, skipping platform");
            metrics::ingestion::source_missing(platform);
            return PlatformExport::missing(platform);
        }
    };

    let mut rows = Vec::new();
    let mut skipped_rows = 0;
    for (row_index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let fields: HashMap<String, String> = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.clone(), v.to_string()))
                    .collect();
                rows.push(RawListing::new(platform, row_index, fields));
            }
            Err(e) => {
                debug!(platform, row_index, error = %e, "Skipping undecodable record");
                skipped_rows += 1;
            }
        }
    }

    if rows.is_empty() {
        warn!(platform, path = %path.display(), "Export is empty");
    } else {
        info!(platform, path = %path.display(), rows = rows.len(), "Loaded export");
    }
    metrics::ingestion::rows_loaded(platform, rows.len());

    PlatformExport {
        platform: platform.to_string(),
        path: Some(path),
        rows,
        skipped_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn picks_lexicographically_last_match() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "gumtree_final_20250101.csv", "url\n");
        write(dir.path(), "gumtree_final_20250301.csv", "url\n");
        write(dir.path(), "gumtree_draft_20251231.csv", "url\n");

        let picked = latest_export(dir.path(), "gumtree_final*.csv").unwrap();
        assert!(picked.ends_with("gumtree_final_20250301.csv"));
    }

    #[test]
    fn pattern_dots_are_literal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "petify_data_cleanXcsv", "url\n");
        assert!(latest_export(dir.path(), "petify_data_clean*.csv").is_none());
    }

    #[test]
    fn absent_export_yields_zero_rows() {
        let dir = tempfile::tempdir().unwrap();
        let export = load_platform_export(dir.path(), "preloved", "preloved_enriched*.csv");
        assert!(export.rows.is_empty());
        assert!(export.path.is_none());
    }

    #[test]
    fn rows_keep_input_order_and_all_columns() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "puppies_final_1.csv",
            "\u{feff}ad_reference,breed,extra\n101,Beagle,x\n102,Pug,y\n",
        );

        let export = load_platform_export(dir.path(), "puppies", "puppies_final*.csv");
        assert_eq!(export.rows.len(), 2);
        assert_eq!(export.rows[0].row_index, 0);
        assert_eq!(export.rows[1].value("ad_reference"), Some("102"));
        assert_eq!(export.rows[1].value("extra"), Some("y"));
    }
}
