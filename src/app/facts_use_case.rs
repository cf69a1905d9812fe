use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::app::ports::{ExportSourcePort, FactsStorePort};
use crate::pipeline::ingestion::RawListing;
use crate::pipeline::processing::normalize::{PlatformRegistry, SchemaMapper};
use crate::schema::CanonicalSchema;

/// Outcome of building the facts table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactsReport {
    pub platforms_loaded: Vec<String>,
    pub platforms_missing: Vec<String>,
    pub rows_written: usize,
    pub skipped_rows: usize,
}

/// Use case for mapping every platform export into canonical facts
pub struct FactsUseCase<'a> {
    registry: &'a PlatformRegistry,
    schema: &'a CanonicalSchema,
    source: Box<dyn ExportSourcePort + 'a>,
    output: Box<dyn FactsStorePort + 'a>,
}

impl<'a> FactsUseCase<'a> {
    pub fn new(
        registry: &'a PlatformRegistry,
        schema: &'a CanonicalSchema,
        source: Box<dyn ExportSourcePort + 'a>,
        output: Box<dyn FactsStorePort + 'a>,
    ) -> Self {
        Self {
            registry,
            schema,
            source,
            output,
        }
    }

    pub fn execute(&self) -> Result<FactsReport> {
        let mut report = FactsReport::default();
        let mut exports: Vec<(String, Vec<RawListing>)> = Vec::new();

        for profile in self.registry.profiles() {
            let export = self.source.load_export(profile.id(), profile.file_pattern());
            report.skipped_rows += export.skipped_rows;
            if export.rows.is_empty() {
                report.platforms_missing.push(profile.id().to_string());
            } else {
                report.platforms_loaded.push(profile.id().to_string());
            }
            exports.push((export.platform, export.rows));
        }

        if report.platforms_loaded.is_empty() {
            warn!("No platform exports contained rows");
        }

        let facts = SchemaMapper::new(self.schema, self.registry)
            .map_all(&exports)
            .context("Failed to map platform exports")?;

        self.output
            .write_facts(self.schema, &facts)
            .with_context(|| format!("Failed to write facts to {}", self.output.location().display()))?;

        report.rows_written = facts.len();
        info!(
            rows = report.rows_written,
            loaded = report.platforms_loaded.len(),
            missing = ?report.platforms_missing,
            path = %self.output.location().display(),
            "Facts table written"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;
    use crate::pipeline::ingestion::PlatformExport;
    use crate::pipeline::processing::normalize::CanonicalFact;
    use crate::schema::CanonicalField;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;
    use std::rc::Rc;

    struct StubSource;

    impl ExportSourcePort for StubSource {
        fn load_export(&self, platform: &str, _pattern: &str) -> PlatformExport {
            let rows = match platform {
                "gumtree" => vec![RawListing::new(
                    "gumtree",
                    0,
                    HashMap::from([
                        ("title".to_string(), "Labrador pups".to_string()),
                        ("posted".to_string(), "2 days ago".to_string()),
                    ]),
                )],
                _ => Vec::new(),
            };
            PlatformExport {
                platform: platform.to_string(),
                path: None,
                rows,
                skipped_rows: 0,
            }
        }
    }

    struct MockFactsStore {
        written: Rc<RefCell<Vec<CanonicalFact>>>,
    }

    impl FactsStorePort for MockFactsStore {
        fn write_facts(&self, _schema: &CanonicalSchema, facts: &[CanonicalFact]) -> error::Result<()> {
            self.written.borrow_mut().extend_from_slice(facts);
            Ok(())
        }

        fn read_facts(&self, _schema: &CanonicalSchema) -> error::Result<Vec<CanonicalFact>> {
            Ok(self.written.borrow().clone())
        }

        fn location(&self) -> &Path {
            Path::new("memory")
        }
    }

    #[test]
    fn missing_platforms_contribute_zero_rows() {
        let registry = PlatformRegistry::new();
        let schema = CanonicalSchema::builtin();
        let written = Rc::new(RefCell::new(Vec::new()));
        let use_case = FactsUseCase::new(
            &registry,
            &schema,
            Box::new(StubSource),
            Box::new(MockFactsStore {
                written: written.clone(),
            }),
        );

        let report = use_case.execute().unwrap();
        assert_eq!(report.platforms_loaded, vec!["gumtree".to_string()]);
        assert_eq!(report.platforms_missing.len(), 8);
        assert_eq!(report.rows_written, 1);

        let facts = written.borrow();
        assert_eq!(facts[0].get(CanonicalField::PublishedAt), Some("2 days ago"));
        assert_eq!(facts[0].get(CanonicalField::Title), Some("Labrador pups"));
    }
}
