use std::path::{Path, PathBuf};
use tracing::debug;

use super::{ensure_parent_dir, malformed, require_input};
use crate::app::ports::FactsStorePort;
use crate::error::Result;
use crate::pipeline::processing::normalize::CanonicalFact;
use crate::schema::{CanonicalField, CanonicalSchema};

/// `facts.csv`: `platform`, `row_index`, then the schema's fields in order
pub struct FactsCsvAdapter {
    path: PathBuf,
}

impl FactsCsvAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FactsStorePort for FactsCsvAdapter {
    fn write_facts(&self, schema: &CanonicalSchema, facts: &[CanonicalFact]) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let mut writer = csv::Writer::from_path(&self.path)?;

        let mut header = vec!["platform", "row_index"];
        header.extend(schema.fields().iter().map(|f| f.as_str()));
        writer.write_record(&header)?;

        for fact in facts {
            let mut row = vec![fact.platform.clone(), fact.row_index.to_string()];
            row.extend(
                schema
                    .fields()
                    .iter()
                    .map(|f| fact.get(*f).unwrap_or_default().to_string()),
            );
            writer.write_record(&row)?;
        }
        writer.flush()?;

        debug!(path = %self.path.display(), rows = facts.len(), "Wrote facts table");
        Ok(())
    }

    fn read_facts(&self, schema: &CanonicalSchema) -> Result<Vec<CanonicalFact>> {
        require_input(&self.path)?;
        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers = reader.headers()?.clone();

        let column = |name: &str| headers.iter().position(|h| h == name);
        let platform_col = column("platform").ok_or_else(|| malformed(&self.path, "missing `platform` column"))?;
        let row_col = column("row_index").ok_or_else(|| malformed(&self.path, "missing `row_index` column"))?;

        let fields: Vec<(usize, CanonicalField)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| CanonicalField::from_name(name).map(|f| (idx, f)))
            .filter(|(_, f)| schema.contains(*f))
            .collect();

        let mut facts = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let platform = record.get(platform_col).unwrap_or_default().trim();
            if platform.is_empty() {
                return Err(malformed(&self.path, format!("row {} has no platform", line + 1)));
            }
            let row_index: usize = record
                .get(row_col)
                .and_then(|v| v.trim().parse().ok())
                .ok_or_else(|| malformed(&self.path, format!("row {} has an invalid row_index", line + 1)))?;

            let mut fact = CanonicalFact::new(platform, row_index);
            for (idx, field) in &fields {
                if let Some(value) = record.get(*idx) {
                    fact.set(*field, value);
                }
            }
            facts.push(fact);
        }

        debug!(path = %self.path.display(), rows = facts.len(), "Read facts table");
        Ok(facts)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use tempfile::TempDir;

    #[test]
    fn facts_survive_a_write_and_read() {
        let dir = TempDir::new().unwrap();
        let adapter = FactsCsvAdapter::new(dir.path().join("facts/facts.csv"));
        let schema = CanonicalSchema::builtin();
        let facts = vec![
            CanonicalFact::new("pets4homes", 0)
                .with(CanonicalField::Title, "Cockapoo, 8 weeks")
                .with(CanonicalField::Price, "£950"),
            CanonicalFact::new("gumtree", 3).with(CanonicalField::Breed, "Pug"),
        ];

        adapter.write_facts(&schema, &facts).unwrap();
        assert_eq!(adapter.read_facts(&schema).unwrap(), facts);
    }

    #[test]
    fn header_lists_platform_then_schema_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("facts.csv");
        let schema = CanonicalSchema::from_names(&["title", "price"]).unwrap();
        FactsCsvAdapter::new(&path).write_facts(&schema, &[]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("platform,row_index,title,price"));
    }

    #[test]
    fn missing_file_is_structural() {
        let dir = TempDir::new().unwrap();
        let adapter = FactsCsvAdapter::new(dir.path().join("absent.csv"));
        let err = adapter.read_facts(&CanonicalSchema::builtin()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn missing_platform_column_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("facts.csv");
        std::fs::write(&path, "row_index,title\n0,Pug\n").unwrap();
        let err = FactsCsvAdapter::new(&path).read_facts(&CanonicalSchema::builtin()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }
}
