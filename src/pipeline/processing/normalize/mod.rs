//! Schema mapping: per-platform raw rows into one canonical fact table.

pub mod platforms;
pub mod registry;

use std::collections::BTreeMap;

use tracing::{debug, info};

pub use platforms::PlatformProfile;
pub use registry::PlatformRegistry;

use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::RawListing;
use crate::schema::{CanonicalField, CanonicalSchema};

/// A raw listing expressed in the canonical schema.
///
/// Values are the trimmed raw strings; absent keys are nulls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalFact {
    pub platform: String,
    pub row_index: usize,
    pub values: BTreeMap<CanonicalField, String>,
}

impl CanonicalFact {
    pub fn new(platform: impl Into<String>, row_index: usize) -> Self {
        Self {
            platform: platform.into(),
            row_index,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Set a value; blank input is stored as null
    pub fn set(&mut self, field: CanonicalField, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value.to_string());
        }
    }

    pub fn with(mut self, field: CanonicalField, value: &str) -> Self {
        self.set(field, value);
        self
    }

    /// Number of populated canonical fields
    pub fn populated_count(&self) -> usize {
        self.values.len()
    }
}

/// Maps raw platform rows into canonical facts. No value is parsed here.
pub struct SchemaMapper<'a> {
    schema: &'a CanonicalSchema,
    registry: &'a PlatformRegistry,
}

impl<'a> SchemaMapper<'a> {
    pub fn new(schema: &'a CanonicalSchema, registry: &'a PlatformRegistry) -> Self {
        Self { schema, registry }
    }

    /// Map one raw row. Fields targeted by several raw columns take the first
    /// non-empty value in table order; fields outside the schema are dropped.
    pub fn map_row(&self, profile: &dyn PlatformProfile, raw: &RawListing) -> CanonicalFact {
        let mut fact = CanonicalFact::new(profile.id(), raw.row_index);

        for (raw_column, field) in profile.field_map() {
            if !self.schema.contains(*field) || fact.values.contains_key(field) {
                continue;
            }
            if let Some(value) = raw.value(raw_column) {
                fact.set(*field, value);
            }
        }

        fact
    }

    /// Map every row of one platform's export, preserving input order.
    pub fn map_rows(&self, platform: &str, rows: &[RawListing]) -> Result<Vec<CanonicalFact>> {
        let profile = self
            .registry
            .get(platform)
            .ok_or_else(|| PipelineError::UnknownPlatform(platform.to_string()))?;

        let facts: Vec<CanonicalFact> = rows.iter().map(|raw| self.map_row(profile, raw)).collect();

        debug!(platform, rows = facts.len(), "Mapped rows to canonical schema");
        metrics::normalize::records_mapped(platform, facts.len());
        Ok(facts)
    }

    /// Map every platform's rows in registry order, then row order.
    pub fn map_all(&self, exports: &[(String, Vec<RawListing>)]) -> Result<Vec<CanonicalFact>> {
        let mut ordered: Vec<&(String, Vec<RawListing>)> = exports.iter().collect();
        ordered.sort_by_key(|(platform, _)| self.registry.rank(platform));

        let mut all = Vec::new();
        for (platform, rows) in ordered {
            all.extend(self.map_rows(platform, rows)?);
        }
        info!(rows = all.len(), "Canonical fact table built");
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn raw(platform: &str, pairs: &[(&str, &str)]) -> RawListing {
        let fields: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawListing::new(platform, 0, fields)
    }

    #[test]
    fn renames_platform_columns() {
        let schema = CanonicalSchema::builtin();
        let registry = PlatformRegistry::new();
        let mapper = SchemaMapper::new(&schema, &registry);

        let facts = mapper
            .map_rows(
                "champdogs",
                &[raw("champdogs", &[("listing_id", "C-77"), ("kennel_name", "Oakridge"), ("junk", "x")])],
            )
            .unwrap();

        assert_eq!(facts[0].get(CanonicalField::AdId), Some("C-77"));
        assert_eq!(facts[0].get(CanonicalField::CompanyName), Some("Oakridge"));
        assert_eq!(facts[0].populated_count(), 2);
    }

    #[test]
    fn first_non_empty_fallback_wins() {
        let schema = CanonicalSchema::builtin();
        let registry = PlatformRegistry::new();
        let mapper = SchemaMapper::new(&schema, &registry);

        let primary = raw("kennel_club", &[("location", "Leeds"), ("county", "West Yorkshire")]);
        let fallback = raw("kennel_club", &[("location", "  "), ("county", "West Yorkshire")]);

        let facts = mapper.map_rows("kennel_club", &[primary, fallback]).unwrap();
        assert_eq!(facts[0].get(CanonicalField::Location), Some("Leeds"));
        assert_eq!(facts[1].get(CanonicalField::Location), Some("West Yorkshire"));
    }

    #[test]
    fn values_are_not_parsed() {
        let schema = CanonicalSchema::builtin();
        let registry = PlatformRegistry::new();
        let mapper = SchemaMapper::new(&schema, &registry);

        let fact = mapper
            .map_rows("gumtree", &[raw("gumtree", &[("price", " £1,200 "), ("posted", "3 days ago")])])
            .unwrap()
            .remove(0);
        assert_eq!(fact.get(CanonicalField::Price), Some("£1,200"));
        assert_eq!(fact.get(CanonicalField::PublishedAt), Some("3 days ago"));
    }

    #[test]
    fn mapping_is_idempotent() {
        let schema = CanonicalSchema::builtin();
        let registry = PlatformRegistry::new();
        let mapper = SchemaMapper::new(&schema, &registry);
        let row = raw("freeads", &[("title", "Pug pups"), ("age", ""), ("puppy_age", "6 weeks")]);

        let first = mapper.map_rows("freeads", &[row.clone()]).unwrap();
        let second = mapper.map_rows("freeads", &[row]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].get(CanonicalField::Age), Some("6 weeks"));
    }

    #[test]
    fn fields_outside_schema_are_dropped() {
        let schema = CanonicalSchema::from_names(&["url", "breed"]).unwrap();
        let registry = PlatformRegistry::new();
        let mapper = SchemaMapper::new(&schema, &registry);

        let fact = mapper
            .map_rows("petify", &[raw("petify", &[("url", "u"), ("breed", "Pug"), ("price", "100")])])
            .unwrap()
            .remove(0);
        assert_eq!(fact.get(CanonicalField::Price), None);
        assert_eq!(fact.populated_count(), 2);
    }

    #[test]
    fn unknown_platform_is_an_error() {
        let schema = CanonicalSchema::builtin();
        let registry = PlatformRegistry::new();
        let mapper = SchemaMapper::new(&schema, &registry);
        assert!(mapper.map_rows("ebay", &[]).is_err());
    }

    #[test]
    fn map_all_orders_by_platform_rank() {
        let schema = CanonicalSchema::builtin();
        let registry = PlatformRegistry::new();
        let mapper = SchemaMapper::new(&schema, &registry);

        let exports = vec![
            ("champdogs".to_string(), vec![raw("champdogs", &[("breed", "Pug")])]),
            ("pets4homes".to_string(), vec![raw("pets4homes", &[("breed", "Pug")])]),
        ];
        let facts = mapper.map_all(&exports).unwrap();
        assert_eq!(facts[0].platform, "pets4homes");
        assert_eq!(facts[1].platform, "champdogs");
    }
}
