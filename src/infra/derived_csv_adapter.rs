use chrono::{DateTime, Utc};
use csv::StringRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use super::{ensure_parent_dir, malformed, require_input};
use crate::app::ports::DerivedStorePort;
use crate::constants::LIST_SEPARATOR;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::availability::{Availability, AvailabilityState};
use crate::pipeline::processing::conflation::{DedupAnnotation, DedupStatus};
use crate::pipeline::processing::derive::timestamps::format_timestamp;
use crate::pipeline::processing::derive::{DerivedRecord, QuantitySource, TypedNumbers, TypedTimestamps};
use crate::pipeline::processing::identity::{RescueReason, SellerAnnotation};
use crate::pipeline::processing::normalize::CanonicalFact;
use crate::pipeline::processing::quality_gate::QualityFlag;
use crate::schema::{CanonicalField, CanonicalSchema};

/// Typed, derived and tag columns written after the canonical ones
pub const DERIVED_COLUMNS: [&str; 34] = [
    "asof_ts",
    "created_at_ts",
    "published_at_ts",
    "refreshed_at_ts",
    "date_of_birth_ts",
    "ready_to_leave_parsed_ts",
    "member_since_ts",
    "last_active_ts",
    "price_num",
    "males_available_num",
    "females_available_num",
    "total_available_num",
    "views_count_num",
    "reviews_num",
    "rating_num",
    "quantity",
    "quantity_source",
    "age_days",
    "age_weeks",
    "listing_age_days",
    "availability_state",
    "ready_to_leave_ts",
    "days_until_ready",
    "is_ready_now",
    "is_waiting_list",
    "availability_known",
    "quality_flags",
    "dedup_status",
    "listing_id",
    "dedup_group_id",
    "seller_key",
    "is_rescue",
    "rescue_reason",
    "is_high_volume_seller",
];

fn ts_cell(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| format_timestamp(&t)).unwrap_or_default()
}

fn num_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn derived_cells(record: &DerivedRecord) -> Vec<String> {
    let t = &record.timestamps;
    let n = &record.numbers;
    let a = &record.availability;
    let flags: Vec<String> = record.quality_flags.iter().map(|f| f.to_string()).collect();

    vec![
        format_timestamp(&record.asof_ts),
        ts_cell(t.created_at),
        ts_cell(t.published_at),
        ts_cell(t.refreshed_at),
        ts_cell(t.date_of_birth),
        ts_cell(t.ready_to_leave),
        ts_cell(t.member_since),
        ts_cell(t.last_active),
        num_cell(n.price),
        num_cell(n.males_available),
        num_cell(n.females_available),
        num_cell(n.total_available),
        num_cell(n.views_count),
        num_cell(n.reviews),
        num_cell(n.rating),
        num_cell(record.quantity),
        record.quantity_source.as_str().to_string(),
        num_cell(record.age_days),
        num_cell(record.age_weeks),
        num_cell(record.listing_age_days),
        a.state.as_str().to_string(),
        ts_cell(a.ready_ts),
        num_cell(a.days_until_ready),
        a.is_ready_now.to_string(),
        a.is_waiting_list.to_string(),
        a.availability_known.to_string(),
        flags.join(&LIST_SEPARATOR.to_string()),
        record.dedup.status.as_str().to_string(),
        record.dedup.listing_id.clone().unwrap_or_default(),
        record.dedup.group_id.clone().unwrap_or_default(),
        record.seller.key.clone(),
        record.seller.is_rescue.to_string(),
        record.seller.rescue_reason.map(|r| r.as_str().to_string()).unwrap_or_default(),
        record.seller.is_high_volume.to_string(),
    ]
}

/// One derived-table row with typed accessors
struct Row<'r> {
    record: &'r StringRecord,
    columns: &'r HashMap<String, usize>,
    path: &'r Path,
    line: usize,
}

impl<'r> Row<'r> {
    fn text(&self, column: &str) -> Option<&'r str> {
        let idx = *self.columns.get(column)?;
        self.record.get(idx).map(str::trim).filter(|v| !v.is_empty())
    }

    fn error(&self, column: &str, value: &str) -> PipelineError {
        malformed(self.path, format!("row {}: invalid {column} value '{value}'", self.line))
    }

    fn parse<T: FromStr>(&self, column: &str) -> Result<Option<T>> {
        match self.text(column) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| self.error(column, raw)),
        }
    }

    fn timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        match self.text(column) {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(|_| self.error(column, raw)),
        }
    }

    fn flag(&self, column: &str) -> Result<bool> {
        Ok(self.parse::<bool>(column)?.unwrap_or(false))
    }

    fn label<T>(&self, column: &str, from_label: fn(&str) -> Option<T>) -> Result<Option<T>> {
        match self.text(column) {
            None => Ok(None),
            Some(raw) => from_label(raw).map(Some).ok_or_else(|| self.error(column, raw)),
        }
    }

    fn to_record(&self, canonical: &[(usize, CanonicalField)]) -> Result<DerivedRecord> {
        let platform = self
            .text("platform")
            .ok_or_else(|| malformed(self.path, format!("row {} has no platform", self.line)))?;
        let row_index = self
            .parse::<usize>("row_index")?
            .ok_or_else(|| malformed(self.path, format!("row {} has no row_index", self.line)))?;

        let mut fact = CanonicalFact::new(platform, row_index);
        for (idx, field) in canonical {
            if let Some(value) = self.record.get(*idx) {
                fact.set(*field, value);
            }
        }

        let asof_ts = self
            .timestamp("asof_ts")?
            .ok_or_else(|| malformed(self.path, format!("row {} has no asof_ts", self.line)))?;

        let quality_flags = match self.text("quality_flags") {
            None => Vec::new(),
            Some(raw) => raw
                .split(LIST_SEPARATOR)
                .map(|flag| QualityFlag::parse(flag.trim()).ok_or_else(|| self.error("quality_flags", flag)))
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(DerivedRecord {
            fact,
            asof_ts,
            timestamps: TypedTimestamps {
                created_at: self.timestamp("created_at_ts")?,
                published_at: self.timestamp("published_at_ts")?,
                refreshed_at: self.timestamp("refreshed_at_ts")?,
                date_of_birth: self.timestamp("date_of_birth_ts")?,
                ready_to_leave: self.timestamp("ready_to_leave_parsed_ts")?,
                member_since: self.timestamp("member_since_ts")?,
                last_active: self.timestamp("last_active_ts")?,
            },
            numbers: TypedNumbers {
                price: self.parse("price_num")?,
                males_available: self.parse("males_available_num")?,
                females_available: self.parse("females_available_num")?,
                total_available: self.parse("total_available_num")?,
                views_count: self.parse("views_count_num")?,
                reviews: self.parse("reviews_num")?,
                rating: self.parse("rating_num")?,
            },
            quantity: self.parse("quantity")?,
            quantity_source: self
                .label("quantity_source", QuantitySource::from_label)?
                .unwrap_or(QuantitySource::Unresolved),
            age_days: self.parse("age_days")?,
            age_weeks: self.parse("age_weeks")?,
            listing_age_days: self.parse("listing_age_days")?,
            availability: Availability {
                state: self
                    .label("availability_state", AvailabilityState::from_label)?
                    .unwrap_or(AvailabilityState::Missing),
                ready_ts: self.timestamp("ready_to_leave_ts")?,
                days_until_ready: self.parse("days_until_ready")?,
                is_ready_now: self.flag("is_ready_now")?,
                is_waiting_list: self.flag("is_waiting_list")?,
                availability_known: self.flag("availability_known")?,
            },
            quality_flags,
            dedup: DedupAnnotation {
                status: self
                    .label("dedup_status", DedupStatus::from_label)?
                    .unwrap_or(DedupStatus::Unique),
                listing_id: self.text("listing_id").map(str::to_string),
                group_id: self.text("dedup_group_id").map(str::to_string),
            },
            seller: SellerAnnotation {
                key: self
                    .text("seller_key")
                    .map(str::to_string)
                    .unwrap_or_else(|| SellerAnnotation::default().key),
                is_rescue: self.flag("is_rescue")?,
                rescue_reason: self.label("rescue_reason", RescueReason::from_label)?,
                is_high_volume: self.flag("is_high_volume_seller")?,
            },
        })
    }
}

/// `derived.csv`: canonical columns, then every typed, derived and tag column.
/// Timestamps are RFC 3339; tag lists are `;`-joined.
pub struct DerivedCsvAdapter {
    path: PathBuf,
}

impl DerivedCsvAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DerivedStorePort for DerivedCsvAdapter {
    fn write_derived(&self, schema: &CanonicalSchema, records: &[DerivedRecord]) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let mut writer = csv::Writer::from_path(&self.path)?;

        let mut header = vec!["platform", "row_index"];
        header.extend(schema.fields().iter().map(|f| f.as_str()));
        header.extend(DERIVED_COLUMNS);
        writer.write_record(&header)?;

        for record in records {
            let mut row = vec![record.fact.platform.clone(), record.fact.row_index.to_string()];
            row.extend(
                schema
                    .fields()
                    .iter()
                    .map(|f| record.get(*f).unwrap_or_default().to_string()),
            );
            row.extend(derived_cells(record));
            writer.write_record(&row)?;
        }
        writer.flush()?;

        debug!(path = %self.path.display(), rows = records.len(), "Wrote derived view");
        Ok(())
    }

    fn read_derived(&self, schema: &CanonicalSchema) -> Result<Vec<DerivedRecord>> {
        require_input(&self.path)?;
        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers = reader.headers()?.clone();

        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_string(), idx))
            .collect();

        let missing: Vec<&str> = ["platform", "row_index"]
            .into_iter()
            .chain(DERIVED_COLUMNS)
            .filter(|c| !columns.contains_key(*c))
            .collect();
        if !missing.is_empty() {
            return Err(malformed(&self.path, format!("missing columns: {}", missing.join(", "))));
        }

        let canonical: Vec<(usize, CanonicalField)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| CanonicalField::from_name(name).map(|f| (idx, f)))
            .filter(|(_, f)| schema.contains(*f))
            .collect();

        let mut records = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let row = Row {
                record: &record,
                columns: &columns,
                path: &self.path,
                line: line + 1,
            };
            records.push(row.to_record(&canonical)?);
        }

        debug!(path = %self.path.display(), rows = records.len(), "Read derived view");
        Ok(records)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuantityConfig;
    use crate::pipeline::processing::availability::{AvailabilityResolver, AvailabilityRule};
    use crate::pipeline::processing::derive::TypedFieldDeriver;
    use crate::pipeline::processing::quality_gate::{DefaultQualityGate, QualityGate};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample() -> DerivedRecord {
        let asof = Utc.with_ymd_and_hms(2026, 1, 22, 0, 0, 0).unwrap();
        let fact = CanonicalFact::new("gumtree", 4)
            .with(CanonicalField::Title, "Labrador; 3 left")
            .with(CanonicalField::PublishedAt, "2026-01-10")
            .with(CanonicalField::ReadyToLeave, "in 2 weeks")
            .with(CanonicalField::TotalAvailable, "2026")
            .with(CanonicalField::MalesAvailable, "3")
            .with(CanonicalField::FemalesAvailable, "2")
            .with(CanonicalField::Price, "£650.50");
        let derived = TypedFieldDeriver::new(&QuantityConfig::default(), asof).derive(fact);
        let mut record = AvailabilityResolver::new(Default::default())
            .apply(AvailabilityRule::RelativePhrase, DefaultQualityGate::new().assess(derived));
        record.dedup.listing_id = Some("1498765432".to_string());
        record.dedup.group_id = Some("0123456789ab".to_string());
        record.seller.key = "Jo|Leeds".to_string();
        record
    }

    #[test]
    fn derived_records_survive_a_write_and_read() {
        let dir = TempDir::new().unwrap();
        let adapter = DerivedCsvAdapter::new(dir.path().join("views/derived.csv"));
        let schema = CanonicalSchema::builtin();
        let records = vec![sample()];

        adapter.write_derived(&schema, &records).unwrap();
        let read = adapter.read_derived(&schema).unwrap();
        assert_eq!(read, records);
        assert_eq!(read[0].quality_flags.len(), 2);
    }

    #[test]
    fn sub_second_timestamps_survive_a_write_and_read() {
        let dir = TempDir::new().unwrap();
        let adapter = DerivedCsvAdapter::new(dir.path().join("derived.csv"));
        let schema = CanonicalSchema::builtin();
        let mut record = sample();
        record.asof_ts = Utc.with_ymd_and_hms(2026, 1, 22, 9, 15, 30).unwrap() + chrono::Duration::microseconds(123_456);
        record.timestamps.published_at = Some(Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap() + chrono::Duration::milliseconds(5));

        adapter.write_derived(&schema, std::slice::from_ref(&record)).unwrap();
        let read = adapter.read_derived(&schema).unwrap();
        assert_eq!(read[0].asof_ts, record.asof_ts);
        assert_eq!(read[0].timestamps.published_at, record.timestamps.published_at);
    }

    #[test]
    fn flags_and_timestamps_are_rendered_as_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("derived.csv");
        DerivedCsvAdapter::new(&path)
            .write_derived(&CanonicalSchema::builtin(), &[sample()])
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("total_available:year_like;total_available:rederived_gender_split"));
        assert!(content.contains("2026-01-24T00:00:00Z"));
    }

    #[test]
    fn missing_derived_columns_are_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("derived.csv");
        std::fs::write(&path, "platform,row_index,title\ngumtree,0,Pug\n").unwrap();
        let err = DerivedCsvAdapter::new(&path)
            .read_derived(&CanonicalSchema::builtin())
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }

    #[test]
    fn unknown_status_label_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("derived.csv");
        let adapter = DerivedCsvAdapter::new(&path);
        adapter.write_derived(&CanonicalSchema::builtin(), &[sample()]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap().replace(",unique,", ",maybe,");
        std::fs::write(&path, content).unwrap();
        assert!(adapter.read_derived(&CanonicalSchema::builtin()).is_err());
    }
}
