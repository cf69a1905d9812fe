//! Typed field derivation: raw canonical strings into timestamps, numbers,
//! ages and a resolved puppy quantity.

pub mod age;
pub mod numeric;
pub mod quantity;
pub mod timestamps;

use chrono::{DateTime, Utc};
use tracing::debug;

pub use quantity::{QuantityExtractor, QuantityOutcome, QuantitySource};

use crate::config::QuantityConfig;
use crate::observability::metrics;
use crate::pipeline::processing::availability::Availability;
use crate::pipeline::processing::conflation::DedupAnnotation;
use crate::pipeline::processing::identity::SellerAnnotation;
use crate::pipeline::processing::normalize::CanonicalFact;
use crate::pipeline::processing::quality_gate::{QualityFlag, QualityTag};
use crate::schema::CanonicalField;

/// Timestamp columns parsed from their canonical text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedTimestamps {
    pub created_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub date_of_birth: Option<DateTime<Utc>>,
    /// Mechanical parse only; the availability resolver decides what it means
    pub ready_to_leave: Option<DateTime<Utc>>,
    pub member_since: Option<DateTime<Utc>>,
    pub last_active: Option<DateTime<Utc>>,
}

/// Numeric columns parsed from their canonical text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedNumbers {
    pub price: Option<f64>,
    pub males_available: Option<f64>,
    pub females_available: Option<f64>,
    pub total_available: Option<f64>,
    pub views_count: Option<f64>,
    pub reviews: Option<f64>,
    pub rating: Option<f64>,
}

/// A canonical fact plus every typed, derived and tag column.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    pub fact: CanonicalFact,
    /// Run anchor every relative value was resolved against
    pub asof_ts: DateTime<Utc>,
    pub timestamps: TypedTimestamps,
    pub numbers: TypedNumbers,
    /// Resolved puppy count
    pub quantity: Option<i64>,
    pub quantity_source: QuantitySource,
    pub age_days: Option<i64>,
    pub age_weeks: Option<f64>,
    pub listing_age_days: Option<i64>,
    pub availability: Availability,
    pub quality_flags: Vec<QualityFlag>,
    pub dedup: DedupAnnotation,
    pub seller: SellerAnnotation,
}

impl DerivedRecord {
    pub fn platform(&self) -> &str {
        &self.fact.platform
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fact.get(field)
    }

    pub fn has_flag(&self, tag: QualityTag) -> bool {
        self.quality_flags.iter().any(|f| f.tag == tag)
    }
}

/// Age in whole days and weeks. A date of birth wins over free text.
pub fn resolve_age(
    date_of_birth: Option<DateTime<Utc>>,
    age_text: Option<&str>,
    asof: DateTime<Utc>,
) -> (Option<i64>, Option<f64>) {
    let age_days = date_of_birth.map(|dob| timestamps::whole_days_between(dob, asof));
    let age_weeks = age_days
        .map(|d| d as f64 / 7.0)
        .or_else(|| age_text.and_then(age::parse_age_weeks));
    (age_days, age_weeks)
}

pub struct TypedFieldDeriver {
    extractor: QuantityExtractor,
    asof: DateTime<Utc>,
}

impl TypedFieldDeriver {
    pub fn new(config: &QuantityConfig, asof: DateTime<Utc>) -> Self {
        Self {
            extractor: QuantityExtractor::new(config),
            asof,
        }
    }

    fn timestamp(&self, fact: &CanonicalFact, field: CanonicalField, allow_relative: bool) -> Option<DateTime<Utc>> {
        let raw = fact.get(field)?;
        let parsed = if allow_relative {
            timestamps::parse_timestamp_or_relative(raw, self.asof)
        } else {
            timestamps::parse_timestamp(raw)
        };
        if parsed.is_none() {
            metrics::derive::timestamp_parse_failure(field.as_str());
        }
        parsed
    }

    fn number(&self, fact: &CanonicalFact, field: CanonicalField) -> Option<f64> {
        let raw = fact.get(field)?;
        let parsed = numeric::parse_number(raw);
        if parsed.is_none() {
            metrics::derive::numeric_parse_failure(field.as_str());
        }
        parsed
    }

    /// Derive every typed column for one fact. Parse failures become nulls.
    pub fn derive(&self, fact: CanonicalFact) -> DerivedRecord {
        use CanonicalField::*;

        let timestamps = TypedTimestamps {
            created_at: self.timestamp(&fact, CreatedAt, true),
            published_at: self.timestamp(&fact, PublishedAt, true),
            refreshed_at: self.timestamp(&fact, RefreshedAt, true),
            date_of_birth: self.timestamp(&fact, DateOfBirth, false),
            ready_to_leave: self.timestamp(&fact, ReadyToLeave, false),
            member_since: self.timestamp(&fact, MemberSince, false),
            last_active: self.timestamp(&fact, LastActive, true),
        };

        let numbers = TypedNumbers {
            price: self.number(&fact, Price),
            males_available: self.number(&fact, MalesAvailable),
            females_available: self.number(&fact, FemalesAvailable),
            total_available: self.number(&fact, TotalAvailable),
            views_count: self.number(&fact, ViewsCount),
            reviews: self.number(&fact, Reviews),
            rating: self.number(&fact, Rating),
        };

        let outcome = self.extractor.extract(
            numbers.total_available,
            numbers.males_available,
            numbers.females_available,
            fact.get(Title),
        );
        metrics::derive::quantity_resolved(outcome.source.as_str());

        let mut quality_flags = Vec::new();
        if outcome.clamped {
            quality_flags.push(QualityFlag::new(TotalAvailable.as_str(), QualityTag::Clamped));
        }

        let (age_days, age_weeks) = resolve_age(timestamps.date_of_birth, fact.get(Age), self.asof);
        let listing_age_days = timestamps
            .published_at
            .or(timestamps.created_at)
            .map(|published| timestamps::whole_days_between(published, self.asof));

        debug!(
            platform = %fact.platform,
            row_index = fact.row_index,
            quantity = ?outcome.value,
            source = outcome.source.as_str(),
            "Derived typed fields"
        );

        DerivedRecord {
            fact,
            asof_ts: self.asof,
            timestamps,
            numbers,
            quantity: outcome.value,
            quantity_source: outcome.source,
            age_days,
            age_weeks,
            listing_age_days,
            availability: Availability::default(),
            quality_flags,
            dedup: DedupAnnotation::default(),
            seller: SellerAnnotation::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn asof() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 22, 0, 0, 0).unwrap()
    }

    fn deriver() -> TypedFieldDeriver {
        TypedFieldDeriver::new(&QuantityConfig::default(), asof())
    }

    #[test]
    fn parses_typed_columns() {
        let fact = CanonicalFact::new("pets4homes", 0)
            .with(CanonicalField::Price, "£1,250")
            .with(CanonicalField::DateOfBirth, "01/12/2025")
            .with(CanonicalField::PublishedAt, "2026-01-15T09:00:00Z")
            .with(CanonicalField::Rating, "4.8");

        let record = deriver().derive(fact);
        assert_eq!(record.numbers.price, Some(1250.0));
        assert_eq!(record.numbers.rating, Some(4.8));
        assert_eq!(record.age_days, Some(52));
        assert_eq!(record.listing_age_days, Some(6));
        assert_eq!(record.asof_ts, asof());
    }

    #[test]
    fn parse_failures_become_null() {
        let fact = CanonicalFact::new("gumtree", 0)
            .with(CanonicalField::Price, "Offers")
            .with(CanonicalField::DateOfBirth, "recently");

        let record = deriver().derive(fact);
        assert_eq!(record.numbers.price, None);
        assert_eq!(record.timestamps.date_of_birth, None);
        assert_eq!(record.age_days, None);
    }

    #[test]
    fn relative_publish_time_resolves_against_run_anchor() {
        let fact = CanonicalFact::new("freeads", 0).with(CanonicalField::PublishedAt, "6 days ago");
        let record = deriver().derive(fact);
        assert_eq!(record.timestamps.published_at, Some(Utc.with_ymd_and_hms(2026, 1, 16, 0, 0, 0).unwrap()));
        assert_eq!(record.listing_age_days, Some(6));
    }

    #[test]
    fn age_text_is_used_without_dob() {
        let fact = CanonicalFact::new("freeads", 0).with(CanonicalField::Age, "10 weeks");
        let record = deriver().derive(fact);
        assert_eq!(record.age_days, None);
        assert_eq!(record.age_weeks, Some(10.0));
    }

    #[test]
    fn text_quantity_clamp_is_flagged() {
        let fact = CanonicalFact::new("gumtree", 0).with(CanonicalField::Title, "Litter of 14 labradors");
        let record = deriver().derive(fact);
        assert_eq!(record.quantity, Some(12));
        assert_eq!(record.quantity_source, QuantitySource::LitterOf);
        assert!(record.has_flag(QualityTag::Clamped));
    }
}
