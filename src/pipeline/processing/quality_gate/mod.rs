use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::QuantityConfig;
use crate::observability::metrics;
use crate::pipeline::processing::derive::{resolve_age, DerivedRecord, QuantityExtractor, QuantitySource};
use crate::schema::CanonicalField;

/// Reason a derived value was nullified, re-derived or clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTag {
    /// Value falls in the calendar-year range
    YearLike,
    /// Value looks like a price copied into a count
    PriceLike,
    /// Above the hard litter ceiling
    OverCeiling,
    NonPositive,
    /// Replaced by the male + female sum
    RederivedGenderSplit,
    /// Cut down to the maximum litter size
    Clamped,
    PriceOutOfRange,
    DobInFuture,
}

impl QualityTag {
    pub const ALL: [QualityTag; 8] = [
        QualityTag::YearLike,
        QualityTag::PriceLike,
        QualityTag::OverCeiling,
        QualityTag::NonPositive,
        QualityTag::RederivedGenderSplit,
        QualityTag::Clamped,
        QualityTag::PriceOutOfRange,
        QualityTag::DobInFuture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTag::YearLike => "year_like",
            QualityTag::PriceLike => "price_like",
            QualityTag::OverCeiling => "over_ceiling",
            QualityTag::NonPositive => "non_positive",
            QualityTag::RederivedGenderSplit => "rederived_gender_split",
            QualityTag::Clamped => "clamped",
            QualityTag::PriceOutOfRange => "price_out_of_range",
            QualityTag::DobInFuture => "dob_in_future",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == label)
    }
}

/// One audited correction: which field, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFlag {
    pub field: String,
    pub tag: QualityTag,
}

impl QualityFlag {
    pub fn new(field: &str, tag: QualityTag) -> Self {
        Self {
            field: field.to_string(),
            tag,
        }
    }

    /// Parse the `field:tag` form used in the derived table
    pub fn parse(raw: &str) -> Option<Self> {
        let (field, tag) = raw.split_once(':')?;
        Some(Self::new(field, QualityTag::from_label(tag)?))
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.tag.as_str())
    }
}

/// Result of running the quantity correction passes on one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityCorrection {
    pub value: Option<i64>,
    pub source: QuantitySource,
    pub tags: Vec<QualityTag>,
}

/// Trait for implementing plausibility checks on derived records
pub trait QualityGate {
    /// Check a derived record and return its corrected replacement
    fn assess(&self, record: DerivedRecord) -> DerivedRecord;
}

/// Default gate: layered quantity rules with gender-split re-derivation,
/// plus price and date-of-birth range checks.
pub struct DefaultQualityGate {
    pub config: QuantityConfig,
    extractor: QuantityExtractor,
}

// The explicit value, then the gender-split sum
const MAX_QUANTITY_PASSES: usize = 2;

impl DefaultQualityGate {
    /// Create a new Quality Gate with default configuration
    pub fn new() -> Self {
        Self::with_config(QuantityConfig::default())
    }

    pub fn with_config(config: QuantityConfig) -> Self {
        Self {
            extractor: QuantityExtractor::new(&config),
            config,
        }
    }

    /// First rule a quantity violates, most specific first
    pub fn violation(&self, value: i64) -> Option<QualityTag> {
        let c = &self.config;
        if (c.year_like_min..=c.year_like_max).contains(&value) {
            Some(QualityTag::YearLike)
        } else if value > c.price_scale_threshold {
            Some(QualityTag::PriceLike)
        } else if value > i64::from(c.hard_litter_ceiling) {
            Some(QualityTag::OverCeiling)
        } else if value <= 0 {
            Some(QualityTag::NonPositive)
        } else {
            None
        }
    }

    /// Flag → nullify → re-derive → re-check, bounded by the number of
    /// available sources, then clamp whatever survives.
    pub fn correct_quantity(&self, record: &DerivedRecord) -> QuantityCorrection {
        let mut value = record.quantity;
        let mut source = record.quantity_source;
        let mut tags = Vec::new();

        let mut gender_split_available = source != QuantitySource::GenderSplit;

        for _ in 0..MAX_QUANTITY_PASSES {
            let Some(current) = value else { break };
            let Some(tag) = self.violation(current) else { break };

            tags.push(tag);
            value = None;
            source = QuantitySource::Unresolved;

            if !gender_split_available {
                break;
            }
            gender_split_available = false;

            let sum = self
                .extractor
                .gender_split(record.numbers.males_available, record.numbers.females_available);
            if let Some(sum) = sum {
                value = Some(sum);
                source = QuantitySource::GenderSplit;
                tags.push(QualityTag::RederivedGenderSplit);
            }
        }

        let max = i64::from(self.config.max_litter_size);
        if let Some(current) = value.filter(|v| *v > max) {
            debug!(value = current, max, "Clamping quantity to maximum litter size");
            value = Some(max);
            tags.push(QualityTag::Clamped);
        }

        QuantityCorrection { value, source, tags }
    }
}

impl Default for DefaultQualityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityGate for DefaultQualityGate {
    fn assess(&self, record: DerivedRecord) -> DerivedRecord {
        let correction = self.correct_quantity(&record);

        let mut quality_flags = record.quality_flags.clone();
        for tag in &correction.tags {
            metrics::quality_gate::flag_raised(tag.as_str());
            if *tag == QualityTag::RederivedGenderSplit {
                metrics::quality_gate::value_rederived();
            }
            quality_flags.push(QualityFlag::new(CanonicalField::TotalAvailable.as_str(), *tag));
        }

        let mut numbers = record.numbers.clone();
        if numbers.price.is_some_and(|p| p <= 0.0) {
            numbers.price = None;
            metrics::quality_gate::flag_raised(QualityTag::PriceOutOfRange.as_str());
            quality_flags.push(QualityFlag::new(CanonicalField::Price.as_str(), QualityTag::PriceOutOfRange));
        }

        let mut timestamps = record.timestamps.clone();
        let (mut age_days, mut age_weeks) = (record.age_days, record.age_weeks);
        if timestamps.date_of_birth.is_some_and(|dob| dob > record.asof_ts) {
            timestamps.date_of_birth = None;
            (age_days, age_weeks) = resolve_age(None, record.get(CanonicalField::Age), record.asof_ts);
            metrics::quality_gate::flag_raised(QualityTag::DobInFuture.as_str());
            quality_flags.push(QualityFlag::new(CanonicalField::DateOfBirth.as_str(), QualityTag::DobInFuture));
        }

        if quality_flags.len() > record.quality_flags.len() {
            debug!(
                platform = record.platform(),
                row_index = record.fact.row_index,
                flags = ?quality_flags,
                "Quality gate corrected record"
            );
        }

        DerivedRecord {
            numbers,
            timestamps,
            age_days,
            age_weeks,
            quantity: correction.value,
            quantity_source: correction.source,
            quality_flags,
            ..record
        }
    }
}
