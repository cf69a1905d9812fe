//! Per-stage counters for the listing pipeline.
//!
//! Counters go through the `metrics` facade. No exporter is installed by the
//! binary, so recording is a no-op unless a recorder has been set (tests and
//! embedding applications may install one).

use std::fmt;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingestion
    IngestSourcesMissing,
    IngestRowsLoaded,

    // Schema mapping
    NormalizeRecordsMapped,

    // Typed derivation
    DeriveTimestampParseFailures,
    DeriveNumericParseFailures,
    DeriveQuantityResolved,

    // Availability
    AvailabilityStateResolved,

    // Quality gate
    QualityGateFlagsRaised,
    QualityGateValuesRederived,

    // Deduplication
    DedupRecordsClassified,

    // Identity
    IdentitySellersResolved,
    IdentityRescueListings,

    // Aggregation
    AggregateSnapshotsWritten,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::IngestSourcesMissing => "dog_market_ingest_sources_missing_total",
            MetricName::IngestRowsLoaded => "dog_market_ingest_rows_loaded_total",
            MetricName::NormalizeRecordsMapped => "dog_market_normalize_records_mapped_total",
            MetricName::DeriveTimestampParseFailures => "dog_market_derive_timestamp_parse_failures_total",
            MetricName::DeriveNumericParseFailures => "dog_market_derive_numeric_parse_failures_total",
            MetricName::DeriveQuantityResolved => "dog_market_derive_quantity_resolved_total",
            MetricName::AvailabilityStateResolved => "dog_market_availability_state_resolved_total",
            MetricName::QualityGateFlagsRaised => "dog_market_quality_gate_flags_raised_total",
            MetricName::QualityGateValuesRederived => "dog_market_quality_gate_values_rederived_total",
            MetricName::DedupRecordsClassified => "dog_market_dedup_records_classified_total",
            MetricName::IdentitySellersResolved => "dog_market_identity_sellers_resolved_total",
            MetricName::IdentityRescueListings => "dog_market_identity_rescue_listings_total",
            MetricName::AggregateSnapshotsWritten => "dog_market_aggregate_snapshots_written_total",
        }
    }
}

pub mod ingestion {
    use super::MetricName;

    pub fn source_missing(platform: &str) {
        ::metrics::counter!(MetricName::IngestSourcesMissing.as_str(), "platform" => platform.to_string())
            .increment(1);
    }

    pub fn rows_loaded(platform: &str, rows: usize) {
        ::metrics::counter!(MetricName::IngestRowsLoaded.as_str(), "platform" => platform.to_string())
            .increment(rows as u64);
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn records_mapped(platform: &str, count: usize) {
        ::metrics::counter!(MetricName::NormalizeRecordsMapped.as_str(), "platform" => platform.to_string())
            .increment(count as u64);
    }
}

pub mod derive {
    use super::MetricName;

    pub fn timestamp_parse_failure(field: &'static str) {
        ::metrics::counter!(MetricName::DeriveTimestampParseFailures.as_str(), "field" => field).increment(1);
    }

    pub fn numeric_parse_failure(field: &'static str) {
        ::metrics::counter!(MetricName::DeriveNumericParseFailures.as_str(), "field" => field).increment(1);
    }

    pub fn quantity_resolved(source: &'static str) {
        ::metrics::counter!(MetricName::DeriveQuantityResolved.as_str(), "source" => source).increment(1);
    }
}

pub mod availability {
    use super::MetricName;

    pub fn state_resolved(state: &'static str) {
        ::metrics::counter!(MetricName::AvailabilityStateResolved.as_str(), "state" => state).increment(1);
    }
}

pub mod quality_gate {
    use super::MetricName;

    pub fn flag_raised(tag: &'static str) {
        ::metrics::counter!(MetricName::QualityGateFlagsRaised.as_str(), "tag" => tag).increment(1);
    }

    pub fn value_rederived() {
        ::metrics::counter!(MetricName::QualityGateValuesRederived.as_str()).increment(1);
    }
}

pub mod dedup {
    use super::MetricName;

    pub fn record_classified(status: &'static str) {
        ::metrics::counter!(MetricName::DedupRecordsClassified.as_str(), "status" => status).increment(1);
    }
}

pub mod identity {
    use super::MetricName;

    pub fn sellers_resolved(count: usize) {
        ::metrics::counter!(MetricName::IdentitySellersResolved.as_str()).increment(count as u64);
    }

    pub fn rescue_listings(count: usize) {
        ::metrics::counter!(MetricName::IdentityRescueListings.as_str()).increment(count as u64);
    }
}

pub mod aggregate {
    use super::MetricName;

    pub fn snapshot_written() {
        ::metrics::counter!(MetricName::AggregateSnapshotsWritten.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefixed_counters() {
        let names = [
            MetricName::IngestSourcesMissing,
            MetricName::QualityGateFlagsRaised,
            MetricName::AggregateSnapshotsWritten,
        ];
        for name in names {
            assert!(name.as_str().starts_with("dog_market_"));
            assert!(name.to_string().ends_with("_total"));
        }
    }
}
