//! Deduplication: intra-source re-scrapes, cross-platform fingerprint
//! groups, then staleness.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

use crate::config::{CanonicalPreference, DedupConfig};
use crate::observability::metrics;
use crate::pipeline::processing::derive::DerivedRecord;
use crate::pipeline::processing::normalize::PlatformRegistry;
use crate::schema::CanonicalField;

/// Outcome assigned to every record by the deduplicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStatus {
    Unique,
    /// Same listing id seen earlier in the same platform's export
    IntraSourceArtifact,
    /// Non-canonical member of a multi-platform fingerprint group
    CrossPlatformDuplicate,
    Stale,
}

impl DedupStatus {
    pub const ALL: [DedupStatus; 4] = [
        DedupStatus::Unique,
        DedupStatus::IntraSourceArtifact,
        DedupStatus::CrossPlatformDuplicate,
        DedupStatus::Stale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DedupStatus::Unique => "unique",
            DedupStatus::IntraSourceArtifact => "intra_source_artifact",
            DedupStatus::CrossPlatformDuplicate => "cross_platform_duplicate",
            DedupStatus::Stale => "stale",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == label)
    }
}

/// Dedup columns carried on each derived record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupAnnotation {
    pub status: DedupStatus,
    pub listing_id: Option<String>,
    /// Set on every member of a cross-platform group
    pub group_id: Option<String>,
}

impl Default for DedupAnnotation {
    fn default() -> Self {
        Self {
            status: DedupStatus::Unique,
            listing_id: None,
            group_id: None,
        }
    }
}

/// (breed, location, price band). Only built when all three are present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub breed: String,
    pub location: String,
    pub price_band: i64,
}

impl Fingerprint {
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.breed, self.location, self.price_band)
    }

    /// First 12 hex characters of the SHA-256 of the key
    pub fn group_id(&self) -> String {
        let digest = Sha256::digest(self.key().as_bytes());
        let mut id = hex::encode(digest);
        id.truncate(12);
        id
    }
}

fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Round a price to the nearest band, ties to even
pub fn price_band(price: f64, band: f64) -> i64 {
    ((price / band).round_ties_even() * band) as i64
}

pub fn fingerprint(record: &DerivedRecord, band: f64) -> Option<Fingerprint> {
    let breed = normalize_text(record.get(CanonicalField::Breed)?);
    let location = normalize_text(record.get(CanonicalField::Location)?);
    let price = record.numbers.price?;
    if breed.is_empty() || location.is_empty() {
        return None;
    }
    Some(Fingerprint {
        breed,
        location,
        price_band: price_band(price, band),
    })
}

/// Records judged to be the same real listing across platforms
#[derive(Debug, Clone, PartialEq)]
pub struct DeduplicationGroup {
    pub group_id: String,
    pub fingerprint: Fingerprint,
    /// Position of the canonical member in the deduplicated record list
    pub canonical: usize,
    pub members: Vec<usize>,
    pub platforms: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupSummary {
    pub total_input: usize,
    pub unique_kept: usize,
    pub intra_source_dupes: usize,
    pub cross_platform_dupes: usize,
    pub stale_removed: usize,
    pub groups: usize,
}

impl DedupSummary {
    fn tally(records: &[DerivedRecord], groups: usize) -> Self {
        let mut summary = Self {
            total_input: records.len(),
            groups,
            ..Self::default()
        };
        for record in records {
            match record.dedup.status {
                DedupStatus::Unique => summary.unique_kept += 1,
                DedupStatus::IntraSourceArtifact => summary.intra_source_dupes += 1,
                DedupStatus::CrossPlatformDuplicate => summary.cross_platform_dupes += 1,
                DedupStatus::Stale => summary.stale_removed += 1,
            }
        }
        summary
    }

    /// Every input row is accounted for exactly once
    pub fn is_conserved(&self) -> bool {
        self.unique_kept + self.intra_source_dupes + self.cross_platform_dupes + self.stale_removed == self.total_input
    }
}

#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Every input record in stable order, each with its dedup annotation
    pub records: Vec<DerivedRecord>,
    pub groups: Vec<DeduplicationGroup>,
    pub summary: DedupSummary,
}

/// Trait for classifying duplicate listings
pub trait Deduplicator {
    fn deduplicate(&self, records: Vec<DerivedRecord>) -> DedupOutcome;
}

pub struct DefaultDeduplicator<'a> {
    pub config: DedupConfig,
    registry: &'a PlatformRegistry,
}

impl<'a> DefaultDeduplicator<'a> {
    pub fn new(config: DedupConfig, registry: &'a PlatformRegistry) -> Self {
        Self { config, registry }
    }

    fn mark_intra_source(&self, records: &mut [DerivedRecord]) {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for record in records.iter_mut() {
            let listing_id = self
                .registry
                .get(record.platform())
                .and_then(|profile| profile.listing_id(&record.fact));

            if let Some(id) = &listing_id {
                if !seen.insert((record.fact.platform.clone(), id.clone())) {
                    record.dedup.status = DedupStatus::IntraSourceArtifact;
                }
            }
            record.dedup.listing_id = listing_id;
        }
    }

    /// Index of the canonical member under the configured preference.
    /// `members` is already in processing order.
    fn pick_canonical(&self, records: &[DerivedRecord], members: &[usize]) -> usize {
        match self.config.canonical_preference {
            CanonicalPreference::ProcessingOrder => members[0],
            CanonicalPreference::MostComplete => {
                let mut best = members[0];
                for &idx in &members[1..] {
                    if records[idx].fact.populated_count() > records[best].fact.populated_count() {
                        best = idx;
                    }
                }
                best
            }
        }
    }

    fn group_cross_platform(&self, records: &mut [DerivedRecord]) -> Vec<DeduplicationGroup> {
        let mut buckets: BTreeMap<Fingerprint, Vec<usize>> = BTreeMap::new();
        for (idx, record) in records.iter().enumerate() {
            if record.dedup.status != DedupStatus::Unique {
                continue;
            }
            if let Some(fp) = fingerprint(record, self.config.price_band) {
                buckets.entry(fp).or_default().push(idx);
            }
        }

        let mut groups = Vec::new();
        for (fingerprint, members) in buckets {
            let platforms: BTreeSet<String> = members.iter().map(|&i| records[i].fact.platform.clone()).collect();
            if platforms.len() < 2 {
                continue;
            }

            let canonical = self.pick_canonical(records, &members);
            let group_id = fingerprint.group_id();
            for &idx in &members {
                let dedup = &mut records[idx].dedup;
                dedup.group_id = Some(group_id.clone());
                if idx != canonical {
                    dedup.status = DedupStatus::CrossPlatformDuplicate;
                }
            }

            debug!(
                group_id = %group_id,
                size = members.len(),
                platforms = ?platforms,
                "Cross-platform group"
            );
            groups.push(DeduplicationGroup {
                group_id,
                fingerprint,
                canonical,
                members,
                platforms,
            });
        }
        groups
    }

    fn mark_stale(&self, records: &mut [DerivedRecord]) {
        for record in records.iter_mut() {
            let stale = record
                .listing_age_days
                .is_some_and(|age| age > self.config.stale_after_days);
            if record.dedup.status == DedupStatus::Unique && stale {
                record.dedup.status = DedupStatus::Stale;
            }
        }
    }
}

impl Deduplicator for DefaultDeduplicator<'_> {
    fn deduplicate(&self, mut records: Vec<DerivedRecord>) -> DedupOutcome {
        records.sort_by_key(|r| (self.registry.rank(r.platform()), r.fact.row_index));

        self.mark_intra_source(&mut records);
        let groups = self.group_cross_platform(&mut records);
        self.mark_stale(&mut records);

        for record in &records {
            metrics::dedup::record_classified(record.dedup.status.as_str());
        }

        let summary = DedupSummary::tally(&records, groups.len());
        info!(
            total = summary.total_input,
            unique = summary.unique_kept,
            intra_source = summary.intra_source_dupes,
            cross_platform = summary.cross_platform_dupes,
            stale = summary.stale_removed,
            groups = summary.groups,
            "Deduplication complete"
        );

        DedupOutcome {
            records,
            groups,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuantityConfig;
    use crate::pipeline::processing::derive::TypedFieldDeriver;
    use crate::pipeline::processing::normalize::CanonicalFact;
    use chrono::{TimeZone, Utc};

    fn record(platform: &str, row: usize, pairs: &[(CanonicalField, &str)]) -> DerivedRecord {
        let mut fact = CanonicalFact::new(platform, row);
        for (field, value) in pairs {
            fact.set(*field, value);
        }
        let asof = Utc.with_ymd_and_hms(2026, 1, 22, 0, 0, 0).unwrap();
        TypedFieldDeriver::new(&QuantityConfig::default(), asof).derive(fact)
    }

    fn listing(platform: &str, row: usize, breed: &str, location: &str, price: &str) -> DerivedRecord {
        record(
            platform,
            row,
            &[
                (CanonicalField::Breed, breed),
                (CanonicalField::Location, location),
                (CanonicalField::Price, price),
            ],
        )
    }

    fn run(config: DedupConfig, records: Vec<DerivedRecord>) -> DedupOutcome {
        let registry = PlatformRegistry::new();
        DefaultDeduplicator::new(config, &registry).deduplicate(records)
    }

    fn status_of(outcome: &DedupOutcome, platform: &str) -> DedupStatus {
        outcome
            .records
            .iter()
            .find(|r| r.platform() == platform)
            .map(|r| r.dedup.status)
            .unwrap()
    }

    #[test]
    fn price_bands_round_ties_to_even() {
        assert_eq!(price_band(600.0, 50.0), 600);
        assert_eq!(price_band(625.0, 50.0), 600);
        assert_eq!(price_band(675.0, 50.0), 700);
        assert_eq!(price_band(649.0, 50.0), 650);
    }

    #[test]
    fn cross_posted_listing_forms_one_group() {
        let outcome = run(
            DedupConfig::default(),
            vec![
                listing("gumtree", 0, "Labrador", "Leeds", "625"),
                listing("pets4homes", 0, "Labrador", "Leeds", "600"),
            ],
        );

        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.groups[0].members.len(), 2);
        assert_eq!(status_of(&outcome, "pets4homes"), DedupStatus::Unique);
        assert_eq!(status_of(&outcome, "gumtree"), DedupStatus::CrossPlatformDuplicate);
        let ids: Vec<_> = outcome.records.iter().map(|r| r.dedup.group_id.clone()).collect();
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[0].as_deref().map(str::len), Some(12));
    }

    #[test]
    fn same_platform_matches_are_not_cross_posted() {
        let outcome = run(
            DedupConfig::default(),
            vec![
                listing("freeads", 0, "Labrador", "Leeds", "600"),
                listing("freeads", 1, "Labrador", "Leeds", "610"),
            ],
        );
        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.summary.unique_kept, 2);
    }

    #[test]
    fn incomplete_fingerprints_never_match() {
        let outcome = run(
            DedupConfig::default(),
            vec![
                record("pets4homes", 0, &[(CanonicalField::Breed, "Pug"), (CanonicalField::Location, "York")]),
                record("gumtree", 0, &[(CanonicalField::Breed, "Pug"), (CanonicalField::Location, "York")]),
            ],
        );
        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.summary.unique_kept, 2);
    }

    #[test]
    fn rescrapes_keep_first_occurrence() {
        let url = "https://www.gumtree.com/p/dogs/labrador/1498765432";
        let outcome = run(
            DedupConfig::default(),
            vec![
                record("gumtree", 1, &[(CanonicalField::Url, url)]),
                record("gumtree", 0, &[(CanonicalField::Url, url)]),
            ],
        );
        assert_eq!(outcome.records[0].fact.row_index, 0);
        assert_eq!(outcome.records[0].dedup.status, DedupStatus::Unique);
        assert_eq!(outcome.records[1].dedup.status, DedupStatus::IntraSourceArtifact);
        assert_eq!(outcome.records[1].dedup.listing_id.as_deref(), Some("1498765432"));
    }

    #[test]
    fn stale_filter_runs_after_grouping() {
        let mut old = listing("pets4homes", 0, "Pug", "York", "900");
        old.listing_age_days = Some(400);
        let fresh = listing("gumtree", 0, "Pug", "York", "900");

        let outcome = run(DedupConfig::default(), vec![old, fresh]);
        // The old listing still claims the group before it is dropped as stale
        assert_eq!(status_of(&outcome, "pets4homes"), DedupStatus::Stale);
        assert_eq!(status_of(&outcome, "gumtree"), DedupStatus::CrossPlatformDuplicate);
        assert!(outcome.summary.is_conserved());
    }

    #[test]
    fn most_complete_preference_picks_richer_member() {
        let sparse = listing("pets4homes", 0, "Pug", "York", "900");
        let rich = record(
            "preloved",
            0,
            &[
                (CanonicalField::Breed, "Pug"),
                (CanonicalField::Location, "York"),
                (CanonicalField::Price, "900"),
                (CanonicalField::Title, "Pug puppies"),
                (CanonicalField::SellerName, "Jo"),
            ],
        );

        let config = DedupConfig {
            canonical_preference: CanonicalPreference::MostComplete,
            ..DedupConfig::default()
        };
        let outcome = run(config, vec![sparse, rich]);
        assert_eq!(status_of(&outcome, "preloved"), DedupStatus::Unique);
        assert_eq!(status_of(&outcome, "pets4homes"), DedupStatus::CrossPlatformDuplicate);
    }

    #[test]
    fn every_row_is_accounted_for() {
        let url = "https://example.com/ad/123456";
        let mut records = vec![
            listing("pets4homes", 0, "Pug", "York", "900"),
            listing("gumtree", 0, "Pug", "York", "910"),
            record("freeads", 0, &[(CanonicalField::Url, url)]),
            record("freeads", 1, &[(CanonicalField::Url, url)]),
            listing("champdogs", 0, "Beagle", "Bath", "1200"),
        ];
        records[4].listing_age_days = Some(365);

        let outcome = run(DedupConfig::default(), records);
        let s = &outcome.summary;
        assert_eq!(s.total_input, 5);
        assert_eq!((s.unique_kept, s.intra_source_dupes, s.cross_platform_dupes, s.stale_removed), (2, 1, 1, 1));
        assert!(s.is_conserved());
    }
}
