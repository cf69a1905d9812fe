//! Seller identity: composite (name, location) keys, rescue classification
//! and high-volume flagging.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::config::IdentityConfig;
use crate::constants::UNKNOWN_SELLER_KEY;
use crate::observability::metrics;
use crate::pipeline::processing::conflation::DedupStatus;
use crate::pipeline::processing::derive::DerivedRecord;
use crate::schema::CanonicalField;

/// Why a record was classified as a rescue or rehoming listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescueReason {
    UserType,
    SellerName,
    /// Adult dog at a low price. Approximate.
    RehomingHeuristic,
}

impl RescueReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RescueReason::UserType => "user_type",
            RescueReason::SellerName => "seller_name",
            RescueReason::RehomingHeuristic => "rehoming_heuristic",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [
            RescueReason::UserType,
            RescueReason::SellerName,
            RescueReason::RehomingHeuristic,
        ]
        .into_iter()
        .find(|r| r.as_str() == label)
    }
}

/// Seller columns carried on each derived record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerAnnotation {
    pub key: String,
    pub is_rescue: bool,
    pub rescue_reason: Option<RescueReason>,
    pub is_high_volume: bool,
}

impl Default for SellerAnnotation {
    fn default() -> Self {
        Self {
            key: UNKNOWN_SELLER_KEY.to_string(),
            is_rescue: false,
            rescue_reason: None,
            is_high_volume: false,
        }
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `name|location`, whitespace collapsed and case preserved. Either part
/// missing maps to the shared unknown identity.
pub fn seller_key(name: Option<&str>, location: Option<&str>) -> String {
    let name = name.map(collapse_whitespace).filter(|s| !s.is_empty());
    let location = location.map(collapse_whitespace).filter(|s| !s.is_empty());
    match (name, location) {
        (Some(name), Some(location)) => format!("{name}|{location}"),
        _ => UNKNOWN_SELLER_KEY.to_string(),
    }
}

/// Aggregated view of one seller key over kept listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerIdentity {
    pub key: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub listing_count: usize,
    pub platforms: BTreeSet<String>,
    pub has_license: bool,
    pub rescue_listings: usize,
    pub non_rescue_listings: usize,
    pub is_high_volume: bool,
}

impl SellerIdentity {
    fn new(key: &str, record: &DerivedRecord) -> Self {
        let known = key != UNKNOWN_SELLER_KEY;
        Self {
            key: key.to_string(),
            name: known.then(|| record.get(CanonicalField::SellerName).map(collapse_whitespace)).flatten(),
            location: known.then(|| record.get(CanonicalField::Location).map(collapse_whitespace)).flatten(),
            listing_count: 0,
            platforms: BTreeSet::new(),
            has_license: false,
            rescue_listings: 0,
            non_rescue_listings: 0,
            is_high_volume: false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.key == UNKNOWN_SELLER_KEY
    }
}

#[derive(Debug, Clone)]
pub struct IdentityOutcome {
    pub records: Vec<DerivedRecord>,
    /// Keyed by seller key, sentinel included
    pub sellers: BTreeMap<String, SellerIdentity>,
}

impl IdentityOutcome {
    /// Sellers eligible for volume analysis
    pub fn known_sellers(&self) -> impl Iterator<Item = &SellerIdentity> {
        self.sellers.values().filter(|s| !s.is_unknown())
    }
}

pub struct IdentityResolver {
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    /// Disjunctive rescue test; the first matching clause is the reason
    pub fn classify_rescue(&self, record: &DerivedRecord) -> Option<RescueReason> {
        let contains_rescue = |field: CanonicalField| {
            record
                .get(field)
                .is_some_and(|v| v.to_lowercase().contains("rescue"))
        };

        if contains_rescue(CanonicalField::UserType) {
            return Some(RescueReason::UserType);
        }
        if contains_rescue(CanonicalField::SellerName) {
            return Some(RescueReason::SellerName);
        }

        let heuristic = &self.config.rehoming_heuristic;
        if heuristic.enabled {
            let age_days = record
                .age_days
                .map(|d| d as f64)
                .or_else(|| record.age_weeks.map(|w| w * 7.0));
            let adult = age_days.is_some_and(|d| d > heuristic.min_age_days as f64);
            let cheap = record.numbers.price.is_some_and(|p| p < heuristic.max_price);
            if adult && cheap {
                return Some(RescueReason::RehomingHeuristic);
            }
        }
        None
    }

    fn has_license(record: &DerivedRecord) -> bool {
        record.get(CanonicalField::LicenseNum).is_some()
    }

    /// Annotate every record and build the per-key identities. Counts only
    /// include records the deduplicator kept.
    pub fn resolve(&self, mut records: Vec<DerivedRecord>) -> IdentityOutcome {
        let mut sellers: BTreeMap<String, SellerIdentity> = BTreeMap::new();

        for record in records.iter_mut() {
            let key = seller_key(record.get(CanonicalField::SellerName), record.get(CanonicalField::Location));
            let rescue_reason = self.classify_rescue(record);

            if record.dedup.status == DedupStatus::Unique {
                let seller = sellers
                    .entry(key.clone())
                    .or_insert_with(|| SellerIdentity::new(&key, record));
                seller.listing_count += 1;
                seller.platforms.insert(record.fact.platform.clone());
                seller.has_license |= Self::has_license(record);
                if rescue_reason.is_some() {
                    seller.rescue_listings += 1;
                } else {
                    seller.non_rescue_listings += 1;
                }
            }

            record.seller = SellerAnnotation {
                key,
                is_rescue: rescue_reason.is_some(),
                rescue_reason,
                is_high_volume: false,
            };
        }

        for seller in sellers.values_mut() {
            seller.is_high_volume =
                !seller.is_unknown() && seller.non_rescue_listings >= self.config.high_volume_min_listings;
        }

        for record in records.iter_mut() {
            record.seller.is_high_volume = !record.seller.is_rescue
                && sellers
                    .get(&record.seller.key)
                    .is_some_and(|s| s.is_high_volume);
        }

        let rescue_count = records.iter().filter(|r| r.seller.is_rescue).count();
        let high_volume = sellers.values().filter(|s| s.is_high_volume).count();
        metrics::identity::sellers_resolved(sellers.len());
        metrics::identity::rescue_listings(rescue_count);
        info!(
            sellers = sellers.len(),
            high_volume,
            rescue_listings = rescue_count,
            "Seller identities resolved"
        );

        IdentityOutcome { records, sellers }
    }
}
