//! Market metrics over the final record set.
//!
//! Everything here is a pure function of the annotated records, so the
//! snapshot can be rebuilt from `derived.csv` alone.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::MetricsConfig;
use crate::constants::{METRICS_SCHEMA_VERSION, UNKNOWN_SELLER_KEY};
use crate::pipeline::processing::availability::AvailabilityState;
use crate::pipeline::processing::conflation::DedupStatus;
use crate::pipeline::processing::derive::numeric::median;
use crate::pipeline::processing::derive::DerivedRecord;
use crate::pipeline::processing::quality_gate::QualityTag;
use crate::schema::CanonicalField;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub schema_version: String,
    pub run_id: String,
    pub generated_at: String,
    pub as_of: String,
    pub summary: SummarySection,
    pub platforms: BTreeMap<String, PlatformStats>,
    /// Group size → number of cross-platform groups of that size
    pub cross_platform_duplicates: BTreeMap<usize, usize>,
    pub sellers: SellerSection,
    pub freshness: BTreeMap<String, FreshnessStats>,
    pub age_distribution: BTreeMap<String, AgeStats>,
    pub puppies_vs_adults: PuppiesVsAdults,
    pub breeds: BreedSection,
    pub geography: Vec<AreaStats>,
    pub qa: QaSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySection {
    pub raw_listings: usize,
    pub raw_puppies: i64,
    pub raw_avg_per_listing: f64,
    pub unique_listings: usize,
    pub unique_puppies: i64,
    pub removed_listings: usize,
    pub annualized_puppies: i64,
    pub market_share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub listings: usize,
    pub puppies: i64,
    pub unique: usize,
    pub avg_puppies: f64,
    pub share_pct: f64,
    pub availability: AvailabilityCoverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityCoverage {
    pub known_pct: f64,
    pub ready_now: usize,
    pub waiting_list: usize,
    pub unknown: usize,
    pub ready_now_pct: f64,
    pub waiting_list_pct: f64,
    pub unknown_pct: f64,
    /// Listings per availability state
    pub states: BTreeMap<String, usize>,
    pub price_coverage_pct: f64,
    pub median_price: Option<f64>,
    pub age_coverage_pct: f64,
    pub median_age_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerSection {
    pub total: usize,
    pub high_volume: usize,
    pub by_platform: BTreeMap<String, PlatformSellers>,
    pub top: Vec<TopSeller>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSellers {
    pub high_volume_sellers: usize,
    pub pct_of_high_volume: f64,
    pub licensed_sellers: usize,
    pub license_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSeller {
    pub name: String,
    pub location: String,
    pub listings: usize,
    pub platforms: Vec<String>,
    pub has_license: bool,
    pub is_high_volume: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub count: usize,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessStats {
    pub total: usize,
    pub with_age: usize,
    pub median_days: Option<f64>,
    pub under_7d: Bucket,
    #[serde(rename = "7_30d")]
    pub days_7_30: Bucket,
    #[serde(rename = "30_90d")]
    pub days_30_90: Bucket,
    pub over_90d: Bucket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeStats {
    pub total_with_age: usize,
    pub median_weeks: Option<f64>,
    pub under_8w: Bucket,
    #[serde(rename = "8_12w")]
    pub weeks_8_12: Bucket,
    #[serde(rename = "12_26w")]
    pub weeks_12_26: Bucket,
    #[serde(rename = "6_12mo")]
    pub months_6_12: Bucket,
    pub over_1yr: Bucket,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PuppiesVsAdults {
    pub total_with_age: usize,
    pub under_1yr: usize,
    pub under_1yr_pct: f64,
    pub over_1yr: usize,
    pub over_1yr_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedSection {
    pub top_by_count: Vec<BreedCount>,
    pub top_by_price: Vec<BreedPrice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedCount {
    pub breed: String,
    pub count: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedPrice {
    pub breed: String,
    pub median_price: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaStats {
    pub area: String,
    pub listings: usize,
    pub median_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaSection {
    pub total_rows: usize,
    pub unique_kept: usize,
    pub intra_source_dupes: usize,
    pub cross_platform_dupes: usize,
    pub stale_removed: usize,
    pub conserved: bool,
    pub duplicate_groups: usize,
    pub platforms_count: usize,
    pub flag_counts: BTreeMap<String, usize>,
    pub quantity_sources: BTreeMap<String, usize>,
    pub availability_states: BTreeMap<String, usize>,
    /// Share of rows with a non-null canonical value, per field
    pub fill_rates: BTreeMap<String, f64>,
    /// Raw value present but no typed value, per typed field
    pub parse_failures: BTreeMap<String, usize>,
}

/// Run-level values stamped onto the snapshot
#[derive(Debug, Clone)]
pub struct SnapshotContext {
    pub run_id: String,
    pub generated_at: String,
    pub as_of: String,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round_to(part as f64 / whole as f64 * 100.0, 1)
    }
}

fn bucket(count: usize, total: usize) -> Bucket {
    Bucket {
        count,
        pct: pct(count, total),
    }
}

fn median_rounded(values: &[f64]) -> Option<f64> {
    median(values).map(|m| round_to(m, 1))
}

fn puppies(records: &[&DerivedRecord]) -> i64 {
    records.iter().filter_map(|r| r.quantity).sum()
}

fn is_kept(record: &DerivedRecord) -> bool {
    record.dedup.status == DedupStatus::Unique
}

/// County/region after the first comma, else the whole location
pub fn location_area(location: &str) -> &str {
    let separator = |c: char| c == ',' || c.is_whitespace();
    let location = location.trim_matches(separator);
    match location.split_once(',') {
        Some((_, tail)) => tail.trim_matches(separator),
        None => location,
    }
}

/// Age bucket index: `<8w`, `8–12w`, `12–26w`, `6–12mo`, `>1yr`
fn age_bucket(weeks: f64) -> usize {
    match weeks {
        w if w < 8.0 => 0,
        w if w < 12.0 => 1,
        w if w < 26.0 => 2,
        w if w < 52.0 => 3,
        _ => 4,
    }
}

/// Freshness bucket index: `<7d`, `7–30d`, `30–90d`, `>90d`
fn freshness_bucket(days: i64) -> usize {
    match days {
        d if d < 7 => 0,
        d if d < 30 => 1,
        d if d < 90 => 2,
        _ => 3,
    }
}

/// Typed value behind a canonical field, when the field has one
fn typed_value_present(record: &DerivedRecord, field: CanonicalField) -> Option<bool> {
    use CanonicalField::*;
    let t = &record.timestamps;
    let n = &record.numbers;
    let present = match field {
        CreatedAt => t.created_at.is_some(),
        PublishedAt => t.published_at.is_some(),
        RefreshedAt => t.refreshed_at.is_some(),
        DateOfBirth => t.date_of_birth.is_some(),
        MemberSince => t.member_since.is_some(),
        LastActive => t.last_active.is_some(),
        Price => n.price.is_some(),
        MalesAvailable => n.males_available.is_some(),
        FemalesAvailable => n.females_available.is_some(),
        TotalAvailable => n.total_available.is_some(),
        ViewsCount => n.views_count.is_some(),
        Reviews => n.reviews.is_some(),
        Rating => n.rating.is_some(),
        _ => return None,
    };
    Some(present)
}

pub struct Aggregator {
    config: MetricsConfig,
}

impl Aggregator {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    pub fn snapshot(&self, records: &[DerivedRecord], context: &SnapshotContext) -> MetricsSnapshot {
        let all: Vec<&DerivedRecord> = records.iter().collect();
        let kept: Vec<&DerivedRecord> = records.iter().filter(|r| is_kept(r)).collect();

        MetricsSnapshot {
            schema_version: METRICS_SCHEMA_VERSION.to_string(),
            run_id: context.run_id.clone(),
            generated_at: context.generated_at.clone(),
            as_of: context.as_of.clone(),
            summary: self.summary(&all, &kept),
            platforms: self.platforms(&all),
            cross_platform_duplicates: Self::group_histogram(&all),
            sellers: self.sellers(&kept),
            freshness: Self::freshness(&all),
            age_distribution: Self::age_distribution(&kept),
            puppies_vs_adults: Self::puppies_vs_adults(&kept),
            breeds: self.breeds(&kept),
            geography: Self::geography(&kept),
            qa: Self::qa(&all),
        }
    }

    fn by_platform<'a>(records: &[&'a DerivedRecord]) -> BTreeMap<String, Vec<&'a DerivedRecord>> {
        let mut grouped: BTreeMap<String, Vec<&DerivedRecord>> = BTreeMap::new();
        for &record in records {
            grouped.entry(record.fact.platform.clone()).or_default().push(record);
        }
        grouped
    }

    pub fn annualize(&self, unique_puppies: i64) -> i64 {
        let turnover = 365.0 / self.config.listing_lifetime_days;
        (unique_puppies as f64 * turnover * self.config.seasonality_multiplier).round() as i64
    }

    fn summary(&self, all: &[&DerivedRecord], kept: &[&DerivedRecord]) -> SummarySection {
        let raw_puppies = puppies(all);
        let unique_puppies = puppies(kept);
        let annualized_puppies = self.annualize(unique_puppies);
        let market_share_pct = if self.config.national_annual_estimate > 0.0 {
            round_to(annualized_puppies as f64 / self.config.national_annual_estimate * 100.0, 2)
        } else {
            0.0
        };

        SummarySection {
            raw_listings: all.len(),
            raw_puppies,
            raw_avg_per_listing: if all.is_empty() {
                0.0
            } else {
                round_to(raw_puppies as f64 / all.len() as f64, 2)
            },
            unique_listings: kept.len(),
            unique_puppies,
            removed_listings: all.len() - kept.len(),
            annualized_puppies,
            market_share_pct,
        }
    }

    fn availability(records: &[&DerivedRecord]) -> AvailabilityCoverage {
        let n = records.len();
        let known = records.iter().filter(|r| r.availability.availability_known).count();
        let ready_now = records.iter().filter(|r| r.availability.is_ready_now).count();
        let waiting_list = records.iter().filter(|r| r.availability.is_waiting_list).count();
        let unknown = n - ready_now - waiting_list;

        let mut states = BTreeMap::new();
        for record in records {
            *states.entry(record.availability.state.as_str().to_string()).or_insert(0) += 1;
        }

        let prices: Vec<f64> = records.iter().filter_map(|r| r.numbers.price).collect();
        let ages: Vec<f64> = records.iter().filter_map(|r| r.age_days).map(|d| d as f64).collect();

        AvailabilityCoverage {
            known_pct: pct(known, n),
            ready_now,
            waiting_list,
            unknown,
            ready_now_pct: pct(ready_now, n),
            waiting_list_pct: pct(waiting_list, n),
            unknown_pct: pct(unknown, n),
            states,
            price_coverage_pct: pct(prices.len(), n),
            median_price: median_rounded(&prices),
            age_coverage_pct: pct(ages.len(), n),
            median_age_days: median_rounded(&ages),
        }
    }

    fn platforms(&self, all: &[&DerivedRecord]) -> BTreeMap<String, PlatformStats> {
        let raw_puppies = puppies(all);
        Self::by_platform(all)
            .into_iter()
            .map(|(platform, records)| {
                let count = records.len();
                let pups = puppies(&records);
                let stats = PlatformStats {
                    listings: count,
                    puppies: pups,
                    unique: records.iter().filter(|r| is_kept(r)).count(),
                    avg_puppies: if count == 0 { 0.0 } else { round_to(pups as f64 / count as f64, 1) },
                    share_pct: if raw_puppies > 0 {
                        round_to(pups as f64 / raw_puppies as f64 * 100.0, 1)
                    } else {
                        0.0
                    },
                    availability: Self::availability(&records),
                };
                (platform, stats)
            })
            .collect()
    }

    fn group_histogram(all: &[&DerivedRecord]) -> BTreeMap<usize, usize> {
        let mut sizes: BTreeMap<&str, usize> = BTreeMap::new();
        for record in all {
            if let Some(group_id) = record.dedup.group_id.as_deref() {
                *sizes.entry(group_id).or_insert(0) += 1;
            }
        }
        let mut histogram = BTreeMap::new();
        for size in sizes.into_values() {
            *histogram.entry(size).or_insert(0) += 1;
        }
        histogram
    }

    fn sellers(&self, kept: &[&DerivedRecord]) -> SellerSection {
        struct Tally<'a> {
            listings: usize,
            platforms: BTreeSet<&'a str>,
            has_license: bool,
            is_high_volume: bool,
        }

        let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
        for record in kept {
            if record.seller.key == UNKNOWN_SELLER_KEY || record.seller.is_rescue {
                continue;
            }
            let tally = tallies.entry(record.seller.key.as_str()).or_insert_with(|| Tally {
                listings: 0,
                platforms: BTreeSet::new(),
                has_license: false,
                is_high_volume: false,
            });
            tally.listings += 1;
            tally.platforms.insert(record.fact.platform.as_str());
            tally.has_license |= record.get(CanonicalField::LicenseNum).is_some();
            tally.is_high_volume |= record.seller.is_high_volume;
        }

        let high_volume = tallies.values().filter(|t| t.is_high_volume).count();

        let mut by_platform = BTreeMap::new();
        for (platform, records) in Self::by_platform(kept) {
            let keys: BTreeSet<&str> = records
                .iter()
                .filter(|r| r.seller.is_high_volume)
                .map(|r| r.seller.key.as_str())
                .collect();
            let licensed = keys
                .iter()
                .filter(|k| tallies.get(*k).is_some_and(|t| t.has_license))
                .count();
            by_platform.insert(
                platform,
                PlatformSellers {
                    high_volume_sellers: keys.len(),
                    pct_of_high_volume: pct(keys.len(), high_volume),
                    licensed_sellers: licensed,
                    license_pct: pct(licensed, keys.len()),
                },
            );
        }

        let mut ranked: Vec<(&str, &Tally)> = tallies.iter().map(|(k, t)| (*k, t)).collect();
        ranked.sort_by(|a, b| b.1.listings.cmp(&a.1.listings).then_with(|| a.0.cmp(b.0)));
        let top = ranked
            .into_iter()
            .take(self.config.leaderboard_size)
            .map(|(key, tally)| {
                let (name, location) = key.split_once('|').unwrap_or((key, ""));
                TopSeller {
                    name: name.to_string(),
                    location: location.to_string(),
                    listings: tally.listings,
                    platforms: tally.platforms.iter().map(|p| p.to_string()).collect(),
                    has_license: tally.has_license,
                    is_high_volume: tally.is_high_volume,
                }
            })
            .collect();

        SellerSection {
            total: tallies.len(),
            high_volume,
            by_platform,
            top,
        }
    }

    fn freshness(all: &[&DerivedRecord]) -> BTreeMap<String, FreshnessStats> {
        Self::by_platform(all)
            .into_iter()
            .map(|(platform, records)| {
                let ages: Vec<i64> = records.iter().filter_map(|r| r.listing_age_days).collect();
                let mut counts = [0usize; 4];
                for age in &ages {
                    counts[freshness_bucket(*age)] += 1;
                }
                let with_age = ages.len();
                let as_f64: Vec<f64> = ages.iter().map(|d| *d as f64).collect();
                let stats = FreshnessStats {
                    total: records.len(),
                    with_age,
                    median_days: median_rounded(&as_f64),
                    under_7d: bucket(counts[0], with_age),
                    days_7_30: bucket(counts[1], with_age),
                    days_30_90: bucket(counts[2], with_age),
                    over_90d: bucket(counts[3], with_age),
                };
                (platform, stats)
            })
            .collect()
    }

    fn age_distribution(kept: &[&DerivedRecord]) -> BTreeMap<String, AgeStats> {
        let mut distribution = BTreeMap::new();
        for (platform, records) in Self::by_platform(kept) {
            let weeks: Vec<f64> = records.iter().filter_map(|r| r.age_weeks).collect();
            if weeks.is_empty() {
                continue;
            }
            let mut counts = [0usize; 5];
            for w in &weeks {
                counts[age_bucket(*w)] += 1;
            }
            let total = weeks.len();
            distribution.insert(
                platform,
                AgeStats {
                    total_with_age: total,
                    median_weeks: median_rounded(&weeks),
                    under_8w: bucket(counts[0], total),
                    weeks_8_12: bucket(counts[1], total),
                    weeks_12_26: bucket(counts[2], total),
                    months_6_12: bucket(counts[3], total),
                    over_1yr: bucket(counts[4], total),
                },
            );
        }
        distribution
    }

    fn puppies_vs_adults(kept: &[&DerivedRecord]) -> PuppiesVsAdults {
        let weeks: Vec<f64> = kept.iter().filter_map(|r| r.age_weeks).collect();
        let total = weeks.len();
        let over = weeks.iter().filter(|w| age_bucket(**w) == 4).count();
        PuppiesVsAdults {
            total_with_age: total,
            under_1yr: total - over,
            under_1yr_pct: pct(total - over, total),
            over_1yr: over,
            over_1yr_pct: pct(over, total),
        }
    }

    fn breeds(&self, kept: &[&DerivedRecord]) -> BreedSection {
        let excluded: BTreeSet<String> = self.config.excluded_breeds.iter().map(|b| b.to_lowercase()).collect();

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut prices: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for record in kept {
            let Some(breed) = record.get(CanonicalField::Breed) else {
                continue;
            };
            if !excluded.contains(&breed.to_lowercase()) {
                *counts.entry(breed).or_insert(0) += 1;
            }
            if let Some(price) = record.numbers.price {
                prices.entry(breed).or_default().push(price);
            }
        }

        let counted: usize = counts.values().sum();
        let mut by_count: Vec<(&str, usize)> = counts.into_iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let top_by_count = by_count
            .into_iter()
            .take(self.config.leaderboard_size)
            .map(|(breed, count)| BreedCount {
                breed: breed.to_string(),
                count,
                share_pct: pct(count, counted),
            })
            .collect();

        let mut by_price: Vec<BreedPrice> = prices
            .into_iter()
            .filter(|(_, values)| values.len() >= self.config.breed_min_sample)
            .filter_map(|(breed, values)| {
                Some(BreedPrice {
                    breed: breed.to_string(),
                    median_price: median_rounded(&values)?,
                    count: values.len(),
                })
            })
            .collect();
        by_price.sort_by(|a, b| {
            b.median_price
                .total_cmp(&a.median_price)
                .then_with(|| a.breed.cmp(&b.breed))
        });
        by_price.truncate(self.config.leaderboard_size);

        BreedSection {
            top_by_count,
            top_by_price: by_price,
        }
    }

    fn geography(kept: &[&DerivedRecord]) -> Vec<AreaStats> {
        let mut areas: BTreeMap<&str, (usize, Vec<f64>)> = BTreeMap::new();
        for record in kept {
            let Some(location) = record.get(CanonicalField::Location) else {
                continue;
            };
            let area = location_area(location);
            if area.is_empty() {
                continue;
            }
            let entry = areas.entry(area).or_default();
            entry.0 += 1;
            entry.1.extend(record.numbers.price);
        }

        let mut rollup: Vec<AreaStats> = areas
            .into_iter()
            .map(|(area, (listings, prices))| AreaStats {
                area: area.to_string(),
                listings,
                median_price: median_rounded(&prices),
            })
            .collect();
        rollup.sort_by(|a, b| b.listings.cmp(&a.listings).then_with(|| a.area.cmp(&b.area)));
        rollup
    }

    fn qa(all: &[&DerivedRecord]) -> QaSection {
        let mut status_counts: BTreeMap<DedupStatus, usize> = BTreeMap::new();
        let mut flag_counts: BTreeMap<String, usize> = QualityTag::ALL
            .iter()
            .map(|t| (t.as_str().to_string(), 0))
            .collect();
        let mut quantity_sources = BTreeMap::new();
        let mut availability_states: BTreeMap<String, usize> = AvailabilityState::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut filled: BTreeMap<CanonicalField, usize> = BTreeMap::new();
        let mut parse_failures: BTreeMap<String, usize> = BTreeMap::new();

        for record in all {
            *status_counts.entry(record.dedup.status).or_insert(0) += 1;
            for flag in &record.quality_flags {
                *flag_counts.entry(flag.tag.as_str().to_string()).or_insert(0) += 1;
            }
            *quantity_sources
                .entry(record.quantity_source.as_str().to_string())
                .or_insert(0) += 1;
            *availability_states
                .entry(record.availability.state.as_str().to_string())
                .or_insert(0) += 1;

            for field in record.fact.values.keys() {
                *filled.entry(*field).or_insert(0) += 1;
                // Values nullified by the quality gate are not parse failures
                let gated = record.quality_flags.iter().any(|f| f.field == field.as_str());
                if typed_value_present(record, *field) == Some(false) && !gated {
                    *parse_failures.entry(field.as_str().to_string()).or_insert(0) += 1;
                }
            }
        }

        let total = all.len();
        let status = |s: DedupStatus| status_counts.get(&s).copied().unwrap_or(0);
        let (unique_kept, intra, cross, stale) = (
            status(DedupStatus::Unique),
            status(DedupStatus::IntraSourceArtifact),
            status(DedupStatus::CrossPlatformDuplicate),
            status(DedupStatus::Stale),
        );
        let groups: BTreeSet<&str> = all.iter().filter_map(|r| r.dedup.group_id.as_deref()).collect();
        let platforms: BTreeSet<&str> = all.iter().map(|r| r.platform()).collect();

        QaSection {
            total_rows: total,
            unique_kept,
            intra_source_dupes: intra,
            cross_platform_dupes: cross,
            stale_removed: stale,
            conserved: unique_kept + intra + cross + stale == total,
            duplicate_groups: groups.len(),
            platforms_count: platforms.len(),
            flag_counts,
            quantity_sources,
            availability_states,
            fill_rates: CanonicalField::ALL
                .iter()
                .map(|f| {
                    let count = filled.get(f).copied().unwrap_or(0);
                    (f.as_str().to_string(), pct(count, total))
                })
                .collect(),
            parse_failures,
        }
    }
}
