use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use crate::error::{PipelineError, Result};

/// Run configuration: file locations plus every tunable policy value.
///
/// Every section has defaults, so a missing `config.toml` is not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub run: RunConfig,
    pub quantity: QuantityConfig,
    pub availability: AvailabilityConfig,
    pub dedup: DedupConfig,
    pub identity: IdentityConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the per-platform scraper exports
    pub raw_dir: PathBuf,
    /// Canonical schema definition (one `field_name` per row)
    pub schema: PathBuf,
    pub facts: PathBuf,
    pub derived: PathBuf,
    pub metrics: PathBuf,
    /// JSON Schema the metrics document must satisfy
    pub metrics_contract: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            schema: PathBuf::from("schema/canonical_schema.csv"),
            facts: PathBuf::from("output/facts/facts.csv"),
            derived: PathBuf::from("output/views/derived.csv"),
            metrics: PathBuf::from("output/metrics/metrics.json"),
            metrics_contract: PathBuf::from("schemas/metrics_snapshot.v1.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Fixed run anchor (RFC 3339 or YYYY-MM-DD); wall clock when unset
    pub as_of: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantityConfig {
    /// Largest plausible litter; larger corrected values are clamped to it
    pub max_litter_size: u32,
    /// Values above this are treated as mis-scrapes, not big litters
    pub hard_litter_ceiling: u32,
    pub year_like_min: i64,
    pub year_like_max: i64,
    /// Values above this look like a price copied into the quantity field
    pub price_scale_threshold: i64,
}

impl Default for QuantityConfig {
    fn default() -> Self {
        Self {
            max_litter_size: 12,
            hard_litter_ceiling: 20,
            year_like_min: 1800,
            year_like_max: 2099,
            price_scale_threshold: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Heuristic: puppies are assumed ready this many weeks after birth
    pub dob_ready_weeks: i64,
    /// Day+month dates further than this from the anchor get rolled or distrusted
    pub day_month_window_days: i64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            dob_ready_weeks: 8,
            day_month_window_days: 180,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalPreference {
    /// First member by platform order, then input order
    ProcessingOrder,
    /// Member with the most populated canonical fields; ties by processing order
    MostComplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Price band width for the cross-platform fingerprint, in pounds
    pub price_band: f64,
    pub stale_after_days: i64,
    pub canonical_preference: CanonicalPreference,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            price_band: 50.0,
            stale_after_days: 180,
            canonical_preference: CanonicalPreference::ProcessingOrder,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub high_volume_min_listings: usize,
    pub rehoming_heuristic: RehomingHeuristic,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            high_volume_min_listings: 3,
            rehoming_heuristic: RehomingHeuristic::default(),
        }
    }
}

/// Approximate rehoming signal: an adult dog offered cheaply.
///
/// This is a business heuristic, not a regulatory classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RehomingHeuristic {
    pub enabled: bool,
    pub min_age_days: i64,
    pub max_price: f64,
}

impl Default for RehomingHeuristic {
    fn default() -> Self {
        Self {
            enabled: true,
            min_age_days: 365,
            max_price: 500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Assumed average days a listing stays live
    pub listing_lifetime_days: f64,
    pub seasonality_multiplier: f64,
    /// National annual puppy sales used as the market-share denominator
    pub national_annual_estimate: f64,
    pub breed_min_sample: usize,
    pub leaderboard_size: usize,
    pub excluded_breeds: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listing_lifetime_days: 30.0,
            seasonality_multiplier: 1.2,
            national_annual_estimate: 946_000.0,
            breed_min_sample: 5,
            leaderboard_size: 10,
            excluded_breeds: vec!["Mixed Breed".to_string()],
        }
    }
}

impl Config {
    /// Load from `$DOG_MARKET_CONFIG`, else `config.toml`.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            warn!(path = %config_path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&config_content)?;
        info!(path = %config_path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let q = &self.quantity;
        if q.max_litter_size == 0 {
            return Err(PipelineError::Config("quantity.max_litter_size must be at least 1".into()));
        }
        if q.hard_litter_ceiling < q.max_litter_size {
            return Err(PipelineError::Config(
                "quantity.hard_litter_ceiling must be >= quantity.max_litter_size".into(),
            ));
        }
        if q.year_like_min > q.year_like_max {
            return Err(PipelineError::Config("quantity.year_like_min exceeds year_like_max".into()));
        }
        if !(self.dedup.price_band > 0.0) {
            return Err(PipelineError::Config("dedup.price_band must be positive".into()));
        }
        if !(self.metrics.listing_lifetime_days > 0.0) {
            return Err(PipelineError::Config("metrics.listing_lifetime_days must be positive".into()));
        }
        if !(self.metrics.national_annual_estimate > 0.0) {
            return Err(PipelineError::Config("metrics.national_annual_estimate must be positive".into()));
        }
        self.run.resolve_as_of(Utc::now())?;
        Ok(())
    }
}

impl RunConfig {
    /// The configured anchor, or `now` when none is set.
    pub fn resolve_as_of(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let Some(raw) = self.as_of.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(now);
        };

        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| PipelineError::Config(format!("run.as_of is not a valid date: {raw}")))
    }
}
