use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{info, info_span};

use crate::app::ports::{DerivedStorePort, FactsStorePort};
use crate::config::Config;
use crate::pipeline::processing::availability::{AvailabilityResolver, AvailabilityRule};
use crate::pipeline::processing::conflation::{DedupSummary, DefaultDeduplicator, Deduplicator};
use crate::pipeline::processing::derive::{DerivedRecord, TypedFieldDeriver};
use crate::pipeline::processing::identity::IdentityResolver;
use crate::pipeline::processing::normalize::{CanonicalFact, PlatformRegistry};
use crate::pipeline::processing::quality_gate::{DefaultQualityGate, QualityGate};
use crate::schema::CanonicalSchema;

/// Per-run counts from the derive stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeriveReport {
    pub rows: usize,
    pub dedup: DedupSummary,
    pub flag_counts: BTreeMap<String, usize>,
    pub sellers: usize,
    pub high_volume_sellers: usize,
}

/// Runs every record-level stage in order: typed derivation, quality gate,
/// availability, deduplication and identity resolution.
pub struct DerivePipeline<'a> {
    config: &'a Config,
    registry: &'a PlatformRegistry,
    asof: DateTime<Utc>,
    quality_gate: Box<dyn QualityGate + 'a>,
}

impl<'a> DerivePipeline<'a> {
    pub fn new(config: &'a Config, registry: &'a PlatformRegistry, asof: DateTime<Utc>) -> Self {
        Self {
            config,
            registry,
            asof,
            quality_gate: Box::new(DefaultQualityGate::with_config(config.quantity.clone())),
        }
    }

    /// Swap in a custom quality gate
    pub fn with_quality_gate(mut self, quality_gate: Box<dyn QualityGate + 'a>) -> Self {
        self.quality_gate = quality_gate;
        self
    }

    fn rule_for(&self, platform: &str) -> AvailabilityRule {
        self.registry
            .get(platform)
            .map(|profile| profile.availability_rule())
            .unwrap_or(AvailabilityRule::DirectDate)
    }

    pub fn run(&self, facts: Vec<CanonicalFact>) -> (Vec<DerivedRecord>, DeriveReport) {
        let deriver = TypedFieldDeriver::new(&self.config.quantity, self.asof);
        let resolver = AvailabilityResolver::new(self.config.availability.clone());

        let validated: Vec<DerivedRecord> = {
            let _span = info_span!("derive", rows = facts.len()).entered();
            facts
                .into_iter()
                .map(|fact| deriver.derive(fact))
                .map(|record| self.quality_gate.assess(record))
                .map(|record| {
                    let rule = self.rule_for(record.platform());
                    resolver.apply(rule, record)
                })
                .collect()
        };

        let deduplicated = {
            let _span = info_span!("dedup").entered();
            DefaultDeduplicator::new(self.config.dedup.clone(), self.registry).deduplicate(validated)
        };

        let identities = {
            let _span = info_span!("identity").entered();
            IdentityResolver::new(self.config.identity.clone()).resolve(deduplicated.records)
        };

        let mut flag_counts = BTreeMap::new();
        for record in &identities.records {
            for flag in &record.quality_flags {
                *flag_counts.entry(flag.to_string()).or_insert(0) += 1;
            }
        }

        let report = DeriveReport {
            rows: identities.records.len(),
            dedup: deduplicated.summary,
            flag_counts,
            sellers: identities.known_sellers().count(),
            high_volume_sellers: identities.known_sellers().filter(|s| s.is_high_volume).count(),
        };
        (identities.records, report)
    }
}

/// Use case for building the derived view from the facts table
pub struct DeriveUseCase<'a> {
    config: &'a Config,
    registry: &'a PlatformRegistry,
    schema: &'a CanonicalSchema,
    facts: Box<dyn FactsStorePort + 'a>,
    output: Box<dyn DerivedStorePort + 'a>,
}

impl<'a> DeriveUseCase<'a> {
    pub fn new(
        config: &'a Config,
        registry: &'a PlatformRegistry,
        schema: &'a CanonicalSchema,
        facts: Box<dyn FactsStorePort + 'a>,
        output: Box<dyn DerivedStorePort + 'a>,
    ) -> Self {
        Self {
            config,
            registry,
            schema,
            facts,
            output,
        }
    }

    pub fn execute(&self, asof: DateTime<Utc>) -> Result<DeriveReport> {
        let facts = self
            .facts
            .read_facts(self.schema)
            .with_context(|| format!("Failed to read facts from {}", self.facts.location().display()))?;
        info!(rows = facts.len(), asof = %asof, "Deriving typed fields");

        let (records, report) = DerivePipeline::new(self.config, self.registry, asof).run(facts);

        if !report.dedup.is_conserved() {
            anyhow::bail!("Deduplication lost rows: {:?}", report.dedup);
        }

        self.output
            .write_derived(self.schema, &records)
            .with_context(|| format!("Failed to write derived view to {}", self.output.location().display()))?;

        info!(
            rows = report.rows,
            unique = report.dedup.unique_kept,
            sellers = report.sellers,
            high_volume = report.high_volume_sellers,
            path = %self.output.location().display(),
            "Derived view written"
        );
        Ok(report)
    }
}
