pub mod ports;
pub mod facts_use_case;
pub mod derive_use_case;
pub mod metrics_use_case;

use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::app::derive_use_case::DeriveReport;
use crate::app::facts_use_case::FactsReport;
use crate::pipeline::processing::aggregate::MetricsSnapshot;

/// Export rows read versus rows accounted for after deduplication.
/// Malformed CSV records never reach the facts table, so they are counted
/// on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowConservation {
    pub input_rows: usize,
    pub unique: usize,
    pub duplicates: usize,
    pub stale: usize,
    pub skipped: usize,
}

impl RowConservation {
    pub fn accounted(&self) -> usize {
        self.unique + self.duplicates + self.stale + self.skipped
    }

    pub fn is_balanced(&self) -> bool {
        self.input_rows == self.accounted()
    }
}

/// Per-run data-quality summary across the stages that ran
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub facts: Option<FactsReport>,
    pub derive: Option<DeriveReport>,
    pub fill_rates: BTreeMap<String, f64>,
    pub flag_counts: BTreeMap<String, usize>,
    pub run_id: Option<String>,
}

impl RunReport {
    pub fn with_facts(mut self, report: FactsReport) -> Self {
        self.facts = Some(report);
        self
    }

    pub fn with_derive(mut self, report: DeriveReport) -> Self {
        self.derive = Some(report);
        self
    }

    pub fn with_snapshot(mut self, snapshot: &MetricsSnapshot) -> Self {
        self.fill_rates = snapshot.qa.fill_rates.clone();
        self.flag_counts = snapshot.qa.flag_counts.clone();
        self.run_id = Some(snapshot.run_id.clone());
        self
    }

    /// Needs both the facts and derive reports
    pub fn conservation(&self) -> Option<RowConservation> {
        let facts = self.facts.as_ref()?;
        let d = &self.derive.as_ref()?.dedup;
        Some(RowConservation {
            input_rows: facts.rows_written + facts.skipped_rows,
            unique: d.unique_kept,
            duplicates: d.intra_source_dupes + d.cross_platform_dupes,
            stale: d.stale_removed,
            skipped: facts.skipped_rows,
        })
    }

    pub fn log(&self) {
        if let Some(facts) = &self.facts {
            info!(
                rows = facts.rows_written,
                skipped = facts.skipped_rows,
                loaded = ?facts.platforms_loaded,
                missing = ?facts.platforms_missing,
                "Run report: facts"
            );
        }
        if let Some(derive) = &self.derive {
            let d = &derive.dedup;
            info!(
                rows = derive.rows,
                unique = d.unique_kept,
                intra_source = d.intra_source_dupes,
                cross_platform = d.cross_platform_dupes,
                stale = d.stale_removed,
                flags = ?derive.flag_counts,
                "Run report: derive"
            );
        }
        if let Some(c) = self.conservation() {
            if c.is_balanced() {
                info!(
                    input = c.input_rows,
                    unique = c.unique,
                    duplicates = c.duplicates,
                    stale = c.stale,
                    skipped = c.skipped,
                    "Run report: rows conserved"
                );
            } else {
                warn!(
                    input = c.input_rows,
                    accounted = c.accounted(),
                    unique = c.unique,
                    duplicates = c.duplicates,
                    stale = c.stale,
                    skipped = c.skipped,
                    "Run report: row counts do not balance"
                );
            }
        }
        if let Some(run_id) = &self.run_id {
            let sparse: Vec<_> = self.fill_rates.iter().filter(|(_, rate)| **rate < 50.0).collect();
            info!(
                run_id = %run_id,
                tags = ?self.flag_counts,
                sparse_fields = ?sparse,
                "Run report: metrics"
            );
        }
    }
}
