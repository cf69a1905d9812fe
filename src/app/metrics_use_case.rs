use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::app::ports::{DerivedStorePort, MetricsOutputPort};
use crate::config::MetricsConfig;
use crate::observability::metrics;
use crate::pipeline::processing::aggregate::{Aggregator, MetricsSnapshot, SnapshotContext};
use crate::pipeline::processing::derive::timestamps::format_timestamp;
use crate::schema::CanonicalSchema;

/// Use case for computing the metrics snapshot from the derived view
pub struct MetricsUseCase<'a> {
    config: &'a MetricsConfig,
    schema: &'a CanonicalSchema,
    derived: Box<dyn DerivedStorePort + 'a>,
    output: Box<dyn MetricsOutputPort + 'a>,
}

impl<'a> MetricsUseCase<'a> {
    pub fn new(
        config: &'a MetricsConfig,
        schema: &'a CanonicalSchema,
        derived: Box<dyn DerivedStorePort + 'a>,
        output: Box<dyn MetricsOutputPort + 'a>,
    ) -> Self {
        Self {
            config,
            schema,
            derived,
            output,
        }
    }

    /// `fallback_asof` is used only when the derived view is empty; otherwise
    /// the anchor the records were derived against is reported.
    pub fn execute(&self, fallback_asof: DateTime<Utc>) -> Result<MetricsSnapshot> {
        let records = self
            .derived
            .read_derived(self.schema)
            .with_context(|| format!("Failed to read derived view from {}", self.derived.location().display()))?;

        let asof = records.first().map(|r| r.asof_ts).unwrap_or(fallback_asof);
        let context = SnapshotContext {
            run_id: Uuid::new_v4().to_string(),
            generated_at: format_timestamp(&Utc::now()),
            as_of: format_timestamp(&asof),
        };

        let snapshot = Aggregator::new(self.config.clone()).snapshot(&records, &context);

        self.output
            .write_snapshot(&snapshot)
            .with_context(|| format!("Failed to write metrics to {}", self.output.location().display()))?;
        metrics::aggregate::snapshot_written();

        info!(
            run_id = %snapshot.run_id,
            raw_listings = snapshot.summary.raw_listings,
            unique_listings = snapshot.summary.unique_listings,
            unique_puppies = snapshot.summary.unique_puppies,
            annualized = snapshot.summary.annualized_puppies,
            path = %self.output.location().display(),
            "Metrics snapshot written"
        );
        Ok(snapshot)
    }
}
