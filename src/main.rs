use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use dog_market::app::derive_use_case::{DeriveReport, DeriveUseCase};
use dog_market::app::facts_use_case::{FactsReport, FactsUseCase};
use dog_market::app::metrics_use_case::MetricsUseCase;
use dog_market::app::RunReport;
use dog_market::config::Config;
use dog_market::infra::derived_csv_adapter::DerivedCsvAdapter;
use dog_market::infra::export_source_adapter::DirectoryExportSource;
use dog_market::infra::facts_csv_adapter::FactsCsvAdapter;
use dog_market::infra::metrics_json_adapter::{MetricsContract, MetricsJsonAdapter};
use dog_market::logging;
use dog_market::pipeline::processing::aggregate::MetricsSnapshot;
use dog_market::pipeline::PlatformRegistry;
use dog_market::schema::CanonicalSchema;

#[derive(Parser)]
#[command(name = "dog-market")]
#[command(about = "Reconcile scraped puppy marketplace listings into one dataset and market metrics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map every platform export into the canonical facts table
    Facts,
    /// Build the derived view from the facts table
    Derive,
    /// Compute the metrics snapshot from the derived view
    Metrics,
    /// Run facts, derive and metrics in order
    Run,
}

/// Everything a stage needs, loaded once per invocation
struct Runtime {
    config: Config,
    schema: CanonicalSchema,
    registry: PlatformRegistry,
    asof: DateTime<Utc>,
}

impl Runtime {
    fn load() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        let schema = CanonicalSchema::load(&config.paths.schema)
            .with_context(|| format!("Failed to load canonical schema from {}", config.paths.schema.display()))?;
        let asof = config.run.resolve_as_of(Utc::now())?;

        info!(fields = schema.len(), asof = %asof, "Runtime ready");
        Ok(Self {
            config,
            schema,
            registry: PlatformRegistry::new(),
            asof,
        })
    }

    fn facts(&self) -> Result<FactsReport> {
        let paths = &self.config.paths;
        FactsUseCase::new(
            &self.registry,
            &self.schema,
            Box::new(DirectoryExportSource::new(&paths.raw_dir)),
            Box::new(FactsCsvAdapter::new(&paths.facts)),
        )
        .execute()
    }

    fn derive(&self) -> Result<DeriveReport> {
        let paths = &self.config.paths;
        DeriveUseCase::new(
            &self.config,
            &self.registry,
            &self.schema,
            Box::new(FactsCsvAdapter::new(&paths.facts)),
            Box::new(DerivedCsvAdapter::new(&paths.derived)),
        )
        .execute(self.asof)
    }

    fn metrics(&self) -> Result<MetricsSnapshot> {
        let paths = &self.config.paths;
        let contract = MetricsContract::load(&paths.metrics_contract)
            .with_context(|| format!("Failed to load metrics contract from {}", paths.metrics_contract.display()))?;
        MetricsUseCase::new(
            &self.config.metrics,
            &self.schema,
            Box::new(DerivedCsvAdapter::new(&paths.derived)),
            Box::new(MetricsJsonAdapter::new(&paths.metrics, contract)),
        )
        .execute(self.asof)
    }
}

fn print_facts(report: &FactsReport) {
    println!(
        "✅ Facts: {} rows from {} platforms ({} missing, {} rows skipped)",
        report.rows_written,
        report.platforms_loaded.len(),
        report.platforms_missing.len(),
        report.skipped_rows
    );
}

fn print_derive(report: &DeriveReport) {
    let d = &report.dedup;
    println!(
        "✅ Derive: {} rows, {} unique, {} intra-source, {} cross-platform, {} stale",
        report.rows, d.unique_kept, d.intra_source_dupes, d.cross_platform_dupes, d.stale_removed
    );
}

fn print_metrics(snapshot: &MetricsSnapshot) {
    println!(
        "✅ Metrics: {} unique listings, {} unique puppies, {} annualized (run {})",
        snapshot.summary.unique_listings,
        snapshot.summary.unique_puppies,
        snapshot.summary.annualized_puppies,
        snapshot.run_id
    );
}

fn execute(command: Commands) -> Result<()> {
    let runtime = Runtime::load()?;

    match command {
        Commands::Facts => {
            println!("📥 Building facts table...");
            print_facts(&runtime.facts()?);
        }
        Commands::Derive => {
            println!("🔨 Building derived view...");
            print_derive(&runtime.derive()?);
        }
        Commands::Metrics => {
            println!("📊 Computing metrics...");
            print_metrics(&runtime.metrics()?);
        }
        Commands::Run => {
            println!("🚀 Running full pipeline...");

            println!("\n📥 Step 1: facts");
            let facts = runtime.facts()?;
            print_facts(&facts);

            println!("\n🔨 Step 2: derive");
            let derive = runtime.derive()?;
            print_derive(&derive);

            println!("\n📊 Step 3: metrics");
            let snapshot = runtime.metrics()?;
            print_metrics(&snapshot);

            RunReport::default()
                .with_facts(facts)
                .with_derive(derive)
                .with_snapshot(&snapshot)
                .log();
        }
    }
    Ok(())
}

fn main() {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    if let Err(e) = execute(cli.command) {
        error!("Pipeline failed: {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}
