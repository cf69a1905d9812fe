use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::{fs, path::PathBuf};

use dog_market::infra::metrics_json_adapter::MetricsContract;

/// Validate a metrics snapshot against the metrics_snapshot.v1 schema.
#[derive(Parser, Debug)]
#[command(name = "validate-metrics", version, about = "Validate a metrics snapshot against its schema")]
struct Cli {
    /// Path to the metrics JSON file to validate
    path: PathBuf,

    /// Optional path to a schema file (defaults to schemas/metrics_snapshot.v1.json)
    #[arg(long)]
    schema: Option<PathBuf>,
}

fn load_json(path: &PathBuf) -> Result<Value> {
    let data = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let json: Value =
        serde_json::from_str(&data).with_context(|| format!("Failed to parse JSON in {}", path.display()))?;
    Ok(json)
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let schema_path = args
        .schema
        .unwrap_or_else(|| PathBuf::from("schemas/metrics_snapshot.v1.json"));

    let contract = MetricsContract::load(&schema_path).context("Failed to compile JSON Schema")?;
    let instance = load_json(&args.path)?;

    let violations = contract.violations(&instance);
    if violations.is_empty() {
        println!("valid");
        return Ok(());
    }

    eprintln!("invalid:");
    for violation in violations {
        eprintln!("- {}", violation);
    }
    std::process::exit(1)
}
