//! `reward-calc`: run one reward calculation from JSON files
//!
//! Reads a pipeline configuration and a cycle snapshot, runs every phase and
//! prints the calculation report as JSON on stdout. Logs go to stderr and are
//! filtered with `RUST_LOG`.

use anyhow::{Context, Result};
use clap::Parser;
use reward_distribution_core_rs::{Pipeline, PipelineConfig, RewardSnapshot};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "reward-calc", version, about = "Compute reward payouts for one cycle")]
struct Args {
    /// Reward snapshot (JSON)
    #[arg(long)]
    snapshot: PathBuf,

    /// Pipeline configuration (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print only the payout list
    #[arg(long)]
    payouts_only: bool,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    PipelineConfig::from_json_str(&json)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

fn load_snapshot(path: &Path) -> Result<RewardSnapshot> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    RewardSnapshot::from_json_str(&json)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let snapshot = load_snapshot(&args.snapshot)?;

    let pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;
    let report = pipeline
        .run(&snapshot)
        .with_context(|| format!("Calculation failed for cycle {}", snapshot.cycle))?;

    let output = match (args.payouts_only, args.pretty) {
        (true, true) => serde_json::to_string_pretty(&report.payouts)?,
        (true, false) => serde_json::to_string(&report.payouts)?,
        (false, true) => serde_json::to_string_pretty(&report)?,
        (false, false) => serde_json::to_string(&report)?,
    };
    println!("{}", output);

    tracing::info!(run_id = %report.run_id, digest = %report.digest, "report written");

    Ok(())
}
