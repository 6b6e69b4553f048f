//! trialmart-check - CLI tool to verify the pipeline tables
//!
//! Checks organization coverage across layers, atomic activity values,
//! boolean goal flags and empty tables. Exits non-zero on any failure.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use trialmart_core::check::run_checks;
use trialmart_core::{Config, Database};

#[derive(Parser)]
#[command(name = "trialmart-check")]
#[command(about = "Verify consistency of the trial activation tables")]
#[command(version)]
struct Args {
    /// Database file (defaults to database.path from the config, then the XDG data dir)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        trialmart_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = config.resolve_database_path(args.database);
    if !db_path.exists() {
        anyhow::bail!(
            "no database at {}; run 'trialmart-load' first",
            db_path.display()
        );
    }

    let db = Database::open(&db_path).context("failed to open database")?;
    let report = run_checks(&db).context("failed to run checks")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Database: {}", db_path.display());
        for (table, rows) in &report.table_rows {
            println!("  {:<28} {:>8} rows", table, rows);
        }
        println!("  Consistency: {}", report.consistency.describe());
        for warning in report.warnings() {
            println!("warning: {}", warning);
        }
    }

    let failures = report.failures();
    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("FAILED: {}", failure);
        }
        anyhow::bail!("{} check(s) failed", failures.len());
    }

    println!("All checks passed");
    Ok(())
}
