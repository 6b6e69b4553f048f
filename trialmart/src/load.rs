//! trialmart-load - CLI tool to load a behavioral event CSV and rebuild the marts
//!
//! Every run drops and rebuilds `behavioral_events`,
//! `staging_behavioral_events`, `trial_goals` and `trial_activation`.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/trialmart/trial_data.db (~/.local/share/trialmart/trial_data.db)
//! - Logs: $XDG_STATE_HOME/trialmart/trialmart.log.<date> (~/.local/state/trialmart/)
//! - Config: $XDG_CONFIG_HOME/trialmart/config.toml (~/.config/trialmart/config.toml)

mod process_lock;

use anyhow::{Context, Result};
use clap::Parser;
use process_lock::acquire_load_guard;
use std::path::PathBuf;
use trialmart_core::check;
use trialmart_core::ingest::Loader;
use trialmart_core::{Config, Database};

#[derive(Parser)]
#[command(name = "trialmart-load")]
#[command(about = "Load behavioral events and rebuild the trial activation marts")]
#[command(version)]
struct Args {
    /// CSV file to load (defaults to input.csv_path from the config)
    csv: Option<PathBuf>,

    /// Database file (defaults to database.path from the config, then the XDG data dir)
    #[arg(long)]
    database: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        trialmart_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("trialmart-load starting");

    let db_path = config.resolve_database_path(args.database);
    let csv_path = args.csv.unwrap_or_else(|| config.input.csv_path.clone());

    let _load_guard = acquire_load_guard(&db_path).context("failed to acquire process lock")?;

    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;

    println!("Database: {}", db_path.display());
    println!("Input:    {}", csv_path.display());
    println!("Log:      {}", trialmart_core::logging::current_log_file().display());

    let result = Loader::new(&db)
        .load_path(&csv_path)
        .with_context(|| format!("failed to load {}", csv_path.display()))?;

    let consistency =
        check::organization_consistency(&db).context("failed to read consistency counts")?;

    println!("\nLoad complete:");
    println!("  Events loaded:         {}", result.events_loaded);
    println!("  Organizations:         {}", result.organizations);
    println!("  Goal rows:             {}", result.goal_rows);
    println!("  Activated orgs:        {}", result.activated);
    println!("  Elapsed:               {:.2?}", result.elapsed);

    println!("\nConsistency check:");
    println!("  Rows (raw/staging):    {} / {}", consistency.raw_rows, consistency.staging_rows);
    println!(
        "  Orgs (raw/staging/goals): {} / {} / {}",
        consistency.raw_organizations,
        consistency.staging_organizations,
        consistency.goal_organizations
    );

    tracing::info!("trialmart-load complete");
    Ok(())
}
