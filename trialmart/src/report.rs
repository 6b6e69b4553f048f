//! trialmart-report - CLI tool to print trial activation metrics
//!
//! Reads the mart tables built by `trialmart-load`; never writes.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use trialmart_core::analytics::MetricsReport;
use trialmart_core::format::{format_days, format_days_opt, format_percent};
use trialmart_core::{Config, Database};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "trialmart-report")]
#[command(about = "Print trial activation metrics")]
#[command(version)]
struct Args {
    /// Database file (defaults to database.path from the config, then the XDG data dir)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Day window for goal achievement probabilities (defaults to report.within_days)
    #[arg(long)]
    within_days: Option<u32>,
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
    let within_days = args.within_days.unwrap_or(config.report.within_days);

    let report =
        MetricsReport::compute(&db, within_days).context("failed to compute metrics")?;

    match args.format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print_text(&report),
    }

    Ok(())
}

fn print_text(report: &MetricsReport) {
    println!(
        "Trial Activation Rate: {}",
        format_percent(report.activation_rate)
    );
    println!(
        "Average Time to Activation: {}",
        format_days(report.time_to_activation_days)
    );

    println!("\nGoal Completion Rates:");
    for rate in &report.goal_completion_rates {
        println!("  {:<20} {:>8}", rate.label, format_percent(rate.value));
    }

    println!("\nFeature Engagement Rates:");
    for feature in &report.feature_engagement_rates {
        println!("  {:<22} {:>8}", feature.feature, format_percent(feature.rate));
    }

    println!("\nAverage Time to Goal (from first activity):");
    for timing in &report.goal_achievement_times {
        println!(
            "  {:<20} {:>12}  ({} orgs)",
            timing.label,
            format_days_opt(timing.value.mean_days),
            timing.value.organizations
        );
    }

    println!(
        "\nGoal Achievement Probabilities (within {} days):",
        report.within_days
    );
    for probability in &report.goal_achievement_probabilities {
        println!(
            "  {:<20} {:>8}",
            probability.label,
            format_percent(probability.value)
        );
    }
}
