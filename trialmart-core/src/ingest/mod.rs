//! Ingestion layer: CSV event log to pipeline tables
//!
//! The loader runs every layer in dependency order, each as its own
//! drop/recreate/populate transaction:
//!
//! ```text
//! ┌────────────┐   ┌───────────────────┐   ┌───────────────────────────┐
//! │  CSV file  │──►│ behavioral_events │──►│ staging_behavioral_events │
//! └────────────┘   └───────────────────┘   └─────────────┬─────────────┘
//!                                                        ▼
//!                  ┌───────────────────┐   ┌───────────────────────────┐
//!                  │ trial_activation  │◄──│        trial_goals        │
//!                  └───────────────────┘   └───────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trialmart_core::{Database, Config};
//! use trialmart_core::ingest::Loader;
//!
//! let db = Database::open(&Config::database_path())?;
//! let result = Loader::new(&db).load_path(Path::new("events.csv"))?;
//! println!("{} of {} organizations activated", result.activated, result.organizations);
//! ```

mod parser;

pub use parser::{parse_timestamp, EventCsvParser};

use crate::check;
use crate::db::schema::{CREATE_RAW_EVENTS, RAW_EVENTS};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::mart;
use crate::types::{format_timestamp, RawEvent};
use rusqlite::params;
use std::path::Path;
use std::time::{Duration, Instant};

/// Summary of a full pipeline run.
#[derive(Debug, Default, Clone)]
pub struct LoadResult {
    /// Rows written to the raw and staging tables
    pub events_loaded: usize,
    /// Distinct organizations in the input
    pub organizations: usize,
    /// Rows written to `trial_goals`
    pub goal_rows: usize,
    /// Rows written to `trial_activation`
    pub activated: usize,
    /// Wall time for the whole run
    pub elapsed: Duration,
}

/// Runs the load and every transformation layer against one database.
pub struct Loader<'a> {
    db: &'a Database,
    parser: EventCsvParser,
}

impl<'a> Loader<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            parser: EventCsvParser::new(),
        }
    }

    /// Parse a CSV file and rebuild all pipeline tables from it.
    pub fn load_path(&self, path: &Path) -> Result<LoadResult> {
        let events = self.parser.parse_path(path)?;
        tracing::info!(
            path = %path.display(),
            events = events.len(),
            "Parsed event log"
        );
        self.load_events(&events)
    }

    /// Rebuild all pipeline tables from already-parsed events.
    pub fn load_events(&self, events: &[RawEvent]) -> Result<LoadResult> {
        let started = Instant::now();

        let events_loaded = write_raw_events(self.db, events)?;
        mart::staging::build(self.db)?;
        let goal_rows = mart::goals::build(self.db)?;

        let (consistency, activated) = build_activation(self.db)?;

        let result = LoadResult {
            events_loaded,
            organizations: consistency.raw_organizations as usize,
            goal_rows,
            activated,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            events = result.events_loaded,
            organizations = result.organizations,
            activated = result.activated,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Pipeline run complete"
        );

        Ok(result)
    }
}

/// Build `trial_activation` once the upstream layers agree on organizations.
///
/// On divergence `trial_activation` is emptied so it never holds rows from
/// an earlier run next to the new goal table.
fn build_activation(db: &Database) -> Result<(check::OrganizationConsistency, usize)> {
    let consistency = check::organization_consistency(db)?;
    if !consistency.is_consistent() {
        tracing::error!(?consistency, "Organization counts diverged");
        mart::activation::clear(db)?;
        return Err(Error::Consistency(consistency.describe()));
    }

    let activated = mart::activation::build(db)?;
    Ok((consistency, activated))
}

/// Replace `behavioral_events` with the given events.
fn write_raw_events(db: &Database, events: &[RawEvent]) -> Result<usize> {
    db.replace_table(RAW_EVENTS, CREATE_RAW_EVENTS, |tx| {
        let mut stmt = tx.prepare(
            "INSERT INTO behavioral_events
                (organization_id, timestamp, activity_name, activity_detail)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for event in events {
            stmt.execute(params![
                event.organization_id,
                format_timestamp(&event.timestamp),
                event.activity_name,
                event.activity_detail,
            ])?;
        }
        Ok(events.len())
    })
}
