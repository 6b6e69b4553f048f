//! Database repository layer
//!
//! Owns the SQLite connection and provides the table rebuild primitive
//! used by the loader plus read operations over the pipeline tables.

use super::schema::{STAGING_EVENTS, TRIAL_ACTIVATION, TRIAL_GOALS};
use crate::error::{Error, Result};
use crate::types::{parse_stored_timestamp, GoalRecord, StagingEvent};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Database handle owning a single connection.
///
/// Every pipeline and metric operation takes a `&Database`; there is no
/// process-wide connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        tracing::debug!(path = %path.display(), "Opened database");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the underlying connection
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Drop, recreate and populate one table inside a single transaction.
    ///
    /// `populate` receives the open transaction and returns the number of
    /// rows it wrote. If any step fails the previous table is left intact.
    pub fn replace_table<F>(&self, table: &str, create_sql: &str, populate: F) -> Result<usize>
    where
        F: FnOnce(&Transaction<'_>) -> Result<usize>,
    {
        let started = Instant::now();
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table))?;
        tx.execute_batch(create_sql)?;
        let rows = populate(&tx)?;
        tx.commit()?;

        tracing::info!(
            table,
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rebuilt table"
        );

        Ok(rows)
    }

    // ============================================
    // Introspection
    // ============================================

    /// Check whether a table exists
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List user tables in the database, sorted by name
    pub fn table_names(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Count rows in a table
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let conn = self.connection()?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    /// Count distinct organizations in a table
    pub fn count_organizations(&self, table: &str) -> Result<i64> {
        let conn = self.connection()?;
        let count = conn.query_row(
            &format!("SELECT COUNT(DISTINCT organization_id) FROM {}", table),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ============================================
    // Reads
    // ============================================

    /// All staging rows in surrogate key order
    pub fn list_staging_events(&self) -> Result<Vec<StagingEvent>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, organization_id, activity_name, activity_detail, timestamp
             FROM {} ORDER BY id",
            STAGING_EVENTS
        ))?;
        let events = stmt
            .query_map([], row_to_staging_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// All goal records ordered by organization id
    pub fn list_goal_records(&self) -> Result<Vec<GoalRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT organization_id, goal_shift_created, goal_employee_invited,
                    goal_punched_in, goal_punch_in_approved, goal_advanced_features
             FROM {} ORDER BY organization_id",
            TRIAL_GOALS
        ))?;
        let records = stmt
            .query_map([], |row| {
                Ok(GoalRecord {
                    organization_id: row.get(0)?,
                    shift_created: row.get(1)?,
                    employee_invited: row.get(2)?,
                    punched_in: row.get(3)?,
                    punch_in_approved: row.get(4)?,
                    advanced_features: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Activated organization ids, sorted
    pub fn list_activated_organizations(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT organization_id FROM {} ORDER BY organization_id",
            TRIAL_ACTIVATION
        ))?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

fn row_to_staging_event(row: &Row<'_>) -> rusqlite::Result<StagingEvent> {
    let ts: String = row.get(4)?;
    let timestamp = parse_stored_timestamp(&ts).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("invalid stored timestamp: {}", ts).into(),
        )
    })?;

    Ok(StagingEvent {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        activity_name: row.get(2)?,
        activity_detail: row.get(3)?,
        timestamp,
    })
}
