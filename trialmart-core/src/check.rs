//! Consistency and normalization checks over the pipeline tables
//!
//! The loader runs [`organization_consistency`] before building the
//! activation mart. `trialmart-check` runs the full [`run_checks`] suite
//! against an existing database.

use crate::db::schema::{
    PIPELINE_TABLES, RAW_EVENTS, STAGING_EVENTS, TRIAL_ACTIVATION, TRIAL_GOALS,
};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::Goal;
use serde::Serialize;

/// Organization and row counts across the raw, staging and goal layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationConsistency {
    pub raw_rows: i64,
    pub staging_rows: i64,
    pub raw_organizations: i64,
    pub staging_organizations: i64,
    pub goal_organizations: i64,
    /// Organizations present in all three tables
    pub shared_organizations: i64,
}

impl OrganizationConsistency {
    /// True when every layer covers exactly the same organizations and
    /// staging holds one row per raw event.
    pub fn is_consistent(&self) -> bool {
        self.raw_rows == self.staging_rows
            && self.raw_organizations == self.staging_organizations
            && self.staging_organizations == self.goal_organizations
            && self.shared_organizations == self.raw_organizations
    }

    /// One-line summary of the counts.
    pub fn describe(&self) -> String {
        format!(
            "rows raw={} staging={}; organizations raw={} staging={} goals={} shared={}",
            self.raw_rows,
            self.staging_rows,
            self.raw_organizations,
            self.staging_organizations,
            self.goal_organizations,
            self.shared_organizations
        )
    }
}

/// Compare organization coverage of `behavioral_events`,
/// `staging_behavioral_events` and `trial_goals`.
pub fn organization_consistency(db: &Database) -> Result<OrganizationConsistency> {
    let shared_organizations = {
        let conn = db.connection()?;
        conn.query_row(
            "SELECT COUNT(*) FROM (
                SELECT organization_id FROM behavioral_events
                INTERSECT
                SELECT organization_id FROM staging_behavioral_events
                INTERSECT
                SELECT organization_id FROM trial_goals
            )",
            [],
            |row| row.get(0),
        )?
    };

    Ok(OrganizationConsistency {
        raw_rows: db.count_rows(RAW_EVENTS)?,
        staging_rows: db.count_rows(STAGING_EVENTS)?,
        raw_organizations: db.count_organizations(RAW_EVENTS)?,
        staging_organizations: db.count_organizations(STAGING_EVENTS)?,
        goal_organizations: db.count_organizations(TRIAL_GOALS)?,
        shared_organizations,
    })
}

/// Staging rows whose activity name or detail holds more than one value.
pub fn non_atomic_values(db: &Database) -> Result<i64> {
    let conn = db.connection()?;
    let count = conn.query_row(
        "SELECT COUNT(*) FROM staging_behavioral_events
         WHERE activity_name LIKE '%;%' OR activity_detail LIKE '%;%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Distinct stored values of each goal column.
pub fn goal_flag_values(db: &Database) -> Result<Vec<(Goal, Vec<i64>)>> {
    let conn = db.connection()?;
    let mut values = Vec::with_capacity(Goal::ALL.len());
    for goal in Goal::ALL {
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT {col} FROM trial_goals ORDER BY {col}",
            col = goal.column()
        ))?;
        let distinct = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        values.push((goal, distinct));
    }
    Ok(values)
}

/// Result of the full check suite.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizationReport {
    pub consistency: OrganizationConsistency,
    pub non_atomic_values: i64,
    pub goal_flag_values: Vec<(Goal, Vec<i64>)>,
    /// Row count per pipeline table, in build order
    pub table_rows: Vec<(String, i64)>,
}

impl NormalizationReport {
    /// Human-readable check failures; empty when everything passed.
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();

        if !self.consistency.is_consistent() {
            failures.push(format!(
                "organization ids differ across tables: {}",
                self.consistency.describe()
            ));
        }

        if self.non_atomic_values > 0 {
            failures.push(format!(
                "found {} non-atomic activity values",
                self.non_atomic_values
            ));
        }

        for (goal, values) in &self.goal_flag_values {
            if values.len() > 2 || values.iter().any(|v| *v != 0 && *v != 1) {
                failures.push(format!(
                    "{} holds non-boolean values: {:?}",
                    goal.column(),
                    values
                ));
            }
        }

        for (table, rows) in &self.table_rows {
            if *rows == 0 && table != TRIAL_ACTIVATION {
                failures.push(format!("table {} is empty", table));
            }
        }

        failures
    }

    /// Conditions worth reporting that do not fail the check.
    pub fn warnings(&self) -> Vec<String> {
        self.table_rows
            .iter()
            .filter(|(table, rows)| *rows == 0 && table == TRIAL_ACTIVATION)
            .map(|(table, _)| format!("table {} is empty: no organization is activated", table))
            .collect()
    }

    pub fn passed(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Run every check against a loaded database.
///
/// Fails with [`Error::Consistency`] if a pipeline table is missing.
/// Storage errors are returned as they are.
pub fn run_checks(db: &Database) -> Result<NormalizationReport> {
    let mut missing = Vec::new();
    for table in PIPELINE_TABLES.iter().copied() {
        if !db.table_exists(table)? {
            missing.push(table);
        }
    }
    if !missing.is_empty() {
        return Err(Error::Consistency(format!(
            "missing tables: {}",
            missing.join(", ")
        )));
    }

    let table_rows = PIPELINE_TABLES
        .iter()
        .map(|table| -> Result<(String, i64)> {
            Ok((table.to_string(), db.count_rows(table)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let report = NormalizationReport {
        consistency: organization_consistency(db)?,
        non_atomic_values: non_atomic_values(db)?,
        goal_flag_values: goal_flag_values(db)?,
        table_rows,
    };

    tracing::info!(
        passed = report.passed(),
        failures = report.failures().len(),
        "Normalization checks complete"
    );

    Ok(report)
}
