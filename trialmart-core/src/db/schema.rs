//! Table definitions for the pipeline
//!
//! Table and column names are read by anything downstream of the loader,
//! so they must not change. Every table is dropped and recreated on each
//! load, which is why there are no migrations here.

/// Raw events, one row per CSV record.
pub const RAW_EVENTS: &str = "behavioral_events";

/// Typed, surrogate-keyed copy of the raw events.
pub const STAGING_EVENTS: &str = "staging_behavioral_events";

/// One row of goal flags per organization.
pub const TRIAL_GOALS: &str = "trial_goals";

/// Organizations that reached every goal.
pub const TRIAL_ACTIVATION: &str = "trial_activation";

/// All pipeline tables in build order.
pub const PIPELINE_TABLES: [&str; 4] = [RAW_EVENTS, STAGING_EVENTS, TRIAL_GOALS, TRIAL_ACTIVATION];

pub(crate) const CREATE_RAW_EVENTS: &str = r#"
    CREATE TABLE behavioral_events (
        organization_id  TEXT NOT NULL,
        timestamp        DATETIME NOT NULL,
        activity_name    TEXT,
        activity_detail  TEXT
    )
"#;

pub(crate) const CREATE_STAGING_EVENTS: &str = r#"
    CREATE TABLE staging_behavioral_events (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        organization_id  TEXT NOT NULL,
        activity_name    TEXT,
        activity_detail  TEXT,
        timestamp        DATETIME NOT NULL
    )
"#;

pub(crate) const CREATE_STAGING_INDEXES: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_staging_org_ts
        ON staging_behavioral_events(organization_id, timestamp);
    CREATE INDEX IF NOT EXISTS idx_staging_activity
        ON staging_behavioral_events(activity_name);
"#;

pub(crate) const CREATE_TRIAL_GOALS: &str = r#"
    CREATE TABLE trial_goals (
        organization_id         TEXT PRIMARY KEY,
        goal_shift_created      BOOLEAN NOT NULL,
        goal_employee_invited   BOOLEAN NOT NULL,
        goal_punched_in         BOOLEAN NOT NULL,
        goal_punch_in_approved  BOOLEAN NOT NULL,
        goal_advanced_features  BOOLEAN NOT NULL
    )
"#;

pub(crate) const CREATE_TRIAL_ACTIVATION: &str = r#"
    CREATE TABLE trial_activation (
        organization_id  TEXT PRIMARY KEY
    )
"#;
