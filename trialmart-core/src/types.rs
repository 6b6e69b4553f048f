//! Core domain types for trialmart
//!
//! These types mirror the four pipeline tables:
//!
//! | Term | Table | Definition |
//! |------|-------|------------|
//! | **RawEvent** | `behavioral_events` | One ingested CSV record |
//! | **StagingEvent** | `staging_behavioral_events` | Surrogate-keyed copy of a raw event |
//! | **GoalRecord** | `trial_goals` | Five trial goal flags for one organization |
//! | **Activation** | `trial_activation` | Organizations that reached every goal |
//!
//! Goals are derived by thresholding counts of specific activities. The
//! thresholds and the advanced-feature page list live here so that goal
//! derivation and every metric share one definition.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage format for event timestamps.
///
/// Lexically sortable and understood by SQLite's date functions.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Format a timestamp the way it is stored in the event tables.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp previously written with [`format_timestamp`].
pub fn parse_stored_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================
// Activities
// ============================================

/// Activity names that feed trial goals.
pub mod activity {
    pub const SHIFT_CREATED: &str = "Shift.Created";
    pub const EMPLOYEE_INVITED: &str = "Hr.Employee.Invited";
    pub const PUNCHED_IN: &str = "PunchClock.PunchedIn";
    pub const PUNCH_APPROVED: &str = "PunchClock.Approvals.EntryApproved";
    pub const PAGE_VIEWED: &str = "Page.Viewed";
}

/// `Page.Viewed` details that count as advanced feature usage.
///
/// Used verbatim by goal derivation and by the feature engagement metric.
pub const ADVANCED_FEATURE_PAGES: &[&str] = &[
    "revenue",
    "integrations-overview",
    "absence-accounts",
    "availability",
];

/// Quote a string as a SQL literal.
pub(crate) fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// The advanced feature list as a SQL `IN (...)` body.
pub(crate) fn advanced_feature_sql_list() -> String {
    ADVANCED_FEATURE_PAGES
        .iter()
        .map(|page| sql_literal(page))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================
// Events
// ============================================

/// One behavioral event as read from the CSV input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Organization the event belongs to (free-form, typically a UUID)
    pub organization_id: String,
    /// Activity name, e.g. `Shift.Created`
    pub activity_name: Option<String>,
    /// Optional activity detail, e.g. the page viewed
    pub activity_detail: Option<String>,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
}

/// A row of `staging_behavioral_events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingEvent {
    /// Surrogate key
    pub id: i64,
    pub organization_id: String,
    pub activity_name: Option<String>,
    pub activity_detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ============================================
// Goals
// ============================================

/// A trial goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    ShiftCreated,
    EmployeeInvited,
    PunchedIn,
    PunchInApproved,
    AdvancedFeatures,
}

impl Goal {
    /// All goals in report order.
    pub const ALL: [Goal; 5] = [
        Goal::ShiftCreated,
        Goal::EmployeeInvited,
        Goal::PunchedIn,
        Goal::PunchInApproved,
        Goal::AdvancedFeatures,
    ];

    /// Column name in `trial_goals`.
    pub fn column(&self) -> &'static str {
        match self {
            Goal::ShiftCreated => "goal_shift_created",
            Goal::EmployeeInvited => "goal_employee_invited",
            Goal::PunchedIn => "goal_punched_in",
            Goal::PunchInApproved => "goal_punch_in_approved",
            Goal::AdvancedFeatures => "goal_advanced_features",
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Goal::ShiftCreated => "Shift Created",
            Goal::EmployeeInvited => "Employee Invited",
            Goal::PunchedIn => "Punched In",
            Goal::PunchInApproved => "Punch In Approved",
            Goal::AdvancedFeatures => "Advanced Features",
        }
    }

    /// Number of qualifying events needed to reach the goal.
    pub fn threshold(&self) -> u32 {
        match self {
            Goal::ShiftCreated | Goal::AdvancedFeatures => 2,
            Goal::EmployeeInvited | Goal::PunchedIn | Goal::PunchInApproved => 1,
        }
    }

    /// SQL predicate over a staging row that selects qualifying events.
    pub(crate) fn qualifying_predicate(&self) -> String {
        let name = match self {
            Goal::ShiftCreated => activity::SHIFT_CREATED,
            Goal::EmployeeInvited => activity::EMPLOYEE_INVITED,
            Goal::PunchedIn => activity::PUNCHED_IN,
            Goal::PunchInApproved => activity::PUNCH_APPROVED,
            Goal::AdvancedFeatures => {
                return format!(
                    "activity_name = {} AND activity_detail IN ({})",
                    sql_literal(activity::PAGE_VIEWED),
                    advanced_feature_sql_list()
                )
            }
        };
        format!("activity_name = {}", sql_literal(name))
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Goal {
    type Err = String;

    /// Accepts the column name with or without its `goal_` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let key = key.strip_prefix("goal_").unwrap_or(&key);
        match key {
            "shift_created" => Ok(Goal::ShiftCreated),
            "employee_invited" => Ok(Goal::EmployeeInvited),
            "punched_in" => Ok(Goal::PunchedIn),
            "punch_in_approved" => Ok(Goal::PunchInApproved),
            "advanced_features" => Ok(Goal::AdvancedFeatures),
            _ => Err(format!("unknown goal: {}", s)),
        }
    }
}

/// A row of `trial_goals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalRecord {
    pub organization_id: String,
    pub shift_created: bool,
    pub employee_invited: bool,
    pub punched_in: bool,
    pub punch_in_approved: bool,
    pub advanced_features: bool,
}

impl GoalRecord {
    /// Flag for a single goal.
    pub fn achieved(&self, goal: Goal) -> bool {
        match goal {
            Goal::ShiftCreated => self.shift_created,
            Goal::EmployeeInvited => self.employee_invited,
            Goal::PunchedIn => self.punched_in,
            Goal::PunchInApproved => self.punch_in_approved,
            Goal::AdvancedFeatures => self.advanced_features,
        }
    }

    /// True when every goal is reached, i.e. the organization is activated.
    pub fn is_activated(&self) -> bool {
        Goal::ALL.iter().all(|goal| self.achieved(*goal))
    }
}
