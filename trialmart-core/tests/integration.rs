//! Integration tests for the trialmart load pipeline and metrics
//!
//! These tests load `tests/fixtures/trial_events.csv` into a file-backed
//! database and check the tables and metrics end to end.
//!
//! Fixture organizations:
//! - `...0001`: reaches every goal (activated), first event Jan 1 08:00,
//!   last event Jan 5 08:00
//! - `...0002`: one `Shift.Created` only, otherwise every goal
//! - `...0003`: two shifts; one allow-listed page view plus a `Revenue`
//!   view that does not match the canonical list

use std::path::PathBuf;
use tempfile::TempDir;
use trialmart_core::analytics::{MetricsReport, TrialMetrics};
use trialmart_core::check;
use trialmart_core::db::schema::{RAW_EVENTS, STAGING_EVENTS, TRIAL_ACTIVATION, TRIAL_GOALS};
use trialmart_core::ingest::Loader;
use trialmart_core::{Database, Error, Goal};

const ORG_1: &str = "0d4b5a0e-1f5e-4c3a-9d2b-000000000001";
const ORG_2: &str = "0d4b5a0e-1f5e-4c3a-9d2b-000000000002";
const ORG_3: &str = "0d4b5a0e-1f5e-4c3a-9d2b-000000000003";

const EPSILON: f64 = 1e-6;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn loaded_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("trial_data.db")).unwrap();
    Loader::new(&db)
        .load_path(&fixture_path("trial_events.csv"))
        .expect("load should succeed");
    (dir, db)
}

fn rate_for(rates: &[trialmart_core::analytics::GoalMetric<f64>], goal: Goal) -> f64 {
    rates.iter().find(|r| r.goal == goal).unwrap().value
}

// ============================================
// Pipeline tables
// ============================================

#[test]
fn test_load_fixture_populates_all_tables() {
    trialmart_core::logging::init_test();
    let (_dir, db) = loaded_db();

    assert_eq!(db.count_rows(RAW_EVENTS).unwrap(), 18);
    assert_eq!(db.count_rows(STAGING_EVENTS).unwrap(), 18);
    assert_eq!(db.count_rows(TRIAL_GOALS).unwrap(), 3);
    assert_eq!(db.count_rows(TRIAL_ACTIVATION).unwrap(), 1);

    let names = db.table_names().unwrap();
    for table in [RAW_EVENTS, STAGING_EVENTS, TRIAL_GOALS, TRIAL_ACTIVATION] {
        assert!(names.iter().any(|n| n == table), "missing {table}");
    }
}

#[test]
fn test_organization_counts_match_across_layers() {
    let (_dir, db) = loaded_db();

    let consistency = check::organization_consistency(&db).unwrap();
    assert!(consistency.is_consistent(), "{}", consistency.describe());
    assert_eq!(consistency.raw_organizations, 3);
    assert_eq!(consistency.goal_organizations, 3);

    let report = check::run_checks(&db).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures());
}

#[test]
fn test_goal_flags_per_organization() {
    let (_dir, db) = loaded_db();
    let goals = db.list_goal_records().unwrap();

    let org1 = goals.iter().find(|g| g.organization_id == ORG_1).unwrap();
    assert!(org1.is_activated());

    let org2 = goals.iter().find(|g| g.organization_id == ORG_2).unwrap();
    assert!(!org2.shift_created);
    assert!(org2.employee_invited && org2.punched_in && org2.punch_in_approved);
    assert!(org2.advanced_features);

    let org3 = goals.iter().find(|g| g.organization_id == ORG_3).unwrap();
    assert!(org3.shift_created);
    assert!(!org3.advanced_features, "'Revenue' must not match 'revenue'");
    assert!(!org3.employee_invited);

    assert_eq!(
        db.list_activated_organizations().unwrap(),
        vec![ORG_1.to_string()]
    );
}

#[test]
fn test_reload_is_idempotent() {
    let (_dir, db) = loaded_db();
    let goals_before = db.list_goal_records().unwrap();
    let activated_before = db.list_activated_organizations().unwrap();
    let staged_before = db.list_staging_events().unwrap();

    Loader::new(&db)
        .load_path(&fixture_path("trial_events.csv"))
        .unwrap();

    assert_eq!(db.list_goal_records().unwrap(), goals_before);
    assert_eq!(db.list_activated_organizations().unwrap(), activated_before);
    assert_eq!(db.list_staging_events().unwrap(), staged_before);
}

#[test]
fn test_malformed_input_fails_without_partial_load() {
    let (dir, db) = loaded_db();

    let bad_path = dir.path().join("bad.csv");
    std::fs::write(
        &bad_path,
        "organization_id,timestamp,activity_name,activity_detail\n\
         org-x,2024-01-01 09:00:00,Shift.Created,\n\
         org-y,2024-13-45 09:00:00,Shift.Created,\n",
    )
    .unwrap();

    let err = Loader::new(&db).load_path(&bad_path).unwrap_err();
    assert!(matches!(err, Error::Parse { line: 3, .. }), "got {err:?}");

    assert_eq!(db.count_rows(RAW_EVENTS).unwrap(), 18);
    assert_eq!(db.count_rows(TRIAL_GOALS).unwrap(), 3);
}

// ============================================
// Metrics
// ============================================

#[test]
fn test_activation_metrics() {
    let (_dir, db) = loaded_db();
    let metrics = TrialMetrics::new(&db);

    let rate = metrics.activation_rate().unwrap();
    assert!((rate - 1.0 / 3.0).abs() < EPSILON);

    // ORG_1 spans Jan 1 08:00 to Jan 5 08:00
    let days = metrics.time_to_activation().unwrap();
    assert!((days - 4.0).abs() < EPSILON, "got {days}");
}

#[test]
fn test_goal_completion_matches_goal_table() {
    let (_dir, db) = loaded_db();
    let rates = TrialMetrics::new(&db).goal_completion_rates().unwrap();
    let goals = db.list_goal_records().unwrap();

    for goal in Goal::ALL {
        let achieved = goals.iter().filter(|g| g.achieved(goal)).count() as f64;
        let expected = achieved / goals.len() as f64;
        assert!((rate_for(&rates, goal) - expected).abs() < EPSILON);
    }
    assert!((rate_for(&rates, Goal::ShiftCreated) - 2.0 / 3.0).abs() < EPSILON);
    assert!((rate_for(&rates, Goal::AdvancedFeatures) - 2.0 / 3.0).abs() < EPSILON);
}

#[test]
fn test_feature_engagement_uses_canonical_pages() {
    let (_dir, db) = loaded_db();
    let features = TrialMetrics::new(&db).feature_engagement_rate().unwrap();
    let rate = |name: &str| features.iter().find(|f| f.feature == name).unwrap().rate;

    // ORG_1 and ORG_3 viewed "revenue"; ORG_3's "Revenue" view is ignored
    assert!((rate("revenue") - 2.0 / 3.0).abs() < EPSILON);
    assert!((rate("integrations-overview") - 1.0 / 3.0).abs() < EPSILON);
    assert!((rate("absence-accounts") - 1.0 / 3.0).abs() < EPSILON);
    assert!((rate("availability") - 1.0 / 3.0).abs() < EPSILON);
}

#[test]
fn test_goal_achievement_times_from_fixture() {
    let (_dir, db) = loaded_db();
    let timings = TrialMetrics::new(&db).goal_achievement_times().unwrap();
    let timing = |goal: Goal| timings.iter().find(|t| t.goal == goal).unwrap().value.clone();

    // Second shift: ORG_1 after 1 day + 1h, ORG_3 after 4 days
    let shift = timing(Goal::ShiftCreated);
    assert_eq!(shift.organizations, 2);
    let expected = ((1.0 + 1.0 / 24.0) + 4.0) / 2.0;
    assert!((shift.mean_days.unwrap() - expected).abs() < EPSILON);

    // Only ORG_2 has no timing for shifts, ORG_3 none for invites
    let invited = timing(Goal::EmployeeInvited);
    assert_eq!(invited.organizations, 2);
}

#[test]
fn test_metrics_report_json() {
    let (_dir, db) = loaded_db();
    let report = MetricsReport::compute(&db, 30).unwrap();
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    let rate = json["activation_rate"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&rate));
    assert_eq!(json["goal_achievement_probabilities"].as_array().unwrap().len(), 5);
}
