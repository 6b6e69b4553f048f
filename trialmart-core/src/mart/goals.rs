//! Goal mart: one row of goal flags per organization

use crate::db::schema::{CREATE_TRIAL_GOALS, TRIAL_GOALS};
use crate::db::Database;
use crate::error::Result;
use crate::types::Goal;

/// Rebuild `trial_goals` from the staging events.
///
/// Grouping runs over the staging table's own organizations, so every
/// organization with at least one event gets exactly one row and goals
/// without qualifying events come out as `false`.
pub fn build(db: &Database) -> Result<usize> {
    let sql = derivation_sql();
    db.replace_table(TRIAL_GOALS, CREATE_TRIAL_GOALS, |tx| {
        Ok(tx.execute(&sql, [])?)
    })
}

/// The `INSERT ... SELECT` that evaluates every goal threshold.
pub(crate) fn derivation_sql() -> String {
    let columns = Goal::ALL
        .iter()
        .map(|goal| goal.column())
        .collect::<Vec<_>>()
        .join(",\n                ");

    let flags = Goal::ALL
        .iter()
        .map(|goal| {
            format!(
                "CASE WHEN SUM(CASE WHEN {} THEN 1 ELSE 0 END) >= {} THEN 1 ELSE 0 END",
                goal.qualifying_predicate(),
                goal.threshold()
            )
        })
        .collect::<Vec<_>>()
        .join(",\n                ");

    format!(
        "INSERT INTO trial_goals (
                organization_id,
                {columns}
            )
            SELECT
                organization_id,
                {flags}
            FROM staging_behavioral_events
            GROUP BY organization_id
            ORDER BY organization_id"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Loader;
    use crate::mart::fixtures::{activated_org, event};
    use crate::types::GoalRecord;

    fn goals_for(events: &[crate::types::RawEvent]) -> Vec<GoalRecord> {
        let db = Database::open_in_memory().unwrap();
        Loader::new(&db).load_events(events).unwrap();
        db.list_goal_records().unwrap()
    }

    #[test]
    fn test_single_shift_does_not_reach_threshold() {
        let goals = goals_for(&[event("org-a", "Shift.Created", None, 0, 0)]);
        assert_eq!(goals.len(), 1);
        assert!(!goals[0].shift_created);

        let goals = goals_for(&[
            event("org-a", "Shift.Created", None, 0, 0),
            event("org-a", "Shift.Created", None, 0, 1),
        ]);
        assert!(goals[0].shift_created);
    }

    #[test]
    fn test_organization_without_qualifying_events_gets_false_flags() {
        let goals = goals_for(&[event("org-a", "Mobile.Schedule.Loaded", None, 0, 0)]);

        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].organization_id, "org-a");
        for goal in Goal::ALL {
            assert!(!goals[0].achieved(goal), "{goal} should be false");
        }
    }

    #[test]
    fn test_advanced_features_only_count_allow_listed_pages() {
        let goals = goals_for(&[
            event("org-a", "Page.Viewed", Some("revenue"), 0, 0),
            event("org-a", "Page.Viewed", Some("Revenue"), 0, 1),
            event("org-a", "Page.Viewed", Some("dashboard"), 0, 2),
            event("org-a", "Shift.Created", Some("availability"), 0, 3),
        ]);
        assert!(!goals[0].advanced_features);

        let goals = goals_for(&[
            event("org-a", "Page.Viewed", Some("revenue"), 0, 0),
            event("org-a", "Page.Viewed", Some("revenue"), 0, 1),
        ]);
        assert!(goals[0].advanced_features);
    }

    #[test]
    fn test_one_row_per_organization() {
        let mut events = activated_org("org-a", 0, 3);
        events.push(event("org-b", "Hr.Employee.Invited", None, 1, 0));
        events.push(event("org-b", "Hr.Employee.Invited", None, 2, 0));
        events.push(event("org-c", "PunchClock.PunchedIn", None, 1, 0));

        let goals = goals_for(&events);
        let orgs: Vec<&str> = goals.iter().map(|g| g.organization_id.as_str()).collect();
        assert_eq!(orgs, vec!["org-a", "org-b", "org-c"]);

        assert!(goals[0].is_activated());
        assert!(goals[1].employee_invited && !goals[1].punched_in);
        assert!(goals[2].punched_in && !goals[2].employee_invited);
    }

    #[test]
    fn test_derivation_sql_covers_every_goal() {
        let sql = derivation_sql();
        for goal in Goal::ALL {
            assert!(sql.contains(goal.column()));
        }
        assert!(sql.contains(">= 2"));
        assert!(sql.contains("GROUP BY organization_id"));
    }
}
