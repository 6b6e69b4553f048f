//! Trial metrics over the mart tables
//!
//! Every metric is an independent read-only query; nothing is cached and
//! metrics do not depend on each other. Empty denominators resolve to `0`
//! (or `None` for timings) instead of erroring.

use crate::db::Database;
use crate::error::Result;
use crate::types::{advanced_feature_sql_list, Goal, ADVANCED_FEATURE_PAGES};
use rusqlite::params;
use serde::Serialize;
use std::collections::HashMap;

/// A per-goal metric value with its report label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalMetric<T> {
    pub goal: Goal,
    pub label: &'static str,
    pub value: T,
}

impl<T> GoalMetric<T> {
    fn new(goal: Goal, value: T) -> Self {
        Self {
            goal,
            label: goal.label(),
            value,
        }
    }
}

/// Engagement rate for one advanced feature page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMetric {
    pub feature: &'static str,
    pub rate: f64,
}

/// Mean time to reach a goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalTiming {
    /// Mean days from first activity to the threshold-crossing event,
    /// `None` when no organization reached the goal
    pub mean_days: Option<f64>,
    /// Organizations that reached the goal
    pub organizations: i64,
}

fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// Per-organization days from first activity to the event that crossed a
/// goal's threshold, as CTEs ending in `crossings(organization_id, days_to_goal)`.
///
/// The crossing event is the Nth qualifying event in (timestamp, id) order
/// where N is the goal threshold, e.g. the second `Shift.Created`.
fn crossings_cte(goal: Goal) -> String {
    format!(
        "WITH first_activity AS (
            SELECT organization_id, MIN(timestamp) AS first_ts
            FROM staging_behavioral_events
            GROUP BY organization_id
        ),
        qualifying AS (
            SELECT organization_id, timestamp,
                   ROW_NUMBER() OVER (
                       PARTITION BY organization_id ORDER BY timestamp, id
                   ) AS occurrence
            FROM staging_behavioral_events
            WHERE {predicate}
        ),
        crossings AS (
            SELECT q.organization_id,
                   julianday(q.timestamp) - julianday(f.first_ts) AS days_to_goal
            FROM qualifying q
            JOIN first_activity f ON f.organization_id = q.organization_id
            JOIN trial_goals g ON g.organization_id = q.organization_id
            WHERE q.occurrence = {threshold} AND g.{column} = 1
        )",
        predicate = goal.qualifying_predicate(),
        threshold = goal.threshold(),
        column = goal.column(),
    )
}

/// Metric queries bound to one database.
pub struct TrialMetrics<'a> {
    db: &'a Database,
}

impl<'a> TrialMetrics<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Activated organizations over all organizations with events.
    pub fn activation_rate(&self) -> Result<f64> {
        let conn = self.db.connection()?;
        let (activated, total): (i64, i64) = conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM trial_activation),
                (SELECT COUNT(DISTINCT organization_id) FROM staging_behavioral_events)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let rate = ratio(activated, total);
        tracing::debug!(activated, total, rate, "Computed activation rate");
        Ok(rate)
    }

    /// Mean span in days between first and last event of activated
    /// organizations; `0.0` when none are activated.
    pub fn time_to_activation(&self) -> Result<f64> {
        let conn = self.db.connection()?;
        let avg_days: Option<f64> = conn.query_row(
            "WITH activity_span AS (
                SELECT organization_id,
                       MIN(timestamp) AS first_event,
                       MAX(timestamp) AS last_event
                FROM staging_behavioral_events
                GROUP BY organization_id
            )
            SELECT AVG(julianday(last_event) - julianday(first_event))
            FROM activity_span
            WHERE organization_id IN (SELECT organization_id FROM trial_activation)",
            [],
            |row| row.get(0),
        )?;

        tracing::debug!(?avg_days, "Computed time to activation");
        Ok(avg_days.unwrap_or(0.0))
    }

    /// Share of goal rows with each flag set.
    pub fn goal_completion_rates(&self) -> Result<Vec<GoalMetric<f64>>> {
        let sums = Goal::ALL
            .iter()
            .map(|goal| format!("SUM({})", goal.column()))
            .collect::<Vec<_>>()
            .join(", ");

        let conn = self.db.connection()?;
        let (completed, total) = conn.query_row(
            &format!("SELECT {sums}, COUNT(*) FROM trial_goals"),
            [],
            |row| {
                let mut completed = Vec::with_capacity(Goal::ALL.len());
                for idx in 0..Goal::ALL.len() {
                    completed.push(row.get::<_, Option<i64>>(idx)?.unwrap_or(0));
                }
                let total: i64 = row.get(Goal::ALL.len())?;
                Ok((completed, total))
            },
        )?;

        Ok(Goal::ALL
            .iter()
            .zip(completed)
            .map(|(goal, count)| GoalMetric::new(*goal, ratio(count, total)))
            .collect())
    }

    /// Share of organizations that viewed each advanced feature page.
    ///
    /// Every page in [`ADVANCED_FEATURE_PAGES`] is reported, in list order.
    pub fn feature_engagement_rate(&self) -> Result<Vec<FeatureMetric>> {
        let conn = self.db.connection()?;
        let total: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT organization_id) FROM staging_behavioral_events",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT activity_detail, COUNT(DISTINCT organization_id)
             FROM staging_behavioral_events
             WHERE activity_name = 'Page.Viewed'
               AND activity_detail IN ({})
             GROUP BY activity_detail",
            advanced_feature_sql_list()
        ))?;
        let engaged = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(ADVANCED_FEATURE_PAGES
            .iter()
            .map(|&feature| FeatureMetric {
                feature,
                rate: ratio(engaged.get(feature).copied().unwrap_or(0), total),
            })
            .collect())
    }

    /// Mean days from first activity to the event that reached each goal.
    ///
    /// The measured event is the one whose occurrence meets the goal
    /// threshold (the second `Shift.Created`, the second allow-listed page
    /// view, the first of the other activities), so only organizations with
    /// the goal flag set contribute.
    ///
    /// Note: earlier versions of this report measured to events sharing the
    /// organization's first timestamp, which ignores the threshold entirely.
    /// Threshold-crossing timing replaces that and is an open decision, so
    /// numbers are not comparable with reports produced the old way.
    pub fn goal_achievement_times(&self) -> Result<Vec<GoalMetric<GoalTiming>>> {
        let conn = self.db.connection()?;
        let mut timings = Vec::with_capacity(Goal::ALL.len());

        for goal in Goal::ALL {
            let sql = format!(
                "{} SELECT AVG(days_to_goal), COUNT(*) FROM crossings",
                crossings_cte(goal)
            );
            let timing = conn.query_row(&sql, [], |row| {
                Ok(GoalTiming {
                    mean_days: row.get(0)?,
                    organizations: row.get(1)?,
                })
            })?;
            tracing::debug!(goal = %goal, ?timing, "Computed goal achievement time");
            timings.push(GoalMetric::new(goal, timing));
        }

        Ok(timings)
    }

    /// Share of all organizations that reached a goal within `days` days of
    /// their first activity.
    pub fn goal_achievement_probability(&self, goal: Goal, days: f64) -> Result<f64> {
        let conn = self.db.connection()?;
        let sql = format!(
            "{} SELECT
                (SELECT COUNT(*) FROM crossings WHERE days_to_goal <= ?1),
                (SELECT COUNT(*) FROM first_activity)",
            crossings_cte(goal)
        );
        let (reached, total): (i64, i64) =
            conn.query_row(&sql, params![days], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(ratio(reached, total))
    }

    /// [`goal_achievement_probability`](Self::goal_achievement_probability)
    /// for every goal.
    pub fn goal_achievement_probabilities(&self, days: f64) -> Result<Vec<GoalMetric<f64>>> {
        Goal::ALL
            .iter()
            .map(|goal| -> Result<GoalMetric<f64>> {
                Ok(GoalMetric::new(
                    *goal,
                    self.goal_achievement_probability(*goal, days)?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Loader;
    use crate::mart::fixtures::{activated_org, event};
    use crate::types::RawEvent;

    const EPSILON: f64 = 1e-6;

    fn metrics_db(events: &[RawEvent]) -> Database {
        let db = Database::open_in_memory().unwrap();
        Loader::new(&db).load_events(events).unwrap();
        db
    }

    fn value_for<T: Clone>(metrics: &[GoalMetric<T>], goal: Goal) -> T {
        metrics
            .iter()
            .find(|m| m.goal == goal)
            .map(|m| m.value.clone())
            .unwrap()
    }

    /// org-a activated over 4 days; org-b and org-c each miss a goal.
    fn three_orgs() -> Vec<RawEvent> {
        let mut events = activated_org("org-a", 0, 4);
        events.push(event("org-b", "Shift.Created", None, 0, 0));
        events.push(event("org-b", "Shift.Created", None, 2, 0));
        events.push(event("org-b", "Page.Viewed", Some("revenue"), 3, 0));
        events.push(event("org-c", "Hr.Employee.Invited", None, 1, 0));
        events
    }

    #[test]
    fn test_activation_rate_one_of_three() {
        let db = metrics_db(&three_orgs());
        let rate = TrialMetrics::new(&db).activation_rate().unwrap();
        assert!((rate - 1.0 / 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_empty_tables_yield_zero() {
        let db = metrics_db(&[]);
        let metrics = TrialMetrics::new(&db);

        assert_eq!(metrics.activation_rate().unwrap(), 0.0);
        assert_eq!(metrics.time_to_activation().unwrap(), 0.0);
        for rate in metrics.goal_completion_rates().unwrap() {
            assert_eq!(rate.value, 0.0);
        }
        for feature in metrics.feature_engagement_rate().unwrap() {
            assert_eq!(feature.rate, 0.0);
        }
        for timing in metrics.goal_achievement_times().unwrap() {
            assert!(timing.value.mean_days.is_none());
            assert_eq!(timing.value.organizations, 0);
        }
        assert_eq!(
            metrics
                .goal_achievement_probability(Goal::PunchedIn, 30.0)
                .unwrap(),
            0.0
        );
    }

    #[test]
    fn test_time_to_activation_averages_activated_spans() {
        let mut events = activated_org("org-a", 0, 4);
        events.extend(activated_org("org-b", 10, 2));
        // Not activated, long span must not count
        events.push(event("org-c", "Shift.Created", None, 0, 0));
        events.push(event("org-c", "Shift.Created", None, 50, 0));

        let db = metrics_db(&events);
        let days = TrialMetrics::new(&db).time_to_activation().unwrap();
        assert!((days - 3.0).abs() < EPSILON, "got {days}");
    }

    #[test]
    fn test_goal_completion_rates() {
        let db = metrics_db(&three_orgs());
        let rates = TrialMetrics::new(&db).goal_completion_rates().unwrap();

        assert_eq!(rates.len(), 5);
        assert_eq!(rates[0].label, "Shift Created");
        assert!((value_for(&rates, Goal::ShiftCreated) - 2.0 / 3.0).abs() < EPSILON);
        assert!((value_for(&rates, Goal::EmployeeInvited) - 2.0 / 3.0).abs() < EPSILON);
        assert!((value_for(&rates, Goal::PunchInApproved) - 1.0 / 3.0).abs() < EPSILON);
        for rate in &rates {
            assert!((0.0..=1.0).contains(&rate.value));
        }
    }

    #[test]
    fn test_feature_engagement_reports_every_allow_listed_page() {
        let db = metrics_db(&three_orgs());
        let features = TrialMetrics::new(&db).feature_engagement_rate().unwrap();

        let names: Vec<&str> = features.iter().map(|f| f.feature).collect();
        assert_eq!(names, ADVANCED_FEATURE_PAGES.to_vec());

        let rate = |name: &str| features.iter().find(|f| f.feature == name).unwrap().rate;
        assert!((rate("revenue") - 2.0 / 3.0).abs() < EPSILON);
        assert!((rate("availability") - 1.0 / 3.0).abs() < EPSILON);
        assert_eq!(rate("absence-accounts"), 0.0);
    }

    #[test]
    fn test_goal_timing_uses_threshold_crossing_event() {
        let events = vec![
            event("org-a", "Hr.Employee.Invited", None, 0, 0),
            event("org-a", "Shift.Created", None, 1, 0),
            event("org-a", "Shift.Created", None, 5, 0),
            event("org-a", "Shift.Created", None, 9, 0),
        ];
        let db = metrics_db(&events);
        let timings = TrialMetrics::new(&db).goal_achievement_times().unwrap();

        let shift = value_for(&timings, Goal::ShiftCreated);
        assert_eq!(shift.organizations, 1);
        assert!((shift.mean_days.unwrap() - 5.0).abs() < EPSILON);

        let invited = value_for(&timings, Goal::EmployeeInvited);
        assert!((invited.mean_days.unwrap() - 0.0).abs() < EPSILON);

        let punched = value_for(&timings, Goal::PunchedIn);
        assert!(punched.mean_days.is_none());
    }

    #[test]
    fn test_single_shift_has_no_timing() {
        let db = metrics_db(&[event("org-a", "Shift.Created", None, 3, 0)]);
        let timings = TrialMetrics::new(&db).goal_achievement_times().unwrap();
        assert!(value_for(&timings, Goal::ShiftCreated).mean_days.is_none());
    }

    #[test]
    fn test_goal_achievement_probability_window() {
        let events = vec![
            event("org-a", "PunchClock.PunchedIn", None, 0, 1),
            event("org-b", "Shift.Created", None, 0, 0),
            event("org-b", "PunchClock.PunchedIn", None, 40, 0),
            event("org-c", "Shift.Created", None, 0, 0),
        ];
        let db = metrics_db(&events);
        let metrics = TrialMetrics::new(&db);

        let within_30 = metrics
            .goal_achievement_probability(Goal::PunchedIn, 30.0)
            .unwrap();
        assert!((within_30 - 1.0 / 3.0).abs() < EPSILON);

        let within_60 = metrics
            .goal_achievement_probability(Goal::PunchedIn, 60.0)
            .unwrap();
        assert!((within_60 - 2.0 / 3.0).abs() < EPSILON);

        let all = metrics.goal_achievement_probabilities(60.0).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(value_for(&all, Goal::ShiftCreated), 0.0);
    }
}
