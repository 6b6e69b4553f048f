//! All trial metrics collected into one report

use super::metrics::{FeatureMetric, GoalMetric, GoalTiming, TrialMetrics};
use crate::db::Database;
use crate::error::Result;
use serde::Serialize;

/// Snapshot of every metric for one database state.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// Activated organizations over all organizations, in [0, 1]
    pub activation_rate: f64,
    /// Mean first-to-last event span of activated organizations, in days
    pub time_to_activation_days: f64,
    pub goal_completion_rates: Vec<GoalMetric<f64>>,
    pub feature_engagement_rates: Vec<FeatureMetric>,
    pub goal_achievement_times: Vec<GoalMetric<GoalTiming>>,
    /// Window used for `goal_achievement_probabilities`
    pub within_days: u32,
    pub goal_achievement_probabilities: Vec<GoalMetric<f64>>,
}

impl MetricsReport {
    /// Run every metric query.
    pub fn compute(db: &Database, within_days: u32) -> Result<Self> {
        let metrics = TrialMetrics::new(db);

        let report = Self {
            activation_rate: metrics.activation_rate()?,
            time_to_activation_days: metrics.time_to_activation()?,
            goal_completion_rates: metrics.goal_completion_rates()?,
            feature_engagement_rates: metrics.feature_engagement_rate()?,
            goal_achievement_times: metrics.goal_achievement_times()?,
            within_days,
            goal_achievement_probabilities: metrics
                .goal_achievement_probabilities(f64::from(within_days))?,
        };

        tracing::info!(
            activation_rate = report.activation_rate,
            time_to_activation_days = report.time_to_activation_days,
            within_days,
            "Computed metrics report"
        );

        Ok(report)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
