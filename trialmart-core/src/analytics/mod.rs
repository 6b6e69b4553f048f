//! Analytics module for trialmart
//!
//! Read-only metrics over the mart tables:
//! - Activation rate and time to activation
//! - Goal completion rates
//! - Advanced feature engagement
//! - Goal achievement timing and probability within a day window
//!
//! See [`metrics`] for the individual queries and [`report`] for the
//! combined snapshot used by the CLI.

pub mod metrics;
pub mod report;

pub use metrics::{FeatureMetric, GoalMetric, GoalTiming, TrialMetrics};
pub use report::MetricsReport;
