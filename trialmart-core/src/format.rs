//! Formatting helpers shared across the CLI tools.

/// Format a fraction as a percentage with two decimals (e.g., "33.33%").
pub fn format_percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

/// Format a day count with two decimals (e.g., "3.50 days").
pub fn format_days(days: f64) -> String {
    format!("{:.2} days", days)
}

/// Format an optional day count, or an em dash if missing.
pub fn format_days_opt(days: Option<f64>) -> String {
    match days {
        Some(days) => format_days(days),
        None => "—".to_string(),
    }
}
