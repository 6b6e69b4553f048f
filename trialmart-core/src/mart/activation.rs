//! Activation mart: organizations that reached every trial goal

use crate::db::schema::{CREATE_TRIAL_ACTIVATION, TRIAL_ACTIVATION};
use crate::db::Database;
use crate::error::Result;
use crate::types::Goal;

/// Rebuild `trial_activation` from `trial_goals`.
pub fn build(db: &Database) -> Result<usize> {
    let all_goals = Goal::ALL
        .iter()
        .map(|goal| format!("{} = 1", goal.column()))
        .collect::<Vec<_>>()
        .join(" AND ");

    let sql = format!(
        "INSERT INTO trial_activation (organization_id)
         SELECT organization_id
         FROM trial_goals
         WHERE {all_goals}
         ORDER BY organization_id"
    );

    db.replace_table(TRIAL_ACTIVATION, CREATE_TRIAL_ACTIVATION, |tx| {
        Ok(tx.execute(&sql, [])?)
    })
}

/// Recreate `trial_activation` empty.
pub fn clear(db: &Database) -> Result<usize> {
    db.replace_table(TRIAL_ACTIVATION, CREATE_TRIAL_ACTIVATION, |_| Ok(0))
}
