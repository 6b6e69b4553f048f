//! Staging layer: typed copy of the raw events

use crate::db::schema::{CREATE_STAGING_EVENTS, CREATE_STAGING_INDEXES, STAGING_EVENTS};
use crate::db::Database;
use crate::error::Result;

/// Rebuild `staging_behavioral_events` from `behavioral_events`.
///
/// Rows are copied in raw insertion order so surrogate keys follow the
/// input file.
pub fn build(db: &Database) -> Result<usize> {
    db.replace_table(STAGING_EVENTS, CREATE_STAGING_EVENTS, |tx| {
        let rows = tx.execute(
            "INSERT INTO staging_behavioral_events
                (organization_id, activity_name, activity_detail, timestamp)
             SELECT organization_id, activity_name, activity_detail, timestamp
             FROM behavioral_events
             ORDER BY rowid",
            [],
        )?;
        tx.execute_batch(CREATE_STAGING_INDEXES)?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use crate::db::schema::{RAW_EVENTS, STAGING_EVENTS};
    use crate::db::Database;
    use crate::ingest::Loader;
    use crate::mart::fixtures::event;

    #[test]
    fn test_staging_is_one_to_one_projection() {
        let db = Database::open_in_memory().unwrap();
        let events = vec![
            event("org-b", "Shift.Created", None, 0, 0),
            event("org-a", "Page.Viewed", Some("revenue"), 1, 0),
            event("org-b", "PunchClock.PunchedIn", None, 2, 0),
        ];
        Loader::new(&db).load_events(&events).unwrap();

        assert_eq!(db.count_rows(RAW_EVENTS).unwrap(), 3);
        assert_eq!(db.count_rows(STAGING_EVENTS).unwrap(), 3);
        assert_eq!(
            db.count_organizations(RAW_EVENTS).unwrap(),
            db.count_organizations(STAGING_EVENTS).unwrap()
        );

        let staged = db.list_staging_events().unwrap();
        let ids: Vec<i64> = staged.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        for (raw, staged) in events.iter().zip(&staged) {
            assert_eq!(raw.organization_id, staged.organization_id);
            assert_eq!(raw.activity_name, staged.activity_name);
            assert_eq!(raw.activity_detail, staged.activity_detail);
            assert_eq!(raw.timestamp, staged.timestamp);
        }
    }

    #[test]
    fn test_rebuild_restarts_surrogate_keys() {
        let db = Database::open_in_memory().unwrap();
        let events = vec![event("org-a", "Shift.Created", None, 0, 0)];

        Loader::new(&db).load_events(&events).unwrap();
        Loader::new(&db).load_events(&events).unwrap();

        let staged = db.list_staging_events().unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].id, 1);
    }
}
