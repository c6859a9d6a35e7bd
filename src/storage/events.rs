//! Issue event log.
//!
//! Append-only record of status transitions. Events are written only from
//! inside [`super::SqliteStorage::mutate`], in the same transaction as the
//! status change they describe.

use rusqlite::{Connection, OptionalExtension, Result, Row};

use crate::model::{IssueEvent, IssueEventWithUser, NewIssueEvent, UserSummary};

/// Insert an event into the database.
///
/// Pass the open transaction so the append commits or rolls back with
/// the status write.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &NewIssueEvent) -> Result<i64> {
    conn.execute(
        "INSERT INTO issue_events (issue_id, changed_by_user_id, from_status, to_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            event.issue_id,
            event.changed_by_user_id,
            event.from_status,
            event.to_status,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get all events for an issue with the changer joined, oldest first.
///
/// Ties on `created_at` fall back to insertion order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_issue_events(conn: &Connection, issue_id: &str) -> Result<Vec<IssueEventWithUser>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.issue_id, e.changed_by_user_id, e.from_status, e.to_status, e.created_at,
                u.name, u.email
         FROM issue_events e
         JOIN users u ON u.id = e.changed_by_user_id
         WHERE e.issue_id = ?1
         ORDER BY e.created_at ASC, e.id ASC",
    )?;

    let rows = stmt.query_map([issue_id], |row| {
        let event = map_event_row(row)?;
        let changed_by_user = UserSummary {
            id: event.changed_by_user_id.clone(),
            name: row.get(6)?,
            email: row.get(7)?,
        };
        Ok(IssueEventWithUser {
            event,
            changed_by_user,
        })
    })?;

    rows.collect()
}

/// Most recent event for an issue, if any.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn latest_event(conn: &Connection, issue_id: &str) -> Result<Option<IssueEvent>> {
    conn.query_row(
        "SELECT id, issue_id, changed_by_user_id, from_status, to_status, created_at
         FROM issue_events
         WHERE issue_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
        [issue_id],
        map_event_row,
    )
    .optional()
}

fn map_event_row(row: &Row<'_>) -> Result<IssueEvent> {
    Ok(IssueEvent {
        id: row.get(0)?,
        issue_id: row.get(1)?,
        changed_by_user_id: row.get(2)?,
        from_status: row.get(3)?,
        to_status: row.get(4)?,
        created_at: row.get(5)?,
    })
}
