//! Incremental schema changes on top of the base schema.
//!
//! Each file under `/migrations/` is compiled in with `include_str!`, so an
//! installed `civic` binary never looks for SQL on disk.

use rusqlite::{Connection, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Embed `migrations/<name>.sql` under its file stem.
macro_rules! migration {
    ($name:literal) => {
        ($name, include_str!(concat!("../../migrations/", $name, ".sql")))
    };
}

/// `(version, sql)` pairs, oldest first.
const MIGRATIONS: &[(&str, &str)] = &[
    migration!("001_add_issue_address"),
    migration!("002_issue_events_changer_index"),
];

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row. Returns how many were applied.
///
/// # Errors
///
/// Returns the first failing statement. A "duplicate column" failure means
/// the column was added outside this runner; it is recorded as applied.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    let done = applied_versions(conn)?;
    let mut count = 0;

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| !done.contains(*v)) {
        let tx = conn.unchecked_transaction()?;
        match tx.execute_batch(sql) {
            Ok(()) => info!(version, "applied migration"),
            Err(e) if is_duplicate_column(&e) => {
                warn!(version, "column already present, recording migration as applied");
            }
            Err(e) => return Err(e),
        }
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;
        count += 1;
    }

    debug!(applied = count, total = MIGRATIONS.len(), "migrations up to date");
    Ok(count)
}

fn applied_versions(conn: &Connection) -> Result<HashSet<String>> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<HashSet<String>>>()?;
    Ok(versions)
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    err.to_string().contains("duplicate column name")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::SCHEMA_SQL;

    fn base_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        conn
    }

    fn recorded(conn: &Connection) -> usize {
        let done = applied_versions(conn).unwrap();
        MIGRATIONS.iter().filter(|(v, _)| done.contains(*v)).count()
    }

    #[test]
    fn test_fresh_database_gets_every_migration() {
        let conn = base_db();
        assert_eq!(run_migrations(&conn).unwrap(), MIGRATIONS.len());
        assert_eq!(recorded(&conn), MIGRATIONS.len());

        let has_address = conn
            .prepare("SELECT 1 FROM pragma_table_info('issues') WHERE name = 'address'")
            .unwrap()
            .exists([])
            .unwrap();
        assert!(has_address);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let conn = base_db();
        run_migrations(&conn).unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), 0);
        assert_eq!(recorded(&conn), MIGRATIONS.len());
    }

    #[test]
    fn test_hand_added_column_is_tolerated() {
        let conn = base_db();
        conn.execute("ALTER TABLE issues ADD COLUMN address TEXT", [])
            .unwrap();

        run_migrations(&conn).unwrap();
        assert_eq!(recorded(&conn), MIGRATIONS.len());
    }
}
