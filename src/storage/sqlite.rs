//! SQLite storage implementation.
//!
//! This module provides the storage backend for CivicLink using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.

use crate::error::{Error, Result};
use crate::model::{
    Issue, IssueAccess, IssueDetail, IssueFilter, IssuePatch, IssuePriority, IssueStatus,
    NewIssueEvent, Role, User, UserSummary,
};
use crate::storage::events::insert_event;
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::time::Duration;

/// Column list for `issues i`, in the order `map_issue_row` reads them.
const ISSUE_COLUMNS: &str = "i.id, i.title, i.description, i.latitude, i.longitude, i.address, \
     i.priority, i.status, i.created_by_user_id, i.created_at, i.updated_at";

/// Column list for `users u`, in the order `map_user_row` reads them.
const USER_COLUMNS: &str = "u.id, u.name, u.email, u.role, u.created_at, u.updated_at";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking side effects.
///
/// This struct is passed to mutation closures to:
/// - Record status transitions for the event log
/// - Carry the operation name and actor for logging
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// User performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<NewIssueEvent>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record a status transition made by the actor.
    pub fn record_transition(&mut self, issue_id: &str, from: IssueStatus, to: IssueStatus) {
        self.events
            .push(NewIssueEvent::new(issue_id, &self.actor, from, to));
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// The timeout bounds how long a writer waits for another
    /// connection's transaction to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (takes the write lock up front, so
    ///    concurrent writers on the same database serialize)
    /// 2. Executes the mutation closure
    /// 3. Appends the issue events the closure recorded
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        tracing::trace!(op = %ctx.op_name, actor = %ctx.actor, events = ctx.events.len(), "Mutation committed");

        Ok(result)
    }

    // ==================
    // Issue Operations
    // ==================

    /// Insert a new issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_issue(&mut self, issue: &Issue, actor: &str) -> Result<()> {
        self.mutate("create_issue", actor, |tx, _ctx| {
            tx.execute(
                "INSERT INTO issues (id, title, description, latitude, longitude, address, priority, status, created_by_user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    issue.id,
                    issue.title,
                    issue.description,
                    issue.latitude,
                    issue.longitude,
                    issue.address,
                    issue.priority,
                    issue.status,
                    issue.created_by_user_id,
                    issue.created_at,
                    issue.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Get an issue by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        select_issue(&self.conn, id)
    }

    /// Get the authorization projection of an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_issue_access(&self, id: &str) -> Result<Option<IssueAccess>> {
        select_issue_access(&self.conn, id)
    }

    /// Get an issue with its reporter's summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_issue_with_creator(&self, id: &str) -> Result<Option<IssueDetail>> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS}, u.name, u.email
             FROM issues i JOIN users u ON u.id = i.created_by_user_id
             WHERE i.id = ?1"
        );

        let detail = self
            .conn
            .query_row(&sql, [id], |row| {
                let issue = map_issue_row(row)?;
                let created_by_user = UserSummary {
                    id: issue.created_by_user_id.clone(),
                    name: row.get(11)?,
                    email: row.get(12)?,
                };
                Ok(IssueDetail {
                    issue,
                    created_by_user,
                })
            })
            .optional()?;

        Ok(detail)
    }

    /// Apply a sparse patch to an issue.
    ///
    /// Runs in one transaction: the access projection is read, `guard`
    /// decides on it, then only the fields set in `patch` are written.
    /// Status and owner are never touched on this path.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` if the issue is missing, whatever `guard`
    /// returns, or an error if the update fails.
    pub fn update_issue_fields<G>(
        &mut self,
        id: &str,
        patch: &IssuePatch,
        actor: &str,
        guard: G,
    ) -> Result<Issue>
    where
        G: FnOnce(&IssueAccess) -> Result<()>,
    {
        let now = chrono::Utc::now().timestamp_millis();

        // Build dynamic UPDATE query based on provided fields
        let mut set_clauses = vec!["updated_at = ?"];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now)];

        if let Some(ref t) = patch.title {
            set_clauses.push("title = ?");
            params.push(Box::new(t.clone()));
        }
        if let Some(ref d) = patch.description {
            set_clauses.push("description = ?");
            params.push(Box::new(d.clone()));
        }
        if let Some(p) = patch.priority {
            set_clauses.push("priority = ?");
            params.push(Box::new(p));
        }
        if let Some(lat) = patch.latitude {
            set_clauses.push("latitude = ?");
            params.push(Box::new(lat));
        }
        if let Some(lon) = patch.longitude {
            set_clauses.push("longitude = ?");
            params.push(Box::new(lon));
        }
        if let Some(ref a) = patch.address {
            set_clauses.push("address = ?");
            params.push(Box::new(a.clone()));
        }

        self.mutate("update_issue", actor, |tx, _ctx| {
            let access = select_issue_access(tx, id)?
                .ok_or_else(|| Error::IssueNotFound { id: id.to_string() })?;

            guard(&access)?;

            let sql = format!("UPDATE issues SET {} WHERE id = ?", set_clauses.join(", "));
            params.push(Box::new(id.to_string()));

            let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
            tx.execute(&sql, param_refs.as_slice())?;

            select_issue(tx, id)?.ok_or_else(|| Error::IssueNotFound { id: id.to_string() })
        })
    }

    /// Change an issue's status and append the matching event, atomically.
    ///
    /// The current status is read under the write lock. When `expected_from`
    /// is given and differs from it, nothing is written.
    ///
    /// Returns the updated issue and the status it moved from.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` if the issue is missing, `StatusConflict` if
    /// `expected_from` is stale, or an error if a write fails.
    pub fn transition_issue_status(
        &mut self,
        id: &str,
        to_status: IssueStatus,
        expected_from: Option<IssueStatus>,
        actor: &str,
    ) -> Result<(Issue, IssueStatus)> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("transition_issue_status", actor, |tx, ctx| {
            let from_status = select_issue_access(tx, id)?
                .ok_or_else(|| Error::IssueNotFound { id: id.to_string() })?
                .status;

            if let Some(expected) = expected_from {
                if expected != from_status {
                    return Err(Error::StatusConflict {
                        id: id.to_string(),
                        expected,
                        actual: from_status,
                    });
                }
            }

            tx.execute(
                "UPDATE issues SET status = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![to_status, now, id],
            )?;

            ctx.record_transition(id, from_status, to_status);

            let issue = select_issue(tx, id)?
                .ok_or_else(|| Error::IssueNotFound { id: id.to_string() })?;
            Ok((issue, from_status))
        })
    }

    /// List issues matching `filter`, newest first, with the total match count.
    ///
    /// Page rows and count are read from one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_issues_filtered(
        &self,
        filter: &IssueFilter,
        skip: u64,
        take: u64,
    ) -> Result<(Vec<Issue>, u64)> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(status) = filter.status {
            where_sql.push_str(" AND i.status = ?");
            params.push(Box::new(status));
        }

        if let Some(priority) = filter.priority {
            where_sql.push_str(" AND i.priority = ?");
            params.push(Box::new(priority));
        }

        let tx = self.conn.unchecked_transaction()?;

        let count_sql = format!("SELECT COUNT(*) FROM issues i{where_sql}");
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|b| b.as_ref()).collect();
        let total: i64 = tx.query_row(&count_sql, param_refs.as_slice(), |row| row.get(0))?;

        let page_sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues i{where_sql}
             ORDER BY i.created_at DESC, i.rowid DESC LIMIT ? OFFSET ?"
        );
        params.push(Box::new(to_sql_int(take)));
        params.push(Box::new(to_sql_int(skip)));
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|b| b.as_ref()).collect();

        let items = {
            let mut stmt = tx.prepare(&page_sql)?;
            let rows = stmt.query_map(param_refs.as_slice(), map_issue_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        tx.commit()?;

        Ok((items, from_sql_count(total)))
    }

    /// List every issue reported by `owner_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_issues_by_owner(&self, owner_id: &str) -> Result<Vec<Issue>> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues i
             WHERE i.created_by_user_id = ?1
             ORDER BY i.created_at DESC, i.rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([owner_id], map_issue_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Issue counts grouped by status. Statuses with no issues are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_issues_by_status(&self) -> Result<Vec<(IssueStatus, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM issues GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, IssueStatus>(0)?, from_sql_count(row.get(1)?)))
        })?;

        let mut counts = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        counts.sort_by_key(|(status, _)| IssueStatus::ALL.iter().position(|s| s == status));
        Ok(counts)
    }

    // ==================
    // User Operations
    // ==================

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the email is taken, or an error if the insert fails.
    pub fn insert_user(&mut self, user: &User, actor: &str) -> Result<()> {
        self.mutate("create_user", actor, |tx, _ctx| {
            tx.execute(
                "INSERT INTO users (id, name, email, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id,
                    user.name,
                    user.email,
                    user.role,
                    user.created_at,
                    user.updated_at
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(code, _)
                    if code.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Error::Conflict("email is already in use".to_string())
                }
                other => Error::Database(other),
            })?;
            Ok(())
        })
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.query_user("u.id = ?1", id)
    }

    /// Get a user by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_user("u.email = ?1 COLLATE NOCASE", email)
    }

    /// Get a user by ID, falling back to email.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_user(&self, reference: &str) -> Result<Option<User>> {
        match self.get_user(reference)? {
            Some(user) => Ok(Some(user)),
            None => self.get_user_by_email(reference),
        }
    }

    /// Oldest user holding `role`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn first_user_with_role(&self, role: Role) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.role = ?1 ORDER BY u.created_at ASC LIMIT 1"
        );
        let user = self.conn.query_row(&sql, [role], map_user_row).optional()?;
        Ok(user)
    }

    /// List users, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_users(&self, skip: u64, take: u64) -> Result<(Vec<User>, u64)> {
        let tx = self.conn.unchecked_transaction()?;

        let total: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u
             ORDER BY u.created_at DESC, u.rowid DESC LIMIT ?1 OFFSET ?2"
        );
        let users = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params![to_sql_int(take), to_sql_int(skip)],
                map_user_row,
            )?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        tx.commit()?;

        Ok((users, from_sql_count(total)))
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if no user has this ID, or an error if the update fails.
    pub fn update_user_role(&mut self, id: &str, role: Role, actor: &str) -> Result<User> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("update_user_role", actor, |tx, _ctx| {
            let rows = tx.execute(
                "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![role, now, id],
            )?;

            if rows == 0 {
                return Err(Error::UserNotFound { id: id.to_string() });
            }

            let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
            Ok(tx.query_row(&sql, [id], map_user_row)?)
        })
    }

    /// Total number of users.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_users(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(from_sql_count(count))
    }

    fn query_user(&self, predicate: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE {predicate}");
        let user = self.conn.query_row(&sql, [value], map_user_row).optional()?;
        Ok(user)
    }
}

// ==================
// Shared queries
// ==================

/// Read a full issue row. Works on a connection or an open transaction.
fn select_issue(conn: &Connection, id: &str) -> Result<Option<Issue>> {
    let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues i WHERE i.id = ?1");
    let issue = conn.query_row(&sql, [id], map_issue_row).optional()?;
    Ok(issue)
}

/// Read only what an access decision needs.
fn select_issue_access(conn: &Connection, id: &str) -> Result<Option<IssueAccess>> {
    let access = conn
        .query_row(
            "SELECT id, created_by_user_id, status FROM issues WHERE id = ?1",
            [id],
            |row| {
                Ok(IssueAccess {
                    id: row.get(0)?,
                    created_by_user_id: row.get(1)?,
                    status: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(access)
}

fn map_issue_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        address: row.get(5)?,
        priority: row.get::<_, IssuePriority>(6)?,
        status: row.get::<_, IssueStatus>(7)?,
        created_by_user_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn to_sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_sql_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or_default()
}
