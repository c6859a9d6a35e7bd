//! Data models for CivicLink.
//!
//! This module contains all domain models:
//! - User, Role, Principal
//! - Issue, IssueStatus, IssuePriority, drafts and patches
//! - IssueEvent (status transition audit records)

/// Implement `ToSql`/`FromSql` for a string-backed enum with `as_str`/`parse`.
macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let text = value.as_str()?;
                <$ty>::parse(text).ok_or_else(|| {
                    rusqlite::types::FromSqlError::Other(
                        format!("unknown {} value: {text}", stringify!($ty)).into(),
                    )
                })
            }
        }
    };
}

pub(crate) use sql_text_enum;

pub mod event;
pub mod issue;
pub mod user;

pub use event::{IssueEvent, IssueEventWithUser, IssueHistory, NewIssueEvent};
pub use issue::{
    Issue, IssueAccess, IssueDetail, IssueDraft, IssueFilter, IssuePage, IssuePatch,
    IssuePriority, IssueStatus, PageRequest,
};
pub use user::{Principal, Role, User, UserPage, UserSummary};
