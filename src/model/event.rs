//! Issue event model.
//!
//! One event is appended per status transition, in the same transaction
//! as the status write. Events are never updated or deleted.

use serde::Serialize;

use super::{IssueStatus, UserSummary};

/// A stored status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueEvent {
    /// Monotonic sequence assigned by the database
    pub id: i64,
    pub issue_id: String,
    pub changed_by_user_id: String,
    pub from_status: IssueStatus,
    pub to_status: IssueStatus,
    pub created_at: i64,
}

/// A transition recorded during a mutation, written at commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssueEvent {
    pub issue_id: String,
    pub changed_by_user_id: String,
    pub from_status: IssueStatus,
    pub to_status: IssueStatus,
    pub created_at: i64,
}

impl NewIssueEvent {
    #[must_use]
    pub fn new(
        issue_id: &str,
        changed_by_user_id: &str,
        from_status: IssueStatus,
        to_status: IssueStatus,
    ) -> Self {
        Self {
            issue_id: issue_id.to_string(),
            changed_by_user_id: changed_by_user_id.to_string(),
            from_status,
            to_status,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// An event joined with the user who made the change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueEventWithUser {
    #[serde(flatten)]
    pub event: IssueEvent,
    pub changed_by_user: UserSummary,
}

/// Full transition history of one issue, oldest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueHistory {
    pub issue_id: String,
    pub events: Vec<IssueEventWithUser>,
}

impl IssueHistory {
    /// Status the history ends in, if any transition happened.
    #[must_use]
    pub fn latest_status(&self) -> Option<IssueStatus> {
        self.events.last().map(|e| e.event.to_status)
    }
}
