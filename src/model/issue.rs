//! Issue model for CivicLink.
//!
//! Issues are civic problems reported by citizens (potholes, broken
//! street lights, ...) and worked through a dispatcher workflow.

use serde::{Deserialize, Serialize};

use super::UserSummary;

/// Issue status values.
///
/// Any status may follow any other; the lifecycle engine does not
/// enforce an adjacency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Open,
    Assigned,
    InProgress,
    Resolved,
    Closed,
}

impl IssueStatus {
    /// Every status, in workflow order.
    pub const ALL: [Self; 5] = [
        Self::Open,
        Self::Assigned,
        Self::InProgress,
        Self::Resolved,
        Self::Closed,
    ];

    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
        }
    }

    /// Parse the canonical storage form (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Some(Self::Open),
            "ASSIGNED" => Some(Self::Assigned),
            "IN_PROGRESS" => Some(Self::InProgress),
            "RESOLVED" => Some(Self::Resolved),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl Default for IssueStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

super::sql_text_enum!(IssueStatus);

/// Issue priority values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuePriority {
    Low,
    Medium,
    High,
}

impl IssuePriority {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Parse the canonical storage form (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }
}

impl Default for IssuePriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

super::sql_text_enum!(IssuePriority);

/// An issue record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Unique identifier (UUID v4)
    pub id: String,

    pub title: String,

    pub description: String,

    pub latitude: f64,

    pub longitude: f64,

    /// Street address, when the reporter gave one
    pub address: Option<String>,

    pub priority: IssuePriority,

    /// Only ever changed through a status transition
    pub status: IssueStatus,

    /// Reporting user; immutable after creation
    pub created_by_user_id: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Issue {
    /// Materialize a draft as a fresh OPEN issue owned by `owner_id`.
    #[must_use]
    pub fn from_draft(draft: IssueDraft, owner_id: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            latitude: draft.latitude,
            longitude: draft.longitude,
            address: draft.address,
            priority: draft.priority.unwrap_or_default(),
            status: IssueStatus::Open,
            created_by_user_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The authorization projection of this issue.
    #[must_use]
    pub fn access(&self) -> IssueAccess {
        IssueAccess {
            id: self.id.clone(),
            created_by_user_id: self.created_by_user_id.clone(),
            status: self.status,
        }
    }
}

/// Minimal projection used for access decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueAccess {
    pub id: String,
    pub created_by_user_id: String,
    pub status: IssueStatus,
}

/// An issue together with its reporter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDetail {
    #[serde(flatten)]
    pub issue: Issue,
    pub created_by_user: UserSummary,
}

/// Input for reporting a new issue.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    /// Defaults to MEDIUM when absent
    #[serde(default)]
    pub priority: Option<IssuePriority>,
}

/// Sparse set of field changes. `None` leaves the field untouched.
///
/// Status and owner are deliberately absent: they cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<IssuePriority>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

impl IssuePatch {
    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.address.is_none()
    }
}

/// Equality filters for the dispatcher listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;

    #[must_use]
    pub const fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Rows to skip before this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// `ceil(total / page_size)`.
    #[must_use]
    pub fn total_pages(&self, total: u64) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        total.div_ceil(u64::from(self.page_size))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PAGE_SIZE)
    }
}

/// One page of issues.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePage {
    pub items: Vec<Issue>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}
