//! Access policy.
//!
//! A pure decision over role × ownership × current status. No I/O and no
//! state: callers fetch the minimal [`IssueAccess`] projection, ask for a
//! decision, and turn a deny into [`Error::Forbidden`].

use crate::error::{Error, Result};
use crate::model::{IssueAccess, IssueStatus, Principal, Role};

/// A named permission the policy evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Read,
    UpdateFields,
    UpdateStatus,
    ListAll,
    ViewHistory,
    /// User administration (listing users, changing roles)
    ManageUsers,
}

impl Capability {
    pub const ALL: [Self; 6] = [
        Self::Read,
        Self::UpdateFields,
        Self::UpdateStatus,
        Self::ListAll,
        Self::ViewHistory,
        Self::ManageUsers,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::UpdateFields => "UPDATE_FIELDS",
            Self::UpdateStatus => "UPDATE_STATUS",
            Self::ListAll => "LIST_ALL",
            Self::ViewHistory => "VIEW_HISTORY",
            Self::ManageUsers => "MANAGE_USERS",
        }
    }

    /// Message shown on deny. Coarse on purpose.
    const fn denial(self) -> &'static str {
        match self {
            Self::Read => "not allowed to view this issue",
            Self::UpdateFields => "not allowed to update this issue",
            Self::UpdateStatus => "only dispatchers or admins can update issue status",
            Self::ListAll => "only dispatchers or admins can list all issues",
            Self::ViewHistory => "not allowed to view this issue history",
            Self::ManageUsers => "only admins can manage users",
        }
    }
}

/// How the principal relates to the issue under decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Owner,
    Stranger,
}

/// Decide whether `principal` holds `capability`.
///
/// `issue` is the minimal projection of the target issue, or `None` for
/// capabilities that are not about a single issue. A citizen is never
/// treated as owner of an issue that was not supplied.
#[must_use]
pub fn is_allowed(principal: &Principal, issue: Option<&IssueAccess>, capability: Capability) -> bool {
    use Capability::{ListAll, ManageUsers, Read, UpdateFields, UpdateStatus, ViewHistory};

    let relation = match issue {
        Some(access) if principal.owns(&access.created_by_user_id) => Relation::Owner,
        _ => Relation::Stranger,
    };
    let status = issue.map(|access| access.status);

    match principal.role {
        Role::Admin => true,
        Role::Dispatcher => !matches!(capability, ManageUsers),
        Role::Citizen => matches!(
            (capability, relation, status),
            (Read | ViewHistory, Relation::Owner, _)
                | (UpdateFields, Relation::Owner, Some(IssueStatus::Open))
        ),
    }
}

/// Like [`is_allowed`], but a deny becomes `Error::Forbidden`.
///
/// # Errors
///
/// Returns `Forbidden` when the policy denies the capability.
pub fn authorize(principal: &Principal, issue: Option<&IssueAccess>, capability: Capability) -> Result<()> {
    if is_allowed(principal, issue, capability) {
        return Ok(());
    }

    tracing::debug!(
        user_id = %principal.user_id,
        role = %principal.role,
        capability = capability.as_str(),
        issue_id = issue.map(|a| a.id.as_str()),
        "Access denied"
    );
    Err(Error::Forbidden(capability.denial().to_string()))
}
