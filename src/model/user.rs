//! User model for CivicLink.
//!
//! Users are owned by the identity subsystem. The lifecycle engine only
//! reads `id` and `role`, carried per call as a [`Principal`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// User role values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Citizen,
    Dispatcher,
    Admin,
}

impl Role {
    /// Every role, in privilege order.
    pub const ALL: [Self; 3] = [Self::Citizen, Self::Dispatcher, Self::Admin];

    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "CITIZEN",
            Self::Dispatcher => "DISPATCHER",
            Self::Admin => "ADMIN",
        }
    }

    /// Parse the canonical storage form (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CITIZEN" => Some(Self::Citizen),
            "DISPATCHER" => Some(Self::Dispatcher),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Dispatchers and admins see and manage every issue.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self, Self::Dispatcher | Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

super::sql_text_enum!(Role);

/// The authenticated actor performing an operation.
///
/// The role is read once when the principal is built and stays fixed
/// for the whole call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    /// Build a principal from an identity context.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` if the user id is blank.
    pub fn new(user_id: impl Into<String>, role: Role) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(Error::Unauthenticated(
                "identity context has no user id".to_string(),
            ));
        }
        Ok(Self { user_id, role })
    }

    /// Whether this principal created the given record.
    #[must_use]
    pub fn owns(&self, created_by_user_id: &str) -> bool {
        self.user_id == created_by_user_id
    }
}

/// A user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Create a new citizen with a fresh id.
    #[must_use]
    pub fn new(name: &str, email: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role: Role::Citizen,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// The principal acting as this user.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id.clone(),
            role: self.role,
        }
    }

    /// Summary shown next to issues and history entries.
    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// `{id, name, email}` of a user, joined onto issues and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// One page of users.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub items: Vec<User>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}
