//! Error types for CivicLink.
//!
//! Provides structured error handling with:
//! - A coarse [`ErrorKind`] that callers map onto transport status codes
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::model::IssueStatus;

/// Result type alias for CivicLink operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Kind ────────────────────────────────────────────────

/// Coarse failure class surfaced to callers.
///
/// Deliberately carries no detail about which rule failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Authorization,
    Validation,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// HTTP status an API layer should answer with.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Authorization => 403,
            Self::Validation => 400,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }
}

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    IssueNotFound,
    UserNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Authorization (exit 5)
    Unauthenticated,
    Forbidden,

    // Conflict (exit 6)
    Conflict,
    StatusConflict,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::IssueNotFound => "ISSUE_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::StatusConflict => "STATUS_CONFLICT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::IssueNotFound | Self::UserNotFound => 3,
            Self::InvalidArgument => 4,
            Self::Unauthenticated | Self::Forbidden => 5,
            Self::Conflict | Self::StatusConflict => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the caller may retry, possibly after re-reading state.
    ///
    /// True for validation errors, stale-status conflicts and busy
    /// databases. False for not-found, authorization or I/O errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument | Self::StatusConflict | Self::DatabaseError
        )
    }

    /// Coarse class of this code.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::IssueNotFound | Self::UserNotFound => ErrorKind::NotFound,
            Self::Unauthenticated | Self::Forbidden => ErrorKind::Authorization,
            Self::InvalidArgument => ErrorKind::Validation,
            Self::Conflict | Self::StatusConflict | Self::AlreadyInitialized => {
                ErrorKind::Conflict
            }
            Self::NotInitialized
            | Self::DatabaseError
            | Self::ConfigError
            | Self::IoError
            | Self::JsonError
            | Self::InternalError => ErrorKind::Internal,
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in CivicLink operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `civic init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Issue not found: {id}")]
    IssueNotFound { id: String },

    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Issue {id} changed concurrently: expected {expected}, found {actual}")]
    StatusConflict {
        id: String,
        expected: IssueStatus,
        actual: IssueStatus,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::IssueNotFound { .. } => ErrorCode::IssueNotFound,
            Self::UserNotFound { .. } => ErrorCode::UserNotFound,
            Self::Unauthenticated(_) => ErrorCode::Unauthenticated,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::StatusConflict { .. } => ErrorCode::StatusConflict,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Coarse class, see [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.error_code().kind()
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `civic init` to create the database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::IssueNotFound { .. } => Some(
                "Use `civic issue mine` or `civic issue list` to see issues you can access."
                    .to_string(),
            ),

            Self::Unauthenticated(_) => Some(
                "Pass `--as <user id or email>` or set CIVIC_USER. \
                 Register with `civic user register`."
                    .to_string(),
            ),

            Self::StatusConflict { id, .. } => Some(format!(
                "Re-read the issue with `civic issue show {id}` and retry."
            )),

            Self::InvalidArgument(msg) => {
                if msg.contains("status") {
                    Some(
                        "Valid statuses: open, assigned, in_progress, resolved, closed. \
                         Synonyms: wip→in_progress, done→resolved"
                            .to_string(),
                    )
                } else if msg.contains("priority") {
                    Some("Valid priorities: low, medium, high".to_string())
                } else if msg.contains("role") {
                    Some("Valid roles: citizen, dispatcher, admin".to_string())
                } else {
                    None
                }
            }

            Self::UserNotFound { .. }
            | Self::Forbidden(_)
            | Self::Conflict(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
                "status": code.kind().http_status(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
