//! Configuration management.
//!
//! This module provides functions for locating the CivicLink database,
//! resolving who the CLI is acting as, and reading the admin bootstrap
//! settings.
//!
//! # Architecture
//!
//! CivicLink uses a single **global database** at
//! `~/.civiclink/data/civiclink.db`. Every command opens it once and hands
//! the storage to the services.

use crate::error::{Error, Result};

use std::path::{Path, PathBuf};

/// Default email of the bootstrapped admin.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@civiclink.local";

/// Default display name of the bootstrapped admin.
pub const DEFAULT_ADMIN_NAME: &str = "System Admin";

/// Get the global CivicLink directory location (`~/.civiclink/`).
#[must_use]
pub fn global_civiclink_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".civiclink"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `CIVIC_TEST_DB=1` (or any non-empty value).
/// This redirects all database operations to an isolated test database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("CIVIC_TEST_DB")
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path.
///
/// Returns `~/.civiclink/test/civiclink.db` for isolated testing.
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_civiclink_dir().map(|dir| dir.join("test").join("civiclink.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided (`--db` / `CIVIC_DB`), use it directly
/// 2. `CIVIC_TEST_DB` environment variable → uses test database
/// 3. `CIVICLINK_DB` environment variable
/// 4. Global location: `~/.civiclink/data/civiclink.db`
///
/// # Returns
///
/// Returns the path to the database file, or `None` if no location found.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Explicit path from CLI flag
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Test mode - use isolated test database
    if is_test_mode() {
        return test_db_path();
    }

    // Priority 3: CIVICLINK_DB environment variable
    if let Ok(db_path) = std::env::var("CIVICLINK_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    // Priority 4: Global database location
    global_civiclink_dir().map(|dir| dir.join("data").join("civiclink.db"))
}

/// Resolve which user the CLI acts as.
///
/// Priority:
/// 1. Explicit `--as` flag (clap also fills it from `CIVIC_USER`)
/// 2. `CIVIC_USER` environment variable
/// 3. **Error**: there is no default user
///
/// # Errors
///
/// Returns `Unauthenticated` when no reference is configured.
pub fn resolve_user_reference(explicit: Option<&str>) -> Result<String> {
    if let Some(reference) = explicit.map(str::trim).filter(|r| !r.is_empty()) {
        return Ok(reference.to_string());
    }

    if let Ok(reference) = std::env::var("CIVIC_USER") {
        if !reference.trim().is_empty() {
            return Ok(reference.trim().to_string());
        }
    }

    Err(Error::Unauthenticated("no user selected".to_string()))
}

/// Who gets promoted to admin when the database has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSettings {
    pub email: String,
    pub name: String,
}

impl AdminSettings {
    /// Read `ADMIN_EMAIL` and `ADMIN_NAME`, falling back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("ADMIN_EMAIL").ok(),
            std::env::var("ADMIN_NAME").ok(),
        )
    }

    fn from_values(email: Option<String>, name: Option<String>) -> Self {
        let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            email: non_blank(email).unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            name: non_blank(name).unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string()),
        }
    }
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self::from_values(None, None)
    }
}
