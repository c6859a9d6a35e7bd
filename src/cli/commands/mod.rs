//! Command implementations.

pub mod completions;
pub mod health;
pub mod init;
pub mod issue;
pub mod user;
pub mod version;

use crate::config::{resolve_db_path, resolve_user_reference, AdminSettings};
use crate::error::{Error, Result};
use crate::model::Principal;
use crate::service::UserService;
use crate::storage::SqliteStorage;
use std::path::PathBuf;

/// Open the database for a command.
///
/// Makes sure an admin exists before handing the storage back.
///
/// # Errors
///
/// Returns `NotInitialized` if the database file does not exist.
pub(crate) fn open_storage(db_path: Option<&PathBuf>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path())).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    let mut storage = SqliteStorage::open(&db_path)?;
    UserService::new(&mut storage).bootstrap_admin(&AdminSettings::from_env())?;
    Ok(storage)
}

/// Resolve `--as` / `CIVIC_USER` to a principal.
///
/// # Errors
///
/// Returns `Unauthenticated` if no user is selected or the user is unknown.
pub(crate) fn acting_principal(storage: &mut SqliteStorage, user: Option<&str>) -> Result<Principal> {
    let reference = resolve_user_reference(user)?;
    UserService::new(storage).resolve_principal(&reference)
}
