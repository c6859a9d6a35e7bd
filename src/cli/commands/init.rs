//! Initialize the CivicLink database.
//!
//! Creates the database file at the resolved path (see
//! [`resolve_db_path`]), applies the schema, and bootstraps the admin
//! user from `ADMIN_EMAIL` / `ADMIN_NAME`.

use crate::config::{resolve_db_path, AdminSettings};
use crate::error::{Error, Result};
use crate::model::User;
use crate::service::UserService;
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin: Option<User>,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if the directory or database cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path())).ok_or_else(|| {
        Error::Config("Could not determine CivicLink database location".to_string())
    })?;

    let admin = initialize(&db_path, force, &AdminSettings::from_env())?;

    if crate::is_silent() {
        println!("{}", db_path.display());
        return Ok(());
    }

    if json {
        let output = InitOutput {
            database: db_path,
            admin,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized CivicLink database");
        println!("  Database: {}", db_path.display());
        if let Some(admin) = admin {
            println!("  Admin:    {} <{}> ({})", admin.name, admin.email, admin.id);
        }
        println!();
        println!("Next: register with 'civic user register --name <name> --email <email>'.");
    }

    Ok(())
}

/// Create (or recreate) the database and bootstrap the admin.
fn initialize(db_path: &Path, force: bool, settings: &AdminSettings) -> Result<Option<User>> {
    if db_path.exists() {
        if !force {
            return Err(Error::AlreadyInitialized {
                path: db_path.to_path_buf(),
            });
        }
        remove_database(db_path)?;
    }

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut storage = SqliteStorage::open(db_path)?;
    UserService::new(&mut storage).bootstrap_admin(settings)
}

/// Delete the database file and its WAL sidecars.
fn remove_database(db_path: &Path) -> Result<()> {
    fs::remove_file(db_path)?;
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = db_path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            fs::remove_file(sidecar)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_database_and_admin() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("nested").join("civiclink.db");

        let admin = initialize(&db, false, &AdminSettings::default())
            .unwrap()
            .unwrap();
        assert!(db.exists());
        assert_eq!(admin.role, Role::Admin);

        let storage = SqliteStorage::open(&db).unwrap();
        assert_eq!(storage.count_users().unwrap(), 1);
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("civiclink.db");

        initialize(&db, false, &AdminSettings::default()).unwrap();
        let result = initialize(&db, false, &AdminSettings::default());
        assert!(matches!(result, Err(Error::AlreadyInitialized { .. })));
    }

    #[test]
    fn test_init_force_starts_fresh() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("civiclink.db");

        initialize(&db, false, &AdminSettings::default()).unwrap();
        {
            let mut storage = SqliteStorage::open(&db).unwrap();
            UserService::new(&mut storage)
                .register("Cleo", "cleo@example.org")
                .unwrap();
        }

        initialize(&db, true, &AdminSettings::default()).unwrap();
        let storage = SqliteStorage::open(&db).unwrap();
        assert_eq!(storage.count_users().unwrap(), 1);
    }
}
