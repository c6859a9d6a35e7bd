//! User directory.
//!
//! Registration, role administration, first-run admin bootstrap, and the
//! lookup that turns a `--as` reference into a [`Principal`]. Credentials
//! are not stored here.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::AdminSettings;
use crate::error::{Error, Result};
use crate::model::{IssueStatus, PageRequest, Principal, Role, User, UserPage};
use crate::policy::{authorize, Capability};
use crate::service::check_page;
use crate::storage::SqliteStorage;
use crate::validate::validate_registration;

/// Actor recorded for writes that no user initiated.
const SYSTEM_ACTOR: &str = "system";

/// Database liveness summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub users: u64,
    pub issues_by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: IssueStatus,
    pub count: u64,
}

pub struct UserService<'a> {
    storage: &'a mut SqliteStorage,
}

impl<'a> UserService<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage) -> Self {
        Self { storage }
    }

    /// Register a new citizen.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank name or malformed email,
    /// `Conflict` if the email is taken.
    pub fn register(&mut self, name: &str, email: &str) -> Result<User> {
        validate_registration(name, email)?;

        let email = email.trim();
        if self.storage.get_user_by_email(email)?.is_some() {
            return Err(Error::Conflict("email is already in use".to_string()));
        }

        let user = User::new(name.trim(), email);
        self.storage.insert_user(&user, SYSTEM_ACTOR)?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Page through users, newest first. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins, `InvalidArgument` for a page or
    /// page size below 1, or a storage error.
    pub fn list_users(&self, principal: &Principal, page: PageRequest) -> Result<UserPage> {
        authorize(principal, None, Capability::ManageUsers)?;
        let page = check_page(page)?;

        let (items, total) = self
            .storage
            .list_users(page.offset(), u64::from(page.page_size))?;

        Ok(UserPage {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages(total),
        })
    }

    /// Change a user's role. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins, `UserNotFound`, or a storage error.
    pub fn set_role(&mut self, principal: &Principal, user_id: &str, role: Role) -> Result<User> {
        authorize(principal, None, Capability::ManageUsers)?;

        let user = self
            .storage
            .update_user_role(user_id, role, &principal.user_id)?;

        info!(user_id, role = %role, by = %principal.user_id, "User role changed");
        Ok(user)
    }

    /// Make sure at least one admin exists.
    ///
    /// If any admin exists this does nothing. Otherwise the user with the
    /// configured email is promoted, or created and promoted. Returns the
    /// promoted user, or `None` when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or `InvalidArgument` if the configured
    /// email is malformed.
    pub fn bootstrap_admin(&mut self, settings: &AdminSettings) -> Result<Option<User>> {
        if let Some(existing) = self.storage.first_user_with_role(Role::Admin)? {
            debug!(email = %existing.email, "Admin already exists, skipping bootstrap");
            return Ok(None);
        }

        let user = match self.storage.get_user_by_email(&settings.email)? {
            Some(user) => {
                info!(email = %settings.email, "Promoting existing user to admin");
                user
            }
            None => {
                info!(email = %settings.email, "Creating bootstrap admin");
                self.register(&settings.name, &settings.email)?
            }
        };

        let admin = self
            .storage
            .update_user_role(&user.id, Role::Admin, SYSTEM_ACTOR)?;
        Ok(Some(admin))
    }

    /// Resolve a user id or email to the principal acting as that user.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` if no such user exists.
    pub fn resolve_principal(&self, reference: &str) -> Result<Principal> {
        let user = self
            .storage
            .find_user(reference.trim())?
            .ok_or_else(|| Error::Unauthenticated(format!("unknown user '{reference}'")))?;
        Principal::new(user.id, user.role)
    }

    /// User count and issue counts per status.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn health(&self) -> Result<Health> {
        let users = self.storage.count_users()?;
        let issues_by_status = self
            .storage
            .count_issues_by_status()?
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect();
        Ok(Health {
            users,
            issues_by_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_defaults_to_citizen() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut svc = UserService::new(&mut storage);

        let user = svc.register(" Cleo ", "cleo@example.org").unwrap();
        assert_eq!(user.role, Role::Citizen);
        assert_eq!(user.name, "Cleo");

        let err = svc.register("Other", "CLEO@example.org").unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let err = svc.register("", "x@example.org").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_resolve_principal() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut svc = UserService::new(&mut storage);
        let user = svc.register("Cleo", "cleo@example.org").unwrap();

        let by_id = svc.resolve_principal(&user.id).unwrap();
        let by_email = svc.resolve_principal("cleo@example.org").unwrap();
        assert_eq!(by_id, by_email);
        assert_eq!(by_id.role, Role::Citizen);

        let err = svc.resolve_principal("nobody@example.org").unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[test]
    fn test_bootstrap_admin_creates_then_is_idempotent() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut svc = UserService::new(&mut storage);
        let settings = AdminSettings::default();

        let admin = svc.bootstrap_admin(&settings).unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.email, settings.email);
        assert_eq!(admin.name, settings.name);

        assert!(svc.bootstrap_admin(&settings).unwrap().is_none());
        assert_eq!(svc.health().unwrap().users, 1);
    }

    #[test]
    fn test_bootstrap_admin_promotes_existing_user() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut svc = UserService::new(&mut storage);
        let user = svc.register("Ops", "ops@city.gov").unwrap();

        let settings = AdminSettings {
            email: "ops@city.gov".to_string(),
            name: "ignored".to_string(),
        };
        let admin = svc.bootstrap_admin(&settings).unwrap().unwrap();
        assert_eq!(admin.id, user.id);
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.name, "Ops");
    }

    #[test]
    fn test_user_admin_requires_admin() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut svc = UserService::new(&mut storage);
        let admin = svc
            .bootstrap_admin(&AdminSettings::default())
            .unwrap()
            .unwrap()
            .principal();
        let cleo = svc.register("Cleo", "cleo@example.org").unwrap();

        let err = svc
            .set_role(&cleo.principal(), &cleo.id, Role::Admin)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let dispatcher = svc.set_role(&admin, &cleo.id, Role::Dispatcher).unwrap();
        assert_eq!(dispatcher.role, Role::Dispatcher);

        // Dispatchers cannot manage users either.
        let err = svc
            .list_users(&dispatcher.principal(), PageRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let page = svc.list_users(&admin, PageRequest::new(1, 1)).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);

        let err = svc.set_role(&admin, "nobody", Role::Admin).unwrap_err();
        assert!(matches!(err, Error::UserNotFound { .. }));
    }
}
