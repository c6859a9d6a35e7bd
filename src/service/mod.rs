//! Services over the storage layer.
//!
//! - [`issues`] - Issue lifecycle engine (create, read, patch, transition, list, history)
//! - [`users`] - User directory (registration, roles, admin bootstrap, identity)
//!
//! Both borrow an open [`SqliteStorage`](crate::storage::SqliteStorage); the
//! binary opens it once per process and hands it to whichever service a
//! command needs. Neither holds locks of its own: concurrent callers are
//! serialized by the storage transaction.

pub mod issues;
pub mod users;

pub use issues::IssueService;
pub use users::{Health, UserService};

use crate::error::{Error, Result};
use crate::model::PageRequest;

/// Reject pages the store cannot answer sensibly.
pub(crate) fn check_page(page: PageRequest) -> Result<PageRequest> {
    if page.page < 1 {
        return Err(Error::InvalidArgument("page must be at least 1".to_string()));
    }
    if page.page_size < 1 {
        return Err(Error::InvalidArgument(
            "page size must be at least 1".to_string(),
        ));
    }
    Ok(page)
}
