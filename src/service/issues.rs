//! Issue lifecycle engine.
//!
//! Every operation takes the acting [`Principal`] and asks the access
//! policy before it reads more than the minimal projection. Status only
//! changes through [`IssueService::transition_status`], which writes the
//! status and the matching event in one transaction.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    Issue, IssueDetail, IssueDraft, IssueFilter, IssueHistory, IssuePage, IssuePatch, IssueStatus,
    PageRequest, Principal,
};
use crate::policy::{authorize, Capability};
use crate::service::check_page;
use crate::storage::events::get_issue_events;
use crate::storage::SqliteStorage;
use crate::validate::{validate_draft, validate_patch};

/// The issue lifecycle engine.
pub struct IssueService<'a> {
    storage: &'a mut SqliteStorage,
}

impl<'a> IssueService<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage) -> Self {
        Self { storage }
    }

    /// Report a new issue. It starts OPEN, owned by `principal`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed draft, or a storage error.
    pub fn create(&mut self, principal: &Principal, draft: IssueDraft) -> Result<Issue> {
        validate_draft(&draft)?;

        let issue = Issue::from_draft(draft, &principal.user_id);
        self.storage.insert_issue(&issue, &principal.user_id)?;

        info!(
            issue_id = %issue.id,
            user_id = %principal.user_id,
            priority = %issue.priority,
            "Issue created"
        );
        Ok(issue)
    }

    /// Fetch one issue with its reporter.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` if it does not exist, `Forbidden` if the
    /// principal may not read it.
    pub fn get(&self, principal: &Principal, issue_id: &str) -> Result<IssueDetail> {
        let access = self
            .storage
            .get_issue_access(issue_id)?
            .ok_or_else(|| not_found(issue_id))?;
        authorize(principal, Some(&access), Capability::Read)?;

        self.storage
            .get_issue_with_creator(issue_id)?
            .ok_or_else(|| not_found(issue_id))
    }

    /// Apply a sparse patch. Status and owner cannot be changed here.
    ///
    /// The ownership and OPEN checks run in the same transaction as the
    /// write.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty or malformed patch,
    /// `IssueNotFound`, `Forbidden`, or a storage error.
    pub fn update_fields(
        &mut self,
        principal: &Principal,
        issue_id: &str,
        patch: &IssuePatch,
    ) -> Result<Issue> {
        if patch.is_empty() {
            return Err(Error::InvalidArgument(
                "no fields provided for update".to_string(),
            ));
        }
        validate_patch(patch)?;

        let issue = self
            .storage
            .update_issue_fields(issue_id, patch, &principal.user_id, |access| {
                authorize(principal, Some(access), Capability::UpdateFields)
            })?;

        info!(issue_id, user_id = %principal.user_id, "Issue fields updated");
        Ok(issue)
    }

    /// Move an issue to `to_status` and append the event.
    ///
    /// Any status may follow any other. When `expected_from` is set, the
    /// transition only happens if the issue is still in that status;
    /// otherwise it fails with `StatusConflict` and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for citizens, `IssueNotFound`, `StatusConflict`,
    /// or a storage error.
    pub fn transition_status(
        &mut self,
        principal: &Principal,
        issue_id: &str,
        to_status: IssueStatus,
        expected_from: Option<IssueStatus>,
    ) -> Result<Issue> {
        authorize(principal, None, Capability::UpdateStatus)?;

        let (issue, from_status) = self.storage.transition_issue_status(
            issue_id,
            to_status,
            expected_from,
            &principal.user_id,
        )?;

        info!(
            issue_id,
            user_id = %principal.user_id,
            from = %from_status,
            to = %to_status,
            "Issue status changed"
        );
        Ok(issue)
    }

    /// Page through all issues, newest first. Staff only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for citizens, `InvalidArgument` for a page or
    /// page size below 1, or a storage error.
    pub fn list_for_dispatcher(
        &self,
        principal: &Principal,
        filter: IssueFilter,
        page: PageRequest,
    ) -> Result<IssuePage> {
        authorize(principal, None, Capability::ListAll)?;
        let page = check_page(page)?;

        let (items, total) = self.storage.list_issues_filtered(
            &filter,
            page.offset(),
            u64::from(page.page_size),
        )?;

        debug!(total, page = page.page, "Listed issues");
        Ok(IssuePage {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages(total),
        })
    }

    /// Every issue the principal reported, newest first. Unpaginated.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_mine(&self, principal: &Principal) -> Result<Vec<Issue>> {
        self.storage.list_issues_by_owner(&principal.user_id)
    }

    /// Status transitions of one issue, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound`, `Forbidden`, or a storage error.
    pub fn history(&self, principal: &Principal, issue_id: &str) -> Result<IssueHistory> {
        let access = self
            .storage
            .get_issue_access(issue_id)?
            .ok_or_else(|| not_found(issue_id))?;
        authorize(principal, Some(&access), Capability::ViewHistory)?;

        let events = get_issue_events(self.storage.conn(), issue_id)?;
        Ok(IssueHistory {
            issue_id: issue_id.to_string(),
            events,
        })
    }
}

fn not_found(issue_id: &str) -> Error {
    Error::IssueNotFound {
        id: issue_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssuePriority, Role, User};

    struct Fixture {
        storage: SqliteStorage,
        alice: Principal,
        bob: Principal,
        dispatcher: Principal,
        admin: Principal,
    }

    fn fixture() -> Fixture {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut add = |name: &str, email: &str, role: Role| {
            let user = User::new(name, email).with_role(role);
            storage.insert_user(&user, "test").unwrap();
            user.principal()
        };
        let alice = add("Alice", "alice@example.org", Role::Citizen);
        let bob = add("Bob", "bob@example.org", Role::Citizen);
        let dispatcher = add("Dana", "dana@city.gov", Role::Dispatcher);
        let admin = add("Ada", "ada@city.gov", Role::Admin);
        Fixture {
            storage,
            alice,
            bob,
            dispatcher,
            admin,
        }
    }

    fn pothole() -> IssueDraft {
        IssueDraft {
            title: "Pothole".to_string(),
            description: "Deep enough to lose a wheel".to_string(),
            latitude: 40.0,
            longitude: -73.0,
            ..IssueDraft::default()
        }
    }

    fn retitle(title: &str) -> IssuePatch {
        IssuePatch {
            title: Some(title.to_string()),
            ..IssuePatch::default()
        }
    }

    #[test]
    fn test_end_to_end_dispatch_flow() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);

        let issue = svc.create(&f.alice, pothole()).unwrap();
        assert_eq!(issue.status, IssueStatus::Open);

        let moved = svc
            .transition_status(&f.dispatcher, &issue.id, IssueStatus::InProgress, None)
            .unwrap();
        assert_eq!(moved.status, IssueStatus::InProgress);

        let history = svc.history(&f.dispatcher, &issue.id).unwrap();
        assert_eq!(history.events.len(), 1);
        assert_eq!(history.events[0].event.from_status, IssueStatus::Open);
        assert_eq!(history.events[0].event.to_status, IssueStatus::InProgress);
        assert_eq!(history.events[0].changed_by_user.id, f.dispatcher.user_id);

        let err = svc
            .update_fields(&f.alice, &issue.id, &retitle("Big pothole"))
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let filter = IssueFilter {
            status: Some(IssueStatus::InProgress),
            ..IssueFilter::default()
        };
        let page = svc
            .list_for_dispatcher(&f.dispatcher, filter, PageRequest::new(1, 20))
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.items[0].id, issue.id);
    }

    #[test]
    fn test_create_defaults() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);

        let issue = svc.create(&f.alice, pothole()).unwrap();
        assert_eq!(issue.status, IssueStatus::Open);
        assert_eq!(issue.priority, IssuePriority::Medium);
        assert_eq!(issue.created_by_user_id, f.alice.user_id);

        let urgent = IssueDraft {
            priority: Some(IssuePriority::High),
            ..pothole()
        };
        assert_eq!(svc.create(&f.bob, urgent).unwrap().priority, IssuePriority::High);
    }

    #[test]
    fn test_create_rejects_bad_coordinates() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);

        let draft = IssueDraft {
            latitude: 123.0,
            ..pothole()
        };
        let err = svc.create(&f.alice, draft).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(svc.list_mine(&f.alice).unwrap().is_empty());
    }

    #[test]
    fn test_get_respects_ownership() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        let issue = svc.create(&f.alice, pothole()).unwrap();

        let detail = svc.get(&f.alice, &issue.id).unwrap();
        assert_eq!(detail.created_by_user.email, "alice@example.org");
        assert!(svc.get(&f.dispatcher, &issue.id).is_ok());
        assert!(svc.get(&f.admin, &issue.id).is_ok());

        let err = svc.get(&f.bob, &issue.id).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = svc.get(&f.bob, "missing").unwrap_err();
        assert!(matches!(err, Error::IssueNotFound { .. }));
    }

    #[test]
    fn test_citizen_edits_own_issue_only_while_open() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        let issue = svc.create(&f.alice, pothole()).unwrap();

        let updated = svc
            .update_fields(&f.alice, &issue.id, &retitle("Big pothole"))
            .unwrap();
        assert_eq!(updated.title, "Big pothole");
        assert_eq!(updated.description, issue.description);

        let err = svc
            .update_fields(&f.bob, &issue.id, &retitle("Mine now"))
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        svc.transition_status(&f.dispatcher, &issue.id, IssueStatus::Assigned, None)
            .unwrap();
        let err = svc
            .update_fields(&f.alice, &issue.id, &retitle("Too late"))
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        // Staff can still edit.
        let updated = svc
            .update_fields(&f.dispatcher, &issue.id, &retitle("Pothole on 5th"))
            .unwrap();
        assert_eq!(updated.title, "Pothole on 5th");
        assert_eq!(updated.status, IssueStatus::Assigned);
    }

    #[test]
    fn test_empty_patch_rejected_for_every_role() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        let issue = svc.create(&f.alice, pothole()).unwrap();

        for who in [&f.alice, &f.bob, &f.dispatcher, &f.admin] {
            let err = svc
                .update_fields(who, &issue.id, &IssuePatch::default())
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
            // Even on an issue that does not exist.
            let err = svc
                .update_fields(who, "missing", &IssuePatch::default())
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_update_missing_issue_is_not_found() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        let err = svc
            .update_fields(&f.admin, "missing", &retitle("x"))
            .unwrap_err();
        assert!(matches!(err, Error::IssueNotFound { .. }));
    }

    #[test]
    fn test_transition_requires_staff_before_lookup() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        let issue = svc.create(&f.alice, pothole()).unwrap();

        let err = svc
            .transition_status(&f.alice, &issue.id, IssueStatus::Closed, None)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        // Role is checked first, so a citizen learns nothing about existence.
        let err = svc
            .transition_status(&f.alice, "missing", IssueStatus::Closed, None)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = svc
            .transition_status(&f.dispatcher, "missing", IssueStatus::Closed, None)
            .unwrap_err();
        assert!(matches!(err, Error::IssueNotFound { .. }));

        assert!(svc.history(&f.alice, &issue.id).unwrap().events.is_empty());
    }

    #[test]
    fn test_transitions_are_unrestricted() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        let issue = svc.create(&f.alice, pothole()).unwrap();

        for to in [
            IssueStatus::Closed,
            IssueStatus::Open,
            IssueStatus::Resolved,
            IssueStatus::Resolved,
            IssueStatus::Assigned,
        ] {
            let moved = svc
                .transition_status(&f.admin, &issue.id, to, None)
                .unwrap();
            assert_eq!(moved.status, to);
        }

        let history = svc.history(&f.alice, &issue.id).unwrap();
        assert_eq!(history.events.len(), 5);
        assert_eq!(history.latest_status(), Some(IssueStatus::Assigned));
        // Each event starts where the previous one ended.
        for pair in history.events.windows(2) {
            assert_eq!(pair[0].event.to_status, pair[1].event.from_status);
        }
    }

    #[test]
    fn test_stale_expectation_is_conflict() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        let issue = svc.create(&f.alice, pothole()).unwrap();

        svc.transition_status(
            &f.dispatcher,
            &issue.id,
            IssueStatus::Assigned,
            Some(IssueStatus::Open),
        )
        .unwrap();

        let err = svc
            .transition_status(
                &f.admin,
                &issue.id,
                IssueStatus::InProgress,
                Some(IssueStatus::Open),
            )
            .unwrap_err();
        match err {
            Error::StatusConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, IssueStatus::Open);
                assert_eq!(actual, IssueStatus::Assigned);
            }
            other => panic!("expected StatusConflict, got {other:?}"),
        }
        assert_eq!(svc.history(&f.admin, &issue.id).unwrap().events.len(), 1);
    }

    #[test]
    fn test_list_for_dispatcher_paging() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        for i in 0..5 {
            let draft = IssueDraft {
                title: format!("Issue {i}"),
                ..pothole()
            };
            svc.create(&f.alice, draft).unwrap();
        }

        let page = svc
            .list_for_dispatcher(&f.admin, IssueFilter::default(), PageRequest::new(2, 2))
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
        assert_eq!(page.page_size, 2);
        assert_eq!(page.items.len(), 2);

        let page = svc
            .list_for_dispatcher(&f.admin, IssueFilter::default(), PageRequest::new(9, 2))
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 5);
    }

    #[test]
    fn test_list_for_dispatcher_guards() {
        let mut f = fixture();
        let svc = IssueService::new(&mut f.storage);

        let err = svc
            .list_for_dispatcher(&f.alice, IssueFilter::default(), PageRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        for bad in [PageRequest::new(0, 20), PageRequest::new(1, 0)] {
            let err = svc
                .list_for_dispatcher(&f.dispatcher, IssueFilter::default(), bad)
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_list_mine_only_returns_own() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        let first = svc.create(&f.alice, pothole()).unwrap();
        svc.create(&f.bob, pothole()).unwrap();
        let second = svc.create(&f.alice, pothole()).unwrap();

        let mine = svc.list_mine(&f.alice).unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|i| i.created_by_user_id == f.alice.user_id));
        let ids: Vec<&str> = mine.iter().map(|i| i.id.as_str()).collect();
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));

        assert!(svc.list_mine(&f.dispatcher).unwrap().is_empty());
    }

    #[test]
    fn test_history_access() {
        let mut f = fixture();
        let mut svc = IssueService::new(&mut f.storage);
        let issue = svc.create(&f.alice, pothole()).unwrap();

        assert!(svc.history(&f.alice, &issue.id).is_ok());
        assert!(svc.history(&f.dispatcher, &issue.id).is_ok());
        assert!(svc.history(&f.admin, &issue.id).is_ok());
        assert!(matches!(
            svc.history(&f.bob, &issue.id).unwrap_err(),
            Error::Forbidden(_)
        ));
        assert!(matches!(
            svc.history(&f.bob, "missing").unwrap_err(),
            Error::IssueNotFound { .. }
        ));
    }
}
