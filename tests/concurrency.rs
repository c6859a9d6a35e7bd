//! Concurrent status transitions against one on-disk database.

use std::sync::{Arc, Barrier};
use std::thread;

use civic::model::{IssueDraft, IssueStatus, Principal, Role, User};
use civic::service::IssueService;
use civic::storage::events::get_issue_events;
use civic::storage::SqliteStorage;
use civic::Error;
use tempfile::TempDir;

struct Setup {
    _dir: TempDir,
    path: std::path::PathBuf,
    issue_id: String,
    dispatchers: [Principal; 2],
}

fn setup() -> Setup {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("civiclink.db");
    let mut storage = SqliteStorage::open(&path).unwrap();

    let citizen = User::new("Cleo", "cleo@example.org");
    storage.insert_user(&citizen, "test").unwrap();
    let mut dispatchers = Vec::new();
    for (name, email) in [("Dana", "dana@city.gov"), ("Dev", "dev@city.gov")] {
        let user = User::new(name, email).with_role(Role::Dispatcher);
        storage.insert_user(&user, "test").unwrap();
        dispatchers.push(user.principal());
    }

    let draft = IssueDraft {
        title: "Pothole".to_string(),
        description: "Deep".to_string(),
        latitude: 40.0,
        longitude: -73.0,
        ..IssueDraft::default()
    };
    let issue = IssueService::new(&mut storage)
        .create(&citizen.principal(), draft)
        .unwrap();

    Setup {
        _dir: dir,
        path,
        issue_id: issue.id,
        dispatchers: dispatchers.try_into().unwrap(),
    }
}

/// Run one transition per dispatcher at the same moment.
fn race(
    setup: &Setup,
    targets: [IssueStatus; 2],
    expected_from: Option<IssueStatus>,
) -> Vec<Result<IssueStatus, Error>> {
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = setup
        .dispatchers
        .iter()
        .cloned()
        .zip(targets)
        .map(|(principal, to)| {
            // Opened before spawning so schema setup is not part of the race.
            let mut storage = SqliteStorage::open(&setup.path).unwrap();
            let barrier = Arc::clone(&barrier);
            let issue_id = setup.issue_id.clone();
            thread::spawn(move || {
                barrier.wait();
                IssueService::new(&mut storage)
                    .transition_status(&principal, &issue_id, to, expected_from)
                    .map(|issue| issue.status)
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn exactly_one_guarded_transition_wins() {
    let setup = setup();

    let results = race(
        &setup,
        [IssueStatus::Assigned, IssueStatus::InProgress],
        Some(IssueStatus::Open),
    );

    let wins: Vec<IssueStatus> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(wins.len(), 1, "results: {results:?}");

    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    match loser {
        Error::StatusConflict {
            expected, actual, ..
        } => {
            assert_eq!(*expected, IssueStatus::Open);
            assert_eq!(*actual, wins[0]);
        }
        other => panic!("expected StatusConflict, got {other:?}"),
    }

    let storage = SqliteStorage::open(&setup.path).unwrap();
    let issue = storage.get_issue(&setup.issue_id).unwrap().unwrap();
    assert_eq!(issue.status, wins[0]);

    let events = get_issue_events(storage.conn(), &setup.issue_id).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.from_status, IssueStatus::Open);
    assert_eq!(events[0].event.to_status, wins[0]);
}

#[test]
fn unguarded_transitions_serialize_without_stale_reads() {
    let setup = setup();

    let results = race(&setup, [IssueStatus::Assigned, IssueStatus::InProgress], None);
    assert!(results.iter().all(Result::is_ok), "results: {results:?}");

    let storage = SqliteStorage::open(&setup.path).unwrap();
    let events = get_issue_events(storage.conn(), &setup.issue_id).unwrap();
    assert_eq!(events.len(), 2);

    // The second writer saw the first writer's status, not the original OPEN.
    assert_eq!(events[0].event.from_status, IssueStatus::Open);
    assert_eq!(events[1].event.from_status, events[0].event.to_status);

    let issue = storage.get_issue(&setup.issue_id).unwrap().unwrap();
    assert_eq!(issue.status, events[1].event.to_status);
}
