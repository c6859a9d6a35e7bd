//! End-to-end CLI tests.
//!
//! stdout is a pipe here, so every command answers in JSON.

use assert_cmd::Command;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ADMIN: &str = "admin@civiclink.local";

struct Env {
    _dir: TempDir,
    db: PathBuf,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("civiclink.db");
        Self { _dir: dir, db }
    }

    fn initialized() -> Self {
        let env = Self::new();
        env.civic(None, &["init"]).assert().success();
        env
    }

    fn civic(&self, user: Option<&str>, args: &[&str]) -> Command {
        civic(&self.db, user, args)
    }

    /// Run a command expected to succeed and parse its JSON output.
    fn ok(&self, user: Option<&str>, args: &[&str]) -> Value {
        let output = self.civic(user, args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }

    /// Run a command expected to fail with `code` and parse the structured error.
    fn fails(&self, user: Option<&str>, args: &[&str], code: i32) -> Value {
        let output = self.civic(user, args).assert().code(code).get_output().stderr.clone();
        serde_json::from_slice(&output).unwrap()
    }

    fn register(&self, name: &str, email: &str) -> String {
        let user = self.ok(None, &["user", "register", "--name", name, "--email", email]);
        user["id"].as_str().unwrap().to_string()
    }
}

fn civic(db: &Path, user: Option<&str>, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("civic").unwrap();
    cmd.env_remove("CIVIC_USER")
        .env_remove("CIVIC_TEST_DB")
        .env_remove("CIVICLINK_DB")
        .env_remove("ADMIN_EMAIL")
        .env_remove("ADMIN_NAME")
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(db);
    if let Some(user) = user {
        cmd.args(["--as", user]);
    }
    cmd.args(args);
    cmd
}

#[test]
fn version_reports_package_version() {
    let env = Env::new();
    let out = env.ok(None, &["version"]);
    assert_eq!(out["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn commands_require_init() {
    let env = Env::new();
    let err = env.fails(None, &["health"], 2);
    assert_eq!(err["error"]["code"], "NOT_INITIALIZED");
}

#[test]
fn init_bootstraps_admin_and_refuses_twice() {
    let env = Env::new();
    let out = env.ok(None, &["init"]);
    assert_eq!(out["admin"]["email"], ADMIN);
    assert_eq!(out["admin"]["role"], "ADMIN");

    let err = env.fails(None, &["init"], 2);
    assert_eq!(err["error"]["code"], "ALREADY_INITIALIZED");

    env.civic(None, &["init", "--force"]).assert().success();
}

#[test]
fn dispatch_flow() {
    let env = Env::initialized();
    let dana = env.register("Dana", "dana@city.gov");
    env.register("Cleo", "cleo@example.org");

    let promoted = env.ok(Some(ADMIN), &["user", "role", &dana, "dispatcher"]);
    assert_eq!(promoted["role"], "DISPATCHER");

    let issue = env.ok(
        Some("cleo@example.org"),
        &[
            "issue", "create", "Pothole", "--description", "Deep", "--lat", "40.0", "--lon",
            "-73.0",
        ],
    );
    assert_eq!(issue["status"], "OPEN");
    assert_eq!(issue["priority"], "MEDIUM");
    let id = issue["id"].as_str().unwrap().to_string();

    let moved = env.ok(Some("dana@city.gov"), &["issue", "status", &id, "wip"]);
    assert_eq!(moved["status"], "IN_PROGRESS");

    let err = env.fails(
        Some("cleo@example.org"),
        &["issue", "update", &id, "--title", "Big pothole"],
        5,
    );
    assert_eq!(err["error"]["code"], "FORBIDDEN");

    let page = env.ok(
        Some("dana@city.gov"),
        &["issue", "list", "--status", "in_progress"],
    );
    assert_eq!(page["total"], 1);
    assert_eq!(page["pageSize"], 20);
    assert_eq!(page["items"][0]["id"], id.as_str());

    let history = env.ok(Some("cleo@example.org"), &["issue", "history", &id]);
    let events = history["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["fromStatus"], "OPEN");
    assert_eq!(events[0]["toStatus"], "IN_PROGRESS");
    assert_eq!(events[0]["changedByUser"]["email"], "dana@city.gov");

    let shown = env.ok(Some("cleo@example.org"), &["issue", "show", &id]);
    assert_eq!(shown["createdByUser"]["email"], "cleo@example.org");

    let mine = env.ok(Some("cleo@example.org"), &["issue", "mine"]);
    assert_eq!(mine["count"], 1);
}

#[test]
fn stale_expectation_is_a_conflict() {
    let env = Env::initialized();
    env.register("Cleo", "cleo@example.org");
    let id = env.ok(
        Some("cleo@example.org"),
        &["issue", "create", "Light out", "-d", "Dark corner", "--lat", "1", "--lon", "2"],
    )["id"]
        .as_str()
        .unwrap()
        .to_string();

    env.ok(Some(ADMIN), &["issue", "status", &id, "assigned", "--expect", "open"]);
    let err = env.fails(
        Some(ADMIN),
        &["issue", "status", &id, "closed", "--expect", "open"],
        6,
    );
    assert_eq!(err["error"]["code"], "STATUS_CONFLICT");
    assert_eq!(err["error"]["retryable"], true);
}

#[test]
fn identity_is_required_and_checked() {
    let env = Env::initialized();

    let err = env.fails(None, &["issue", "mine"], 5);
    assert_eq!(err["error"]["code"], "UNAUTHENTICATED");

    let err = env.fails(Some("ghost@example.org"), &["issue", "mine"], 5);
    assert_eq!(err["error"]["code"], "UNAUTHENTICATED");

    env.register("Cleo", "cleo@example.org");
    let err = env.fails(Some("cleo@example.org"), &["issue", "list"], 5);
    assert_eq!(err["error"]["code"], "FORBIDDEN");
    let err = env.fails(Some("cleo@example.org"), &["user", "list"], 5);
    assert_eq!(err["error"]["code"], "FORBIDDEN");
}

#[test]
fn input_errors() {
    let env = Env::initialized();
    env.register("Cleo", "cleo@example.org");

    let err = env.fails(None, &["user", "register", "--name", "Again", "--email", "cleo@example.org"], 6);
    assert_eq!(err["error"]["code"], "CONFLICT");

    let err = env.fails(
        Some("cleo@example.org"),
        &["issue", "create", "Bad", "-d", "Off the map", "--lat", "95", "--lon", "0"],
        4,
    );
    assert_eq!(err["error"]["code"], "INVALID_ARGUMENT");

    let err = env.fails(Some(ADMIN), &["issue", "list", "--status", "resolvd"], 4);
    assert!(err["error"]["message"].as_str().unwrap().contains("did you mean 'resolved'"));

    let err = env.fails(Some(ADMIN), &["issue", "show", "missing"], 3);
    assert_eq!(err["error"]["code"], "ISSUE_NOT_FOUND");
}

#[test]
fn health_counts() {
    let env = Env::initialized();
    env.register("Cleo", "cleo@example.org");

    let health = env.ok(None, &["health"]);
    assert_eq!(health["users"], 2);
    assert!(health["issuesByStatus"].as_array().unwrap().is_empty());
}
