//! Issue command implementations.

use crate::cli::commands::{acting_principal, open_storage};
use crate::cli::{IssueCommands, IssueCreateArgs, IssueListArgs, IssueUpdateArgs};
use crate::error::Result;
use crate::model::{
    Issue, IssueDetail, IssueDraft, IssueFilter, IssueHistory, IssuePatch, IssuePriority,
    IssueStatus,
};
use crate::service::IssueService;
use crate::validate::{normalize_priority, normalize_status};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for issue mine.
#[derive(Serialize)]
struct IssueListOutput<'a> {
    issues: &'a [Issue],
    count: usize,
}

/// Execute issue commands.
pub fn execute(
    command: &IssueCommands,
    db_path: Option<&PathBuf>,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    match command {
        IssueCommands::Create(args) => create(args, db_path, user, json),
        IssueCommands::Show { id } => show(id, db_path, user, json),
        IssueCommands::Update(args) => update(args, db_path, user, json),
        IssueCommands::Status { id, status, expect } => {
            set_status(id, status, expect.as_deref(), db_path, user, json)
        }
        IssueCommands::List(args) => list(args, db_path, user, json),
        IssueCommands::Mine => mine(db_path, user, json),
        IssueCommands::History { id } => history(id, db_path, user, json),
    }
}

fn create(
    args: &IssueCreateArgs,
    db_path: Option<&PathBuf>,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let priority = args.priority.as_deref().map(normalize_priority).transpose()?;

    let draft = IssueDraft {
        title: args.title.clone(),
        description: args.description.clone(),
        latitude: args.lat,
        longitude: args.lon,
        address: args.address.clone(),
        priority,
    };

    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let issue = IssueService::new(&mut storage).create(&principal, draft)?;

    if crate::is_silent() {
        println!("{}", issue.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else {
        println!("Created issue: {}", issue.id);
        println!("  Title:    {}", issue.title);
        println!("  Status:   {}", colored_status(issue.status));
        println!("  Priority: {}", colored_priority(issue.priority));
    }

    Ok(())
}

fn show(id: &str, db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let detail = IssueService::new(&mut storage).get(&principal, id)?;

    if json {
        println!("{}", serde_json::to_string(&detail)?);
    } else {
        print_issue_detail(&detail);
    }

    Ok(())
}

fn update(
    args: &IssueUpdateArgs,
    db_path: Option<&PathBuf>,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let patch = IssuePatch {
        title: args.title.clone(),
        description: args.description.clone(),
        priority: args.priority.as_deref().map(normalize_priority).transpose()?,
        latitude: args.lat,
        longitude: args.lon,
        address: args.address.clone(),
    };

    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let issue = IssueService::new(&mut storage).update_fields(&principal, &args.id, &patch)?;

    if crate::is_silent() {
        println!("{}", issue.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else {
        println!("Updated issue: {}", issue.id);
    }

    Ok(())
}

fn set_status(
    id: &str,
    status: &str,
    expect: Option<&str>,
    db_path: Option<&PathBuf>,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let to_status = normalize_status(status)?;
    let expected_from = expect.map(normalize_status).transpose()?;

    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let issue = IssueService::new(&mut storage).transition_status(
        &principal,
        id,
        to_status,
        expected_from,
    )?;

    if crate::is_silent() {
        println!("{}", issue.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else {
        println!("{} is now {}", issue.id, colored_status(issue.status));
    }

    Ok(())
}

fn list(args: &IssueListArgs, db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let filter = IssueFilter {
        status: args.status.as_deref().map(normalize_status).transpose()?,
        priority: args.priority.as_deref().map(normalize_priority).transpose()?,
    };

    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let page = IssueService::new(&mut storage).list_for_dispatcher(
        &principal,
        filter,
        (&args.page).into(),
    )?;

    if json {
        println!("{}", serde_json::to_string(&page)?);
        return Ok(());
    }

    println!(
        "Issues (page {} of {}, {} total):",
        page.page, page.total_pages, page.total
    );
    println!();
    print_issue_rows(&page.items);

    Ok(())
}

fn mine(db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let issues = IssueService::new(&mut storage).list_mine(&principal)?;

    if json {
        let output = IssueListOutput {
            issues: &issues,
            count: issues.len(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Your issues ({} found):", issues.len());
    println!();
    print_issue_rows(&issues);

    Ok(())
}

fn history(id: &str, db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let history = IssueService::new(&mut storage).history(&principal, id)?;

    if json {
        println!("{}", serde_json::to_string(&history)?);
    } else {
        print_history(&history);
    }

    Ok(())
}

// ── Rendering ────────────────────────────────────────────────

fn print_issue_rows(issues: &[Issue]) {
    if issues.is_empty() {
        println!("{}", "No issues.".dimmed());
        return;
    }
    for issue in issues {
        println!(
            "{}  {:<11}  {:<6}  {}",
            issue.id,
            colored_status(issue.status),
            colored_priority(issue.priority),
            issue.title
        );
    }
}

fn print_issue_detail(detail: &IssueDetail) {
    let issue = &detail.issue;
    println!("[{}] {}", issue.id, issue.title.bold());
    println!();
    println!("Status:      {}", colored_status(issue.status));
    println!("Priority:    {}", colored_priority(issue.priority));
    println!("Location:    {:.6}, {:.6}", issue.latitude, issue.longitude);
    if let Some(ref address) = issue.address {
        println!("Address:     {address}");
    }
    println!(
        "Reported by: {} <{}>",
        detail.created_by_user.name, detail.created_by_user.email
    );
    println!("Reported:    {}", format_timestamp(issue.created_at));
    println!("Updated:     {}", format_timestamp(issue.updated_at));
    println!();
    println!("Description:");
    println!("{}", issue.description);
}

fn print_history(history: &IssueHistory) {
    println!("History of {}:", history.issue_id);
    println!();
    if history.events.is_empty() {
        println!("{}", "No status changes yet.".dimmed());
        return;
    }
    for entry in &history.events {
        println!(
            "{}  {} → {}  by {} <{}>",
            format_timestamp(entry.event.created_at).dimmed(),
            colored_status(entry.event.from_status),
            colored_status(entry.event.to_status),
            entry.changed_by_user.name,
            entry.changed_by_user.email
        );
    }
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn colored_status(status: IssueStatus) -> colored::ColoredString {
    let s = status.as_str();
    match status {
        IssueStatus::Open => s.cyan(),
        IssueStatus::Assigned => s.blue(),
        IssueStatus::InProgress => s.yellow(),
        IssueStatus::Resolved => s.green(),
        IssueStatus::Closed => s.dimmed(),
    }
}

fn colored_priority(priority: IssuePriority) -> colored::ColoredString {
    let s = priority.as_str();
    match priority {
        IssuePriority::High => s.red().bold(),
        IssuePriority::Medium => s.normal(),
        IssuePriority::Low => s.dimmed(),
    }
}
