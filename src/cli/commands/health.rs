//! Health command implementation.

use crate::cli::commands::open_storage;
use crate::error::Result;
use crate::model::IssueStatus;
use crate::service::UserService;
use colored::Colorize;
use std::path::PathBuf;

/// Execute the health command.
///
/// # Errors
///
/// Returns `NotInitialized` if there is no database, or a query error.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let health = UserService::new(&mut storage).health()?;

    if json {
        println!("{}", serde_json::to_string(&health)?);
        return Ok(());
    }

    println!("{}", "CivicLink Health".bold().underline());
    println!();
    println!("  {}: {}", "Users".bold(), health.users);
    println!("  {}:", "Issues".bold());
    for status in IssueStatus::ALL {
        let count = health
            .issues_by_status
            .iter()
            .find(|c| c.status == status)
            .map_or(0, |c| c.count);
        println!("    {:<12} {count}", status.as_str());
    }
    println!();
    println!("{}", "OK".green());

    Ok(())
}
