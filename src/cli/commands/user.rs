//! User command implementations.

use crate::cli::commands::{acting_principal, open_storage};
use crate::cli::UserCommands;
use crate::error::Result;
use crate::model::{PageRequest, Role, User};
use crate::service::UserService;
use crate::validate::normalize_role;
use colored::Colorize;
use std::path::PathBuf;

/// Execute user commands.
pub fn execute(
    command: &UserCommands,
    db_path: Option<&PathBuf>,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    match command {
        UserCommands::Register { name, email } => register(name, email, db_path, json),
        UserCommands::List(page) => list(page.into(), db_path, user, json),
        UserCommands::Role { id, role } => set_role(id, role, db_path, user, json),
        UserCommands::Whoami => whoami(db_path, user, json),
    }
}

fn register(name: &str, email: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let user = UserService::new(&mut storage).register(name, email)?;

    if crate::is_silent() {
        println!("{}", user.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&user)?);
    } else {
        println!("Registered {} <{}>", user.name, user.email);
        println!("  ID:   {}", user.id);
        println!("  Role: {}", user.role);
        println!();
        println!("Act as this user with '--as {}' or CIVIC_USER.", user.email);
    }

    Ok(())
}

fn list(page: PageRequest, db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let users = UserService::new(&mut storage).list_users(&principal, page)?;

    if json {
        println!("{}", serde_json::to_string(&users)?);
        return Ok(());
    }

    println!(
        "Users (page {} of {}, {} total):",
        users.page, users.total_pages, users.total
    );
    println!();
    for u in &users.items {
        println!(
            "{}  {:<10}  {} <{}>",
            u.id,
            colored_role(u.role),
            u.name,
            u.email
        );
    }

    Ok(())
}

fn set_role(
    id: &str,
    role: &str,
    db_path: Option<&PathBuf>,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let role = normalize_role(role)?;

    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let updated = UserService::new(&mut storage).set_role(&principal, id, role)?;

    if crate::is_silent() {
        println!("{}", updated.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&updated)?);
    } else {
        println!("{} is now {}", updated.email, colored_role(updated.role));
    }

    Ok(())
}

fn whoami(db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let principal = acting_principal(&mut storage, user)?;
    let me: Option<User> = storage.get_user(&principal.user_id)?;

    if json {
        println!("{}", serde_json::to_string(&me)?);
    } else if let Some(me) = me {
        println!("{} <{}> ({})", me.name, me.email, colored_role(me.role));
        println!("  ID: {}", me.id);
    }

    Ok(())
}

fn colored_role(role: Role) -> colored::ColoredString {
    match role {
        Role::Admin => role.as_str().red().bold(),
        Role::Dispatcher => role.as_str().yellow(),
        Role::Citizen => role.as_str().normal(),
    }
}
