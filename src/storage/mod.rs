//! SQLite storage layer for CivicLink.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - IMMEDIATE transactions so concurrent writers serialize
//! - Status change and event append committed together
//!
//! # Submodules
//!
//! - [`events`] - Append-only issue event log
//! - [`migrations`] - Embedded schema migrations
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use sqlite::{MutationContext, SqliteStorage};
