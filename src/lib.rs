//! CivicLink - citizen issue reporting with a dispatcher workflow.
//!
//! This crate provides the core functionality for the `civic` CLI tool.
//!
//! # Architecture
//!
//! - [`model`] - Data types (User, Issue, IssueEvent, Principal)
//! - [`policy`] - Role × ownership × status access decisions
//! - [`storage`] - SQLite issue store and append-only event log
//! - [`service`] - Issue lifecycle engine and user directory
//! - [`validate`] - Defensive input checks and enum normalization
//! - [`config`] - Configuration management
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod policy;
pub mod service;
pub mod storage;
pub mod validate;

pub use error::{Error, Result};

/// Global silent mode flag for `--silent` output.
///
/// When set, mutating issue commands print only the issue id.
pub static SILENT: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if silent mode is active.
#[inline]
pub fn is_silent() -> bool {
    SILENT.load(std::sync::atomic::Ordering::Relaxed)
}
