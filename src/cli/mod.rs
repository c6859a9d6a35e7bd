//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for list/query commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
}

pub mod commands;

/// CivicLink CLI - report civic issues and work them through dispatch
#[derive(Parser, Debug)]
#[command(name = "civic", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.civiclink/data/civiclink.db)
    #[arg(long, global = true, env = "CIVIC_DB")]
    pub db: Option<PathBuf>,

    /// Act as this user (id or email)
    #[arg(long = "as", value_name = "USER", global = true, env = "CIVIC_USER")]
    pub user: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, json)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Output only the ID (for scripting)
    #[arg(long, global = true)]
    pub silent: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and bootstrap the admin user
    Init {
        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Show database health (user and issue counts)
    Health,

    /// User management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Issue reporting and dispatch
    Issue {
        #[command(subcommand)]
        command: IssueCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// User Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a new citizen
    Register {
        /// Display name
        #[arg(long)]
        name: String,

        /// Email address (must be unique)
        #[arg(long)]
        email: String,
    },

    /// List users (admin only)
    List(PageArgs),

    /// Change a user's role (admin only)
    Role {
        /// User ID
        id: String,

        /// New role (citizen, dispatcher, admin)
        role: String,
    },

    /// Show the user you are acting as
    Whoami,
}

// ============================================================================
// Issue Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum IssueCommands {
    /// Report a new issue
    Create(IssueCreateArgs),

    /// Show issue details
    Show {
        /// Issue ID
        id: String,
    },

    /// Update issue fields
    Update(IssueUpdateArgs),

    /// Change issue status (dispatcher/admin only)
    Status {
        /// Issue ID
        id: String,

        /// New status (open, assigned, in_progress, resolved, closed)
        status: String,

        /// Only change if the issue is currently in this status
        #[arg(long)]
        expect: Option<String>,
    },

    /// List all issues (dispatcher/admin only)
    List(IssueListArgs),

    /// List issues you reported
    Mine,

    /// Show status history of an issue
    History {
        /// Issue ID
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct IssueCreateArgs {
    /// Issue title
    pub title: String,

    /// What is wrong, and where
    #[arg(short, long)]
    pub description: String,

    /// Latitude (-90..90)
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude (-180..180)
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Street address
    #[arg(long)]
    pub address: Option<String>,

    /// Priority (low, medium, high; default medium)
    #[arg(short, long)]
    pub priority: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct IssueUpdateArgs {
    /// Issue ID
    pub id: String,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// New priority (low, medium, high)
    #[arg(short, long)]
    pub priority: Option<String>,

    /// New latitude
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// New longitude
    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// New street address
    #[arg(long)]
    pub address: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct IssueListArgs {
    /// Filter by status
    #[arg(short, long)]
    pub status: Option<String>,

    /// Filter by priority
    #[arg(short, long)]
    pub priority: Option<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

/// Pagination flags.
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Items per page
    #[arg(long, default_value_t = crate::model::PageRequest::DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

impl Default for PageArgs {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: crate::model::PageRequest::DEFAULT_PAGE_SIZE,
        }
    }
}

impl From<&PageArgs> for crate::model::PageRequest {
    fn from(args: &PageArgs) -> Self {
        Self::new(args.page, args.page_size)
    }
}
