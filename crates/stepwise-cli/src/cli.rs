//! CLI argument definitions using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::output::OutputFormat;
use crate::settings::Settings;

/// Stepwise - versioned SQL migrations for PostgreSQL and SQLite
#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Database URL (postgres://... or sqlite://...)
    #[arg(short = 'd', long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Directory holding the migration files
    #[arg(long, env = "STEPWISE_DIR", global = true)]
    pub dir: Option<PathBuf>,

    /// Name of the ledger table
    #[arg(long, env = "STEPWISE_TABLE", global = true)]
    pub table: Option<String>,

    /// TOML configuration file (defaults to ./stepwise.toml when present)
    #[arg(short, long, env = "STEPWISE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Do not take the advisory lock around up/down
    #[arg(long, global = true)]
    pub no_lock: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show applied, pending and orphaned migrations
    Status(commands::status::StatusArgs),

    /// List migration files on disk (no database needed)
    #[command(visible_alias = "ls")]
    List(commands::list::ListArgs),

    /// List migrations that have not been applied
    Pending(commands::list::PendingArgs),

    /// List migrations recorded in the ledger
    Applied(commands::list::AppliedArgs),

    /// Apply pending migrations
    #[command(visible_alias = "migrate")]
    Up(commands::up::UpArgs),

    /// Roll back applied migrations
    #[command(visible_alias = "rollback")]
    Down(commands::down::DownArgs),

    /// Create a new migration file (no database needed)
    New(commands::new::NewArgs),

    /// Check migration files against the ledger
    Validate(commands::validate::ValidateArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Output format selected by the global flags.
    pub fn format(&self) -> OutputFormat {
        OutputFormat::from_json_flag(self.json)
    }

    /// Settings from the global flags.
    pub fn settings(&self) -> Settings {
        Settings {
            database_url: self.database_url.clone(),
            dir: self.dir.clone(),
            table: self.table.clone(),
            config_file: self.config.clone(),
            no_lock: self.no_lock,
        }
    }

    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let format = self.format();
        let settings = self.settings();

        match self.command {
            Commands::Status(args) => commands::status::execute(args, &settings, format).await,
            Commands::List(args) => commands::list::execute_list(args, &settings, format),
            Commands::Pending(args) => commands::list::execute_pending(args, &settings, format).await,
            Commands::Applied(args) => commands::list::execute_applied(args, &settings, format).await,
            Commands::Up(args) => commands::up::execute(args, &settings, format).await,
            Commands::Down(args) => commands::down::execute(args, &settings, format).await,
            Commands::New(args) => commands::new::execute(args, &settings, format),
            Commands::Validate(args) => commands::validate::execute(args, &settings, format).await,
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
