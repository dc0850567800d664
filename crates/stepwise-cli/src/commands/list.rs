//! List commands - migration files, pending migrations and ledger rows.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stepwise_migrations::{AppliedRecord, Migration};
use tabled::Tabled;

use crate::output::{self, CommandResult, OutputFormat};
use crate::settings::Settings;

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print full file paths instead of file names
    #[arg(long)]
    pub paths: bool,
}

/// Arguments for the pending command.
#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Only show migrations up to and including this version
    #[arg(short, long)]
    pub target: Option<i64>,
}

/// Arguments for the applied command.
#[derive(Args, Debug)]
pub struct AppliedArgs {
    /// Only show the most recent N entries
    #[arg(short = 'n', long)]
    pub last: Option<usize>,
}

/// A migration file, as listed.
#[derive(Debug, Serialize, Tabled)]
pub struct MigrationRow {
    #[tabled(rename = "Version")]
    pub version: i64,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Rollback")]
    #[tabled(display_with = "yes_no")]
    pub rollback: bool,
    #[tabled(rename = "File")]
    pub file: String,
}

impl MigrationRow {
    /// Row for a discovered migration.
    pub fn new(migration: &Migration, full_path: bool) -> Self {
        let path = migration.path();
        let file = if full_path {
            path.display().to_string()
        } else {
            path.file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        };

        Self {
            version: migration.version,
            name: migration.name.clone(),
            rollback: migration.supports_rollback(),
            file,
        }
    }
}

/// A ledger entry, as listed.
#[derive(Debug, Serialize, Tabled)]
pub struct AppliedRow {
    #[tabled(rename = "Version")]
    pub version: i64,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Applied At")]
    pub applied_at: String,
}

impl From<&AppliedRecord> for AppliedRow {
    fn from(record: &AppliedRecord) -> Self {
        Self {
            version: record.version,
            name: record.name.clone(),
            applied_at: output::format_timestamp(&record.applied_at),
        }
    }
}

fn yes_no(value: &bool) -> String {
    let text = if *value { "yes" } else { "no" };
    text.to_string()
}

/// Execute the list command.
pub fn execute_list(args: ListArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let source = settings.source()?;
    let migrations = source.discover()?;
    let rows: Vec<MigrationRow> = migrations
        .iter()
        .map(|m| MigrationRow::new(m, args.paths))
        .collect();

    match format {
        OutputFormat::Json => {
            let result = CommandResult::success(serde_json::json!({
                "directory": source.dir().display().to_string(),
                "count": rows.len(),
                "migrations": rows,
            }));
            result.print(format)?;
        }
        OutputFormat::Text => {
            output::section(&format!("Migrations in {}", source.dir().display()));
            output::table(&rows);
        }
    }

    Ok(())
}

/// Execute the pending command.
pub async fn execute_pending(
    args: PendingArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<()> {
    let migrator = settings.migrator().await?;
    let pending = stepwise_migrations::planner::up_to(migrator.pending().await?, args.target);
    let rows: Vec<MigrationRow> = pending.iter().map(|m| MigrationRow::new(m, false)).collect();

    match format {
        OutputFormat::Json => {
            let result = CommandResult::success(serde_json::json!({
                "pending_count": rows.len(),
                "migrations": rows,
            }));
            result.print(format)?;
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                output::success("No pending migrations");
            } else {
                output::section("Pending Migrations");
                output::table(&rows);
            }
        }
    }

    Ok(())
}

/// Execute the applied command.
pub async fn execute_applied(
    args: AppliedArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<()> {
    let migrator = settings.migrator().await?;
    let mut applied = migrator.applied().await?;
    if let Some(last) = args.last {
        let skip = applied.len().saturating_sub(last);
        applied.drain(..skip);
    }

    match format {
        OutputFormat::Json => {
            let result = CommandResult::success(serde_json::json!({
                "applied_count": applied.len(),
                "migrations": applied,
            }));
            result.print(format)?;
        }
        OutputFormat::Text => {
            let rows: Vec<AppliedRow> = applied.iter().map(AppliedRow::from).collect();
            output::section("Applied Migrations");
            output::table(&rows);
        }
    }

    Ok(())
}
