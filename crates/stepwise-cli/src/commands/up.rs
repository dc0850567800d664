//! Up command - apply pending migrations.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::time::Instant;
use stepwise_migrations::{planner, Migration};

use crate::output::{self, CommandResult, OutputFormat};
use crate::settings::Settings;

/// Arguments for the up command.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Stop after this version (inclusive)
    #[arg(short, long)]
    pub target: Option<i64>,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

/// Individual migration info.
#[derive(Debug, Serialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub name: String,
}

impl From<&Migration> for MigrationInfo {
    fn from(migration: &Migration) -> Self {
        Self {
            version: migration.version,
            name: migration.name.clone(),
        }
    }
}

/// Execute the up command.
pub async fn execute(args: UpArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let migrator = settings.migrator().await?;

    if args.dry_run {
        let pending = planner::up_to(migrator.pending().await?, args.target);
        let migrations: Vec<MigrationInfo> = pending.iter().map(MigrationInfo::from).collect();

        match format {
            OutputFormat::Json => {
                let result = CommandResult::success(serde_json::json!({
                    "dry_run": true,
                    "pending_count": migrations.len(),
                    "migrations": migrations,
                }));
                result.print(format)?;
            }
            OutputFormat::Text => {
                output::info(&format!(
                    "Dry run - {} migration(s) would be applied:",
                    migrations.len()
                ));
                for m in &migrations {
                    output::key_value(&format!("{:03}", m.version), &m.name);
                }
            }
        }
        return Ok(());
    }

    let start = Instant::now();
    let applied = migrator.migrate(args.target).await?;
    let elapsed = start.elapsed();

    match format {
        OutputFormat::Json => {
            let migrations: Vec<MigrationInfo> = applied.iter().map(MigrationInfo::from).collect();
            let result = CommandResult::success(serde_json::json!({
                "applied_count": migrations.len(),
                "elapsed_ms": elapsed.as_millis() as u64,
                "migrations": migrations,
            }));
            result.print(format)?;
        }
        OutputFormat::Text => {
            if applied.is_empty() {
                CommandResult::<()>::success_message("No pending migrations").print(format)?;
            } else {
                output::success(&format!(
                    "Applied {} migration(s) in {}",
                    applied.len(),
                    output::format_duration(elapsed)
                ));
                for m in &applied {
                    output::key_value(&format!("{:03}", m.version), &m.name);
                }
            }
        }
    }

    Ok(())
}
