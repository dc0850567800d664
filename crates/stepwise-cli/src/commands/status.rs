//! Status command - applied, pending and orphaned migrations.

use anyhow::Result;
use clap::Args;

use crate::output::{self, CommandResult, OutputFormat};
use crate::settings::Settings;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also list applied migrations
    #[arg(long)]
    pub all: bool,
}

/// Execute the status command.
pub async fn execute(args: StatusArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let migrator = settings.migrator().await?;
    let report = migrator.status().await?;

    match format {
        OutputFormat::Json => {
            let result = CommandResult::success(&report);
            result.print(format)?;
        }
        OutputFormat::Text => {
            output::section("Migration Status");
            output::key_value("Database", &migrator.config().database_type.to_string());
            output::key_value("Directory", &migrator.config().migrations_dir.display().to_string());
            output::key_value("Applied", &report.applied_count.to_string());
            output::key_value("Pending", &report.pending_count.to_string());

            if args.all && !report.applied.is_empty() {
                output::section("Applied Migrations");
                for record in &report.applied {
                    output::status(
                        &format!(
                            "{:03}_{}  ({})",
                            record.version,
                            record.name,
                            output::format_timestamp(&record.applied_at)
                        ),
                        true,
                    );
                }
            }

            if !report.pending.is_empty() {
                output::section("Pending Migrations");
                for pending in &report.pending {
                    output::status(&pending.to_string(), false);
                }
            }

            println!();
            for orphan in &report.orphaned {
                output::warning(&format!("Applied migration {orphan} has no file on disk"));
            }

            if report.is_up_to_date() {
                output::success("Database is up to date");
            } else {
                output::info(&format!("{} migration(s) pending", report.pending_count));
            }
        }
    }

    Ok(())
}
