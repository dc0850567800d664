//! Down command - roll back applied migrations.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stepwise_migrations::planner;

use crate::output::{self, CommandResult, OutputFormat};
use crate::settings::Settings;

/// Arguments for the down command.
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Number of migrations to roll back
    #[arg(short = 'n', long, default_value_t = 1)]
    pub steps: usize,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

/// Planned rollback step.
#[derive(Debug, Serialize)]
pub struct RollbackStep {
    pub version: i64,
    pub name: String,
    pub has_down: bool,
}

/// Execute the down command.
pub async fn execute(args: DownArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let migrator = settings.migrator().await?;

    if args.dry_run {
        let discovered = migrator.discover()?;
        let applied = migrator.applied().await?;
        planner::diff_check(&discovered, &applied)?;
        let plan = planner::rollback_plan(&discovered, &applied, args.steps)?;
        let steps: Vec<RollbackStep> = plan
            .iter()
            .map(|(record, migration)| RollbackStep {
                version: record.version,
                name: record.name.clone(),
                has_down: migration.supports_rollback(),
            })
            .collect();

        match format {
            OutputFormat::Json => {
                let result = CommandResult::success(serde_json::json!({
                    "dry_run": true,
                    "rollback_count": steps.len(),
                    "migrations": steps,
                }));
                result.print(format)?;
            }
            OutputFormat::Text => {
                output::warning(&format!(
                    "Dry run - would roll back {} migration(s):",
                    steps.len()
                ));
                for step in &steps {
                    output::key_value(&format!("{:03}", step.version), &step.name);
                    if !step.has_down {
                        output::warning(&format!(
                            "{:03}_{} has no DOWN section and would stop the rollback",
                            step.version, step.name
                        ));
                    }
                }
            }
        }
        return Ok(());
    }

    let rolled_back = migrator.rollback(args.steps).await?;

    match format {
        OutputFormat::Json => {
            let result = CommandResult::success(serde_json::json!({
                "rolled_back_count": rolled_back.len(),
                "migrations": rolled_back,
            }));
            result.print(format)?;
        }
        OutputFormat::Text => {
            if rolled_back.is_empty() {
                output::info("No migrations to roll back");
            } else {
                output::success(&format!("Rolled back {} migration(s)", rolled_back.len()));
                for r in &rolled_back {
                    output::key_value(&format!("{:03}", r.version), &r.name);
                }
            }
        }
    }

    Ok(())
}
