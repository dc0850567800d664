//! New command - create a migration file.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use stepwise_migrations::source::{self, MigrationSource};

use crate::output::{self, CommandResult, OutputFormat};
use crate::settings::Settings;

/// Arguments for the new command.
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Migration name, e.g. "create users"
    pub name: String,
}

/// Execute the new command.
pub fn execute(args: NewArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let dir = settings.migrations_dir()?;
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create migrations directory {}", dir.display()))?;
        if format == OutputFormat::Text {
            output::info(&format!("Created directory {}", dir.display()));
        }
    }

    let path = MigrationSource::new(&dir)?.create(&args.name)?;
    let (version, name) = source::parse_filename(&path)?;

    match format {
        OutputFormat::Json => {
            let result = CommandResult::success(serde_json::json!({
                "path": path.display().to_string(),
                "version": version,
                "name": name,
            }));
            result.print(format)?;
        }
        OutputFormat::Text => {
            output::success(&format!("Created migration {}", path.display()));
            output::info("Add SQL under -- UP, and the statements that undo it under -- DOWN");
        }
    }

    Ok(())
}
