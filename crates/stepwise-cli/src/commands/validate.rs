//! Validate command - check migration files against the ledger.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stepwise_migrations::ValidationIssue;

use crate::output::{self, CommandResult, OutputFormat, Reported};
use crate::settings::Settings;

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Strict validation mode: warnings fail too
    #[arg(long)]
    pub strict: bool,
}

/// Validation result.
#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub warnings: Vec<ValidationMessage>,
    pub errors: Vec<ValidationMessage>,
}

/// Validation message.
#[derive(Debug, Serialize)]
pub struct ValidationMessage {
    pub level: String,
    pub message: String,
    pub issue: ValidationIssue,
}

/// Missing DOWN sections only matter once someone rolls back.
fn is_warning(issue: &ValidationIssue) -> bool {
    matches!(issue, ValidationIssue::MissingRollback { .. })
}

fn classify(issues: Vec<ValidationIssue>, strict: bool) -> ValidationResult {
    let mut result = ValidationResult {
        valid: true,
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    for issue in issues {
        let message = issue.to_string();
        if is_warning(&issue) {
            result.warnings.push(ValidationMessage {
                level: "warning".to_string(),
                message,
                issue,
            });
        } else {
            result.errors.push(ValidationMessage {
                level: "error".to_string(),
                message,
                issue,
            });
        }
    }

    result.valid = result.errors.is_empty() && (!strict || result.warnings.is_empty());
    result
}

/// Execute the validate command.
pub async fn execute(args: ValidateArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let migrator = settings.migrator().await?;
    let result = classify(migrator.validate().await?, args.strict);
    let valid = result.valid;

    match format {
        OutputFormat::Json => {
            let result = if valid {
                CommandResult::success(result)
            } else {
                CommandResult::failure_with(result, "Validation failed")
            };
            result.print(format)?;
        }
        OutputFormat::Text => {
            for warning in &result.warnings {
                output::warning(&warning.message);
            }
            for error in &result.errors {
                output::error(&error.message);
            }

            if valid {
                output::success("All migrations are valid");
            } else {
                output::error(&format!(
                    "Validation failed: {} error(s), {} warning(s)",
                    result.errors.len(),
                    result.warnings.len()
                ));
            }
        }
    }

    if valid {
        Ok(())
    } else {
        Err(Reported("Validation failed".to_string()).into())
    }
}
