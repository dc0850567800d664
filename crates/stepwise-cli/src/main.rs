//! Stepwise CLI
//!
//! Command-line interface for inspecting, applying and rolling back SQL migrations.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

mod cli;
mod commands;
mod output;
mod settings;

use cli::Cli;
use output::{CommandResult, Reported};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json);

    // Execute command
    let format = cli.format();
    match cli.execute().await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if err.is::<Reported>() => Ok(ExitCode::FAILURE),
        Err(err) => {
            let result: CommandResult<()> = CommandResult::failure(format!("{err:#}"));
            result.print(format)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Initialize tracing/logging based on verbosity and format.
fn init_tracing(verbose: u8, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays parseable.
    if json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(verbose > 1).with_writer(std::io::stderr))
            .init();
    }
}
