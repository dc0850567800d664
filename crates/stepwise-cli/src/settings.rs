//! Resolving the migration configuration from file, environment and flags.
//!
//! Precedence, lowest first: built-in defaults, the TOML config file
//! (`--config`, or `stepwise.toml` in the working directory), then flags and
//! their environment variables.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use stepwise_migrations::{MigrationConfig, MigrationConfigBuilder, MigrationSource, Migrator};
use tracing::debug;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "stepwise.toml";

/// Connection and directory settings shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Database URL from `--database-url` or `DATABASE_URL`.
    pub database_url: Option<String>,
    /// Migrations directory from `--dir` or `STEPWISE_DIR`.
    pub dir: Option<PathBuf>,
    /// Ledger table from `--table` or `STEPWISE_TABLE`.
    pub table: Option<String>,
    /// Explicit config file.
    pub config_file: Option<PathBuf>,
    /// Skip the advisory lock.
    pub no_lock: bool,
}

impl Settings {
    /// Configuration file contents, or defaults when there is no file.
    fn file_config(&self) -> Result<MigrationConfig> {
        let path = match &self.config_file {
            Some(path) => path.clone(),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => PathBuf::from(DEFAULT_CONFIG_FILE),
            None => return Ok(MigrationConfig::default()),
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: MigrationConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Migrations directory after applying file and flag overrides.
    pub fn migrations_dir(&self) -> Result<PathBuf> {
        Ok(match &self.dir {
            Some(dir) => dir.clone(),
            None => self.file_config()?.migrations_dir,
        })
    }

    /// Full configuration for commands that talk to the database.
    pub fn config(&self) -> Result<MigrationConfig> {
        let file = self.file_config()?;
        let database_url = self
            .database_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| file.database_url.clone());
        if database_url.is_empty() {
            bail!("DATABASE_URL environment variable, --database-url or database_url in the config file required");
        }

        let mut builder = MigrationConfigBuilder::from_config(file).database_url(database_url);
        if let Some(dir) = &self.dir {
            builder = builder.migrations_dir(dir);
        }
        if let Some(table) = &self.table {
            builder = builder.table_name(table);
        }
        if self.no_lock {
            builder = builder.use_advisory_lock(false);
        }

        builder.build().context("Invalid migration configuration")
    }

    /// Migrations directory without a database connection.
    pub fn source(&self) -> Result<MigrationSource> {
        Ok(MigrationSource::new(self.migrations_dir()?)?)
    }

    /// Connect a migrator.
    pub async fn migrator(&self) -> Result<Migrator> {
        let config = self.config()?;
        Migrator::new(config)
            .await
            .context("Failed to initialize migrator")
    }
}
