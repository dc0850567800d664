//! Migration configuration.

use crate::error::{MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Database type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// PostgreSQL database.
    #[default]
    PostgreSQL,
    /// SQLite database.
    SQLite,
}

impl DatabaseType {
    /// Parse from a database URL.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if url.starts_with("sqlite://") || url.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PostgreSQL => write!(f, "postgresql"),
            Self::SQLite => write!(f, "sqlite"),
        }
    }
}

/// Migration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Database connection URL.
    #[serde(default)]
    pub database_url: String,

    /// Database type (auto-detected from the URL by the builder).
    #[serde(default)]
    pub database_type: DatabaseType,

    /// Directory holding the `NNN_description.sql` files.
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    /// Schema name for the ledger table (PostgreSQL only).
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Ledger table name.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Connection timeout.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Upper bound for executing a single migration script.
    #[serde(with = "humantime_serde", default = "default_migration_timeout")]
    pub migration_timeout: Duration,

    /// Maximum connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Whether `migrate` and `rollback` hold an advisory lock for the whole batch.
    #[serde(default = "default_true")]
    pub use_advisory_lock: bool,

    /// Key passed to `pg_advisory_lock`.
    #[serde(default = "default_lock_key")]
    pub lock_key: i64,

    /// How long to wait for the advisory lock.
    #[serde(with = "humantime_serde", default = "default_lock_timeout")]
    pub lock_timeout: Duration,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_table_name() -> String {
    "schema_migrations".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_migration_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

// "stepwise" in ASCII
fn default_lock_key() -> i64 {
    0x7374_6570_7769_7365
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            database_type: DatabaseType::PostgreSQL,
            migrations_dir: default_migrations_dir(),
            schema: default_schema(),
            table_name: default_table_name(),
            connect_timeout: default_connect_timeout(),
            migration_timeout: default_migration_timeout(),
            max_connections: default_max_connections(),
            use_advisory_lock: true,
            lock_key: default_lock_key(),
            lock_timeout: default_lock_timeout(),
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> MigrationConfigBuilder {
        MigrationConfigBuilder::new()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(MigrationError::config("Database URL is required"));
        }

        if self.table_name.is_empty() {
            return Err(MigrationError::config("Table name is required"));
        }
        validate_identifier(&self.table_name)?;

        if self.database_type == DatabaseType::PostgreSQL {
            validate_identifier(&self.schema)?;
        }

        if self.max_connections == 0 {
            return Err(MigrationError::config(
                "Max connections must be greater than 0",
            ));
        }

        // The PostgreSQL lock pins one connection for the whole batch.
        if self.use_advisory_lock
            && self.database_type == DatabaseType::PostgreSQL
            && self.max_connections < 2
        {
            return Err(MigrationError::config(
                "Advisory locking needs at least 2 connections",
            ));
        }

        Ok(())
    }

    /// Get the full table name with schema.
    #[must_use]
    pub fn full_table_name(&self) -> String {
        match self.database_type {
            DatabaseType::PostgreSQL => format!("{}.{}", self.schema, self.table_name),
            DatabaseType::SQLite => self.table_name.clone(),
        }
    }
}

/// Check that a name is safe to interpolate into SQL as an identifier.
pub fn validate_identifier(ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && ident.len() <= 63 {
        Ok(())
    } else {
        Err(MigrationError::config(format!(
            "Invalid SQL identifier: {ident:?}"
        )))
    }
}

/// Builder for migration configuration.
#[derive(Debug, Default)]
pub struct MigrationConfigBuilder {
    config: MigrationConfig,
}

impl MigrationConfigBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: MigrationConfig) -> Self {
        Self { config }
    }

    /// Set the database URL.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        // Auto-detect database type if possible
        if let Some(db_type) = DatabaseType::from_url(&url) {
            self.config.database_type = db_type;
        }
        self.config.database_url = url;
        self
    }

    /// Set the database type.
    #[must_use]
    pub fn database_type(mut self, db_type: DatabaseType) -> Self {
        self.config.database_type = db_type;
        self
    }

    /// Set the migrations directory.
    #[must_use]
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.migrations_dir = dir.into();
        self
    }

    /// Set the schema name.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.schema = schema.into();
        self
    }

    /// Set the ledger table name.
    #[must_use]
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.config.table_name = name.into();
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the migration timeout.
    #[must_use]
    pub fn migration_timeout(mut self, timeout: Duration) -> Self {
        self.config.migration_timeout = timeout;
        self
    }

    /// Set maximum connections.
    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Enable or disable the advisory lock.
    #[must_use]
    pub fn use_advisory_lock(mut self, enabled: bool) -> Self {
        self.config.use_advisory_lock = enabled;
        self
    }

    /// Set the advisory lock key.
    #[must_use]
    pub fn lock_key(mut self, key: i64) -> Self {
        self.config.lock_key = key;
        self
    }

    /// Set the lock timeout.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<MigrationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
