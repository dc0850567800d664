//! Migration error types.

use std::path::PathBuf;

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Migration error type.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A migration file violates the naming or body grammar.
    #[error("Invalid migration file {}: {reason}", path.display())]
    Format {
        /// Offending file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// Duplicate version, either on disk or in the ledger.
    #[error("Version conflict for migration {version}: {detail}")]
    Conflict {
        /// Conflicting version.
        version: i64,
        /// Where the conflict was detected.
        detail: String,
    },

    /// Ledger removal requested for a version that is not recorded.
    #[error("Migration {version} is not recorded in the ledger")]
    NotFound {
        /// Migration version that was not found.
        version: i64,
    },

    /// An applied version has no migration file anymore.
    #[error("Migration file for applied version {version} ({name}) not found")]
    MissingMigration {
        /// Orphaned version.
        version: i64,
        /// Name stored in the ledger.
        name: String,
    },

    /// Rollback requested for a migration without a DOWN section.
    #[error("No DOWN section in migration {version:03}_{name}")]
    NoDownScript {
        /// Migration version.
        version: i64,
        /// Migration name.
        name: String,
    },

    /// Applying or reverting a migration failed and was rolled back.
    #[error("Migration {version:03}_{name} failed: {source}")]
    Failed {
        /// Migration version.
        version: i64,
        /// Migration name.
        name: String,
        /// Underlying cause.
        #[source]
        source: Box<MigrationError>,
    },

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// SQL execution error.
    #[error("SQL execution error: {0}")]
    Execution(String),

    /// A statement violated a unique or primary key constraint.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pool error.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Timeout error.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Lock acquisition failed.
    #[error("Failed to acquire migration lock: {0}")]
    LockFailed(String),
}

impl MigrationError {
    /// Create a format error for a file.
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a failure of a single migration step.
    pub fn failed(version: i64, name: impl Into<String>, source: MigrationError) -> Self {
        Self::Failed {
            version,
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Version of the migration this error is about, if any.
    #[must_use]
    pub fn version(&self) -> Option<i64> {
        match self {
            Self::Conflict { version, .. }
            | Self::NotFound { version }
            | Self::MissingMigration { version, .. }
            | Self::NoDownScript { version, .. }
            | Self::Failed { version, .. } => Some(*version),
            _ => None,
        }
    }

    /// Check if the error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::LockFailed(_) => true,
            Self::Failed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => Self::Config(e.to_string()),
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                Self::UniqueViolation(e.to_string())
            }
            sqlx::Error::Database(e) => Self::Execution(e.to_string()),
            sqlx::Error::Io(e) => Self::Io(e),
            sqlx::Error::PoolTimedOut => Self::Timeout("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Pool("Connection pool is closed".to_string()),
            _ => Self::Execution(err.to_string()),
        }
    }
}
