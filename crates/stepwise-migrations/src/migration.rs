//! Migration types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A migration discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Migration version, parsed from the filename prefix.
    pub version: i64,
    /// Migration name, the filename remainder without extension.
    pub name: String,
    /// SQL to apply the migration.
    pub up_script: String,
    /// SQL to roll back the migration, if the file has a DOWN section.
    pub down_script: Option<String>,
    /// File the migration was read from.
    pub source_path: PathBuf,
}

impl Migration {
    /// Create a new migration.
    #[must_use]
    pub fn new(
        version: i64,
        name: impl Into<String>,
        up_script: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            version,
            name: name.into(),
            up_script: up_script.into(),
            down_script: None,
            source_path: source_path.into(),
        }
    }

    /// Set the down script for rollback.
    #[must_use]
    pub fn with_down(mut self, down_script: impl Into<String>) -> Self {
        self.down_script = Some(down_script.into());
        self
    }

    /// Check if rollback is supported.
    #[must_use]
    pub fn supports_rollback(&self) -> bool {
        self.down_script.is_some()
    }

    /// Path of the file this migration came from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.source_path
    }

    /// Version and name only, the shape reported for pending migrations.
    #[must_use]
    pub fn summary(&self) -> MigrationSummary {
        MigrationSummary {
            version: self.version,
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}_{}", self.version, self.name)
    }
}

/// Row of the ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRecord {
    /// Migration version.
    pub version: i64,
    /// Migration name at the time it was applied.
    pub name: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

impl fmt::Display for AppliedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}_{} (applied {})",
            self.version,
            self.name,
            self.applied_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Version and name of a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    /// Migration version.
    pub version: i64,
    /// Migration name.
    pub name: String,
}

/// A migration reverted by a rollback call.
pub type RolledBack = MigrationSummary;

impl From<&AppliedRecord> for MigrationSummary {
    fn from(record: &AppliedRecord) -> Self {
        Self {
            version: record.version,
            name: record.name.clone(),
        }
    }
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}_{}", self.version, self.name)
    }
}
