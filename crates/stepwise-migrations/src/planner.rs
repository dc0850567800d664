//! Reconciling discovered migrations with the ledger.
//!
//! Everything here is a pure function of the discovered migrations and the
//! applied records; nothing touches the database or the filesystem.

use crate::error::{MigrationError, Result};
use crate::migration::{AppliedRecord, Migration, MigrationSummary};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Fail with `Conflict` if two migrations share a version.
pub fn ensure_unique(migrations: &[Migration]) -> Result<()> {
    let mut seen: HashMap<i64, &Migration> = HashMap::new();
    for migration in migrations {
        if let Some(first) = seen.insert(migration.version, migration) {
            return Err(MigrationError::Conflict {
                version: migration.version,
                detail: format!(
                    "both {} and {} use it",
                    first.source_path.display(),
                    migration.source_path.display()
                ),
            });
        }
    }
    Ok(())
}

/// Discovered migrations not yet in the ledger, ascending by version.
#[must_use]
pub fn pending(discovered: &[Migration], applied: &[AppliedRecord]) -> Vec<Migration> {
    let applied: HashSet<i64> = applied.iter().map(|r| r.version).collect();
    let mut pending: Vec<Migration> = discovered
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .cloned()
        .collect();
    pending.sort_by_key(|m| m.version);
    pending
}

/// Keep only migrations at or below `target`.
#[must_use]
pub fn up_to(pending: Vec<Migration>, target: Option<i64>) -> Vec<Migration> {
    match target {
        Some(target) => pending.into_iter().filter(|m| m.version <= target).collect(),
        None => pending,
    }
}

/// Applied records whose migration file no longer exists.
#[must_use]
pub fn orphaned<'a>(discovered: &[Migration], applied: &'a [AppliedRecord]) -> Vec<&'a AppliedRecord> {
    let known: HashSet<i64> = discovered.iter().map(|m| m.version).collect();
    applied.iter().filter(|r| !known.contains(&r.version)).collect()
}

/// Fail with `MissingMigration` for the first applied version without a file.
pub fn diff_check(discovered: &[Migration], applied: &[AppliedRecord]) -> Result<()> {
    match orphaned(discovered, applied).first() {
        Some(record) => Err(MigrationError::MissingMigration {
            version: record.version,
            name: record.name.clone(),
        }),
        None => Ok(()),
    }
}

/// The `steps` most recently applied migrations, highest version first.
///
/// Every selected version must still have its file; otherwise nothing is
/// planned and `MissingMigration` is returned.
pub fn rollback_plan(
    discovered: &[Migration],
    applied: &[AppliedRecord],
    steps: usize,
) -> Result<Vec<(AppliedRecord, Migration)>> {
    let by_version: HashMap<i64, &Migration> =
        discovered.iter().map(|m| (m.version, m)).collect();

    let mut selected: Vec<&AppliedRecord> = applied.iter().collect();
    selected.sort_by(|a, b| b.version.cmp(&a.version));
    selected.truncate(steps);

    selected
        .into_iter()
        .map(|record| {
            by_version
                .get(&record.version)
                .map(|m| (record.clone(), (*m).clone()))
                .ok_or_else(|| MigrationError::MissingMigration {
                    version: record.version,
                    name: record.name.clone(),
                })
        })
        .collect()
}

/// Summary returned by `Migrator::status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Number of applied migrations.
    pub applied_count: usize,
    /// Number of pending migrations.
    pub pending_count: usize,
    /// Ledger rows, ascending by version.
    pub applied: Vec<AppliedRecord>,
    /// Migrations still to run, ascending by version.
    pub pending: Vec<MigrationSummary>,
    /// Applied versions whose file is gone.
    pub orphaned: Vec<MigrationSummary>,
}

impl StatusReport {
    /// Whether everything on disk has been applied.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count == 0
    }
}

/// Assemble the status summary.
#[must_use]
pub fn status(discovered: &[Migration], applied: Vec<AppliedRecord>) -> StatusReport {
    let pending: Vec<MigrationSummary> = pending(discovered, &applied)
        .iter()
        .map(Migration::summary)
        .collect();
    let orphaned: Vec<MigrationSummary> = orphaned(discovered, &applied)
        .into_iter()
        .map(MigrationSummary::from)
        .collect();

    StatusReport {
        applied_count: applied.len(),
        pending_count: pending.len(),
        applied,
        pending,
        orphaned,
    }
}

/// Consistency problem found by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Applied migration whose file was deleted.
    MissingFile {
        /// Applied version.
        version: i64,
        /// Name in the ledger.
        name: String,
    },
    /// File renamed after the migration was applied.
    NameMismatch {
        /// Migration version.
        version: i64,
        /// Name in the ledger.
        applied: String,
        /// Name on disk.
        on_disk: String,
    },
    /// Pending migration numbered below an already applied one.
    OutOfOrder {
        /// Pending version.
        version: i64,
        /// Highest applied version.
        latest_applied: i64,
    },
    /// Migration without a DOWN section.
    MissingRollback {
        /// Migration version.
        version: i64,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFile { version, name } => {
                write!(f, "Applied migration {version:03}_{name} has no file")
            }
            Self::NameMismatch {
                version,
                applied,
                on_disk,
            } => write!(
                f,
                "Migration {version} was applied as {applied:?} but is now named {on_disk:?}"
            ),
            Self::OutOfOrder {
                version,
                latest_applied,
            } => write!(
                f,
                "Pending migration {version} is older than applied migration {latest_applied}"
            ),
            Self::MissingRollback { version } => {
                write!(f, "Missing rollback SQL for version: {version}")
            }
        }
    }
}

/// Report every consistency issue between the files and the ledger.
#[must_use]
pub fn validate(discovered: &[Migration], applied: &[AppliedRecord]) -> Vec<ValidationIssue> {
    let mut issues: Vec<ValidationIssue> = orphaned(discovered, applied)
        .into_iter()
        .map(|r| ValidationIssue::MissingFile {
            version: r.version,
            name: r.name.clone(),
        })
        .collect();

    let names: HashMap<i64, &str> = applied.iter().map(|r| (r.version, r.name.as_str())).collect();
    for migration in discovered {
        if let Some(applied_name) = names.get(&migration.version) {
            if *applied_name != migration.name {
                issues.push(ValidationIssue::NameMismatch {
                    version: migration.version,
                    applied: (*applied_name).to_string(),
                    on_disk: migration.name.clone(),
                });
            }
        }
    }

    if let Some(latest_applied) = applied.iter().map(|r| r.version).max() {
        issues.extend(
            pending(discovered, applied)
                .iter()
                .filter(|m| m.version < latest_applied)
                .map(|m| ValidationIssue::OutOfOrder {
                    version: m.version,
                    latest_applied,
                }),
        );
    }

    issues.extend(
        discovered
            .iter()
            .filter(|m| !m.supports_rollback())
            .map(|m| ValidationIssue::MissingRollback { version: m.version }),
    );

    issues
}
