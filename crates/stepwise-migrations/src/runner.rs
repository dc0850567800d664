//! Executing migrations, one transaction per migration.

use crate::database::{Database, Transaction};
use crate::error::{MigrationError, Result};
use crate::ledger::Ledger;
use crate::migration::{AppliedRecord, Migration, RolledBack};
use crate::script;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of a batch: the steps that committed, and the error that stopped
/// the batch if there was one.
#[derive(Debug)]
pub struct Batch<T> {
    /// Steps committed in execution order.
    pub completed: Vec<T>,
    /// Error of the step that failed; later steps were not attempted.
    pub error: Option<MigrationError>,
}

impl<T> Batch<T> {
    fn new() -> Self {
        Self {
            completed: Vec::new(),
            error: None,
        }
    }

    /// Whether every step committed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// The completed steps, or the error that stopped the batch.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.completed),
        }
    }
}

/// Runs migration scripts together with their ledger mutations.
pub struct Runner {
    db: Arc<dyn Database>,
    ledger: Ledger,
}

impl Runner {
    /// Create a runner writing to `ledger` through `db`.
    #[must_use]
    pub fn new(db: Arc<dyn Database>, ledger: Ledger) -> Self {
        Self { db, ledger }
    }

    /// Apply one migration: run its UP script and record it, atomically.
    pub async fn apply_one(&self, migration: &Migration) -> Result<()> {
        info!(version = migration.version, name = %migration.name, "Applying migration");
        let start = Instant::now();

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| MigrationError::failed(migration.version, &migration.name, e))?;

        let result = self.apply_in(&mut *tx, migration).await;
        self.finish(tx, result, migration).await?;

        info!(
            version = migration.version,
            name = %migration.name,
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Migration applied successfully"
        );
        Ok(())
    }

    /// Apply migrations in order, stopping at the first failure.
    pub async fn apply_many(&self, migrations: &[Migration]) -> Batch<Migration> {
        let mut batch = Batch::new();
        for migration in migrations {
            if let Err(e) = self.apply_one(migration).await {
                batch.error = Some(e);
                break;
            }
            batch.completed.push(migration.clone());
        }
        batch
    }

    /// Revert one migration: run its DOWN script and remove its record, atomically.
    pub async fn rollback_one(&self, migration: &Migration) -> Result<()> {
        let Some(down_script) = migration.down_script.as_deref() else {
            return Err(MigrationError::NoDownScript {
                version: migration.version,
                name: migration.name.clone(),
            });
        };

        info!(version = migration.version, name = %migration.name, "Rolling back migration");
        let start = Instant::now();

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| MigrationError::failed(migration.version, &migration.name, e))?;

        let result = self.rollback_in(&mut *tx, migration.version, down_script).await;
        self.finish(tx, result, migration).await?;

        info!(
            version = migration.version,
            name = %migration.name,
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Migration rolled back successfully"
        );
        Ok(())
    }

    /// Revert planned migrations in the given order, stopping at the first failure.
    ///
    /// `plan` comes from [`crate::planner::rollback_plan`] and is already in
    /// descending version order.
    pub async fn rollback_many(&self, plan: &[(AppliedRecord, Migration)]) -> Batch<RolledBack> {
        let mut batch = Batch::new();
        for (record, migration) in plan {
            if let Err(e) = self.rollback_one(migration).await {
                batch.error = Some(e);
                break;
            }
            batch.completed.push(RolledBack::from(record));
        }
        batch
    }

    async fn apply_in(&self, tx: &mut dyn Transaction, migration: &Migration) -> Result<()> {
        if !script::is_blank(&migration.up_script) {
            tx.execute_script(&migration.up_script).await?;
        }
        self.ledger.record(tx, migration.version, &migration.name).await
    }

    async fn rollback_in(&self, tx: &mut dyn Transaction, version: i64, down_script: &str) -> Result<()> {
        tx.execute_script(down_script).await?;
        self.ledger.remove(tx, version).await
    }

    // Commit on success, roll back on failure. Either way the transaction is consumed.
    async fn finish(
        &self,
        tx: Box<dyn Transaction>,
        result: Result<()>,
        migration: &Migration,
    ) -> Result<()> {
        match result {
            Ok(()) => tx
                .commit()
                .await
                .map_err(|e| MigrationError::failed(migration.version, &migration.name, e)),
            Err(e) => {
                error!(
                    version = migration.version,
                    name = %migration.name,
                    error = %e,
                    "Migration failed, rolling back"
                );
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        version = migration.version,
                        error = %rollback_err,
                        "Transaction rollback failed"
                    );
                }
                Err(MigrationError::failed(migration.version, &migration.name, e))
            }
        }
    }
}
