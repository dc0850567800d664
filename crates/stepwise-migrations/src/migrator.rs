//! Migration façade.

use crate::config::MigrationConfig;
use crate::database::Database;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::migration::{AppliedRecord, Migration, RolledBack};
use crate::planner::{self, StatusReport, ValidationIssue};
use crate::pool::DatabasePool;
use crate::runner::Runner;
use crate::source::MigrationSource;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Entry point for inspecting, applying and reverting migrations.
///
/// A `Migrator` keeps no state between calls: every operation re-reads the
/// migrations directory and the ledger.
pub struct Migrator {
    db: Arc<dyn Database>,
    config: Arc<MigrationConfig>,
    source: MigrationSource,
    ledger: Ledger,
    runner: Runner,
}

impl Migrator {
    /// Create a new migrator, connecting to `config.database_url`.
    pub async fn new(config: MigrationConfig) -> Result<Self> {
        config.validate()?;
        let pool = DatabasePool::new(config.clone()).await?;
        Self::with_database(Arc::new(pool), config)
    }

    /// Create a migrator over an existing database handle.
    pub fn with_database(db: Arc<dyn Database>, config: MigrationConfig) -> Result<Self> {
        let source = MigrationSource::new(&config.migrations_dir)?;
        let ledger = Ledger::new(db.database_type(), &config.schema, &config.table_name)?;
        let runner = Runner::new(Arc::clone(&db), ledger.clone());

        Ok(Self {
            db,
            config: Arc::new(config),
            source,
            ledger,
            runner,
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the database handle.
    #[must_use]
    pub fn database(&self) -> Arc<dyn Database> {
        Arc::clone(&self.db)
    }

    /// Migrations found on disk, ascending by version. Does not touch the database.
    pub fn discover(&self) -> Result<Vec<Migration>> {
        self.source.discover()
    }

    /// Applied, pending and orphaned migrations.
    pub async fn status(&self) -> Result<StatusReport> {
        let (discovered, applied) = self.load().await?;
        Ok(planner::status(&discovered, applied))
    }

    /// Migrations not applied yet, ascending by version.
    pub async fn pending(&self) -> Result<Vec<Migration>> {
        let (discovered, applied) = self.load().await?;
        Ok(planner::pending(&discovered, &applied))
    }

    /// Ledger rows, ascending by version.
    pub async fn applied(&self) -> Result<Vec<AppliedRecord>> {
        self.read_ledger().await
    }

    /// Apply pending migrations in ascending order, up to and including
    /// `target` when given.
    ///
    /// Returns the migrations applied by this call. On failure the
    /// migrations before the failing one stay applied and the error names the
    /// version that stopped the batch.
    pub async fn migrate(&self, target: Option<i64>) -> Result<Vec<Migration>> {
        let locked = self.lock().await?;
        let result = self.migrate_locked(target).await;
        self.unlock(locked).await;
        result
    }

    /// Revert the `steps` most recently applied migrations, highest version first.
    pub async fn rollback(&self, steps: usize) -> Result<Vec<RolledBack>> {
        if steps == 0 {
            return Ok(Vec::new());
        }

        let locked = self.lock().await?;
        let result = self.rollback_locked(steps).await;
        self.unlock(locked).await;
        result
    }

    /// Write a new, empty migration file numbered after the highest existing version.
    pub fn create(&self, name: &str) -> Result<PathBuf> {
        self.source.create(name)
    }

    /// Report inconsistencies between the files and the ledger.
    pub async fn validate(&self) -> Result<Vec<ValidationIssue>> {
        let (discovered, applied) = self.load().await?;
        Ok(planner::validate(&discovered, &applied))
    }

    async fn migrate_locked(&self, target: Option<i64>) -> Result<Vec<Migration>> {
        let (discovered, applied) = self.load().await?;

        for record in planner::orphaned(&discovered, &applied) {
            warn!(
                version = record.version,
                name = %record.name,
                "Applied migration has no file on disk"
            );
        }

        let plan = planner::up_to(planner::pending(&discovered, &applied), target);
        if plan.is_empty() {
            info!("No pending migrations");
            return Ok(Vec::new());
        }

        info!(count = plan.len(), ?target, "Running pending migrations");
        let batch = self.runner.apply_many(&plan).await;
        if let Some(e) = &batch.error {
            error!(completed = batch.completed.len(), error = %e, "Migration batch stopped");
        }
        batch.into_result()
    }

    async fn rollback_locked(&self, steps: usize) -> Result<Vec<RolledBack>> {
        let (discovered, applied) = self.load().await?;
        if applied.is_empty() {
            info!("No applied migrations to roll back");
            return Ok(Vec::new());
        }

        planner::diff_check(&discovered, &applied)?;
        let plan = planner::rollback_plan(&discovered, &applied, steps)?;

        info!(count = plan.len(), "Rolling back migrations");
        let batch = self.runner.rollback_many(&plan).await;
        if let Some(e) = &batch.error {
            error!(completed = batch.completed.len(), error = %e, "Rollback batch stopped");
        }
        batch.into_result()
    }

    async fn load(&self) -> Result<(Vec<Migration>, Vec<AppliedRecord>)> {
        let discovered = self.source.discover()?;
        planner::ensure_unique(&discovered)?;
        let applied = self.read_ledger().await?;
        debug!(
            discovered = discovered.len(),
            applied = applied.len(),
            "Loaded migration state"
        );
        Ok((discovered, applied))
    }

    async fn read_ledger(&self) -> Result<Vec<AppliedRecord>> {
        let mut tx = self.db.begin().await?;
        self.ledger.ensure(&mut *tx).await?;
        let applied = self.ledger.list_applied(&mut *tx).await?;
        tx.commit().await?;
        Ok(applied)
    }

    async fn lock(&self) -> Result<bool> {
        if !self.config.use_advisory_lock {
            return Ok(false);
        }
        self.db.lock(self.config.lock_key).await?;
        Ok(true)
    }

    async fn unlock(&self, locked: bool) {
        if !locked {
            return;
        }
        if let Err(e) = self.db.unlock(self.config.lock_key).await {
            warn!(error = %e, "Failed to release migration lock");
        }
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("database_type", &self.db.database_type())
            .field("migrations_dir", &self.source.dir())
            .field("table", &self.ledger.table_name())
            .finish()
    }
}
