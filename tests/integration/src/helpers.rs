//! Test helper utilities for integration tests

use once_cell::sync::Lazy;
use std::fs;
use std::path::PathBuf;
use stepwise_migrations::sqlx::{self, sqlite::SqlitePool};
use stepwise_migrations::{MigrationConfig, MigrationError, Migrator};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Scratch project for integration tests: a migrations directory next to a
/// SQLite database file, both removed on drop.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// Create an empty project
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(dir.path().join("migrations")).expect("Failed to create migrations dir");
        Self { dir }
    }

    /// Directory holding the migration files
    pub fn migrations_dir(&self) -> PathBuf {
        self.dir.path().join("migrations")
    }

    /// URL of the project's SQLite database
    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.dir.path().join("app.db").display())
    }

    /// Configuration pointing at this project
    pub fn config(&self) -> MigrationConfig {
        MigrationConfig::builder()
            .database_url(self.database_url())
            .migrations_dir(self.migrations_dir())
            .build()
            .expect("Failed to build config")
    }

    /// Connect a fresh migrator
    pub async fn migrator(&self) -> Migrator {
        Migrator::new(self.config())
            .await
            .expect("Failed to create migrator")
    }

    /// Write a migration file and return its path
    pub fn write(&self, file: &str, body: &str) -> PathBuf {
        let path = self.migrations_dir().join(file);
        fs::write(&path, body).expect("Failed to write migration");
        path
    }

    /// Delete a migration file
    pub fn remove(&self, file: &str) {
        fs::remove_file(self.migrations_dir().join(file)).expect("Failed to remove migration");
    }

    /// Whether a table exists in the project database
    pub async fn table_exists(&self, table: &str) -> bool {
        let pool = SqlitePool::connect(&self.database_url())
            .await
            .expect("Failed to connect");
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .expect("Failed to query sqlite_master");
        pool.close().await;
        count > 0
    }

    /// Versions recorded in the ledger, ascending
    pub async fn applied_versions(&self, migrator: &Migrator) -> Vec<i64> {
        migrator
            .applied()
            .await
            .expect("Failed to read ledger")
            .iter()
            .map(|r| r.version)
            .collect()
    }

    /// Versions still pending, ascending
    pub async fn pending_versions(&self, migrator: &Migrator) -> Vec<i64> {
        migrator
            .pending()
            .await
            .expect("Failed to read pending")
            .iter()
            .map(|m| m.version)
            .collect()
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that an error is the wrapper for a failed migration at `version`
pub fn assert_failed_at(err: &MigrationError, version: i64) {
    assert!(
        matches!(err, MigrationError::Failed { version: v, .. } if *v == version),
        "Expected migration {} to fail, got: {}",
        version,
        err
    );
}
