//! The table recording which migrations have been applied.
//!
//! The ledger never opens transactions itself. Each method runs on the
//! transaction handed in by the caller, so a ledger write commits or rolls
//! back together with the migration script it belongs to.

use crate::config::{validate_identifier, DatabaseType, MigrationConfig};
use crate::database::{SqlRow, SqlValue, Transaction};
use crate::error::{MigrationError, Result};
use crate::migration::AppliedRecord;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Handle on one ledger table.
#[derive(Debug, Clone)]
pub struct Ledger {
    database_type: DatabaseType,
    schema: String,
    table: String,
}

impl Ledger {
    /// Bind to `table` in `schema` (the schema is ignored on SQLite).
    pub fn new(
        database_type: DatabaseType,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self> {
        let schema = schema.into();
        let table = table.into();
        validate_identifier(&table)?;
        if database_type == DatabaseType::PostgreSQL {
            validate_identifier(&schema)?;
        }
        Ok(Self {
            database_type,
            schema,
            table,
        })
    }

    /// Ledger described by a configuration.
    pub fn from_config(config: &MigrationConfig) -> Result<Self> {
        Self::new(config.database_type, &config.schema, &config.table_name)
    }

    /// Qualified table name as used in SQL.
    #[must_use]
    pub fn table_name(&self) -> String {
        match self.database_type {
            DatabaseType::PostgreSQL => format!("{}.{}", self.schema, self.table),
            DatabaseType::SQLite => self.table.clone(),
        }
    }

    /// Create the ledger table if it does not exist yet.
    pub async fn ensure(&self, tx: &mut dyn Transaction) -> Result<()> {
        let sql = match self.database_type {
            DatabaseType::PostgreSQL => format!(
                r#"
                CREATE SCHEMA IF NOT EXISTS {schema};

                CREATE TABLE IF NOT EXISTS {table} (
                    version BIGINT PRIMARY KEY,
                    name TEXT NOT NULL,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                "#,
                schema = self.schema,
                table = self.table_name(),
            ),
            DatabaseType::SQLite => format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    version INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );
                "#,
                table = self.table_name(),
            ),
        };

        tx.execute_script(&sql).await?;
        debug!(table = %self.table_name(), "Ledger table ensured");
        Ok(())
    }

    /// Applied migrations, ascending by version.
    pub async fn list_applied(&self, tx: &mut dyn Transaction) -> Result<Vec<AppliedRecord>> {
        let applied_at = match self.database_type {
            DatabaseType::PostgreSQL => {
                r#"to_char(applied_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.US"Z"')"#
            }
            DatabaseType::SQLite => "applied_at",
        };
        let sql = format!(
            "SELECT version, name, {applied_at} AS applied_at FROM {} ORDER BY version",
            self.table_name()
        );

        let rows = tx.fetch_all(&sql, &[]).await?;
        rows.into_iter().map(|row| self.decode(row)).collect()
    }

    /// Insert a row for `version`.
    ///
    /// Fails with `Conflict` if the version is already recorded, including by
    /// a concurrent writer; the primary key is the check.
    pub async fn record(&self, tx: &mut dyn Transaction, version: i64, name: &str) -> Result<()> {
        tx.execute(
            &format!(
                "INSERT INTO {} (version, name) VALUES ($1, $2)",
                self.table_name()
            ),
            &[SqlValue::Int(version), SqlValue::from(name)],
        )
        .await
        .map_err(|e| match e {
            MigrationError::UniqueViolation(detail) => MigrationError::Conflict {
                version,
                detail: format!("already recorded in {} ({detail})", self.table_name()),
            },
            other => other,
        })?;

        debug!(version, name, "Recorded migration");
        Ok(())
    }

    /// Delete the row for `version`.
    ///
    /// Fails with `NotFound` if nothing was deleted.
    pub async fn remove(&self, tx: &mut dyn Transaction, version: i64) -> Result<()> {
        let deleted = tx
            .execute(
                &format!("DELETE FROM {} WHERE version = $1", self.table_name()),
                &[SqlValue::Int(version)],
            )
            .await?;

        if deleted == 0 {
            return Err(MigrationError::NotFound { version });
        }

        debug!(version, "Removed migration record");
        Ok(())
    }

    fn decode(&self, row: SqlRow) -> Result<AppliedRecord> {
        let malformed = || {
            MigrationError::execution(format!(
                "unexpected row shape in ledger table {}",
                self.table_name()
            ))
        };

        let [version, name, applied_at]: [SqlValue; 3] =
            row.try_into().map_err(|_| malformed())?;

        let version = version.as_i64().ok_or_else(malformed)?;
        let name = name.as_str().ok_or_else(malformed)?.to_string();
        let applied_at = applied_at.as_str().ok_or_else(malformed)?;
        let applied_at = DateTime::parse_from_rfc3339(applied_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                MigrationError::execution(format!(
                    "invalid applied_at {applied_at:?} for version {version}: {e}"
                ))
            })?;

        Ok(AppliedRecord {
            version,
            name,
            applied_at,
        })
    }
}
