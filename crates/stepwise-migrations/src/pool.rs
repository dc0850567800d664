//! sqlx-backed database connection pool.

use crate::config::{DatabaseType, MigrationConfig};
use crate::database::{Database, SqlRow, SqlValue, Transaction};
use crate::error::{MigrationError, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(250);

enum Backend {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Database connection pool.
pub struct DatabasePool {
    backend: Backend,
    database_type: DatabaseType,
    config: Arc<MigrationConfig>,
    // Session that holds the PostgreSQL advisory lock while a batch runs.
    lock_conn: Mutex<Option<PoolConnection<Postgres>>>,
}

impl DatabasePool {
    /// Create a new database pool.
    pub async fn new(config: MigrationConfig) -> Result<Self> {
        let backend = match config.database_type {
            DatabaseType::PostgreSQL => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(1)
                    .acquire_timeout(config.connect_timeout)
                    .connect(&config.database_url)
                    .await
                    .map_err(|e| MigrationError::Connection(e.to_string()))?;
                Backend::Postgres(pool)
            }
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::from_str(&config.database_url)
                    .map_err(|e| MigrationError::config(e.to_string()))?
                    .create_if_missing(true);

                let mut pool_options = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.connect_timeout);

                // Every in-memory connection is a separate database, so keep exactly one alive.
                if config.database_url.contains(":memory:") {
                    pool_options = pool_options
                        .max_connections(1)
                        .min_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None);
                }

                let pool = pool_options
                    .connect_with(options)
                    .await
                    .map_err(|e| MigrationError::Connection(e.to_string()))?;
                Backend::Sqlite(pool)
            }
        };

        info!(database_type = %config.database_type, "Connected to database");

        Ok(Self {
            backend,
            database_type: config.database_type,
            config: Arc::new(config),
            lock_conn: Mutex::new(None),
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (size, idle) = match &self.backend {
            Backend::Postgres(pool) => (pool.size(), pool.num_idle()),
            Backend::Sqlite(pool) => (pool.size(), pool.num_idle()),
        };
        PoolStats {
            size,
            idle,
            max_connections: self.config.max_connections,
        }
    }

    /// Test the connection.
    pub async fn test_connection(&self) -> Result<()> {
        let result = match &self.backend {
            Backend::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            Backend::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };
        result.map_err(|e| MigrationError::Connection(e.to_string()))
    }

    async fn try_advisory_lock(conn: &mut PoolConnection<Postgres>, key: i64) -> Result<bool> {
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut **conn)
            .await?;
        Ok(acquired)
    }
}

#[async_trait]
impl Database for DatabasePool {
    fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let timeout = self.config.migration_timeout;
        match &self.backend {
            Backend::Postgres(pool) => Ok(Box::new(PgTransaction {
                tx: pool.begin().await?,
                timeout,
            })),
            Backend::Sqlite(pool) => Ok(Box::new(SqliteTransaction {
                tx: pool.begin().await?,
                timeout,
            })),
        }
    }

    async fn lock(&self, key: i64) -> Result<()> {
        let Backend::Postgres(pool) = &self.backend else {
            // SQLite already serializes writers through its file lock.
            return Ok(());
        };

        let mut held = self.lock_conn.lock().await;
        if held.is_some() {
            return Err(MigrationError::LockFailed(
                "migration lock is already held by this process".to_string(),
            ));
        }

        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| MigrationError::Pool(e.to_string()))?;

        let deadline = Instant::now() + self.config.lock_timeout;
        loop {
            if Self::try_advisory_lock(&mut conn, key).await? {
                break;
            }
            if Instant::now() >= deadline {
                return Err(MigrationError::LockFailed(format!(
                    "another process holds advisory lock {key} (waited {:?})",
                    self.config.lock_timeout
                )));
            }
            debug!(key, "Migration lock busy, retrying");
            tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
        }

        debug!(key, "Acquired migration lock");
        *held = Some(conn);
        Ok(())
    }

    async fn unlock(&self, key: i64) -> Result<()> {
        let Some(mut conn) = self.lock_conn.lock().await.take() else {
            return Ok(());
        };

        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;
        if released {
            debug!(key, "Released migration lock");
        } else {
            warn!(key, "Migration lock was not held at release");
        }
        Ok(())
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("database_type", &self.database_type)
            .field("stats", &self.stats())
            .finish()
    }
}

async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| MigrationError::Timeout(format!("script did not finish within {timeout:?}")))?
        .map_err(MigrationError::from)
}

fn bind_pg<'q>(sql: &'q str, params: &[SqlValue]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Text(s) => query.bind(s.clone()),
        })
}

fn bind_sqlite<'q>(sql: &'q str, params: &[SqlValue]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Text(s) => query.bind(s.clone()),
        })
}

fn decode_pg_row(row: &PgRow) -> Result<SqlRow> {
    row.columns()
        .iter()
        .map(|col| -> Result<SqlValue> {
            let idx = col.ordinal();
            let int = match col.type_info().name() {
                "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(i64::from),
                "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(i64::from),
                "INT8" => row.try_get::<Option<i64>, _>(idx)?,
                _ => {
                    return Ok(row
                        .try_get::<Option<String>, _>(idx)?
                        .map_or(SqlValue::Null, SqlValue::Text))
                }
            };
            Ok(int.map_or(SqlValue::Null, SqlValue::Int))
        })
        .collect()
}

// SQLite types are per value, so decode by the stored type rather than the declared one.
fn decode_sqlite_row(row: &SqliteRow) -> Result<SqlRow> {
    row.columns()
        .iter()
        .map(|col| -> Result<SqlValue> {
            let idx = col.ordinal();
            let raw = row.try_get_raw(idx)?;
            if raw.is_null() {
                return Ok(SqlValue::Null);
            }
            let value = match raw.type_info().name() {
                "INTEGER" => SqlValue::Int(row.try_get::<i64, _>(idx)?),
                _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
            };
            Ok(value)
        })
        .collect()
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    timeout: Duration,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let result = bind_pg(sql, params).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn execute_script(&mut self, sql: &str) -> Result<()> {
        // Simple-query protocol, so a script may hold several statements.
        let conn: &mut sqlx::PgConnection = &mut self.tx;
        with_timeout(self.timeout, sqlx::Executor::execute(conn, sqlx::raw_sql(sql))).await?;
        Ok(())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>> {
        let rows = bind_pg(sql, params).fetch_all(&mut *self.tx).await?;
        rows.iter().map(decode_pg_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}

struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
    timeout: Duration,
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let result = bind_sqlite(sql, params).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn execute_script(&mut self, sql: &str) -> Result<()> {
        let conn: &mut sqlx::SqliteConnection = &mut self.tx;
        with_timeout(self.timeout, sqlx::Executor::execute(conn, sqlx::raw_sql(sql))).await?;
        Ok(())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>> {
        let rows = bind_sqlite(sql, params).fetch_all(&mut *self.tx).await?;
        rows.iter().map(decode_sqlite_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    /// Current number of connections.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum connections allowed.
    pub max_connections: u32,
}

impl PoolStats {
    /// Get the number of active connections.
    #[must_use]
    pub fn active(&self) -> usize {
        (self.size as usize).saturating_sub(self.idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn sqlite_pool(dir: &TempDir) -> DatabasePool {
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let config = MigrationConfig::builder()
            .database_url(url)
            .build()
            .unwrap();
        DatabasePool::new(config).await.unwrap()
    }

    #[test]
    fn test_pool_stats() {
        let stats = PoolStats {
            size: 5,
            idle: 3,
            max_connections: 10,
        };
        assert_eq!(stats.active(), 2);

        let stats = PoolStats {
            size: 0,
            idle: 1,
            max_connections: 10,
        };
        assert_eq!(stats.active(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let dir = TempDir::new().unwrap();
        let pool = sqlite_pool(&dir).await;
        pool.test_connection().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        tx.execute_script("CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT); CREATE TABLE other (id INTEGER);")
            .await
            .unwrap();
        let inserted = tx
            .execute(
                "INSERT INTO items (id, label) VALUES ($1, $2)",
                &[SqlValue::Int(7), SqlValue::from("seven")],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let rows = tx
            .fetch_all("SELECT id, label FROM items WHERE id = $1", &[SqlValue::Int(7)])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(rows, vec![vec![SqlValue::Int(7), SqlValue::from("seven")]]);
    }

    #[tokio::test]
    async fn test_sqlite_rollback_discards_changes() {
        let dir = TempDir::new().unwrap();
        let pool = sqlite_pool(&dir).await;

        let mut tx = pool.begin().await.unwrap();
        tx.execute_script("CREATE TABLE temp_items (id INTEGER)").await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let rows = tx
            .fetch_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = $1",
                &[SqlValue::from("temp_items")],
            )
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_lock_is_noop() {
        let dir = TempDir::new().unwrap();
        let pool = sqlite_pool(&dir).await;

        pool.lock(42).await.unwrap();
        pool.unlock(42).await.unwrap();
        assert_eq!(pool.database_type(), DatabaseType::SQLite);
    }
}
