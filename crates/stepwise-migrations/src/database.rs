//! The execution contract the engine needs from a database.
//!
//! The engine never talks to a driver directly. It begins a transaction,
//! runs statements inside it and commits or rolls back. [`crate::pool::DatabasePool`]
//! implements this over sqlx; tests and embedders can supply their own.

use crate::config::DatabaseType;
use crate::error::Result;
use async_trait::async_trait;

/// A bound parameter or a fetched column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Integer value.
    Int(i64),
    /// Text value.
    Text(String),
}

impl SqlValue {
    /// Integer content, if any.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(s) => s.parse().ok(),
            Self::Null => None,
        }
    }

    /// Text content, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One fetched row, columns in select order.
pub type SqlRow = Vec<SqlValue>;

/// A database the engine can run migrations against.
#[async_trait]
pub trait Database: Send + Sync {
    /// SQL dialect of this database.
    fn database_type(&self) -> DatabaseType;

    /// Open a transaction scope.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Acquire the cross-process migration lock identified by `key`.
    async fn lock(&self, key: i64) -> Result<()>;

    /// Release a lock taken with [`Database::lock`].
    async fn unlock(&self, key: i64) -> Result<()>;
}

/// An open transaction.
///
/// Dropping it without calling [`Transaction::commit`] must roll it back.
#[async_trait]
pub trait Transaction: Send {
    /// Execute one statement with `$n` placeholders, returning affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Execute a script that may hold several statements.
    async fn execute_script(&mut self, sql: &str) -> Result<()>;

    /// Run a query and return all rows.
    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>>;

    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Roll the transaction back.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
