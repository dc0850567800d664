//! # Stepwise Migrations
//!
//! Versioned SQL schema migrations for PostgreSQL and SQLite.
//!
//! This crate provides:
//! - Discovery of numbered `.sql` files with `-- UP` / `-- DOWN` sections
//! - A ledger table recording which versions have been applied
//! - Apply and rollback, one transaction per migration
//! - Status, pending and validation reports
//! - An advisory lock serializing concurrent runs on PostgreSQL
//!
//! ## Example
//!
//! ```rust,no_run
//! use stepwise_migrations::{MigrationConfig, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MigrationConfig::builder()
//!         .database_url("postgres://localhost/app")
//!         .migrations_dir("migrations")
//!         .build()?;
//!
//!     let migrator = Migrator::new(config).await?;
//!     for migration in migrator.migrate(None).await? {
//!         println!("applied {migration}");
//!     }
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod database;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod migrator;
pub mod planner;
pub mod pool;
pub mod runner;
pub mod script;
pub mod source;

pub use config::{DatabaseType, MigrationConfig, MigrationConfigBuilder};
pub use database::{Database, SqlRow, SqlValue, Transaction};
pub use error::{MigrationError, Result};
pub use ledger::Ledger;
pub use migration::{AppliedRecord, Migration, MigrationSummary, RolledBack};
pub use migrator::Migrator;
pub use planner::{StatusReport, ValidationIssue};
pub use pool::{DatabasePool, PoolStats};
pub use runner::{Batch, Runner};
pub use source::MigrationSource;

/// Re-export sqlx types for convenience
pub use sqlx;
