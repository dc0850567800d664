//! Integration tests for stepwise migrations
//!
//! These run the full engine against SQLite databases in temporary
//! directories:
//! - Discovery and file authoring
//! - Applying migrations
//! - Rolling migrations back

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;

#[cfg(test)]
mod discovery_tests;
#[cfg(test)]
mod migrate_tests;
#[cfg(test)]
mod rollback_tests;
