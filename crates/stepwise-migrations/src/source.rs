//! Discovering migrations from a directory of SQL files.
//!
//! Files are named `<version><separator><description>.sql`, for example
//! `001_create_users.sql` or `7-add-index.sql`. The version keeps its numeric
//! value only (`007` and `7` are the same version), the description becomes
//! the migration name unchanged. Files with another extension are ignored; a
//! `.sql` file that does not follow the pattern is an error.

use crate::error::{MigrationError, Result};
use crate::migration::Migration;
use crate::script;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[^\d](.+)\.sql$").expect("valid filename regex"));

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("valid name regex"));

/// Extension of migration files.
pub const EXTENSION: &str = "sql";

/// Parse a migration filename into its version and name.
pub fn parse_filename(path: &Path) -> Result<(i64, String)> {
    let filename = path
        .file_name()
        .and_then(|f| f.to_str())
        .ok_or_else(|| MigrationError::format(path, "filename is not valid UTF-8"))?;

    let caps = FILENAME_RE.captures(filename).ok_or_else(|| {
        MigrationError::format(
            path,
            "expected format NNN_description.sql (version digits, one separator, description)",
        )
    })?;

    let version = caps[1]
        .parse::<i64>()
        .map_err(|e| MigrationError::format(path, format!("invalid version number: {e}")))?;

    Ok((version, caps[2].to_string()))
}

/// Read one migration file.
pub fn load_migration(path: &Path) -> Result<Migration> {
    let (version, name) = parse_filename(path)?;
    let body = fs::read_to_string(path)?;
    let sections = script::split_sections(&body).map_err(|reason| MigrationError::format(path, reason))?;

    Ok(Migration {
        version,
        name,
        up_script: sections.up,
        down_script: sections.down,
        source_path: path.to_path_buf(),
    })
}

/// Turn a free-form name into the description part of a filename.
pub fn sanitize_name(name: &str) -> String {
    UNSAFE_NAME_CHARS
        .replace_all(&name.trim().to_lowercase(), "_")
        .into_owned()
}

/// A directory of migration files.
///
/// Nothing is cached: every call re-reads the directory.
#[derive(Debug, Clone)]
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    /// Bind to a directory, which must exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(MigrationError::config(format!(
                "Migrations directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    /// The directory this source reads.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Discover all migrations, ordered by version.
    ///
    /// Fails on the first malformed file, and with `Conflict` when two files
    /// share a version.
    pub fn discover(&self) -> Result<Vec<Migration>> {
        let mut by_version: BTreeMap<i64, Migration> = BTreeMap::new();

        for path in self.sql_files()? {
            let migration = load_migration(&path)?;
            if let Some(existing) = by_version.get(&migration.version) {
                return Err(MigrationError::Conflict {
                    version: migration.version,
                    detail: format!(
                        "both {} and {} use it",
                        existing.source_path.display(),
                        migration.source_path.display()
                    ),
                });
            }
            by_version.insert(migration.version, migration);
        }

        debug!(dir = %self.dir.display(), count = by_version.len(), "Discovered migrations");
        Ok(by_version.into_values().collect())
    }

    /// Write a new, empty migration file and return its path.
    ///
    /// The version is one more than the highest existing version, or 1.
    pub fn create(&self, name: &str) -> Result<PathBuf> {
        let safe_name = sanitize_name(name);
        if safe_name.trim_matches('_').is_empty() {
            return Err(MigrationError::format(
                self.dir.join(format!("<{name}>")),
                "migration name must contain at least one letter or digit",
            ));
        }

        let latest = self.discover()?.iter().map(|m| m.version).max();
        let next_version = match latest {
            Some(latest) => latest.checked_add(1).ok_or_else(|| {
                MigrationError::format(
                    self.dir.join(format!("{latest}_<{name}>.{EXTENSION}")),
                    "no version left after the highest existing one",
                )
            })?,
            None => 1,
        };

        let path = self
            .dir
            .join(format!("{next_version:03}_{safe_name}.{EXTENSION}"));

        let template = format!(
            "-- Migration: {safe_name}\n\
             -- Created: {}\n\
             \n\
             -- UP\n\
             -- Write your migration SQL here\n\
             \n\
             \n\
             -- DOWN\n\
             -- Write your rollback SQL here (optional)\n\
             \n",
            Utc::now().to_rfc3339()
        );

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(template.as_bytes())?;

        info!(version = next_version, path = %path.display(), "Created migration");
        Ok(path)
    }

    fn sql_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_hidden = entry.file_name().to_string_lossy().starts_with('.');
            let is_sql = path.extension().is_some_and(|ext| ext == EXTENSION);
            if entry.file_type()?.is_file() && is_sql && !is_hidden {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
