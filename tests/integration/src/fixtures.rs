//! Migration file bodies used across the integration tests

use crate::helpers::TestProject;

/// Reversible migration creating `table`
pub fn create_table(table: &str) -> String {
    format!(
        "-- Create {table}\n\
         -- UP\n\
         CREATE TABLE {table} (id INTEGER PRIMARY KEY, label TEXT);\n\
         \n\
         -- DOWN\n\
         DROP TABLE {table};\n"
    )
}

/// Migration creating `table` with no DOWN section
pub fn create_table_up_only(table: &str) -> String {
    format!("-- UP\nCREATE TABLE {table} (id INTEGER PRIMARY KEY);\n")
}

/// Migration whose second statement fails after the first created a table
pub fn half_broken(table: &str) -> String {
    format!(
        "-- UP\n\
         CREATE TABLE {table} (id INTEGER PRIMARY KEY);\n\
         INSERT INTO no_such_table (id) VALUES (1);\n\
         \n\
         -- DOWN\n\
         DROP TABLE {table};\n"
    )
}

/// Table created by migration `version` in [`five_step`]
pub fn step_table(version: i64) -> String {
    format!("step_{version}")
}

/// Write five reversible migrations `001`..`005`; `broken` replaces one of
/// them with [`half_broken`].
pub fn five_step(project: &TestProject, broken: Option<i64>) {
    for version in 1..=5 {
        let table = step_table(version);
        let body = if broken == Some(version) {
            half_broken(&table)
        } else {
            create_table(&table)
        };
        project.write(&format!("{version:03}_create_{table}.sql"), &body);
    }
}
