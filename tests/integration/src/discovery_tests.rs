//! Discovery, validation and authoring of migration files

use crate::fixtures::*;
use crate::helpers::*;
use pretty_assertions::assert_eq;
use std::fs;
use stepwise_migrations::ValidationIssue;

#[tokio::test]
async fn test_create_numbers_after_highest_version() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));
    project.write("002_create_b.sql", &create_table("b"));
    project.write("005_create_e.sql", &create_table("e"));

    let migrator = project.migrator().await;
    let path = migrator.create("add index").unwrap();

    assert_eq!(path.file_name().unwrap(), "006_add_index.sql");
    let versions: Vec<i64> = migrator.discover().unwrap().iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![1, 2, 5, 6]);
}

#[tokio::test]
async fn test_created_file_applies_as_noop() {
    let project = TestProject::new();
    let migrator = project.migrator().await;

    let path = migrator.create("placeholder").unwrap();
    assert_eq!(path.file_name().unwrap(), "001_placeholder.sql");

    let body = fs::read_to_string(&path).unwrap();
    assert!(body.contains("-- UP"));
    assert!(body.contains("-- DOWN"));

    let discovered = migrator.discover().unwrap();
    assert!(!discovered[0].supports_rollback());

    let applied = migrator.migrate(None).await.unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(project.applied_versions(&migrator).await, vec![1]);
}

#[tokio::test]
async fn test_create_refuses_empty_name() {
    let project = TestProject::new();
    let migrator = project.migrator().await;

    assert!(migrator.create("!!!").is_err());
    assert!(migrator.discover().unwrap().is_empty());
}

#[tokio::test]
async fn test_marker_variants_are_recognised() {
    let project = TestProject::new();
    project.write(
        "001_lowercase.sql",
        "--up\nCREATE TABLE a (id INTEGER);\n--down\nDROP TABLE a;\n",
    );
    project.write(
        "002_block.sql",
        "/* UP */\nCREATE TABLE b (id INTEGER);\n/* DOWN */\nDROP TABLE b;\n",
    );
    project.write("003_no_markers.sql", "CREATE TABLE c (id INTEGER);\n");

    let migrator = project.migrator().await;
    let discovered = migrator.discover().unwrap();
    assert!(discovered[0].supports_rollback());
    assert!(discovered[1].supports_rollback());
    assert!(!discovered[2].supports_rollback());

    migrator.migrate(None).await.unwrap();
    for table in ["a", "b", "c"] {
        assert!(project.table_exists(table).await, "table {table} missing");
    }

    migrator.rollback(1).await.unwrap_err();
    project.remove("003_no_markers.sql");
    project.write("003_no_markers.sql", "-- UP\nCREATE TABLE c (id INTEGER);\n-- DOWN\nDROP TABLE c;\n");
    migrator.rollback(3).await.unwrap();
    assert!(project.applied_versions(&migrator).await.is_empty());
}

#[tokio::test]
async fn test_non_sql_files_are_ignored() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));
    project.write("README.md", "# migrations");
    project.write(".002_hidden.sql", &create_table("hidden"));
    fs::create_dir(project.migrations_dir().join("archive")).unwrap();

    let migrator = project.migrator().await;
    assert_eq!(migrator.discover().unwrap().len(), 1);
}

#[tokio::test]
async fn test_validate_reports_drift() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));
    project.write("003_create_c.sql", &create_table_up_only("c"));

    let migrator = project.migrator().await;
    migrator.migrate(None).await.unwrap();

    project.write("002_create_b.sql", &create_table("b"));
    project.remove("001_create_a.sql");

    let issues = migrator.validate().await.unwrap();
    assert_eq!(
        issues,
        vec![
            ValidationIssue::MissingFile {
                version: 1,
                name: "create_a".to_string(),
            },
            ValidationIssue::OutOfOrder {
                version: 2,
                latest_applied: 3,
            },
            ValidationIssue::MissingRollback { version: 3 },
        ]
    );
}
