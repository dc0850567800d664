//! Applying migrations end to end

use crate::fixtures::*;
use crate::helpers::*;
use pretty_assertions::assert_eq;
use stepwise_migrations::MigrationError;

#[tokio::test]
async fn test_migrate_applies_in_version_order() {
    let project = TestProject::new();
    // Sorted by name these would run 002, 010, 9.
    project.write("010_create_c.sql", &create_table("c"));
    project.write("9_create_b.sql", &create_table("b"));
    project.write("002_create_a.sql", &create_table("a"));

    let migrator = project.migrator().await;
    let applied = migrator.migrate(None).await.unwrap();

    let versions: Vec<i64> = applied.iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![2, 9, 10]);
    assert_eq!(project.applied_versions(&migrator).await, vec![2, 9, 10]);
    for table in ["a", "b", "c"] {
        assert!(project.table_exists(table).await, "table {table} missing");
    }
}

#[tokio::test]
async fn test_migrate_is_idempotent() {
    let project = TestProject::new();
    five_step(&project, None);

    let migrator = project.migrator().await;
    assert_eq!(migrator.migrate(None).await.unwrap().len(), 5);
    let before = migrator.applied().await.unwrap();

    assert!(migrator.migrate(None).await.unwrap().is_empty());
    assert_eq!(migrator.applied().await.unwrap(), before);
}

#[tokio::test]
async fn test_migrate_up_to_target() {
    let project = TestProject::new();
    five_step(&project, None);

    let migrator = project.migrator().await;
    let applied = migrator.migrate(Some(3)).await.unwrap();

    assert_eq!(applied.len(), 3);
    assert_eq!(project.applied_versions(&migrator).await, vec![1, 2, 3]);
    assert_eq!(project.pending_versions(&migrator).await, vec![4, 5]);
    assert!(!project.table_exists(&step_table(4)).await);
}

#[tokio::test]
async fn test_failure_stops_batch_and_rolls_back_step() {
    let project = TestProject::new();
    five_step(&project, Some(3));

    let migrator = project.migrator().await;
    let err = migrator.migrate(None).await.unwrap_err();

    assert_failed_at(&err, 3);
    assert!(err.to_string().starts_with("Migration 003_create_step_3 failed"));
    assert_eq!(project.applied_versions(&migrator).await, vec![1, 2]);
    assert_eq!(project.pending_versions(&migrator).await, vec![3, 4, 5]);
    // The CREATE TABLE before the failing statement was undone too.
    assert!(!project.table_exists(&step_table(3)).await);
    assert!(!project.table_exists(&step_table(4)).await);
}

#[tokio::test]
async fn test_migrate_resumes_after_fix() {
    let project = TestProject::new();
    five_step(&project, Some(3));

    let migrator = project.migrator().await;
    assert!(migrator.migrate(None).await.is_err());

    project.write("003_create_step_3.sql", &create_table(&step_table(3)));
    let applied = migrator.migrate(None).await.unwrap();

    let versions: Vec<i64> = applied.iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![3, 4, 5]);
    assert!(migrator.status().await.unwrap().is_up_to_date());
}

#[tokio::test]
async fn test_duplicate_versions_rejected_before_execution() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));
    project.write("1_create_b.sql", &create_table("b"));

    let migrator = project.migrator().await;
    let err = migrator.migrate(None).await.unwrap_err();

    assert!(matches!(err, MigrationError::Conflict { version: 1, .. }));
    assert!(!project.table_exists("a").await);
    assert!(!project.table_exists("b").await);
    assert!(!project.table_exists("schema_migrations").await);
}

#[tokio::test]
async fn test_malformed_filename_rejected() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));
    project.write("create_b.sql", &create_table("b"));

    let migrator = project.migrator().await;
    let err = migrator.migrate(None).await.unwrap_err();

    match err {
        MigrationError::Format { path, .. } => assert!(path.ends_with("create_b.sql")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!project.table_exists("a").await);
}

#[tokio::test]
async fn test_orphaned_ledger_entry_does_not_block_migrate() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));
    project.write("002_create_b.sql", &create_table("b"));

    let migrator = project.migrator().await;
    migrator.migrate(Some(1)).await.unwrap();
    project.remove("001_create_a.sql");

    let status = migrator.status().await.unwrap();
    assert_eq!(status.orphaned.len(), 1);
    assert_eq!(status.orphaned[0].version, 1);

    let applied = migrator.migrate(None).await.unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(project.applied_versions(&migrator).await, vec![1, 2]);
}

#[tokio::test]
async fn test_status_report_serializes() {
    let project = TestProject::new();
    five_step(&project, None);

    let migrator = project.migrator().await;
    migrator.migrate(Some(2)).await.unwrap();

    let status = serde_json::to_value(migrator.status().await.unwrap()).unwrap();
    assert_eq!(status["applied_count"], 2);
    assert_eq!(status["pending_count"], 3);
    assert_eq!(status["pending"][0]["version"], 3);
    assert_eq!(status["pending"][0]["name"], "create_step_3");
    assert_eq!(status["applied"][1]["name"], "create_step_2");
}

#[tokio::test]
async fn test_custom_ledger_table() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));

    let config = stepwise_migrations::MigrationConfig::builder()
        .database_url(project.database_url())
        .migrations_dir(project.migrations_dir())
        .table_name("applied_changes")
        .build()
        .unwrap();
    let migrator = stepwise_migrations::Migrator::new(config).await.unwrap();
    migrator.migrate(None).await.unwrap();

    assert!(project.table_exists("applied_changes").await);
    assert!(!project.table_exists("schema_migrations").await);
}
