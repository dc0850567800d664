//! Rolling migrations back end to end

use crate::fixtures::*;
use crate::helpers::*;
use pretty_assertions::assert_eq;
use stepwise_migrations::MigrationError;

#[tokio::test]
async fn test_migrate_then_rollback_round_trip() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));

    let migrator = project.migrator().await;
    let before = migrator.applied().await.unwrap();

    migrator.migrate(None).await.unwrap();
    assert!(project.table_exists("a").await);

    let rolled_back = migrator.rollback(1).await.unwrap();
    assert_eq!(rolled_back.len(), 1);
    assert_eq!(rolled_back[0].version, 1);
    assert_eq!(rolled_back[0].name, "create_a");
    assert_eq!(migrator.applied().await.unwrap(), before);
    assert!(!project.table_exists("a").await);
}

#[tokio::test]
async fn test_rollback_is_descending_across_gaps() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));
    project.write("002_create_b.sql", &create_table("b"));
    project.write("010_create_c.sql", &create_table("c"));

    let migrator = project.migrator().await;
    migrator.migrate(None).await.unwrap();

    let rolled_back = migrator.rollback(2).await.unwrap();
    let versions: Vec<i64> = rolled_back.iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![10, 2]);
    assert_eq!(project.applied_versions(&migrator).await, vec![1]);
}

#[tokio::test]
async fn test_rollback_more_steps_than_applied() {
    let project = TestProject::new();
    five_step(&project, None);

    let migrator = project.migrator().await;
    migrator.migrate(Some(2)).await.unwrap();

    let rolled_back = migrator.rollback(10).await.unwrap();
    let versions: Vec<i64> = rolled_back.iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![2, 1]);
    assert!(project.applied_versions(&migrator).await.is_empty());
    assert_eq!(project.pending_versions(&migrator).await, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_rollback_without_down_section_leaves_ledger() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table_up_only("a"));

    let migrator = project.migrator().await;
    migrator.migrate(None).await.unwrap();

    let err = migrator.rollback(1).await.unwrap_err();
    assert!(matches!(err, MigrationError::NoDownScript { version: 1, .. }));
    assert_eq!(err.to_string(), "No DOWN section in migration 001_create_a");
    assert_eq!(project.applied_versions(&migrator).await, vec![1]);
    assert!(project.table_exists("a").await);
}

#[tokio::test]
async fn test_rollback_comment_only_down_section_leaves_ledger() {
    let project = TestProject::new();
    project.write(
        "001_create_a.sql",
        "/* UP */\nCREATE TABLE a (id INTEGER PRIMARY KEY);\n/* DOWN */\n/* nothing to undo yet */\n",
    );

    let migrator = project.migrator().await;
    migrator.migrate(None).await.unwrap();

    let err = migrator.rollback(1).await.unwrap_err();
    assert!(matches!(err, MigrationError::NoDownScript { version: 1, .. }));
    assert_eq!(project.applied_versions(&migrator).await, vec![1]);
    assert!(project.table_exists("a").await);
}

#[tokio::test]
async fn test_rollback_stops_at_first_failure() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));
    project.write("002_create_b.sql", &create_table_up_only("b"));
    project.write("003_create_c.sql", &create_table("c"));

    let migrator = project.migrator().await;
    migrator.migrate(None).await.unwrap();

    let err = migrator.rollback(3).await.unwrap_err();
    assert_eq!(err.version(), Some(2));
    // 003 was reverted before 002 stopped the batch; 001 was never attempted.
    assert_eq!(project.applied_versions(&migrator).await, vec![1, 2]);
    assert!(!project.table_exists("c").await);
    assert!(project.table_exists("a").await);
}

#[tokio::test]
async fn test_failing_down_script_keeps_record() {
    let project = TestProject::new();
    project.write(
        "001_create_a.sql",
        "-- UP\nCREATE TABLE a (id INTEGER);\n-- DOWN\nDROP TABLE a;\nDROP TABLE no_such_table;\n",
    );

    let migrator = project.migrator().await;
    migrator.migrate(None).await.unwrap();

    let err = migrator.rollback(1).await.unwrap_err();
    assert_failed_at(&err, 1);
    assert_eq!(project.applied_versions(&migrator).await, vec![1]);
    assert!(project.table_exists("a").await);
}

#[tokio::test]
async fn test_rollback_with_missing_file() {
    let project = TestProject::new();
    project.write("001_create_a.sql", &create_table("a"));
    project.write("002_create_b.sql", &create_table("b"));

    let migrator = project.migrator().await;
    migrator.migrate(None).await.unwrap();
    project.remove("002_create_b.sql");

    let err = migrator.rollback(1).await.unwrap_err();
    match err {
        MigrationError::MissingMigration { version, name } => {
            assert_eq!(version, 2);
            assert_eq!(name, "create_b");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(project.applied_versions(&migrator).await, vec![1, 2]);
}

#[tokio::test]
async fn test_rollback_on_empty_ledger() {
    let project = TestProject::new();
    five_step(&project, None);

    let migrator = project.migrator().await;
    assert!(migrator.rollback(1).await.unwrap().is_empty());
}
