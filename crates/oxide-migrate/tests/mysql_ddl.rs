//! DDL issued against a MySQL backend.
//!
//! The connection is a recorder: introspection answers are canned and the
//! executed statements are compared verbatim.

mod common;

use common::RecordingConnection;
use oxide_migrate::{MigrationExecutor, MigrationOutcome};
use oxide_sql_core::schema::{ForeignKeyAction, IndexDescriptor};
use oxide_sql_core::{FieldDescriptor, TableDefinition, TableNames};

const COLLATE: &str = "CHARACTER SET utf8mb4 COLLATE utf8mb4_general_ci";

fn widget() -> TableDefinition {
    TableDefinition::new("Widget")
        .field(FieldDescriptor::text("name").max_length(32))
        .field(FieldDescriptor::integer("price").min(0).max(100_000))
        .unique(IndexDescriptor::new(["name"]))
}

fn doc() -> TableDefinition {
    TableDefinition::new("Doc")
        .field(FieldDescriptor::text("title").max_length(100))
        .field(FieldDescriptor::reference("owner", "User").cascade())
}

fn executor() -> MigrationExecutor {
    MigrationExecutor::new(TableNames::new("app_"))
}

// =============================================================================
// Table creation
// =============================================================================

#[tokio::test]
async fn creates_table_then_keys() {
    let mut db = RecordingConnection::default();
    let report = executor().migrate(&mut db, &widget()).await.unwrap();

    assert_eq!(report.outcome, MigrationOutcome::Created);
    assert_eq!(
        db.executed,
        vec![
            format!(
                "CREATE TABLE `app_Widget` (`id` INT UNSIGNED NOT NULL AUTO_INCREMENT, \
                 `name` VARCHAR(32) {COLLATE} NOT NULL, \
                 `price` MEDIUMINT UNSIGNED NOT NULL, \
                 `added` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                 `updated` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP, \
                 PRIMARY KEY (`id`)) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
            ),
            String::from("ALTER TABLE `app_Widget` ADD UNIQUE KEY (`name`)"),
        ]
    );
    assert_eq!(report.statements, db.executed);
}

#[tokio::test]
async fn creates_foreign_keys_with_delete_action() {
    let mut db = RecordingConnection::default();
    executor().migrate(&mut db, &doc()).await.unwrap();
    assert_eq!(
        db.executed[1],
        "ALTER TABLE `app_Doc` ADD KEY (`owner`), ADD CONSTRAINT `app_Doc-owner` \
         FOREIGN KEY (`owner`) REFERENCES `app_User` (`id`) ON DELETE CASCADE ON UPDATE CASCADE"
    );
}

// =============================================================================
// Column additions
// =============================================================================

#[tokio::test]
async fn adds_column_after_its_predecessor() {
    let mut db = RecordingConnection::default()
        .with_table("app_Widget", &["id", "name", "price", "added", "updated"])
        .with_key("app_Widget", "name", true, &["name"]);
    let table = widget().field(FieldDescriptor::text("sku").max_length(16).nullable());

    let report = executor().migrate(&mut db, &table).await.unwrap();

    assert_eq!(report.outcome, MigrationOutcome::Altered);
    assert_eq!(
        db.executed,
        vec![format!(
            "ALTER TABLE `app_Widget` ADD COLUMN `sku` VARCHAR(16) {COLLATE} AFTER `price`"
        )]
    );
}

#[tokio::test]
async fn batches_missing_columns_into_one_statement() {
    let mut db = RecordingConnection::default()
        .with_table("app_Widget", &["id", "price"])
        .with_key("app_Widget", "name", true, &["name"]);
    let table = widget().field(FieldDescriptor::boolean("active"));

    executor().migrate(&mut db, &table).await.unwrap();

    assert_eq!(
        db.executed,
        vec![format!(
            "ALTER TABLE `app_Widget` ADD COLUMN `name` VARCHAR(32) {COLLATE} NOT NULL AFTER `id`, \
             ADD COLUMN `active` BOOLEAN NOT NULL AFTER `price`"
        )]
    );
}

// =============================================================================
// Key verification
// =============================================================================

#[tokio::test]
async fn unchanged_table_issues_no_ddl() {
    let mut db = RecordingConnection::default()
        .with_table("app_Doc", &["id", "title", "owner", "added", "updated"])
        .with_key("app_Doc", "owner", false, &["owner"])
        .with_foreign_key(
            "app_Doc",
            "app_Doc-owner",
            "owner",
            "app_User",
            ForeignKeyAction::Cascade,
        );

    let report = executor().migrate(&mut db, &doc()).await.unwrap();

    assert_eq!(report.outcome, MigrationOutcome::UpToDate);
    assert!(report.statements.is_empty());
    assert!(db.executed.is_empty());
}

#[tokio::test]
async fn drifted_foreign_key_is_rebuilt() {
    let mut db = RecordingConnection::default()
        .with_table("app_Doc", &["id", "title", "owner", "added", "updated"])
        .with_key("app_Doc", "owner", false, &["owner"])
        .with_foreign_key(
            "app_Doc",
            "app_Doc-owner",
            "owner",
            "app_User",
            ForeignKeyAction::Restrict,
        );

    let report = executor().migrate(&mut db, &doc()).await.unwrap();

    assert_eq!(report.outcome, MigrationOutcome::IndexesRebuilt);
    assert_eq!(
        db.executed,
        vec![
            String::from("ALTER TABLE `app_Doc` DROP FOREIGN KEY `app_Doc-owner`, DROP KEY `owner`"),
            String::from(
                "ALTER TABLE `app_Doc` ADD KEY (`owner`), ADD CONSTRAINT `app_Doc-owner` \
                 FOREIGN KEY (`owner`) REFERENCES `app_User` (`id`) ON DELETE CASCADE ON UPDATE CASCADE"
            ),
        ]
    );
}

#[tokio::test]
async fn reference_leading_a_unique_group_gets_no_plain_key() {
    let table = doc().unique(IndexDescriptor::named("per_owner", ["owner", "title"]));
    let mut db = RecordingConnection::default();

    executor().migrate(&mut db, &table).await.unwrap();

    assert_eq!(
        db.executed[1],
        "ALTER TABLE `app_Doc` ADD UNIQUE KEY `per_owner` (`owner`, `title`), \
         ADD CONSTRAINT `app_Doc-owner` FOREIGN KEY (`owner`) REFERENCES `app_User` (`id`) \
         ON DELETE CASCADE ON UPDATE CASCADE"
    );
}

#[tokio::test]
async fn dry_run_records_nothing() {
    let mut db = RecordingConnection::default();
    let report = executor()
        .dry_run(true)
        .migrate(&mut db, &widget())
        .await
        .unwrap();
    assert_eq!(report.statements.len(), 2);
    assert!(db.executed.is_empty());
}
