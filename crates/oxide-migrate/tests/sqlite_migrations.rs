//! Migrations against an in-memory SQLite database.

use oxide_migrate::{MigrationExecutor, MigrationOutcome, SchemaFile};
use oxide_sql_core::schema::{IndexDescriptor, IntWidth};
use oxide_sql_core::{Connection, FieldDescriptor, SqlValue, TableDefinition, TableNames};
use oxide_sql_sqlx::SqliteGateway;

fn widget() -> TableDefinition {
    TableDefinition::new("Widget")
        .field(FieldDescriptor::text("name").max_length(32))
        .field(FieldDescriptor::integer("price").min(0).max(100_000))
        .unique(IndexDescriptor::new(["name"]))
}

fn user() -> TableDefinition {
    TableDefinition::new("User").field(FieldDescriptor::text("name").max_length(64))
}

fn group() -> TableDefinition {
    TableDefinition::new("Group").field(FieldDescriptor::text("title").max_length(64))
}

async fn setup() -> (SqliteGateway, MigrationExecutor) {
    let db = SqliteGateway::in_memory().await.unwrap();
    (db, MigrationExecutor::new(TableNames::new("app_")))
}

async fn column_names(db: &mut SqliteGateway, table: &str) -> Vec<String> {
    db.describe(table)
        .await
        .unwrap()
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect()
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn second_migration_is_a_no_op() {
    let (mut db, executor) = setup().await;
    let doc = TableDefinition::new("Doc")
        .field(FieldDescriptor::text("title"))
        .field(FieldDescriptor::reference("owner", "User").nullable())
        .unique(IndexDescriptor::named("title", ["title"]));

    executor.migrate(&mut db, &user()).await.unwrap();
    let first = executor.migrate(&mut db, &doc).await.unwrap();
    assert_eq!(first.outcome, MigrationOutcome::Created);

    let second = executor.migrate(&mut db, &doc).await.unwrap();
    assert_eq!(second.outcome, MigrationOutcome::UpToDate);
    assert!(second.statements.is_empty());
}

// =============================================================================
// Column additions
// =============================================================================

#[tokio::test]
async fn new_field_keeps_existing_rows() {
    let (mut db, executor) = setup().await;
    executor.migrate(&mut db, &widget()).await.unwrap();
    db.execute("INSERT INTO \"app_Widget\" (name, price) VALUES ('bolt', 12)")
        .await
        .unwrap();

    let table = widget()
        .field(FieldDescriptor::text("sku").max_length(16).nullable())
        .field(FieldDescriptor::integer("stock").min(0).max(1000));
    let report = executor.migrate(&mut db, &table).await.unwrap();
    assert_eq!(report.outcome, MigrationOutcome::Altered);
    assert_eq!(report.statements.len(), 2);

    assert_eq!(
        column_names(&mut db, "app_Widget").await,
        ["id", "name", "price", "added", "updated", "sku", "stock"]
    );
    let rows = db
        .fetch_all("SELECT id, name, price, sku, stock FROM \"app_Widget\"")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&SqlValue::Int(1)));
    assert_eq!(rows[0].get("name"), Some(&SqlValue::Text(String::from("bolt"))));
    assert_eq!(rows[0].get("price"), Some(&SqlValue::Int(12)));
    assert_eq!(rows[0].get("sku"), Some(&SqlValue::Null));
    assert_eq!(rows[0].get("stock"), Some(&SqlValue::Int(0)));

    let again = executor.migrate(&mut db, &table).await.unwrap();
    assert_eq!(again.outcome, MigrationOutcome::UpToDate);
}

// =============================================================================
// Key verification
// =============================================================================

#[tokio::test]
async fn dropped_index_is_restored() {
    let (mut db, executor) = setup().await;
    executor.migrate(&mut db, &widget()).await.unwrap();
    db.execute("DROP INDEX \"app_Widget:name\"").await.unwrap();

    let report = executor.migrate(&mut db, &widget()).await.unwrap();
    assert_eq!(report.outcome, MigrationOutcome::IndexesRebuilt);
    assert_eq!(
        report.statements,
        ["CREATE UNIQUE INDEX \"app_Widget:name\" ON \"app_Widget\" (\"name\")"]
    );

    let keys = db.keys("app_Widget").await.unwrap();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].unique);
}

#[tokio::test]
async fn new_unique_group_resets_keys() {
    let (mut db, executor) = setup().await;
    executor.migrate(&mut db, &widget()).await.unwrap();

    let table = widget().unique(IndexDescriptor::named("by_price", ["price", "name"]));
    let report = executor.migrate(&mut db, &table).await.unwrap();
    assert_eq!(report.outcome, MigrationOutcome::IndexesRebuilt);
    assert_eq!(report.statements[0], "DROP INDEX \"app_Widget:name\"");
    assert_eq!(db.keys("app_Widget").await.unwrap().len(), 2);
}

#[tokio::test]
async fn unique_group_is_enforced() {
    let (mut db, executor) = setup().await;
    executor.migrate(&mut db, &widget()).await.unwrap();
    db.execute("INSERT INTO \"app_Widget\" (name, price) VALUES ('bolt', 1)")
        .await
        .unwrap();
    let err = db
        .execute("INSERT INTO \"app_Widget\" (name, price) VALUES ('bolt', 2)")
        .await
        .unwrap_err();
    assert!(!err.is_schema_mismatch());
}

// =============================================================================
// Relation tables
// =============================================================================

#[tokio::test]
async fn relation_table_cascades() {
    let (mut db, executor) = setup().await;
    let relation = TableDefinition::relation(
        "User",
        IntWidth::Regular,
        "Group",
        IntWidth::Regular,
        "groups",
        vec![FieldDescriptor::boolean("admin").default_value(false)],
    );
    let reports = executor
        .migrate_all(&mut db, &[relation.clone(), user(), group()])
        .await
        .unwrap();
    let tables: Vec<&str> = reports.iter().map(|r| r.table.as_str()).collect();
    assert_eq!(tables, ["app_User", "app_Group", "app_User-groups"]);
    assert_eq!(
        column_names(&mut db, "app_User-groups").await,
        ["user", "group", "admin"]
    );

    db.execute("INSERT INTO \"app_User\" (name) VALUES ('ann')").await.unwrap();
    db.execute("INSERT INTO \"app_Group\" (title) VALUES ('ops')").await.unwrap();
    db.execute("INSERT INTO \"app_User-groups\" (\"user\", \"group\", admin) VALUES (1, 1, 1)")
        .await
        .unwrap();
    db.execute("DELETE FROM \"app_User\" WHERE id = 1").await.unwrap();
    let links = db.fetch_all("SELECT * FROM \"app_User-groups\"").await.unwrap();
    assert!(links.is_empty());

    let again = executor.migrate(&mut db, &relation).await.unwrap();
    assert_eq!(again.outcome, MigrationOutcome::UpToDate);
}

// =============================================================================
// Schema files
// =============================================================================

#[tokio::test]
async fn applies_schema_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.toml");
    std::fs::write(
        &path,
        r#"
[[table]]
name = "Widget"
unique = [["name"]]

[[table.fields]]
name = "name"
type = "text"
maxLength = 32

[[table.fields]]
name = "maker"
type = 1
references = "Maker"
nullable = true

[[table]]
name = "Maker"
idBytes = 2

[[table.fields]]
name = "name"
type = "text"
"#,
    )
    .unwrap();

    let file = SchemaFile::load(&path).unwrap();
    let (mut db, executor) = setup().await;
    let reports = executor
        .migrate_all(&mut db, &file.definitions().unwrap())
        .await
        .unwrap();
    let tables: Vec<&str> = reports.iter().map(|r| r.table.as_str()).collect();
    assert_eq!(tables, ["app_Maker", "app_Widget"]);

    let fks = db.foreign_keys("app_Widget").await.unwrap();
    assert_eq!(fks.len(), 1);
    assert_eq!(fks[0].references, "app_Maker");
}
