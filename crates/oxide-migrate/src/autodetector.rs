//! Diffs a table definition against the live table.
//!
//! Detection only reads: it introspects columns, keys and (where the
//! dialect can add them later) foreign keys, and returns the operations
//! that converge the table. Executing them is the executor's job.

use std::collections::HashSet;

use oxide_sql_core::dialect::{ColumnAnchor, MissingColumn};
use oxide_sql_core::gateway::{ColumnInfo, ForeignKeyInfo, IndexInfo};
use oxide_sql_core::schema::KeyPlan;
use oxide_sql_core::{Connection, TableDefinition, TableNames};
use tracing::debug;

use crate::error::Result;
use crate::operations::{MigrationOperation, MigrationOutcome, MigrationReport};

/// The operations that converge one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Physical table name.
    pub table: String,
    /// Outcome once the operations have run.
    pub outcome: MigrationOutcome,
    /// Operations in execution order.
    pub operations: Vec<MigrationOperation>,
}

impl MigrationPlan {
    /// Every statement of every operation, in order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.operations
            .iter()
            .flat_map(MigrationOperation::statements)
            .map(String::as_str)
    }
}

impl From<MigrationPlan> for MigrationReport {
    fn from(plan: MigrationPlan) -> Self {
        let statements = plan.statements().map(String::from).collect();
        Self {
            table: plan.table,
            outcome: plan.outcome,
            statements,
        }
    }
}

/// Plans the migration of `definition`.
///
/// # Errors
///
/// Fails when the definition is invalid or introspection fails.
pub async fn detect<C: Connection>(
    conn: &mut C,
    names: &TableNames,
    definition: &TableDefinition,
) -> Result<MigrationPlan> {
    definition.validate()?;
    let table = names.physical(&definition.name);
    let plan = definition.key_plan(names);

    let Some(live) = conn.describe(&table).await? else {
        debug!(table = %table, "Table is missing");
        let dialect = conn.dialect();
        let mut operations = vec![MigrationOperation::CreateTable {
            table: table.clone(),
            statements: dialect.create_table(&table, definition, &plan),
        }];
        let keys = dialect.add_keys(&table, &plan);
        if !keys.is_empty() {
            operations.push(MigrationOperation::RebuildKeys {
                table: table.clone(),
                statements: keys,
            });
        }
        return Ok(MigrationPlan {
            table,
            outcome: MigrationOutcome::Created,
            operations,
        });
    };

    let missing = missing_columns(definition, &live);
    let keys = conn.keys(&table).await?;
    let compare_foreign_keys = conn.dialect().supports_add_constraint();
    let foreign_keys = if compare_foreign_keys {
        conn.foreign_keys(&table).await?
    } else {
        Vec::new()
    };
    let dialect = conn.dialect();

    let mut operations = Vec::new();
    if !missing.is_empty() {
        operations.push(MigrationOperation::AddColumns {
            table: table.clone(),
            columns: missing.iter().map(|m| m.field.name.clone()).collect(),
            statements: dialect.add_columns(&table, &missing),
        });
    }
    if !keys_match(&plan, &keys, &foreign_keys, compare_foreign_keys) {
        debug!(table = %table, "Keys differ from the declaration");
        let reset = dialect.drop_keys(&table, &keys, &foreign_keys);
        if !reset.is_empty() {
            operations.push(MigrationOperation::ResetKeys {
                table: table.clone(),
                statements: reset,
            });
        }
        let rebuild = dialect.add_keys(&table, &plan);
        if !rebuild.is_empty() {
            operations.push(MigrationOperation::RebuildKeys {
                table: table.clone(),
                statements: rebuild,
            });
        }
    }

    let outcome = if !missing.is_empty() {
        MigrationOutcome::Altered
    } else if operations.is_empty() {
        MigrationOutcome::UpToDate
    } else {
        MigrationOutcome::IndexesRebuilt
    };
    Ok(MigrationPlan {
        table,
        outcome,
        operations,
    })
}

/// Declared fields absent from `live`, each anchored after its declared
/// predecessor. The first field follows `id`, or leads the table when
/// there is no `id`.
pub fn missing_columns<'a>(
    definition: &'a TableDefinition,
    live: &[ColumnInfo],
) -> Vec<MissingColumn<'a>> {
    let existing: HashSet<String> = live.iter().map(|c| c.name.to_lowercase()).collect();
    let mut anchor = if definition.has_auto_id() {
        ColumnAnchor::After(String::from("id"))
    } else {
        ColumnAnchor::First
    };
    let mut missing = Vec::new();
    for field in &definition.fields {
        if !existing.contains(&field.name.to_lowercase()) {
            missing.push(MissingColumn {
                field,
                anchor: anchor.clone(),
            });
        }
        anchor = ColumnAnchor::After(field.name.clone());
    }
    missing
}

/// Compares declared keys with live ones, ignoring names and order.
fn keys_match(
    plan: &KeyPlan,
    keys: &[IndexInfo],
    foreign_keys: &[ForeignKeyInfo],
    compare_foreign_keys: bool,
) -> bool {
    let mut declared: Vec<(bool, &[String])> = plan
        .keys
        .iter()
        .map(|k| (k.unique, k.columns.as_slice()))
        .collect();
    let mut live: Vec<(bool, &[String])> =
        keys.iter().map(|k| (k.unique, k.columns.as_slice())).collect();
    declared.sort_unstable();
    live.sort_unstable();
    if declared != live {
        return false;
    }
    if !compare_foreign_keys {
        return true;
    }

    let mut declared: Vec<(&str, &str, &str)> = plan
        .foreign_keys
        .iter()
        .map(|fk| (fk.column.as_str(), fk.references.as_str(), fk.on_delete.as_sql()))
        .collect();
    let mut live: Vec<(&str, &str, &str)> = foreign_keys
        .iter()
        .map(|fk| (fk.column.as_str(), fk.references.as_str(), fk.on_delete.as_sql()))
        .collect();
    declared.sort_unstable();
    live.sort_unstable();
    declared == live
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_sql_core::schema::{ForeignKeyAction, IndexDescriptor};
    use oxide_sql_core::FieldDescriptor;
    use oxide_sql_sqlx::SqliteGateway;

    fn widget() -> TableDefinition {
        TableDefinition::new("Widget")
            .field(FieldDescriptor::text("name").max_length(32))
            .field(FieldDescriptor::integer("price").min(0).max(100_000))
            .unique(IndexDescriptor::new(["name"]))
    }

    fn column(name: &str) -> ColumnInfo {
        ColumnInfo {
            name: String::from(name),
            sql_type: String::from("INTEGER"),
            nullable: false,
        }
    }

    #[test]
    fn test_missing_columns_track_predecessor() {
        let table = widget().field(FieldDescriptor::text("sku").nullable());
        let live = [column("id"), column("name"), column("added"), column("updated")];
        let missing = missing_columns(&table, &live);
        let found: Vec<(&str, &ColumnAnchor)> = missing
            .iter()
            .map(|m| (m.field.name.as_str(), &m.anchor))
            .collect();
        assert_eq!(
            found,
            vec![
                ("price", &ColumnAnchor::After(String::from("name"))),
                ("sku", &ColumnAnchor::After(String::from("price"))),
            ]
        );
    }

    #[test]
    fn test_first_field_anchors() {
        let table = widget();
        let missing = missing_columns(&table, &[column("id")]);
        assert_eq!(missing[0].anchor, ColumnAnchor::After(String::from("id")));

        let relation = TableDefinition::relation(
            "User",
            oxide_sql_core::schema::IntWidth::Regular,
            "Group",
            oxide_sql_core::schema::IntWidth::Regular,
            "groups",
            Vec::new(),
        );
        let missing = missing_columns(&relation, &[column("group")]);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].anchor, ColumnAnchor::First);
    }

    #[test]
    fn test_keys_match_ignores_names_and_order() {
        let table = TableDefinition::new("Doc")
            .field(FieldDescriptor::text("slug").max_length(64))
            .field(FieldDescriptor::reference("owner", "User"))
            .unique(IndexDescriptor::named("slug", ["slug"]));
        let plan = table.key_plan(&TableNames::new(""));
        let keys = vec![
            IndexInfo {
                name: String::from("owner"),
                unique: false,
                columns: vec![String::from("owner")],
            },
            IndexInfo {
                name: String::from("whatever"),
                unique: true,
                columns: vec![String::from("slug")],
            },
        ];
        let fks = vec![ForeignKeyInfo {
            name: Some(String::from("Doc-owner")),
            column: String::from("owner"),
            references: String::from("User"),
            on_delete: ForeignKeyAction::Restrict,
        }];
        assert!(keys_match(&plan, &keys, &fks, true));
        assert!(keys_match(&plan, &keys, &[], false));
        assert!(!keys_match(&plan, &keys, &[], true));
        assert!(!keys_match(&plan, &keys[..1], &fks, true));
    }

    #[tokio::test]
    async fn test_detect_missing_table() {
        let mut db = SqliteGateway::in_memory().await.unwrap();
        let plan = detect(&mut db, &TableNames::new("app_"), &widget())
            .await
            .unwrap();
        assert_eq!(plan.table, "app_Widget");
        assert_eq!(plan.outcome, MigrationOutcome::Created);
        let statements: Vec<&str> = plan.statements().collect();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE \"app_Widget\""));
        assert_eq!(
            statements[1],
            "CREATE UNIQUE INDEX \"app_Widget:name\" ON \"app_Widget\" (\"name\")"
        );
    }

    #[tokio::test]
    async fn test_detect_rejects_invalid_definition() {
        let mut db = SqliteGateway::in_memory().await.unwrap();
        let table = widget().unique(IndexDescriptor::new(["nope"]));
        let err = detect(&mut db, &TableNames::default(), &table)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::MigrateError::Schema(_)));
    }
}
