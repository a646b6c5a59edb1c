//! SQLite dialect.
//!
//! SQLite cannot add constraints to an existing table, so foreign keys are
//! declared inline when the table is created and columns added later carry
//! no `REFERENCES` clause.

use super::{join_columns, Dialect, MissingColumn};
use crate::gateway::{ForeignKeyInfo, IndexInfo};
use crate::schema::{FieldDescriptor, FieldKind, KeyPlan, PrimaryKey, TableDefinition};
use crate::value::SqlValue;

/// SQLite dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Literal stored in existing rows when a NOT NULL column is added.
    fn fill_value(&self, field: &FieldDescriptor) -> String {
        if let Some(default) = field.default.as_ref().filter(|d| !d.is_null()) {
            if let Ok(literal) = self.escape_literal(default) {
                return literal;
            }
        }
        let zero = match field.kind {
            FieldKind::Reference { .. } | FieldKind::Integer { .. } | FieldKind::Boolean => {
                SqlValue::Int(0)
            }
            FieldKind::Float { .. } => SqlValue::Float(0.0),
            FieldKind::Binary { .. } => SqlValue::Blob(Vec::new()),
            FieldKind::Timestamp | FieldKind::DateTime => {
                SqlValue::Text(String::from("1970-01-01 00:00:00"))
            }
            FieldKind::Json => SqlValue::Text(String::from("null")),
            FieldKind::Text { .. } | FieldKind::Xml { .. } => SqlValue::Text(String::new()),
        };
        self.escape_literal(&zero).unwrap_or_else(|_| String::from("0"))
    }

    fn index_name(table: &str, key_name: Option<&str>, unique: bool, columns: &[String]) -> String {
        match key_name {
            Some(name) => format!("{table}:{name}"),
            None if unique => format!("{table}:{}", columns.join("-")),
            None => format!("{table}:ref:{}", columns.join("-")),
        }
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn identifier_quote(&self) -> char {
        '"'
    }

    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    fn column_type(&self, field: &FieldDescriptor) -> String {
        String::from(match field.kind {
            FieldKind::Reference { .. } | FieldKind::Integer { .. } | FieldKind::Boolean => {
                "INTEGER"
            }
            FieldKind::Float { .. } => "REAL",
            FieldKind::Binary { .. } => "BLOB",
            FieldKind::Text { .. }
            | FieldKind::Xml { .. }
            | FieldKind::Timestamp
            | FieldKind::DateTime
            | FieldKind::Json => "TEXT",
        })
    }

    fn create_table(
        &self,
        table: &str,
        definition: &TableDefinition,
        plan: &KeyPlan,
    ) -> Vec<String> {
        let mut columns = Vec::with_capacity(definition.fields.len() + 4);
        if definition.has_auto_id() {
            columns.push(format!(
                "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                self.quote_identifier("id")
            ));
        }
        for field in &definition.fields {
            let mut column = self.column_definition(field);
            if let Some(fk) = plan.foreign_key_for(&field.name) {
                column.push_str(&format!(
                    " REFERENCES {} ({}) ON DELETE {} ON UPDATE CASCADE",
                    self.quote_identifier(&fk.references),
                    self.quote_identifier("id"),
                    fk.on_delete.as_sql()
                ));
            }
            columns.push(column);
        }
        if definition.timestamps {
            for name in ["added", "updated"] {
                columns.push(format!(
                    "{} TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP",
                    self.quote_identifier(name)
                ));
            }
        }
        if let PrimaryKey::Composite(keys) = &definition.primary_key {
            columns.push(format!("PRIMARY KEY ({})", join_columns(self, keys)));
        }
        vec![format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(table),
            columns.join(", ")
        )]
    }

    fn add_columns(&self, table: &str, columns: &[MissingColumn<'_>]) -> Vec<String> {
        columns
            .iter()
            .map(|missing| {
                let mut sql = format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    self.quote_identifier(table),
                    self.column_definition(missing.field)
                );
                if !missing.field.nullable {
                    sql.push_str(" DEFAULT ");
                    sql.push_str(&self.fill_value(missing.field));
                }
                sql
            })
            .collect()
    }

    fn drop_keys(
        &self,
        _table: &str,
        keys: &[IndexInfo],
        _foreign_keys: &[ForeignKeyInfo],
    ) -> Vec<String> {
        keys.iter()
            .map(|key| format!("DROP INDEX {}", self.quote_identifier(&key.name)))
            .collect()
    }

    fn add_keys(&self, table: &str, plan: &KeyPlan) -> Vec<String> {
        plan.keys
            .iter()
            .map(|key| {
                let name = Self::index_name(table, key.name.as_deref(), key.unique, &key.columns);
                format!(
                    "CREATE {}INDEX {} ON {} ({})",
                    if key.unique { "UNIQUE " } else { "" },
                    self.quote_identifier(&name),
                    self.quote_identifier(table),
                    join_columns(self, &key.columns)
                )
            })
            .collect()
    }

    fn supports_add_constraint(&self) -> bool {
        false
    }

    fn insert_default_values(&self) -> &'static str {
        "DEFAULT VALUES"
    }

    fn touches_updated_column(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::ColumnAnchor;
    use crate::schema::IndexDescriptor;
    use crate::template::TableNames;

    #[test]
    fn test_storage_classes() {
        let d = SqliteDialect;
        assert_eq!(d.column_type(&FieldDescriptor::integer("i")), "INTEGER");
        assert_eq!(d.column_type(&FieldDescriptor::boolean("b")), "INTEGER");
        assert_eq!(d.column_type(&FieldDescriptor::reference("r", "T")), "INTEGER");
        assert_eq!(d.column_type(&FieldDescriptor::float("f")), "REAL");
        assert_eq!(d.column_type(&FieldDescriptor::binary("h", 4)), "BLOB");
        assert_eq!(d.column_type(&FieldDescriptor::json("j")), "TEXT");
        assert_eq!(d.column_type(&FieldDescriptor::timestamp("t")), "TEXT");
    }

    #[test]
    fn test_create_table_inlines_foreign_keys() {
        let table = TableDefinition::new("Doc")
            .field(FieldDescriptor::text("title"))
            .field(FieldDescriptor::reference("owner", "User").nullable());
        let plan = table.key_plan(&TableNames::new("p_"));
        let sql = SqliteDialect.create_table("p_Doc", &table, &plan);
        assert_eq!(
            sql,
            vec![String::from(
                "CREATE TABLE \"p_Doc\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
                 \"title\" TEXT NOT NULL, \
                 \"owner\" INTEGER REFERENCES \"p_User\" (\"id\") ON DELETE SET NULL ON UPDATE CASCADE, \
                 \"added\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                 \"updated\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)"
            )]
        );
    }

    #[test]
    fn test_add_columns_fills_not_null() {
        let sku = FieldDescriptor::text("sku").max_length(16);
        let qty = FieldDescriptor::integer("qty").default_value(5);
        let note = FieldDescriptor::text("note").nullable();
        let sql = SqliteDialect.add_columns(
            "w",
            &[
                MissingColumn {
                    field: &sku,
                    anchor: ColumnAnchor::After(String::from("price")),
                },
                MissingColumn {
                    field: &qty,
                    anchor: ColumnAnchor::After(String::from("sku")),
                },
                MissingColumn {
                    field: &note,
                    anchor: ColumnAnchor::After(String::from("qty")),
                },
            ],
        );
        assert_eq!(
            sql,
            vec![
                String::from("ALTER TABLE \"w\" ADD COLUMN \"sku\" TEXT NOT NULL DEFAULT ''"),
                String::from("ALTER TABLE \"w\" ADD COLUMN \"qty\" INTEGER NOT NULL DEFAULT 5"),
                String::from("ALTER TABLE \"w\" ADD COLUMN \"note\" TEXT"),
            ]
        );
    }

    #[test]
    fn test_keys_are_separate_statements() {
        let table = TableDefinition::new("Doc")
            .field(FieldDescriptor::text("slug"))
            .field(FieldDescriptor::reference("owner", "User"))
            .unique(IndexDescriptor::new(["slug"]));
        let plan = table.key_plan(&TableNames::new(""));
        assert_eq!(
            SqliteDialect.add_keys("Doc", &plan),
            vec![
                String::from("CREATE UNIQUE INDEX \"Doc:slug\" ON \"Doc\" (\"slug\")"),
                String::from("CREATE INDEX \"Doc:ref:owner\" ON \"Doc\" (\"owner\")"),
            ]
        );
        let existing = [IndexInfo {
            name: String::from("Doc:slug"),
            unique: true,
            columns: vec![String::from("slug")],
        }];
        assert_eq!(
            SqliteDialect.drop_keys("Doc", &existing, &[]),
            vec![String::from("DROP INDEX \"Doc:slug\"")]
        );
    }
}
