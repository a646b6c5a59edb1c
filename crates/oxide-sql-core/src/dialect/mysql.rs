//! MySQL / MariaDB dialect.

use super::{join_columns, ColumnAnchor, Dialect, MissingColumn};
use crate::gateway::{ForeignKeyInfo, IndexInfo};
use crate::schema::{
    effective_range, FieldDescriptor, FieldKind, IntegerStorage, KeyPlan, PrimaryKey,
    TableDefinition,
};

const TEXT_COLLATION: &str = "CHARACTER SET utf8mb4 COLLATE utf8mb4_general_ci";

/// MySQL dialect: backtick identifiers, backslash string escapes, InnoDB
/// tables in `utf8mb4`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl MySqlDialect {
    fn text_type(max_length: Option<usize>) -> String {
        let class = match max_length {
            Some(n) if n <= 191 => format!("VARCHAR({n})"),
            Some(n) if n <= 16_383 => String::from("TEXT"),
            Some(n) if n <= 4_194_303 => String::from("MEDIUMTEXT"),
            _ => String::from("LONGTEXT"),
        };
        format!("{class} {TEXT_COLLATION}")
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn escape_string(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 8);
        for c in value.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\x1a' => out.push_str("\\Z"),
                _ => out.push(c),
            }
        }
        out
    }

    fn column_type(&self, field: &FieldDescriptor) -> String {
        match &field.kind {
            FieldKind::Reference { width, .. } => IntegerStorage::id(*width).sql(),
            FieldKind::Text { max_length } | FieldKind::Xml { max_length } => {
                Self::text_type(*max_length)
            }
            FieldKind::Binary { length } => format!("BINARY({length})"),
            FieldKind::Integer { min, max } => {
                let (lo, hi) = effective_range(*min, *max);
                IntegerStorage::for_range(lo, hi).sql()
            }
            FieldKind::Float { .. } => String::from("DOUBLE"),
            FieldKind::Timestamp => String::from("TIMESTAMP"),
            FieldKind::DateTime => String::from("DATETIME"),
            FieldKind::Boolean => String::from("BOOLEAN"),
            FieldKind::Json => String::from("JSON"),
        }
    }

    fn create_table(
        &self,
        table: &str,
        definition: &TableDefinition,
        _plan: &KeyPlan,
    ) -> Vec<String> {
        let mut columns = Vec::with_capacity(definition.fields.len() + 4);
        if let PrimaryKey::AutoId(width) = definition.primary_key {
            columns.push(format!(
                "{} {} NOT NULL AUTO_INCREMENT",
                self.quote_identifier("id"),
                IntegerStorage::id(width).sql()
            ));
        }
        columns.extend(definition.fields.iter().map(|f| self.column_definition(f)));
        if definition.timestamps {
            columns.push(format!(
                "{} TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP",
                self.quote_identifier("added")
            ));
            columns.push(format!(
                "{} TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP",
                self.quote_identifier("updated")
            ));
        }
        let primary = match &definition.primary_key {
            PrimaryKey::AutoId(_) => self.quote_identifier("id"),
            PrimaryKey::Composite(keys) => join_columns(self, keys),
        };
        columns.push(format!("PRIMARY KEY ({primary})"));
        vec![format!(
            "CREATE TABLE {} ({}) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            self.quote_identifier(table),
            columns.join(", ")
        )]
    }

    fn add_columns(&self, table: &str, columns: &[MissingColumn<'_>]) -> Vec<String> {
        if columns.is_empty() {
            return Vec::new();
        }
        let clauses: Vec<String> = columns
            .iter()
            .map(|missing| {
                let position = match &missing.anchor {
                    ColumnAnchor::First => String::from("FIRST"),
                    ColumnAnchor::After(column) => {
                        format!("AFTER {}", self.quote_identifier(column))
                    }
                };
                format!(
                    "ADD COLUMN {} {position}",
                    self.column_definition(missing.field)
                )
            })
            .collect();
        vec![format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table),
            clauses.join(", ")
        )]
    }

    fn drop_keys(
        &self,
        table: &str,
        keys: &[IndexInfo],
        foreign_keys: &[ForeignKeyInfo],
    ) -> Vec<String> {
        let clauses: Vec<String> = foreign_keys
            .iter()
            .filter_map(|fk| fk.name.as_deref())
            .map(|name| format!("DROP FOREIGN KEY {}", self.quote_identifier(name)))
            .chain(
                keys.iter()
                    .map(|key| format!("DROP KEY {}", self.quote_identifier(&key.name))),
            )
            .collect();
        if clauses.is_empty() {
            return Vec::new();
        }
        vec![format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table),
            clauses.join(", ")
        )]
    }

    fn add_keys(&self, table: &str, plan: &KeyPlan) -> Vec<String> {
        let mut clauses = Vec::with_capacity(plan.keys.len() + plan.foreign_keys.len());
        for key in &plan.keys {
            let kind = if key.unique { "UNIQUE KEY" } else { "KEY" };
            let name = key
                .name
                .as_deref()
                .map(|n| format!("{} ", self.quote_identifier(n)))
                .unwrap_or_default();
            clauses.push(format!(
                "ADD {kind} {name}({})",
                join_columns(self, &key.columns)
            ));
        }
        for fk in &plan.foreign_keys {
            clauses.push(format!(
                "ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE CASCADE",
                self.quote_identifier(&fk.name),
                self.quote_identifier(&fk.column),
                self.quote_identifier(&fk.references),
                self.quote_identifier("id"),
                fk.on_delete.as_sql()
            ));
        }
        if clauses.is_empty() {
            return Vec::new();
        }
        vec![format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table),
            clauses.join(", ")
        )]
    }

    fn supports_add_constraint(&self) -> bool {
        true
    }

    fn begin_transaction(&self) -> &'static str {
        "START TRANSACTION"
    }

    fn insert_default_values(&self) -> &'static str {
        "() VALUES ()"
    }

    fn touches_updated_column(&self) -> bool {
        false
    }
}
