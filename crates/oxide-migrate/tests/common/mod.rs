#![allow(dead_code)]

use std::collections::HashMap;

use oxide_sql_core::gateway::{ColumnInfo, ExecResult, ForeignKeyInfo, IndexInfo};
use oxide_sql_core::schema::ForeignKeyAction;
use oxide_sql_core::{Connection, Dialect, DriverError, MySqlDialect, Row};

/// A MySQL-speaking connection that serves canned introspection results
/// and records every statement it is asked to execute.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    dialect: MySqlDialect,
    pub columns: HashMap<String, Vec<ColumnInfo>>,
    pub keys: HashMap<String, Vec<IndexInfo>>,
    pub foreign_keys: HashMap<String, Vec<ForeignKeyInfo>>,
    pub executed: Vec<String>,
}

impl RecordingConnection {
    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.columns.insert(
            String::from(table),
            columns
                .iter()
                .map(|name| ColumnInfo {
                    name: String::from(*name),
                    sql_type: String::from("int"),
                    nullable: false,
                })
                .collect(),
        );
        self
    }

    pub fn with_key(mut self, table: &str, name: &str, unique: bool, columns: &[&str]) -> Self {
        self.keys.entry(String::from(table)).or_default().push(IndexInfo {
            name: String::from(name),
            unique,
            columns: columns.iter().map(|c| String::from(*c)).collect(),
        });
        self
    }

    pub fn with_foreign_key(
        mut self,
        table: &str,
        name: &str,
        column: &str,
        references: &str,
        on_delete: ForeignKeyAction,
    ) -> Self {
        self.foreign_keys
            .entry(String::from(table))
            .or_default()
            .push(ForeignKeyInfo {
                name: Some(String::from(name)),
                column: String::from(column),
                references: String::from(references),
                on_delete,
            });
        self
    }
}

impl Connection for RecordingConnection {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError> {
        self.executed.push(String::from(sql));
        Ok(ExecResult::default())
    }

    async fn fetch_all(&mut self, _sql: &str) -> Result<Vec<Row>, DriverError> {
        Ok(Vec::new())
    }

    async fn describe(&mut self, table: &str) -> Result<Option<Vec<ColumnInfo>>, DriverError> {
        Ok(self.columns.get(table).cloned())
    }

    async fn keys(&mut self, table: &str) -> Result<Vec<IndexInfo>, DriverError> {
        Ok(self.keys.get(table).cloned().unwrap_or_default())
    }

    async fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>, DriverError> {
        Ok(self.foreign_keys.get(table).cloned().unwrap_or_default())
    }

    fn insert_id(&self) -> Option<u64> {
        None
    }
}
