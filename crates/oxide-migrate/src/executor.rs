//! Migration executor.
//!
//! This module applies detected migrations against a connection.

use std::collections::HashSet;

use oxide_sql_core::{Connection, TableDefinition, TableNames};
use tracing::{debug, info};

use crate::autodetector::{detect, MigrationPlan};
use crate::error::Result;
use crate::operations::{MigrationOutcome, MigrationReport};

/// Converges tables with their definitions.
#[derive(Debug, Clone, Default)]
pub struct MigrationExecutor {
    names: TableNames,
    dry_run: bool,
}

impl MigrationExecutor {
    /// Creates an executor resolving table names through `names`.
    #[must_use]
    pub fn new(names: TableNames) -> Self {
        Self {
            names,
            dry_run: false,
        }
    }

    /// Enables dry-run mode (SQL is logged but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the table names in use.
    #[must_use]
    pub const fn names(&self) -> &TableNames {
        &self.names
    }

    /// Plans the migration of one table without executing anything.
    ///
    /// # Errors
    ///
    /// Fails when the definition is invalid or introspection fails.
    pub async fn plan<C: Connection>(
        &self,
        conn: &mut C,
        definition: &TableDefinition,
    ) -> Result<MigrationPlan> {
        detect(conn, &self.names, definition).await
    }

    /// Converges one table.
    ///
    /// Migrating an unchanged table issues no DDL.
    ///
    /// # Errors
    ///
    /// Fails on an invalid definition or when the backend rejects a
    /// statement. Statements already executed stay applied.
    pub async fn migrate<C: Connection>(
        &self,
        conn: &mut C,
        definition: &TableDefinition,
    ) -> Result<MigrationReport> {
        let plan = self.plan(conn, definition).await?;
        if plan.outcome == MigrationOutcome::UpToDate {
            debug!(table = %plan.table, "Table is up to date");
            return Ok(plan.into());
        }

        info!(
            table = %plan.table,
            outcome = %plan.outcome,
            dry_run = self.dry_run,
            "Migrating table"
        );
        for operation in &plan.operations {
            debug!(operation = %operation, "Running operation");
            for sql in operation.statements() {
                if self.dry_run {
                    info!(sql = %sql, "Would execute");
                } else {
                    conn.execute(sql).await?;
                }
            }
        }
        Ok(plan.into())
    }

    /// Converges several tables, each after the tables it references.
    ///
    /// # Errors
    ///
    /// Stops at the first table that fails.
    pub async fn migrate_all<C: Connection>(
        &self,
        conn: &mut C,
        definitions: &[TableDefinition],
    ) -> Result<Vec<MigrationReport>> {
        let mut reports = Vec::with_capacity(definitions.len());
        for definition in dependency_order(definitions) {
            reports.push(self.migrate(conn, definition).await?);
        }
        Ok(reports)
    }
}

/// Converges one table with a default executor.
///
/// # Errors
///
/// See [`MigrationExecutor::migrate`].
pub async fn migrate<C: Connection>(
    conn: &mut C,
    names: &TableNames,
    definition: &TableDefinition,
) -> Result<MigrationReport> {
    MigrationExecutor::new(names.clone())
        .migrate(conn, definition)
        .await
}

/// Orders definitions so that referenced tables come before the tables
/// referencing them. References to tables outside the slice are ignored;
/// cycles are broken at the first table revisited.
#[must_use]
pub fn dependency_order(definitions: &[TableDefinition]) -> Vec<&TableDefinition> {
    fn visit<'a>(
        index: usize,
        definitions: &'a [TableDefinition],
        seen: &mut HashSet<usize>,
        ordered: &mut Vec<&'a TableDefinition>,
    ) {
        if !seen.insert(index) {
            return;
        }
        let definition = &definitions[index];
        for target in definition.fields.iter().filter_map(|f| f.target()) {
            if let Some(next) = definitions.iter().position(|d| d.name == target) {
                visit(next, definitions, seen, ordered);
            }
        }
        ordered.push(definition);
    }

    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(definitions.len());
    for index in 0..definitions.len() {
        visit(index, definitions, &mut seen, &mut ordered);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_sql_core::FieldDescriptor;
    use oxide_sql_sqlx::SqliteGateway;

    fn names(defs: &[&TableDefinition]) -> Vec<String> {
        defs.iter().map(|d| d.name.clone()).collect()
    }

    #[test]
    fn test_dependency_order() {
        let defs = vec![
            TableDefinition::new("Doc")
                .field(FieldDescriptor::reference("owner", "User"))
                .field(FieldDescriptor::reference("parent", "Doc").nullable()),
            TableDefinition::new("User").field(FieldDescriptor::reference("team", "Team")),
            TableDefinition::new("Team"),
        ];
        assert_eq!(names(&dependency_order(&defs)), ["Team", "User", "Doc"]);
    }

    #[test]
    fn test_dependency_order_with_cycle() {
        let defs = vec![
            TableDefinition::new("A").field(FieldDescriptor::reference("b", "B").nullable()),
            TableDefinition::new("B").field(FieldDescriptor::reference("a", "A").nullable()),
        ];
        assert_eq!(names(&dependency_order(&defs)), ["B", "A"]);
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let mut db = SqliteGateway::in_memory().await.unwrap();
        let table = TableDefinition::new("Widget").field(FieldDescriptor::text("name"));
        let executor = MigrationExecutor::new(TableNames::new("app_")).dry_run(true);
        let report = executor.migrate(&mut db, &table).await.unwrap();
        assert_eq!(report.outcome, MigrationOutcome::Created);
        assert_eq!(report.statements.len(), 1);
        assert_eq!(db.describe("app_Widget").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_migrate_all_creates_targets_first() {
        let mut db = SqliteGateway::in_memory().await.unwrap();
        let defs = vec![
            TableDefinition::new("Doc").field(FieldDescriptor::reference("owner", "User")),
            TableDefinition::new("User").field(FieldDescriptor::text("name")),
        ];
        let reports = MigrationExecutor::default()
            .migrate_all(&mut db, &defs)
            .await
            .unwrap();
        let tables: Vec<&str> = reports.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(tables, ["User", "Doc"]);
        assert!(reports.iter().all(|r| r.outcome == MigrationOutcome::Created));
    }
}
