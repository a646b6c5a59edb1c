//! The entity store.
//!
//! A [`Store`] owns one connection, the table names of one install and the
//! registry of entity types. Every statement an entity issues goes through
//! it: when the backend reports a missing table or column, the store
//! converges the tables involved once and retries the statement once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use oxide_migrate::{MigrationExecutor, MigrationReport};
use oxide_sql_core::schema::IntWidth;
use oxide_sql_core::{
    Connection, Dialect, ExecResult, FieldDescriptor, Row, SqlValue, TableDefinition, TableNames,
};
use tracing::{debug, debug_span, warn, Instrument};

use crate::entity::{Entity, Key};
use crate::entity_type::EntityType;
use crate::error::{OrmError, Result};
use crate::permission::{Actor, Anonymous};

/// One connection plus everything needed to persist entities through it.
pub struct Store<C: Connection> {
    conn: C,
    names: TableNames,
    types: HashMap<String, Arc<EntityType>>,
    actor: Arc<dyn Actor>,
    pub(crate) settings: Option<HashMap<String, String>>,
}

impl<C: Connection> std::fmt::Debug for Store<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("dialect", &self.conn.dialect().name())
            .field("names", &self.names)
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Store<C> {
    /// Wraps a connection. The store acts for [`Anonymous`] until told
    /// otherwise.
    #[must_use]
    pub fn new(conn: C, names: TableNames) -> Self {
        Self {
            conn,
            names,
            types: HashMap::new(),
            actor: Arc::new(Anonymous),
            settings: None,
        }
    }

    /// Sets the actor permission gates check against.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Actor + 'static) -> Self {
        self.actor = Arc::new(actor);
        self
    }

    /// Replaces the current actor.
    pub fn set_actor(&mut self, actor: Arc<dyn Actor>) {
        self.actor = actor;
    }

    /// The current actor.
    #[must_use]
    pub fn actor(&self) -> &dyn Actor {
        self.actor.as_ref()
    }

    /// Table names of this install.
    #[must_use]
    pub const fn names(&self) -> &TableNames {
        &self.names
    }

    /// Dialect of the connection.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.conn.dialect()
    }

    /// The underlying connection.
    pub fn connection(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Gives the connection back.
    #[must_use]
    pub fn into_inner(self) -> C {
        self.conn
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Registers an entity type under its name.
    ///
    /// # Errors
    ///
    /// Fails when a different type is already registered under that name.
    pub fn register(&mut self, ty: Arc<EntityType>) -> Result<()> {
        if let Some(existing) = self.types.get(ty.name()) {
            if Arc::ptr_eq(existing, &ty) {
                return Ok(());
            }
            return Err(OrmError::Configuration(format!(
                "entity type {} is already registered",
                ty.name()
            )));
        }
        debug!(entity = %ty.name(), "Registered entity type");
        self.types.insert(String::from(ty.name()), ty);
        Ok(())
    }

    /// A registered type.
    ///
    /// # Errors
    ///
    /// Fails when no type is registered under `name`.
    pub fn entity_type(&self, name: &str) -> Result<Arc<EntityType>> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| OrmError::Configuration(format!("unknown entity type {name}")))
    }

    /// A fresh instance of a registered type.
    ///
    /// # Errors
    ///
    /// Fails when no type is registered under `type_name`.
    pub fn create(&self, type_name: &str) -> Result<Entity> {
        Ok(Entity::new(self.entity_type(type_name)?))
    }

    /// Opens an instance of a registered type; `None` on a miss unless
    /// `throw` is set.
    ///
    /// # Errors
    ///
    /// See [`Entity::open`].
    pub async fn open(
        &mut self,
        type_name: &str,
        key: impl Into<Key>,
        throw: bool,
    ) -> Result<Option<Entity>> {
        let mut entity = self.create(type_name)?;
        Ok(entity.open(self, key, throw).await?.then_some(entity))
    }

    /// Tables an entity type needs, referenced types first, then the type,
    /// then its companions.
    #[must_use]
    pub fn plan_for(&self, ty: &EntityType) -> Vec<TableDefinition> {
        let mut seen = HashSet::new();
        let mut plan = Vec::new();
        self.collect_plan(ty, &mut seen, &mut plan);
        plan
    }

    fn collect_plan(
        &self,
        ty: &EntityType,
        seen: &mut HashSet<String>,
        plan: &mut Vec<TableDefinition>,
    ) {
        if !seen.insert(String::from(ty.name())) {
            return;
        }
        for target in ty.targets() {
            match self.types.get(target) {
                Some(target) => self.collect_plan(target, seen, plan),
                None => debug!(entity = %ty.name(), target, "Reference to unregistered type"),
            }
        }
        plan.push(ty.table_definition(|target| self.types.get(target).map(|t| t.id_width())));
        plan.extend(ty.companions().iter().cloned());
    }

    // =========================================================================
    // Migrations
    // =========================================================================

    /// Converges a set of tables, referenced ones first.
    ///
    /// # Errors
    ///
    /// Fails on an invalid definition or a rejected statement.
    pub async fn converge(&mut self, tables: &[TableDefinition]) -> Result<Vec<MigrationReport>> {
        let executor = MigrationExecutor::new(self.names.clone());
        Ok(executor.migrate_all(&mut self.conn, tables).await?)
    }

    /// Converges one table.
    ///
    /// # Errors
    ///
    /// Fails on an invalid definition or a rejected statement.
    pub async fn create_table(&mut self, table: &TableDefinition) -> Result<MigrationReport> {
        let executor = MigrationExecutor::new(self.names.clone());
        Ok(executor.migrate(&mut self.conn, table).await?)
    }

    /// Converges the junction table `<left>-<name>` between two types,
    /// with `extra` fields per link. Id widths come from the registry.
    ///
    /// # Errors
    ///
    /// Fails on an invalid definition or a rejected statement.
    pub async fn create_rel_table(
        &mut self,
        left: &str,
        right: &str,
        name: &str,
        extra: Vec<FieldDescriptor>,
    ) -> Result<MigrationReport> {
        let width = |ty: &str| {
            self.types
                .get(ty)
                .map_or(IntWidth::Regular, |t| t.id_width())
        };
        let relation = TableDefinition::relation(left, width(left), right, width(right), name, extra);
        self.create_table(&relation).await
    }

    /// Converges every table a registered type needs.
    ///
    /// # Errors
    ///
    /// Fails for an unknown type or a rejected statement.
    pub async fn migrate_type(&mut self, type_name: &str) -> Result<Vec<MigrationReport>> {
        let ty = self.entity_type(type_name)?;
        let plan = self.plan_for(&ty);
        self.converge(&plan).await
    }

    // =========================================================================
    // Recovering execution
    // =========================================================================

    /// Runs a query; on a missing table or column, converges `tables` and
    /// retries once.
    pub(crate) async fn fetch_recovering(
        &mut self,
        tables: &[TableDefinition],
        sql: &str,
    ) -> Result<Vec<Row>> {
        match self.conn.fetch_all(sql).await {
            Err(e) if e.is_schema_mismatch() => {
                warn!(error = %e, "Schema mismatch, migrating and retrying");
                self.converge(tables).await?;
                Ok(self.conn.fetch_all(sql).await?)
            }
            other => Ok(other?),
        }
    }

    /// Executes a statement; on a missing table or column, converges
    /// `tables` and retries once.
    pub(crate) async fn execute_recovering(
        &mut self,
        tables: &[TableDefinition],
        sql: &str,
    ) -> Result<ExecResult> {
        match self.conn.execute(sql).await {
            Err(e) if e.is_schema_mismatch() => {
                warn!(error = %e, "Schema mismatch, migrating and retrying");
                self.converge(tables).await?;
                Ok(self.conn.execute(sql).await?)
            }
            other => Ok(other?),
        }
    }

    pub(crate) async fn fetch_for(&mut self, ty: &EntityType, sql: &str) -> Result<Vec<Row>> {
        let plan = self.plan_for(ty);
        self.fetch_recovering(&plan, sql)
            .instrument(debug_span!("entity", entity = %ty.name()))
            .await
    }

    pub(crate) async fn execute_for(&mut self, ty: &EntityType, sql: &str) -> Result<ExecResult> {
        let plan = self.plan_for(ty);
        self.execute_recovering(&plan, sql)
            .instrument(debug_span!("entity", entity = %ty.name()))
            .await
    }

    // =========================================================================
    // Raw access
    // =========================================================================

    /// Renders a query template for this install.
    ///
    /// # Errors
    ///
    /// Fails on a malformed template or a parameter count mismatch.
    pub fn render(&self, template: &str, params: &[SqlValue]) -> Result<String> {
        Ok(self.names.render(self.conn.dialect(), template, params)?)
    }

    /// Renders and runs a row-returning template.
    ///
    /// # Errors
    ///
    /// Fails on a bad template or a backend error. No migration is
    /// attempted.
    pub async fn query(&mut self, template: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let sql = self.render(template, params)?;
        Ok(self.conn.fetch_all(&sql).await?)
    }

    /// Renders and runs a statement.
    ///
    /// # Errors
    ///
    /// Fails on a bad template or a backend error. No migration is
    /// attempted.
    pub async fn execute(&mut self, template: &str, params: &[SqlValue]) -> Result<ExecResult> {
        let sql = self.render(template, params)?;
        Ok(self.conn.execute(&sql).await?)
    }

    /// A value as a literal of this dialect.
    ///
    /// # Errors
    ///
    /// Fails for non-finite floats.
    pub fn escape(&self, value: &SqlValue) -> Result<String> {
        Ok(self.conn.dialect().escape_literal(value)?)
    }

    /// A quoted identifier.
    #[must_use]
    pub fn escape_field(&self, name: &str) -> String {
        self.conn.dialect().quote_identifier(name)
    }

    /// The quoted physical name of a logical table.
    #[must_use]
    pub fn table_name(&self, logical: &str) -> String {
        self.escape_field(&self.names.physical(logical))
    }

    /// Id generated by the most recent insert.
    #[must_use]
    pub fn insert_id(&self) -> Option<u64> {
        self.conn.insert_id()
    }

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Fails when the backend refuses.
    pub async fn begin(&mut self) -> Result<()> {
        Ok(self.conn.begin().await?)
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Fails when the backend refuses.
    pub async fn commit(&mut self) -> Result<()> {
        Ok(self.conn.commit().await?)
    }

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Fails when the backend refuses.
    pub async fn rollback(&mut self) -> Result<()> {
        Ok(self.conn.rollback().await?)
    }
}
