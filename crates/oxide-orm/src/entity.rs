//! Entity instances.
//!
//! An [`Entity`] is one row of an [`EntityType`], held in memory. It starts
//! unsaved with every field at its default, binds to a row through
//! [`Entity::open`] or [`Entity::save`], and goes back to unsaved after
//! [`Entity::delete`].
//!
//! References are loaded lazily: opening a row only records the referenced
//! id, and the first [`Entity::get`] of the field opens the target and
//! caches it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use oxide_sql_core::{
    Connection, Delete, DriverError, FieldDescriptor, FieldKind, Insert, Row, Select, SqlValue,
    Update,
};
use tracing::{debug, info, warn};

use crate::entity_type::EntityType;
use crate::error::{OrmError, Result, ValidationError};
use crate::fields;
use crate::permission::{Actor, Permissions};
use crate::store::Store;
use crate::value::Value;

/// How [`Entity::open`] finds its row.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// By primary key.
    Id(u64),
    /// By an `AND` of field equalities.
    Fields(Vec<(String, Value)>),
}

impl Key {
    /// A single field equality.
    #[must_use]
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Fields(vec![(name.into(), value.into())])
    }

    /// Adds a field equality.
    #[must_use]
    pub fn and(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut pairs = match self {
            Self::Id(id) => vec![(String::from("id"), Value::from(id_to_i64(id)))],
            Self::Fields(pairs) => pairs,
        };
        pairs.push((name.into(), value.into()));
        Self::Fields(pairs)
    }
}

impl From<u64> for Key {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Fields(pairs) => {
                let terms: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "[{}]", terms.join(", "))
            }
        }
    }
}

/// What [`Entity::save`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A row was inserted.
    Created,
    /// The bound row was updated.
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Saved {
    id: u64,
    added: DateTime<Utc>,
    updated: DateTime<Utc>,
}

/// One instance of an entity type.
#[derive(Debug, Clone)]
pub struct Entity {
    ty: Arc<EntityType>,
    saved: Option<Saved>,
    values: Vec<Value>,
    deferred: HashMap<usize, u64>,
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.ty.name() == other.ty.name()
            && self.saved == other.saved
            && self.values == other.values
            && self.deferred == other.deferred
    }
}

fn id_to_i64(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

fn check_name(name: &str) -> std::result::Result<(), ValidationError> {
    if name.is_empty() {
        Err(ValidationError::EmptyName)
    } else if name.starts_with('_') {
        Err(ValidationError::Reserved(String::from(name)))
    } else {
        Ok(())
    }
}

fn read_timestamp(row: &Row, column: &str) -> Result<DateTime<Utc>> {
    row.text(column)
        .as_deref()
        .and_then(fields::parse_timestamp)
        .ok_or_else(|| {
            OrmError::Driver(DriverError::Decode {
                column: String::from(column),
                message: String::from("missing or malformed timestamp"),
            })
        })
}

impl Entity {
    /// A fresh, unsaved instance with every field at its default.
    #[must_use]
    pub fn new(ty: Arc<EntityType>) -> Self {
        let mut entity = Self {
            values: vec![Value::Null; ty.fields().len()],
            ty,
            saved: None,
            deferred: HashMap::new(),
        };
        for index in 0..entity.values.len() {
            entity.reset_to_default(index);
        }
        entity
    }

    /// The entity type.
    #[must_use]
    pub const fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    /// Name of the entity type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    /// Primary key, once saved.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.saved.map(|s| s.id)
    }

    /// Whether the instance is bound to a row.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        self.saved.is_some()
    }

    /// Creation time of the row.
    #[must_use]
    pub fn added(&self) -> Option<DateTime<Utc>> {
        self.saved.map(|s| s.added)
    }

    /// Last write time of the row.
    #[must_use]
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.saved.map(|s| s.updated)
    }

    /// Stored value of a declared field, without overrides or loading.
    /// A reference that has not been loaded yet reads as null.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.ty.field_index(name).map(|index| &self.values[index])
    }

    /// Id behind a reference field, loaded or not.
    #[must_use]
    pub fn reference_id(&self, name: &str) -> Option<u64> {
        let index = self.ty.field_index(name)?;
        self.deferred
            .get(&index)
            .copied()
            .or_else(|| self.values[index].as_entity().and_then(Self::id))
    }

    /// Whether `actor` holds `permission` on this instance.
    #[must_use]
    pub fn has_permission(&self, actor: &dyn Actor, permission: Permissions) -> bool {
        self.ty.gate().has_permission(self, actor, permission)
    }

    fn check_permission(&self, actor: &dyn Actor, permission: Permissions) -> Result<()> {
        if self.has_permission(actor, permission) {
            Ok(())
        } else {
            Err(OrmError::AccessDenied {
                subject: String::from(self.type_name()),
                permission,
            })
        }
    }

    fn index_of(&self, name: &str) -> std::result::Result<usize, ValidationError> {
        self.ty
            .field_index(name)
            .ok_or_else(|| ValidationError::UnknownField {
                entity: String::from(self.type_name()),
                field: String::from(name),
            })
    }

    fn field_at(&self, index: usize) -> &FieldDescriptor {
        &self.ty.fields()[index]
    }

    fn reset_to_default(&mut self, index: usize) {
        let ty = Arc::clone(&self.ty);
        let field = &ty.fields()[index];
        self.deferred.remove(&index);
        let value = field
            .default
            .as_ref()
            .and_then(|d| fields::decode(field, d).ok())
            .unwrap_or(Value::Null);
        match (&field.kind, value) {
            (FieldKind::Reference { .. }, Value::Int(id)) => {
                if let Ok(id) = u64::try_from(id) {
                    self.deferred.insert(index, id);
                }
                self.values[index] = Value::Null;
            }
            (_, value) => self.values[index] = value,
        }
    }

    fn store_at(
        &mut self,
        index: usize,
        value: Value,
    ) -> std::result::Result<(), ValidationError> {
        let ty = Arc::clone(&self.ty);
        let field = &ty.fields()[index];
        if !value.is_null() {
            let value = fields::coerce(field, value)?;
            self.deferred.remove(&index);
            self.values[index] = value;
        } else if field.nullable {
            self.deferred.remove(&index);
            self.values[index] = Value::Null;
        } else if field.default.is_some() {
            self.reset_to_default(index);
        } else {
            return Err(ValidationError::NullNotAllowed(field.name.clone()));
        }
        Ok(())
    }

    /// Reads a property without touching the database: override getters
    /// run, unloaded references read as null.
    ///
    /// # Errors
    ///
    /// Fails for a bad or unknown name, or when an override getter fails.
    pub fn peek(&self, name: &str) -> Result<Value> {
        check_name(name)?;
        if let Some(get) = self.ty.accessor(name).and_then(|a| a.get) {
            return get(self);
        }
        Ok(self.values[self.index_of(name)?].clone())
    }

    /// Reads a property, loading a referenced entity on first access.
    ///
    /// A reference whose row is gone reads as null.
    ///
    /// # Errors
    ///
    /// Fails for a bad or unknown name, when the target type is not
    /// registered, or when loading the target fails or is denied.
    pub async fn get<C: Connection>(&mut self, store: &mut Store<C>, name: &str) -> Result<Value> {
        check_name(name)?;
        if let Some(get) = self.ty.accessor(name).and_then(|a| a.get) {
            return get(self);
        }
        let index = self.index_of(name)?;
        if let Some(id) = self.deferred.get(&index).copied() {
            let target = self.field_at(index).target().unwrap_or_default().to_owned();
            let mut referenced = store.create(&target)?;
            if referenced.open(store, Key::Id(id), false).await? {
                self.values[index] = Value::Entity(Box::new(referenced));
                self.deferred.remove(&index);
            } else {
                warn!(entity = %self.type_name(), field = %name, id, "Dangling reference");
                return Ok(Value::Null);
            }
        }
        Ok(self.values[index].clone())
    }

    /// Assigns a property through override setters and the typed setter.
    ///
    /// Null stores null on nullable fields and the default on defaulted
    /// ones.
    ///
    /// # Errors
    ///
    /// Fails for a bad, unknown or read-only name, or a value the field
    /// does not accept.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        check_name(name)?;
        if let Some(set) = self.ty.accessor(name).and_then(|a| a.set) {
            return set(self, value.into());
        }
        let index = self.index_of(name)?;
        if self.field_at(index).read_only {
            return Err(ValidationError::ReadOnly(String::from(name)).into());
        }
        Ok(self.store_at(index, value.into())?)
    }

    /// Typed assignment that skips override setters and the read-only
    /// flag. Meant for override accessors and read-only fields set by the
    /// type itself.
    ///
    /// # Errors
    ///
    /// Fails for an unknown name or a value the field does not accept.
    pub fn assign(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        check_name(name)?;
        let index = self.index_of(name)?;
        Ok(self.store_at(index, value.into())?)
    }

    /// Points a reference at a row by id, without loading it.
    ///
    /// # Errors
    ///
    /// Fails for an unknown name, a read-only field or a non-reference.
    pub fn set_reference_id(&mut self, name: &str, id: u64) -> Result<()> {
        check_name(name)?;
        let index = self.index_of(name)?;
        let field = self.field_at(index);
        if field.read_only {
            return Err(ValidationError::ReadOnly(String::from(name)).into());
        }
        if field.target().is_none() {
            return Err(ValidationError::WrongType {
                field: String::from(name),
                found: "id",
            }
            .into());
        }
        self.values[index] = Value::Null;
        self.deferred.insert(index, id);
        Ok(())
    }

    /// Clears a property to null when nullable, else restores its default.
    ///
    /// # Errors
    ///
    /// Fails for a bad, unknown or read-only name, and with
    /// [`ValidationError::CannotUnset`] when there is neither.
    pub fn unset(&mut self, name: &str) -> Result<()> {
        check_name(name)?;
        if let Some(unset) = self.ty.accessor(name).and_then(|a| a.unset) {
            return unset(self);
        }
        let index = self.index_of(name)?;
        let field = self.field_at(index);
        if field.read_only {
            return Err(ValidationError::ReadOnly(String::from(name)).into());
        }
        if field.nullable {
            self.deferred.remove(&index);
            self.values[index] = Value::Null;
        } else if field.default.is_some() {
            self.reset_to_default(index);
        } else {
            return Err(ValidationError::CannotUnset(String::from(name)).into());
        }
        Ok(())
    }

    fn stored(&self, index: usize) -> Result<SqlValue> {
        match self.deferred.get(&index) {
            Some(id) => Ok(SqlValue::Int(id_to_i64(*id))),
            None => fields::encode(self.field_at(index), &self.values[index]),
        }
    }

    fn load_row(&mut self, row: &Row) -> Result<()> {
        let id = row
            .get("id")
            .and_then(SqlValue::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| {
                OrmError::Driver(DriverError::Decode {
                    column: String::from("id"),
                    message: String::from("missing primary key"),
                })
            })?;
        let ty = Arc::clone(&self.ty);
        for (index, field) in ty.fields().iter().enumerate() {
            let raw = row.get(&field.name).unwrap_or(&SqlValue::Null);
            self.deferred.remove(&index);
            match (&field.kind, fields::decode(field, raw)?) {
                (FieldKind::Reference { .. }, Value::Int(target)) => {
                    self.values[index] = Value::Null;
                    if let Ok(target) = u64::try_from(target) {
                        self.deferred.insert(index, target);
                    }
                }
                (_, value) => self.values[index] = value,
            }
        }
        self.saved = Some(Saved {
            id,
            added: read_timestamp(row, "added")?,
            updated: read_timestamp(row, "updated")?,
        });
        Ok(())
    }

    /// Binds this unsaved instance to an existing row.
    ///
    /// Field keys are assigned through the typed setter first, so they are
    /// validated and normalised before the lookup. Returns `false` when the
    /// instance is already saved, or when no row matches and `throw` is
    /// off.
    ///
    /// # Errors
    ///
    /// [`OrmError::NotFound`] on a miss with `throw`, validation errors for
    /// field keys, [`OrmError::AccessDenied`] when the gate refuses
    /// `access` (the instance is reset), and backend failures.
    pub async fn open<C: Connection>(
        &mut self,
        store: &mut Store<C>,
        key: impl Into<Key>,
        throw: bool,
    ) -> Result<bool> {
        if self.is_saved() {
            return Ok(false);
        }
        let key = key.into();
        let ty = Arc::clone(&self.ty);
        let mut select = Select::from(store.names().physical(ty.name())).limit(1);
        match &key {
            Key::Id(id) => select = select.filter("id", *id),
            Key::Fields(pairs) if pairs.is_empty() => {
                return Err(OrmError::Configuration(format!(
                    "empty lookup key for {}",
                    ty.name()
                )))
            }
            Key::Fields(pairs) => {
                for (name, value) in pairs {
                    if name == "id" {
                        select = select.filter("id", fields::coerce_id(value)?);
                        continue;
                    }
                    self.set(name, value.clone())?;
                    let index = self.index_of(name).map_err(|_| {
                        OrmError::Configuration(format!(
                            "{}.{name} has no column to look up",
                            ty.name()
                        ))
                    })?;
                    select = select.filter(name.as_str(), self.stored(index)?);
                }
            }
        }

        let sql = select.render(store.dialect())?;
        let row = store.fetch_for(&ty, &sql).await?.into_iter().next();
        let Some(row) = row else {
            debug!(entity = %ty.name(), key = %key, "No matching row");
            if throw {
                return Err(OrmError::NotFound {
                    entity: String::from(ty.name()),
                    key: key.to_string(),
                });
            }
            return Ok(false);
        };

        self.load_row(&row)?;
        if let Err(denied) = self.check_permission(store.actor(), Permissions::ACCESS) {
            *self = Self::new(ty);
            return Err(denied);
        }
        Ok(true)
    }

    /// Writes the instance: `INSERT` when unsaved, `UPDATE` of the bound
    /// row otherwise. Referenced instances that are not saved yet are saved
    /// first. The timestamps are read back afterwards.
    ///
    /// # Errors
    ///
    /// [`OrmError::AccessDenied`] when the gate refuses `create` or
    /// `update`, [`ValidationError::NullNotAllowed`] for an empty required
    /// field, and backend failures. In-memory values stay as assigned.
    pub async fn save<C: Connection>(&mut self, store: &mut Store<C>) -> Result<SaveOutcome> {
        let (outcome, permission) = if self.is_saved() {
            (SaveOutcome::Updated, Permissions::UPDATE)
        } else {
            (SaveOutcome::Created, Permissions::CREATE)
        };
        self.check_permission(store.actor(), permission)?;
        for (index, field) in self.ty.fields().iter().enumerate() {
            if !field.nullable && self.values[index].is_null() && !self.deferred.contains_key(&index)
            {
                return Err(ValidationError::NullNotAllowed(field.name.clone()).into());
            }
        }

        for value in &mut self.values {
            if let Value::Entity(referenced) = value {
                if !referenced.is_saved() {
                    Box::pin(referenced.save(store)).await?;
                }
            }
        }

        let ty = Arc::clone(&self.ty);
        let table = store.names().physical(ty.name());
        let sql = match self.saved {
            Some(saved) => {
                let mut update = Update::table(&table);
                for (index, field) in ty.fields().iter().enumerate() {
                    update = update.set(field.name.as_str(), self.stored(index)?);
                }
                if store.dialect().touches_updated_column() {
                    update = update.set_expression("updated", "CURRENT_TIMESTAMP");
                }
                update.filter("id", saved.id).render(store.dialect())?
            }
            None => {
                let mut insert = Insert::into(&table);
                for (index, field) in ty.fields().iter().enumerate() {
                    insert = insert.value(field.name.as_str(), self.stored(index)?);
                }
                insert.render(store.dialect())?
            }
        };

        let result = store.execute_for(&ty, &sql).await?;
        let id = match self.saved {
            Some(saved) => saved.id,
            None => result
                .last_insert_id
                .or_else(|| store.insert_id())
                .ok_or_else(|| {
                    OrmError::Driver(DriverError::Decode {
                        column: String::from("id"),
                        message: format!("insert into {table} generated no id"),
                    })
                })?,
        };

        let sql = Select::from(table.as_str())
            .columns(["added", "updated"])
            .filter("id", id)
            .render(store.dialect())?;
        let row = store
            .fetch_for(&ty, &sql)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::NotFound {
                entity: String::from(ty.name()),
                key: Key::Id(id).to_string(),
            })?;
        self.saved = Some(Saved {
            id,
            added: read_timestamp(&row, "added")?,
            updated: read_timestamp(&row, "updated")?,
        });

        match outcome {
            SaveOutcome::Created => info!(entity = %ty.name(), id, "Created"),
            SaveOutcome::Updated => debug!(entity = %ty.name(), id, "Updated"),
        }
        Ok(outcome)
    }

    /// Deletes the bound row; the instance becomes unsaved and keeps its
    /// values. Returns `false` when it was not saved.
    ///
    /// # Errors
    ///
    /// [`OrmError::AccessDenied`] when the gate refuses `delete`, and
    /// backend failures.
    pub async fn delete<C: Connection>(&mut self, store: &mut Store<C>) -> Result<bool> {
        let Some(saved) = self.saved else {
            return Ok(false);
        };
        self.check_permission(store.actor(), Permissions::DELETE)?;
        let ty = Arc::clone(&self.ty);
        let sql = Delete::from(store.names().physical(ty.name()))
            .filter("id", saved.id)
            .render(store.dialect())?;
        store.execute_for(&ty, &sql).await?;
        self.saved = None;
        info!(entity = %ty.name(), id = saved.id, "Deleted");
        Ok(true)
    }
}
