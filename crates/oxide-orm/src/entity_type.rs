//! Entity type descriptors.
//!
//! An [`EntityType`] is built once and shared through an `Arc`: the field
//! list, unique groups, primary-key width, override accessors, the
//! permission gate and any companion tables created along with it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use oxide_sql_core::schema::{IndexDescriptor, IntWidth};
use oxide_sql_core::{FieldDescriptor, FieldKind, TableDefinition};

use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::fields;
use crate::permission::{AllowAll, OwnerGate, PermissionGate};
use crate::value::Value;

/// Override getter.
pub type Getter = fn(&Entity) -> Result<Value>;
/// Override setter.
pub type Setter = fn(&mut Entity, Value) -> Result<()>;
/// Override unsetter.
pub type Unsetter = fn(&mut Entity) -> Result<()>;

/// Per-field overrides consulted before the generic typed access.
///
/// An accessor may also name a property with no column behind it, which
/// makes it a computed property.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accessor {
    /// Replaces the generic getter.
    pub get: Option<Getter>,
    /// Replaces the generic setter.
    pub set: Option<Setter>,
    /// Replaces the generic unset.
    pub unset: Option<Unsetter>,
}

impl Accessor {
    /// Getter only.
    #[must_use]
    pub const fn getter(get: Getter) -> Self {
        Self {
            get: Some(get),
            set: None,
            unset: None,
        }
    }

    /// Setter only.
    #[must_use]
    pub const fn setter(set: Setter) -> Self {
        Self {
            get: None,
            set: Some(set),
            unset: None,
        }
    }

    /// Adds an unsetter.
    #[must_use]
    pub const fn with_unset(mut self, unset: Unsetter) -> Self {
        self.unset = Some(unset);
        self
    }

    fn overlay(self, base: Self) -> Self {
        Self {
            get: self.get.or(base.get),
            set: self.set.or(base.set),
            unset: self.unset.or(base.unset),
        }
    }
}

/// A persistent entity type.
#[derive(Clone)]
pub struct EntityType {
    name: String,
    fields: Vec<FieldDescriptor>,
    unique: Vec<IndexDescriptor>,
    id_width: IntWidth,
    accessors: HashMap<String, Accessor>,
    gate: Arc<dyn PermissionGate>,
    companions: Vec<TableDefinition>,
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("unique", &self.unique)
            .field("id_width", &self.id_width)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl EntityType {
    /// Starts a new type.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    /// Fully qualified type name, also the logical table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, ancestors first.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// A declared field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a declared field.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Unique groups.
    #[must_use]
    pub fn unique(&self) -> &[IndexDescriptor] {
        &self.unique
    }

    /// Primary-key width.
    #[must_use]
    pub const fn id_width(&self) -> IntWidth {
        self.id_width
    }

    /// Override accessor for a property.
    #[must_use]
    pub fn accessor(&self, name: &str) -> Option<&Accessor> {
        self.accessors.get(name)
    }

    /// The permission gate.
    #[must_use]
    pub fn gate(&self) -> &dyn PermissionGate {
        self.gate.as_ref()
    }

    /// Tables created together with this type's table.
    #[must_use]
    pub fn companions(&self) -> &[TableDefinition] {
        &self.companions
    }

    /// Types referenced by this type's fields.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(FieldDescriptor::target)
    }

    /// The table backing this type. `target_width` supplies the id width
    /// of referenced types that are known.
    #[must_use]
    pub fn table_definition(
        &self,
        target_width: impl Fn(&str) -> Option<IntWidth>,
    ) -> TableDefinition {
        let mut table = TableDefinition::new(&self.name).id_bytes(self.id_width.bytes());
        for field in &self.fields {
            let width = field.target().and_then(&target_width);
            table = table.field(match width {
                Some(width) => field.clone().id_width(width),
                None => field.clone(),
            });
        }
        for group in &self.unique {
            table = table.unique(group.clone());
        }
        table
    }
}

/// Builder for [`EntityType`].
#[derive(Debug)]
pub struct EntityTypeBuilder {
    name: String,
    parent: Option<Arc<EntityType>>,
    fields: Vec<FieldDescriptor>,
    unique: Vec<IndexDescriptor>,
    id_width: Option<IntWidth>,
    accessors: HashMap<String, Accessor>,
    gate: Option<Arc<dyn PermissionGate>>,
    companions: Vec<TableDefinition>,
}

impl EntityTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            unique: Vec::new(),
            id_width: None,
            accessors: HashMap::new(),
            gate: None,
            companions: Vec::new(),
        }
    }

    /// Inherits everything `parent` declares.
    ///
    /// A field declared again here replaces the inherited one in place, so
    /// column order stays the ancestor's. Unset options (gate, id width) and
    /// accessors fall back to the parent's.
    #[must_use]
    pub fn extends(mut self, parent: &Arc<EntityType>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Declares a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares several fields.
    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Declares a unique group.
    #[must_use]
    pub fn unique(mut self, index: IndexDescriptor) -> Self {
        self.unique.push(index);
        self
    }

    /// Primary-key byte budget (1, 2, 3, 4, anything else is 8).
    #[must_use]
    pub const fn id_bytes(mut self, bytes: u8) -> Self {
        self.id_width = Some(IntWidth::from_bytes(bytes));
        self
    }

    /// Registers override accessors for a property.
    #[must_use]
    pub fn accessor(mut self, name: impl Into<String>, accessor: Accessor) -> Self {
        self.accessors.insert(name.into(), accessor);
        self
    }

    /// Sets the permission gate.
    #[must_use]
    pub fn gate(mut self, gate: impl PermissionGate + 'static) -> Self {
        self.gate = Some(Arc::new(gate));
        self
    }

    /// Makes the type owned by an entity of `owner_type`: adds the
    /// [`OwnerGate`] fields and installs the gate.
    #[must_use]
    pub fn owned_by(self, owner_type: &str) -> Self {
        self.fields(OwnerGate::fields(owner_type)).gate(OwnerGate)
    }

    /// Adds a table created and migrated along with this type's table.
    #[must_use]
    pub fn companion(mut self, table: TableDefinition) -> Self {
        self.companions.push(table);
        self
    }

    /// Finishes the type.
    ///
    /// # Errors
    ///
    /// Fails with [`OrmError::Configuration`] for an empty name or a
    /// default that does not fit its field, and with
    /// [`OrmError::Schema`] for an inconsistent table.
    pub fn build(self) -> Result<Arc<EntityType>> {
        if self.name.trim().is_empty() {
            return Err(OrmError::Configuration(String::from(
                "entity type name must not be empty",
            )));
        }
        let (mut fields, mut unique, mut accessors, mut companions, inherited_gate, inherited_width) =
            match &self.parent {
                Some(parent) => (
                    parent.fields.clone(),
                    parent.unique.clone(),
                    parent.accessors.clone(),
                    parent.companions.clone(),
                    Some(Arc::clone(&parent.gate)),
                    Some(parent.id_width),
                ),
                None => Default::default(),
            };

        let inherited = fields.len();
        for field in self.fields {
            match fields[..inherited].iter_mut().find(|f| f.name == field.name) {
                Some(slot) => *slot = field,
                None => fields.push(field),
            }
        }
        for group in self.unique {
            if !unique.contains(&group) {
                unique.push(group);
            }
        }
        for (name, accessor) in self.accessors {
            let merged = match accessors.get(&name) {
                Some(base) => accessor.overlay(*base),
                None => accessor,
            };
            accessors.insert(name, merged);
        }
        companions.extend(self.companions);

        let ty = EntityType {
            name: self.name,
            fields,
            unique,
            id_width: self.id_width.or(inherited_width).unwrap_or(IntWidth::Regular),
            accessors,
            gate: self
                .gate
                .or(inherited_gate)
                .unwrap_or_else(|| Arc::new(AllowAll)),
            companions,
        };
        ty.table_definition(|_| None).validate()?;
        for field in &ty.fields {
            if let Some(default) = &field.default {
                let decoded = fields::decode(field, default);
                let usable = match (decoded, &field.kind) {
                    (Ok(Value::Null), _) | (Err(_), _) => false,
                    (Ok(_), FieldKind::Reference { .. }) => true,
                    (Ok(value), _) => fields::coerce(field, value).is_ok(),
                };
                if !usable {
                    return Err(OrmError::Configuration(format!(
                        "default of {}.{} does not fit the field",
                        ty.name, field.name
                    )));
                }
            }
        }
        Ok(Arc::new(ty))
    }
}
