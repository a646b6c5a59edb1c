//! Table definitions and the key layout derived from them.

use std::collections::HashSet;

use super::field::{FieldDescriptor, FieldKind};
use super::width::IntWidth;
use crate::error::SchemaError;
use crate::template::TableNames;

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignKeyAction {
    /// No action.
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses an action as printed by a backend. `NO ACTION` and a missing
    /// clause both mean `RESTRICT` on the engines we target.
    #[must_use]
    pub fn parse(sql: &str) -> Self {
        match sql.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::Restrict,
        }
    }
}

/// A unique key over an ordered list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Key name; anonymous keys are named by the backend.
    pub name: Option<String>,
    /// Ordered field names.
    pub fields: Vec<String>,
}

impl IndexDescriptor {
    /// Anonymous unique key.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Named unique key.
    #[must_use]
    pub fn named<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: Some(name.into()),
            ..Self::new(fields)
        }
    }
}

/// How a table is keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    /// Auto-incrementing unsigned `id` column of the given width.
    AutoId(IntWidth),
    /// Composite key over declared fields, as used by relation tables.
    Composite(Vec<String>),
}

/// Everything the migration engine needs to converge one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    /// Logical name, resolved through [`TableNames::physical`].
    pub name: String,
    /// Declared fields, in column order.
    pub fields: Vec<FieldDescriptor>,
    /// Unique groups, in declaration order.
    pub unique: Vec<IndexDescriptor>,
    /// Whether `added`/`updated` columns are maintained.
    pub timestamps: bool,
    /// Primary key layout.
    pub primary_key: PrimaryKey,
}

impl TableDefinition {
    /// Entity table with an `INT UNSIGNED` id and timestamps.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            unique: Vec::new(),
            timestamps: true,
            primary_key: PrimaryKey::AutoId(IntWidth::Regular),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends a unique group.
    #[must_use]
    pub fn unique(mut self, index: IndexDescriptor) -> Self {
        self.unique.push(index);
        self
    }

    /// Enables or disables the timestamp columns.
    #[must_use]
    pub const fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Sets the id width from a byte budget.
    #[must_use]
    pub fn id_bytes(mut self, bytes: u8) -> Self {
        self.primary_key = PrimaryKey::AutoId(IntWidth::from_bytes(bytes));
        self
    }

    /// Junction table `<left>-<name>` linking two entity types.
    ///
    /// Its two reference columns are named after the last path segment of
    /// each type, lower-cased; both cascade on delete and together form the
    /// primary key. `extra` fields follow them.
    #[must_use]
    pub fn relation(
        left: &str,
        left_width: IntWidth,
        right: &str,
        right_width: IntWidth,
        name: &str,
        extra: Vec<FieldDescriptor>,
    ) -> Self {
        let left_column = relation_column(left);
        let mut right_column = relation_column(right);
        if right_column == left_column {
            right_column.push('2');
        }
        let mut fields = vec![
            FieldDescriptor::reference(left_column.clone(), left)
                .cascade()
                .id_width(left_width),
            FieldDescriptor::reference(right_column.clone(), right)
                .cascade()
                .id_width(right_width),
        ];
        fields.extend(extra);
        Self {
            name: format!("{left}-{name}"),
            fields,
            unique: Vec::new(),
            timestamps: false,
            primary_key: PrimaryKey::Composite(vec![left_column, right_column]),
        }
    }

    /// Looks up a declared field.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the table has the auto-increment `id` column.
    #[must_use]
    pub const fn has_auto_id(&self) -> bool {
        matches!(self.primary_key, PrimaryKey::AutoId(_))
    }

    /// Checks every field and key group.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            field.validate()?;
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    table: self.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        let key_fields = self.unique.iter().flat_map(|group| group.fields.iter());
        let pk_fields = match &self.primary_key {
            PrimaryKey::Composite(columns) => columns.as_slice(),
            PrimaryKey::AutoId(_) => &[],
        };
        for name in key_fields.chain(pk_fields) {
            if !seen.contains(name.as_str()) {
                return Err(SchemaError::UnknownIndexField {
                    table: self.name.clone(),
                    field: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// The keys and foreign keys this table should carry.
    ///
    /// One unique key per unique group; one plain key per reference field
    /// that no unique group (or composite primary key) leads with; one
    /// foreign key per reference field, named `<table>-<field>`.
    #[must_use]
    pub fn key_plan(&self, names: &TableNames) -> KeyPlan {
        let mut keys: Vec<KeySpec> = self
            .unique
            .iter()
            .map(|group| KeySpec {
                name: group.name.clone(),
                unique: true,
                columns: group.fields.clone(),
            })
            .collect();

        let mut leading: HashSet<&str> = self
            .unique
            .iter()
            .filter_map(|group| group.fields.first().map(String::as_str))
            .collect();
        if let PrimaryKey::Composite(columns) = &self.primary_key {
            leading.extend(columns.first().map(String::as_str));
        }

        let mut foreign_keys = Vec::new();
        for field in &self.fields {
            let FieldKind::Reference {
                target, cascade, ..
            } = &field.kind
            else {
                continue;
            };
            if !leading.contains(field.name.as_str()) {
                keys.push(KeySpec {
                    name: None,
                    unique: false,
                    columns: vec![field.name.clone()],
                });
            }
            let on_delete = if *cascade {
                ForeignKeyAction::Cascade
            } else if field.nullable {
                ForeignKeyAction::SetNull
            } else {
                ForeignKeyAction::Restrict
            };
            foreign_keys.push(ForeignKeySpec {
                name: names.physical(&format!("{}-{}", self.name, field.name)),
                column: field.name.clone(),
                references: names.physical(target),
                on_delete,
            });
        }

        KeyPlan { keys, foreign_keys }
    }
}

fn relation_column(type_name: &str) -> String {
    type_name
        .rsplit(|c| c == '\\' || c == ':' || c == '*' || c == '/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(type_name)
        .to_lowercase()
}

/// A key the table should have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    /// Name, when declared.
    pub name: Option<String>,
    /// Unique or plain.
    pub unique: bool,
    /// Ordered columns.
    pub columns: Vec<String>,
}

/// A foreign key the table should have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySpec {
    /// Physical constraint name.
    pub name: String,
    /// Referencing column.
    pub column: String,
    /// Physical name of the referenced table.
    pub references: String,
    /// `ON DELETE` action; `ON UPDATE` is always `CASCADE`.
    pub on_delete: ForeignKeyAction,
}

/// Declared key layout of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPlan {
    /// Unique and plain keys, unique groups first.
    pub keys: Vec<KeySpec>,
    /// Foreign keys, in field order.
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl KeyPlan {
    /// Foreign key declared for `column`.
    #[must_use]
    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKeySpec> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }
}
