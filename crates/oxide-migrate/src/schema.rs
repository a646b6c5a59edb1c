//! Schema files.
//!
//! A schema file declares tables in TOML so the CLI can converge a database
//! without an application around it:
//!
//! ```toml
//! [[table]]
//! name = "Widget"
//! unique = [["name"]]
//!
//! [[table.fields]]
//! name = "name"
//! type = "text"
//! maxLength = 32
//!
//! [[table.fields]]
//! name = "price"
//! type = 4
//! min = 0
//! max = 100000
//!
//! [[relation]]
//! left = "User"
//! right = "Widget"
//! name = "favourites"
//! ```
//!
//! Reference fields and relations pick up the id width of tables declared
//! in the same file unless they set `idBytes` themselves.

use std::path::Path;
use std::str::FromStr;

use oxide_sql_core::schema::{FieldSpec, IndexDescriptor, IntWidth};
use oxide_sql_core::{FieldDescriptor, SchemaError, TableDefinition};
use serde::Deserialize;

use crate::error::{MigrateError, Result};

/// A unique group: a bare list of fields, or a named one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UniqueSpec {
    /// Anonymous key.
    Fields(Vec<String>),
    /// Named key.
    Named {
        /// Key name.
        name: String,
        /// Ordered fields.
        fields: Vec<String>,
    },
}

impl From<UniqueSpec> for IndexDescriptor {
    fn from(spec: UniqueSpec) -> Self {
        match spec {
            UniqueSpec::Fields(fields) => Self::new(fields),
            UniqueSpec::Named { name, fields } => Self::named(name, fields),
        }
    }
}

fn yes() -> bool {
    true
}

/// An entity table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    /// Logical name.
    pub name: String,
    /// Declared fields, in column order.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Unique groups.
    #[serde(default)]
    pub unique: Vec<UniqueSpec>,
    /// Whether `added`/`updated` are maintained.
    #[serde(default = "yes")]
    pub timestamps: bool,
    /// Primary-key byte budget.
    #[serde(default, alias = "id_bytes")]
    pub id_bytes: Option<u8>,
}

/// A junction table between two entity tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationSpec {
    /// Owning side.
    pub left: String,
    /// Other side.
    pub right: String,
    /// Relation name.
    pub name: String,
    /// Id byte budget of `left`.
    #[serde(default)]
    pub left_id_bytes: Option<u8>,
    /// Id byte budget of `right`.
    #[serde(default)]
    pub right_id_bytes: Option<u8>,
    /// Extra fields stored per link.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// Parsed contents of a schema file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaFile {
    /// Entity tables.
    #[serde(default, rename = "table")]
    pub tables: Vec<TableSpec>,
    /// Relation tables.
    #[serde(default, rename = "relation")]
    pub relations: Vec<RelationSpec>,
}

impl FromStr for SchemaFile {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl SchemaFile {
    /// Reads and parses a schema file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not a valid schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        text.parse::<Self>().map_err(|e| MigrateError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn id_bytes_of(&self, table: &str) -> Option<u8> {
        self.tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.id_bytes.unwrap_or(4))
    }

    fn field(&self, mut spec: FieldSpec) -> std::result::Result<FieldDescriptor, SchemaError> {
        if spec.id_bytes.is_none() {
            spec.id_bytes = spec.references.as_deref().and_then(|t| self.id_bytes_of(t));
        }
        FieldDescriptor::try_from(spec)
    }

    /// Table definitions, relations last.
    ///
    /// # Errors
    ///
    /// Returns the first field that cannot be decoded.
    pub fn definitions(&self) -> std::result::Result<Vec<TableDefinition>, SchemaError> {
        let mut definitions = Vec::with_capacity(self.tables.len() + self.relations.len());
        for spec in &self.tables {
            let mut table = TableDefinition::new(&spec.name).timestamps(spec.timestamps);
            if let Some(bytes) = spec.id_bytes {
                table = table.id_bytes(bytes);
            }
            for field in &spec.fields {
                table = table.field(self.field(field.clone())?);
            }
            for group in &spec.unique {
                table = table.unique(group.clone().into());
            }
            definitions.push(table);
        }
        for spec in &self.relations {
            let width = |explicit: Option<u8>, table: &str| {
                IntWidth::from_bytes(explicit.or_else(|| self.id_bytes_of(table)).unwrap_or(4))
            };
            let extra = spec
                .fields
                .iter()
                .map(|f| self.field(f.clone()))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            definitions.push(TableDefinition::relation(
                &spec.left,
                width(spec.left_id_bytes, &spec.left),
                &spec.right,
                width(spec.right_id_bytes, &spec.right),
                &spec.name,
                extra,
            ));
        }
        Ok(definitions)
    }

    /// Definition of one table or relation, by logical name.
    ///
    /// # Errors
    ///
    /// Fails when the name is not declared or a field cannot be decoded.
    pub fn definition(&self, name: &str) -> Result<TableDefinition> {
        self.definitions()?
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| MigrateError::UnknownTable(String::from(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_sql_core::schema::{FieldKind, PrimaryKey};

    const SCHEMA: &str = r#"
        [[table]]
        name = "User"
        idBytes = 2

        [[table.fields]]
        name = "name"
        type = "text"
        maxLength = 64

        [[table]]
        name = "Widget"
        unique = [["name"], { name = "by_owner", fields = ["owner", "name"] }]

        [[table.fields]]
        name = "name"
        type = 2
        maxLength = 32

        [[table.fields]]
        name = "price"
        type = "integer"
        min = 0
        max = 100000

        [[table.fields]]
        name = "owner"
        type = "reference"
        references = "User"
        nullable = true

        [[relation]]
        left = "User"
        right = "Widget"
        name = "favourites"
    "#;

    #[test]
    fn test_definitions() {
        let file: SchemaFile = SCHEMA.parse().unwrap();
        let defs = file.definitions().unwrap();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["User", "Widget", "User-favourites"]);

        assert_eq!(defs[0].primary_key, PrimaryKey::AutoId(IntWidth::Small));
        let widget = &defs[1];
        assert_eq!(widget.unique.len(), 2);
        assert_eq!(widget.unique[1].name.as_deref(), Some("by_owner"));
        assert_eq!(widget.get_field("price").unwrap().integer_range(), Some((0, 100_000)));
        assert!(matches!(
            widget.get_field("owner").unwrap().kind,
            FieldKind::Reference { width: IntWidth::Small, .. }
        ));

        let relation = &defs[2];
        assert_eq!(
            relation.primary_key,
            PrimaryKey::Composite(vec![String::from("user"), String::from("widget")])
        );
        assert!(matches!(
            relation.fields[0].kind,
            FieldKind::Reference { width: IntWidth::Small, cascade: true, .. }
        ));
    }

    #[test]
    fn test_unknown_table() {
        let file: SchemaFile = SCHEMA.parse().unwrap();
        assert!(matches!(
            file.definition("Nope"),
            Err(MigrateError::UnknownTable(name)) if name == "Nope"
        ));
        assert!(file.definition("Widget").is_ok());
    }

    #[test]
    fn test_bad_field_type() {
        let file: SchemaFile = r#"
            [[table]]
            name = "T"
            [[table.fields]]
            name = "x"
            type = 42
        "#
        .parse()
        .unwrap();
        assert!(matches!(
            file.definitions(),
            Err(SchemaError::UnknownFieldType(42))
        ));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.toml");
        std::fs::write(&path, "[[table]]\nfields = 3\n").unwrap();
        let err = SchemaFile::load(&path).unwrap_err();
        assert!(matches!(err, MigrateError::ParseError { path: p, .. } if p == path));
    }
}
