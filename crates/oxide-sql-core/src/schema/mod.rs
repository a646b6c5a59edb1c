//! Schema declarations: field descriptors, integer widths and table
//! definitions.
//!
//! Turning these into DDL is dialect work, see [`crate::dialect`].

mod field;
mod table;
mod width;

pub use field::{
    is_valid_field_name, Bound, FieldDescriptor, FieldKind, FieldSpec, FieldType, FieldTypeSpec,
    RESERVED_COLUMNS,
};
pub use table::{
    ForeignKeyAction, ForeignKeySpec, IndexDescriptor, KeyPlan, KeySpec, PrimaryKey,
    TableDefinition,
};
pub use width::{effective_range, IntWidth, IntegerStorage};
