//! Self-converging table migrations.
//!
//! `oxide-migrate` keeps a live table in line with its
//! [`TableDefinition`](oxide_sql_core::TableDefinition). There are no
//! migration files and no history table: the declaration is the target
//! state and the live schema is read back on every run.
//!
//! # Algorithm
//!
//! 1. **Describe** the live table.
//! 2. **Create** it when absent: primary key, every declared column and the
//!    `added`/`updated` timestamps.
//! 3. **Add** missing columns when present, each right after its declared
//!    predecessor (MySQL batches them into one `ALTER TABLE`).
//! 4. **Verify keys**: unique groups, reference keys and foreign keys are
//!    compared with the declaration. Only when they differ are they
//!    dropped and rebuilt.
//!
//! Running a migration twice issues no DDL the second time.
//!
//! # Example
//!
//! ```rust,no_run
//! use oxide_migrate::prelude::*;
//! use oxide_sql_core::schema::IndexDescriptor;
//! use oxide_sql_core::{FieldDescriptor, TableDefinition, TableNames};
//!
//! # async fn run() -> oxide_migrate::Result<()> {
//! let mut db = oxide_sql_sqlx::connect("sqlite::memory:").await?;
//! let widget = TableDefinition::new("Widget")
//!     .field(FieldDescriptor::text("name").max_length(32))
//!     .field(FieldDescriptor::integer("price").min(0).max(100_000))
//!     .unique(IndexDescriptor::new(["name"]));
//!
//! let executor = MigrationExecutor::new(TableNames::new("app_"));
//! let report = executor.migrate(&mut db, &widget).await?;
//! assert_eq!(report.outcome, MigrationOutcome::Created);
//!
//! let report = executor.migrate(&mut db, &widget).await?;
//! assert_eq!(report.outcome, MigrationOutcome::UpToDate);
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Converge every table declared in a schema file
//! oxide-migrate --database mysql://root@localhost/app --prefix app_ apply schema.toml
//!
//! # Show the statements without running them
//! oxide-migrate apply schema.toml --dry-run
//!
//! # Inspect a live table
//! oxide-migrate describe Widget
//!
//! # Render or run a query template
//! oxide-migrate render "SELECT * FROM [[Widget]] WHERE name = ?" bolt
//! oxide-migrate sql "SELECT * FROM [[Widget]]"
//! ```

pub mod autodetector;
pub mod error;
pub mod executor;
pub mod operations;
pub mod schema;

pub use autodetector::{detect, missing_columns, MigrationPlan};
pub use error::{MigrateError, Result};
pub use executor::{dependency_order, migrate, MigrationExecutor};
pub use operations::{MigrationOperation, MigrationOutcome, MigrationReport};
pub use schema::{RelationSpec, SchemaFile, TableSpec, UniqueSpec};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::{migrate, MigrationExecutor};
    pub use crate::operations::{MigrationOperation, MigrationOutcome, MigrationReport};
    pub use crate::schema::SchemaFile;
}
