//! # oxide-orm
//!
//! An entity runtime on top of `oxide-sql-core` and `oxide-migrate`.
//!
//! This crate provides:
//! - [`EntityType`] descriptors with typed fields, unique groups,
//!   inheritance and override accessors
//! - [`Entity`] instances with validated setters, lazily loaded references
//!   and `open`/`save`/`delete`
//! - A [`Store`] that owns the connection and heals the schema: when a
//!   statement hits a missing table or column, the tables involved are
//!   migrated and the statement is retried once
//! - [`PermissionGate`]s checked on every access, create, update and delete
//! - An install-wide settings store and an error log sink
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oxide_orm::{EntityType, Store, StoreConfig};
//! use oxide_sql_core::FieldDescriptor;
//!
//! # async fn run() -> oxide_orm::Result<()> {
//! let widget = EntityType::builder("Widget")
//!     .field(FieldDescriptor::text("name").max_length(64))
//!     .field(FieldDescriptor::integer("price").min(0).max(100_000))
//!     .build()?;
//!
//! let mut store = StoreConfig::new("sqlite::memory:").connect().await?;
//! store.register(widget)?;
//!
//! // The table does not exist yet; the first save creates it.
//! let mut bolt = store.create("Widget")?;
//! bolt.set("name", "bolt")?;
//! bolt.set("price", 250)?;
//! bolt.save(&mut store).await?;
//!
//! let reopened = store.open("Widget", bolt.id().unwrap_or_default(), true).await?;
//! assert!(reopened.is_some());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entity;
pub mod entity_type;
pub mod error;
pub mod errorlog;
pub mod fields;
pub mod permission;
pub mod settings;
pub mod store;
pub mod value;

pub use config::StoreConfig;
pub use entity::{Entity, Key, SaveOutcome};
pub use entity_type::{Accessor, EntityType, EntityTypeBuilder};
pub use error::{OrmError, Result, ValidationError};
pub use errorlog::{ErrorRecord, LoggedError};
pub use permission::{Actor, ActorId, AllowAll, Anonymous, OwnerGate, PermissionGate, Permissions};
pub use settings::SettingValue;
pub use store::Store;
pub use value::Value;
