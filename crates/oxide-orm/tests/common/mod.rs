#![allow(dead_code)]

use std::sync::Arc;

use oxide_orm::{Accessor, EntityType, Store, Value};
use oxide_sql_core::schema::IndexDescriptor;
use oxide_sql_core::{Connection, FieldDescriptor, TableNames};
use oxide_sql_sqlx::SqliteGateway;

// =============================================================================
// Entity types
// =============================================================================

pub fn maker() -> Arc<EntityType> {
    EntityType::builder("Maker")
        .field(FieldDescriptor::text("name").max_length(64))
        .id_bytes(2)
        .build()
        .unwrap()
}

pub fn widget_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::text("name").max_length(32),
        FieldDescriptor::integer("price").min(0).max(100_000),
        FieldDescriptor::integer("stock").min(0).max(1000).default_value(5_i64),
        FieldDescriptor::reference("maker", "Maker").nullable(),
    ]
}

pub fn widget() -> Arc<EntityType> {
    EntityType::builder("Widget")
        .fields(widget_fields())
        .accessor(
            "label",
            Accessor::getter(|w| {
                Ok(Value::Text(format!(
                    "{} @ {}",
                    w.peek("name")?,
                    w.peek("price")?
                )))
            }),
        )
        .unique(IndexDescriptor::new(["name"]))
        .build()
        .unwrap()
}

/// The Widget type after a release that added `sku` right after `price`.
pub fn widget_with_sku() -> Arc<EntityType> {
    let mut fields = widget_fields();
    fields.insert(2, FieldDescriptor::text("sku").max_length(16).nullable());
    EntityType::builder("Widget")
        .fields(fields)
        .unique(IndexDescriptor::new(["name"]))
        .build()
        .unwrap()
}

pub fn user() -> Arc<EntityType> {
    EntityType::builder("User")
        .field(FieldDescriptor::text("login").max_length(32))
        .build()
        .unwrap()
}

pub fn group() -> Arc<EntityType> {
    EntityType::builder("Group")
        .field(FieldDescriptor::text("title").max_length(64))
        .id_bytes(1)
        .build()
        .unwrap()
}

pub fn document() -> Arc<EntityType> {
    EntityType::builder("Doc")
        .field(FieldDescriptor::text("title").max_length(100))
        .owned_by("User")
        .build()
        .unwrap()
}

// =============================================================================
// Stores
// =============================================================================

pub const PREFIX: &str = "app_";

pub async fn empty_store() -> Store<SqliteGateway> {
    let db = SqliteGateway::in_memory().await.unwrap();
    Store::new(db, TableNames::new(PREFIX))
}

/// A store with every test type registered and no tables yet.
pub async fn store() -> Store<SqliteGateway> {
    let mut store = empty_store().await;
    for ty in [maker(), widget(), user(), group(), document()] {
        store.register(ty).unwrap();
    }
    store
}

pub async fn column_names(store: &mut Store<SqliteGateway>, logical: &str) -> Vec<String> {
    let table = store.names().physical(logical);
    store
        .connection()
        .describe(&table)
        .await
        .unwrap()
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.name)
        .collect()
}

pub async fn table_exists(store: &mut Store<SqliteGateway>, logical: &str) -> bool {
    let table = store.names().physical(logical);
    store.connection().describe(&table).await.unwrap().is_some()
}
