//! Settings store and error log sink.

mod common;

use common::{empty_store, table_exists};
use oxide_orm::errorlog::MAX_LOG_ENTRIES;
use oxide_orm::{ErrorRecord, OrmError, ValidationError};
use oxide_sql_core::SqlValue;

// =============================================================================
// Settings
// =============================================================================

#[tokio::test]
async fn first_read_stores_the_default() {
    let mut store = empty_store().await;
    assert!(!table_exists(&mut store, "*settings").await);

    let name = store.setting("site-name", String::from("oxide")).await.unwrap();
    assert_eq!(name, "oxide");

    let rows = store
        .query(
            "SELECT value FROM [[*settings]] WHERE data = ?",
            &[SqlValue::from("site-name")],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text("value").as_deref(), Some("oxide"));
}

#[tokio::test]
async fn dynamic_read_stores_nothing() {
    let mut store = empty_store().await;
    assert_eq!(store.dynamic_setting("page-size", 20_i64).await.unwrap(), 20);
    let rows = store.query("SELECT * FROM [[*settings]]", &[]).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn numbers_are_clamped() {
    let mut store = empty_store().await;
    store.set_setting("page-size", &700_i64).await.unwrap();
    assert_eq!(
        store.setting_within("page-size", 20_i64, 5, 500).await.unwrap(),
        500
    );

    store.set_setting("ratio", &-0.5_f64).await.unwrap();
    let ratio = store.setting_within("ratio", 0.5_f64, 0.0, 1.0).await.unwrap();
    assert!(ratio.abs() < f64::EPSILON);

    store.set_setting("page-size", &"lots".to_string()).await.unwrap();
    assert_eq!(store.setting("page-size", 20_i64).await.unwrap(), 20);
}

#[tokio::test]
async fn text_out_of_range_reads_as_default() {
    let mut store = empty_store().await;
    store.set_setting("motto", &String::from("hi")).await.unwrap();
    assert_eq!(
        store
            .setting_within("motto", String::from("keep going"), 3, 40)
            .await
            .unwrap(),
        "keep going"
    );
    assert_eq!(
        store.setting("motto", String::new()).await.unwrap(),
        "hi"
    );
}

#[tokio::test]
async fn boolean_settings_parse_loosely() {
    let mut store = empty_store().await;
    for (raw, expected) in [
        ("Disabled", false),
        ("off", false),
        ("", false),
        ("0", false),
        ("yes", true),
        ("2", true),
    ] {
        store.set_setting("feature", &String::from(raw)).await.unwrap();
        assert_eq!(store.setting("feature", !expected).await.unwrap(), expected, "{raw:?}");
    }

    store.set_setting("feature", &true).await.unwrap();
    let rows = store
        .query("SELECT value FROM [[*settings]] WHERE data = 'feature'", &[])
        .await
        .unwrap();
    assert_eq!(rows[0].text("value").as_deref(), Some("1"));
}

// =============================================================================
// Error log
// =============================================================================

#[tokio::test]
async fn log_keeps_only_the_newest_entries() {
    let mut store = empty_store().await;
    store.set_setting(MAX_LOG_ENTRIES, &5_i64).await.unwrap();

    for n in 1..=8 {
        let record = ErrorRecord::new(format!("failure {n}")).with("attempt", n);
        let id = store.log_error(&record).await.unwrap();
        assert_eq!(id, n);
    }

    let entries = store.recent_errors(100).await.unwrap();
    let ids: Vec<u64> = entries.iter().map(|e| e.id).collect();
    assert_eq!(ids, [8, 7, 6, 5, 4]);
    assert_eq!(entries[0].record.message, "failure 8");
    assert_eq!(entries[0].record.context["attempt"], 8);
    assert!(entries[0].added.is_some());
}

#[tokio::test]
async fn log_limit_never_drops_below_five() {
    let mut store = empty_store().await;
    store.set_setting(MAX_LOG_ENTRIES, &1_i64).await.unwrap();
    for n in 0..7 {
        store
            .log_error(&ErrorRecord::new(format!("e{n}")))
            .await
            .unwrap();
    }
    assert_eq!(store.recent_errors(100).await.unwrap().len(), 5);
}

#[tokio::test]
async fn orm_errors_are_logged_with_their_kind() {
    let mut store = empty_store().await;
    let err = OrmError::from(ValidationError::ReadOnly(String::from("code")));
    store.log_error(&ErrorRecord::from(&err)).await.unwrap();

    let entries = store.recent_errors(1).await.unwrap();
    assert_eq!(entries[0].record.kind.as_deref(), Some("validation"));
    assert_eq!(entries[0].record.causes, ["field 'code' is read-only"]);
}

#[tokio::test]
async fn unstructured_content_is_kept_as_message() {
    let mut store = empty_store().await;
    store.log_error(&ErrorRecord::new("seed")).await.unwrap();
    store
        .execute(
            "INSERT INTO [[*errorLog]] (content) VALUES (?)",
            &[SqlValue::from("plain text")],
        )
        .await
        .unwrap();

    let entries = store.recent_errors(1).await.unwrap();
    assert_eq!(entries[0].record, ErrorRecord::new("plain text"));
}
