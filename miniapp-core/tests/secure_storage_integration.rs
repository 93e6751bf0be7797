//! End-to-end bridge flows against real encrypted databases.

mod common;

use std::sync::Arc;

use common::{error_type, ready_event, value, BridgeMessage, FixedKeyProvider, Session};
use miniapp_core::secure_storage::{database_name, StorageDirectory};
use miniapp_core::{HkdfKeyProvider, SecureStorageConfig};
use serde_json::json;

fn database_names(dir: &tempfile::TempDir) -> Vec<String> {
    StorageDirectory::new(dir.path())
        .database_names()
        .expect("list databases")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_set_get_remove_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = common::host(&dir);
    let mut session = Session::new(&host, "app-a");

    assert_eq!(session.load().await, ready_event());
    assert_eq!(
        session.set_items("cb-1", json!({"a": "1", "b": "2"})).await,
        value("cb-1", "Items saved successfully.")
    );
    assert_eq!(session.get_item("cb-2", "a").await, value("cb-2", "1"));
    assert_eq!(session.get_item("cb-3", "b").await, value("cb-3", "2"));
    assert_eq!(
        session.remove_items("cb-4", &["a"]).await,
        value("cb-4", "Items removed successfully.")
    );
    assert_eq!(session.get_item("cb-5", "a").await, value("cb-5", "null"));
    assert_eq!(session.get_item("cb-6", "b").await, value("cb-6", "2"));
    assert_eq!(database_names(&dir), vec![database_name("app-a")]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_key_answers_null() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = common::host(&dir);
    let mut session = Session::new(&host, "app");

    assert_eq!(session.load().await, ready_event());
    assert_eq!(session.get_item("cb", "nope").await, value("cb", "null"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_large_batch_is_fully_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = common::host(&dir);
    let mut session = Session::new(&host, "app");
    let items: serde_json::Map<String, serde_json::Value> = (0..250)
        .map(|i| (format!("key-{i}"), json!(format!("value-{i}"))))
        .collect();

    assert_eq!(session.load().await, ready_event());
    assert_eq!(
        session.set_items("cb-set", items.into()).await,
        value("cb-set", "Items saved successfully.")
    );
    for i in [0, 99, 100, 199, 200, 249] {
        let callback_id = format!("cb-{i}");
        assert_eq!(
            session.get_item(&callback_id, &format!("key-{i}")).await,
            value(&callback_id, &format!("value-{i}"))
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clear_all_then_reload_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = common::host(&dir);
    let mut session = Session::new(&host, "app");

    assert_eq!(session.load().await, ready_event());
    session.set_items("cb-1", json!({"a": "1"})).await;
    assert_eq!(
        session.clear_all("cb-2").await,
        value("cb-2", "Storage removed successfully.")
    );
    assert!(database_names(&dir).is_empty());

    let reply = session.get_item("cb-3", "a").await;
    assert_eq!(error_type(&reply, "cb-3"), "SecureStorageUnavailableError");

    assert_eq!(session.load().await, ready_event());
    assert_eq!(session.get_item("cb-4", "a").await, value("cb-4", "null"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clearing_one_mini_app_leaves_others() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = common::host(&dir);
    let mut x = Session::new(&host, "x");
    let mut y = Session::new(&host, "y");

    assert_eq!(x.load().await, ready_event());
    assert_eq!(y.load().await, ready_event());
    x.set_items("x-1", json!({"k": "from-x"})).await;
    y.set_items("y-1", json!({"k": "from-y"})).await;

    host.clear_secure_storage_for("x");
    assert_eq!(database_names(&dir), vec![database_name("y")]);
    assert!(!host.registry().contains("x"));

    assert_eq!(y.get_item("y-2", "k").await, value("y-2", "from-y"));
    let reply = x.get_item("x-2", "k").await;
    assert_eq!(error_type(&reply, "x-2"), "SecureStorageNotInitializedError");

    assert_eq!(x.load().await, ready_event());
    assert_eq!(x.get_item("x-3", "k").await, value("x-3", "null"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clear_secure_storage_removes_every_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = common::host(&dir);
    let mut x = Session::new(&host, "x");
    let mut y = Session::new(&host, "y");
    std::fs::write(dir.path().join("unrelated.db"), b"keep").expect("write");

    assert_eq!(x.load().await, ready_event());
    assert_eq!(y.load().await, ready_event());
    x.set_items("x-1", json!({"k": "v"})).await;
    y.set_items("y-1", json!({"k": "v"})).await;

    x.dispatcher.clear_secure_storage();
    assert!(database_names(&dir).is_empty());
    assert!(host.registry().is_empty());
    assert!(dir.path().join("unrelated.db").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_key_reports_load_error_and_recovers() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let host = common::host(&dir);
        let mut session = Session::new(&host, "app");
        assert_eq!(session.load().await, ready_event());
        session.set_items("cb-1", json!({"a": "1"})).await;
        session.dispatcher.cleanup_secure_storage();
    }
    assert_eq!(database_names(&dir), vec![database_name("app")]);

    let other = common::host_with(common::config(&dir), Arc::new(FixedKeyProvider([0x77; 32])));
    let mut session = Session::new(&other, "app");
    match session.load().await {
        BridgeMessage::Event { event_type, value } => {
            assert_eq!(event_type, "miniappsecurestorageloaderror");
            let error: serde_json::Value = serde_json::from_str(&value).expect("error json");
            assert_eq!(error["type"], "SecureStorageIOError");
        }
        other => panic!("expected a load error event, got {other:?}"),
    }
    assert!(database_names(&dir).is_empty());

    assert_eq!(session.load().await, ready_event());
    assert_eq!(session.get_item("cb-2", "a").await, value("cb-2", "null"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_size_reports_usage_and_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = common::host(&dir);
    let mut session = Session::new(&host, "app");

    assert_eq!(session.load().await, ready_event());
    session.set_items("cb-1", json!({"a": "1"})).await;
    let BridgeMessage::Value { callback_id, value } = session.size("cb-2").await else {
        panic!("expected a size value");
    };
    assert_eq!(callback_id, "cb-2");
    let size: serde_json::Value = serde_json::from_str(&value).expect("size json");
    assert_eq!(size["maxSpace"], 5 * 1024 * 1024);
    assert!(size["usedSpace"].as_u64().expect("used space") > 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_write_beyond_budget_reports_full() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SecureStorageConfig {
        max_size_kb: 4,
        ..common::config(&dir)
    };
    let host = common::host_with(config, Arc::new(FixedKeyProvider([0x5a; 32])));
    let mut session = Session::new(&host, "app");

    assert_eq!(session.load().await, ready_event());
    let large = "x".repeat(64 * 1024);
    let reply = session.set_items("cb-1", json!({ "big": large })).await;
    assert_eq!(error_type(&reply, "cb-1"), "SecureStorageFullError");
    assert_eq!(session.get_item("cb-2", "big").await, value("cb-2", "null"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_data_survives_a_new_host_with_the_same_master_secret() {
    let dir = tempfile::tempdir().expect("tempdir");
    let secret = vec![0x42; 32];
    {
        let provider = HkdfKeyProvider::new(secret.clone()).expect("provider");
        let host = common::host_with(common::config(&dir), provider);
        let mut session = Session::new(&host, "app");
        assert_eq!(session.load().await, ready_event());
        session.set_items("cb-1", json!({"token": "abc"})).await;
        session.dispatcher.cleanup_secure_storage();
    }

    let provider = HkdfKeyProvider::new(secret).expect("provider");
    let host = common::host_with(common::config(&dir), provider);
    let mut session = Session::new(&host, "app");
    assert_eq!(session.load().await, ready_event());
    assert_eq!(session.get_item("cb-2", "token").await, value("cb-2", "abc"));
}
