//! File-backed storage and backup recovery.

mod common;

use std::sync::Arc;

use common::MemoryClipboard;
use courier_core::ElementNode;
use courier_transport::{
    ClipboardCodec, CopyContext, ErrorLog, ErrorLogEntry, FailureKind, FileStorage, Storage,
};
use serde_json::json;

#[tokio::test]
async fn test_file_storage_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = FileStorage::new(dir.path()).expect("storage");

    assert!(storage.get("courier.last_copy").await.expect("get").is_none());
    storage
        .set("courier.last_copy", json!({"hello": "world"}))
        .await
        .expect("set");
    assert_eq!(
        storage.get("courier.last_copy").await.expect("get"),
        Some(json!({"hello": "world"}))
    );
    assert!(dir.path().join("courier_last_copy.json").exists());
}

#[tokio::test]
async fn test_file_storage_keys_stay_inside_data_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let storage = FileStorage::new(&data).expect("storage");
    storage.set("../escape", json!(1)).await.expect("set");
    assert!(!dir.path().join("escape.json").exists());
    assert_eq!(storage.get("../escape").await.expect("get"), Some(json!(1)));
}

#[tokio::test]
async fn test_corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = FileStorage::new(dir.path()).expect("storage");
    std::fs::write(dir.path().join("broken.json"), "{ not json").expect("write");
    assert!(storage.get("broken").await.is_err());
}

#[tokio::test]
async fn test_backup_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tree = ElementNode::section().with_id("s1");
    {
        let storage = Arc::new(FileStorage::new(dir.path()).expect("storage"));
        let codec = ClipboardCodec::new(Arc::new(MemoryClipboard::default()), storage);
        codec
            .write(tree.clone(), &CopyContext::new("https://a.example", "3.5.0"))
            .await
            .expect("write");
    }

    let storage = Arc::new(FileStorage::new(dir.path()).expect("storage"));
    let codec = ClipboardCodec::new(Arc::new(MemoryClipboard::default()), storage);
    let backup = codec.read_backup().await.expect("read").expect("present");
    assert_eq!(backup.data, tree);
    assert_eq!(backup.metadata.source_origin, "https://a.example");
}

#[tokio::test]
async fn test_error_log_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Arc::new(FileStorage::new(dir.path()).expect("storage"));
    let log = ErrorLog::with_capacity(storage.clone(), 2);
    for kind in [FailureKind::Timeout, FailureKind::BridgeFailure, FailureKind::Unknown] {
        log.record(ErrorLogEntry::new("paste", Some(kind), kind.to_string()))
            .await;
    }
    let reopened = ErrorLog::new(storage);
    let entries = reopened.entries().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, Some(FailureKind::BridgeFailure));
    assert_eq!(entries[1].kind, Some(FailureKind::Unknown));
    assert!(!entries[0].operation_id.is_empty());
}
