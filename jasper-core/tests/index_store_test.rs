//! On-disk index compatibility and recovery

mod common;

use jasper_core::index::{record_upload, ArchiveHash, ArchiveRecord, IndexStore, PostRecord};
use jasper_core::status::resolve;
use jasper_core::PublicationStatus;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_missing_index_then_first_save_creates_it() {
    common::init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("archive.json");
    let store = IndexStore::<ArchiveRecord>::new(&path);

    let mut records = store.load();
    assert!(records.is_empty());
    assert_eq!(resolve(Some("abc"), &records), PublicationStatus::IndexUnavailable);

    record_upload(
        &mut records,
        "abc",
        "First",
        ArchiveHash::new("h1", "2024-05-01T10:00:00+00:00".to_string()),
    );
    store.save(&records).unwrap();

    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["files"][0]["uuid"], "abc");
    assert_eq!(written["files"][0]["arweave_hashes"][0]["link"], "https://www.arweave.net/h1");
    assert!(!store.backup_path().exists());
    let reloaded = store.load();
    assert_eq!(resolve(Some("abc"), &reloaded), PublicationStatus::Published(1));
    assert_eq!(resolve(Some("other"), &reloaded), PublicationStatus::NotPublished);
}

#[test]
fn test_hand_edited_index_with_trailing_commas_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("archive.json");
    fs::write(
        &path,
        r#"{
  "files": [
    {
      "uuid": "abc",
      "title": "Commas, everywhere,]",
      "arweave_hashes": [
        {"hash": "h1", "timestamp": "2024-01-01T00:00:00", "link": "https://www.arweave.net/h1"},
      ],
    },
  ],
}"#,
    )
    .unwrap();

    let records = IndexStore::<ArchiveRecord>::new(&path).load();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Commas, everywhere,]");
    assert_eq!(records[0].arweave_hashes.len(), 1);
}

#[test]
fn test_posts_index_with_null_url_is_a_draft() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("atproto_posts.json");
    fs::write(
        &path,
        r#"{"posts": [{"uuid": "d1", "title": "Draft", "url": null, "posted_at": null}]}"#,
    )
    .unwrap();

    let records = IndexStore::<PostRecord>::new(&path).load();

    assert_eq!(resolve(Some("d1"), &records), PublicationStatus::Draft);
    assert_eq!(resolve(Some("N/A"), &records), PublicationStatus::NoIdentifier);
}

#[test]
fn test_truncated_file_degrades_to_empty_and_next_save_repairs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("archive.json");
    fs::write(&path, r#"{"files": [{"uuid": "abc", "title""#).unwrap();
    let store = IndexStore::<ArchiveRecord>::new(&path);

    assert!(store.load().is_empty());

    store.save(&[]).unwrap();
    // The corrupt file is what got backed up.
    assert!(fs::read_to_string(store.backup_path()).unwrap().contains(r#""title""#));
    assert!(store.load().is_empty());
    assert!(fs::read_to_string(&path).unwrap().contains("\"files\""));
}
