//! QA tests for the character registry and the persisted document.
//!
//! These tests cover recency ordering, idempotent updates, export/import
//! round trips, and recovery from a corrupt data file.
//!
//! Run with: `cargo test -p kotoba-core --test qa_registry`

use kotoba_core::model::{AppData, Character, Message};
use kotoba_core::registry::Registry;
use kotoba_core::store::{Store, StoreError};
use kotoba_core::testing::sample_character;
use tempfile::TempDir;

fn empty_registry(dir: &TempDir) -> Registry {
    let store = Store::new(dir.path().join("kotoba.json"));
    Registry::with_data(store, AppData::default())
}

fn with_message_at(mut character: Character, timestamp: i64) -> Character {
    let mut message = Message::user_text("こんにちは");
    message.timestamp = timestamp;
    character.chat_history.push(message);
    character
}

// =============================================================================
// TEST 1: Recency ordering across spoken and unspoken characters
// =============================================================================

#[tokio::test]
async fn test_recency_ordering() {
    let dir = TempDir::new().unwrap();
    let mut registry = empty_registry(&dir);

    // "a" spoke at T1, "b" at T2 > T1, "c" never spoke and has an id
    // timestamp below both, "d" never spoke with an even older id.
    registry
        .add(with_message_at(sample_character("char_5000", "a"), 8000))
        .await
        .unwrap();
    registry
        .add(with_message_at(sample_character("char_5001", "b"), 9000))
        .await
        .unwrap();
    registry.add(sample_character("char_3000", "c")).await.unwrap();
    registry.add(sample_character("char_2000", "d")).await.unwrap();

    let names: Vec<&str> = registry
        .list_by_recency()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["b", "a", "c", "d"]);
}

#[tokio::test]
async fn test_recency_tie_preserves_insertion_order() {
    let dir = TempDir::new().unwrap();
    let mut registry = empty_registry(&dir);

    // Malformed ids sort as zero, so both tie and keep insertion order.
    registry.add(sample_character("first", "x")).await.unwrap();
    registry.add(sample_character("second", "y")).await.unwrap();

    let names: Vec<&str> = registry
        .list_by_recency()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["x", "y"]);
}

// =============================================================================
// TEST 2: Updates are idempotent and unknown ids are a no-op
// =============================================================================

#[tokio::test]
async fn test_update_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut registry = empty_registry(&dir);

    let mut character = sample_character("c1", "健太");
    registry.add(character.clone()).await.unwrap();

    character.name = "健太郎".to_string();
    assert!(registry.update(character.clone()).await.unwrap());
    assert!(registry.update(character).await.unwrap());

    assert_eq!(registry.list_by_recency().len(), 1);
    assert_eq!(registry.get("c1").unwrap().name, "健太郎");
}

#[tokio::test]
async fn test_update_unknown_id_is_noop() {
    let dir = TempDir::new().unwrap();
    let mut registry = empty_registry(&dir);
    registry.add(sample_character("c1", "健太")).await.unwrap();

    let applied = registry
        .update(sample_character("ghost", "誰"))
        .await
        .unwrap();
    assert!(!applied);
    assert_eq!(registry.list_by_recency().len(), 1);
    assert!(registry.get("ghost").is_none());
}

// =============================================================================
// TEST 3: Removal cascades to the character's history
// =============================================================================

#[tokio::test]
async fn test_remove_cascades() {
    let dir = TempDir::new().unwrap();
    let mut registry = empty_registry(&dir);
    registry
        .add(with_message_at(sample_character("c1", "健太"), 1000))
        .await
        .unwrap();

    assert!(registry.remove("c1").await.unwrap());
    assert!(!registry.contains("c1"));
    assert!(!registry.remove("c1").await.unwrap());

    // Reopening the store shows the removal, history included.
    let store = Store::new(dir.path().join("kotoba.json"));
    let reloaded = Registry::open(store).await;
    assert!(reloaded.get("c1").is_none());
}

// =============================================================================
// TEST 4: Export then import round-trips the whole document
// =============================================================================

#[tokio::test]
async fn test_export_import_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut registry = empty_registry(&dir);
    registry
        .add(with_message_at(sample_character("c1", "健太"), 4242))
        .await
        .unwrap();
    registry
        .set_api_key("test-key".to_string())
        .await
        .unwrap();

    let backup = dir.path().join("backup.json");
    registry.export(&backup).await.unwrap();

    let other_dir = TempDir::new().unwrap();
    let mut other = empty_registry(&other_dir);
    other.import(&backup).await.unwrap();

    assert_eq!(other.data(), registry.data());
    let imported = other.get("c1").unwrap();
    assert_eq!(imported.chat_history[0].timestamp, 4242);
    assert_eq!(other.api_key(), Some("test-key"));
}

#[tokio::test]
async fn test_import_rejects_malformed_document() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.json");
    tokio::fs::write(&bad, r#"{"characters": "not-an-array"}"#)
        .await
        .unwrap();

    let mut registry = empty_registry(&dir);
    registry.add(sample_character("c1", "健太")).await.unwrap();

    let err = registry.import(&bad).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidFormat));
    // The failed import leaves the registry untouched.
    assert!(registry.contains("c1"));
}

// =============================================================================
// TEST 5: A corrupt data file falls back to the starter roster
// =============================================================================

#[tokio::test]
async fn test_corrupt_file_yields_starter_roster() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kotoba.json");
    tokio::fs::write(&path, "{{{ not json").await.unwrap();

    let registry = Registry::open(Store::new(path)).await;
    let names: Vec<&str> = registry
        .list_by_recency()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert!(names.contains(&"健太"));
    assert!(names.contains(&"葵"));
}
