//! Persistent store: one JSON document holding the entire app state.
//!
//! The store owns a single file path and exposes `load` / `save` over the
//! whole [`AppData`] document — no partial updates, no migrations. A missing
//! or corrupt file yields starter data rather than an error, matching the
//! best-effort contract of the local-storage slot this replaces.

use crate::model::AppData;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data format: `characters` must be an array")]
    InvalidFormat,
}

/// A single-document JSON store at a fixed path.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. A missing or unparseable file yields starter data.
    pub async fn load(&self) -> AppData {
        match fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!(
                        "corrupt data file at {}, starting fresh: {e}",
                        self.path.display()
                    );
                    AppData::starter()
                }
            },
            Err(_) => AppData::starter(),
        }
    }

    /// Write the full document. Idempotent full overwrite; goes through a
    /// temp file and rename so an interrupted write cannot tear the document.
    pub async fn save(&self, data: &AppData) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Export the document to a caller-chosen path as a shareable backup.
    pub async fn export(&self, data: &AppData, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(data)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Read a user-supplied backup file. The only structural requirement is
    /// that `characters` is an array; everything else is best-effort.
    pub async fn import(&self, path: impl AsRef<Path>) -> Result<AppData, StoreError> {
        let content = fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&content)?;

        if !value.get("characters").map(Value::is_array).unwrap_or(false) {
            return Err(StoreError::InvalidFormat);
        }

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;
    use tempfile::TempDir;

    fn sample_data() -> AppData {
        let mut data = AppData::starter();
        data.api_key = Some("test-key".to_string());
        data.characters[0]
            .chat_history
            .push(Message::user_text("こんにちは"));
        data
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().expect("temp dir");
        let store = Store::new(dir.path().join("data.json"));

        let data = sample_data();
        store.save(&data).await.expect("save should succeed");

        let loaded = store.load().await;
        assert_eq!(loaded, data);
    }

    #[tokio::test]
    async fn test_load_missing_file_yields_starter() {
        let dir = TempDir::new().expect("temp dir");
        let store = Store::new(dir.path().join("nope.json"));

        let loaded = store.load().await;
        assert_eq!(loaded, AppData::starter());
        assert_eq!(loaded.characters.len(), 2);
    }

    #[tokio::test]
    async fn test_load_corrupt_file_yields_starter() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("data.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = Store::new(&path);
        assert_eq!(store.load().await, AppData::starter());
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let store = Store::new(dir.path().join("data.json"));

        let data = sample_data();
        store.save(&data).await.unwrap();
        store.save(&data).await.unwrap();
        assert_eq!(store.load().await, data);
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let store = Store::new(dir.path().join("data.json"));
        let backup = dir.path().join("backup.json");

        let data = sample_data();
        store.export(&data, &backup).await.unwrap();

        let imported = store.import(&backup).await.unwrap();
        assert_eq!(imported, data);
    }

    #[tokio::test]
    async fn test_import_rejects_non_array_characters() {
        let dir = TempDir::new().expect("temp dir");
        let store = Store::new(dir.path().join("data.json"));

        let bad = dir.path().join("bad.json");
        tokio::fs::write(&bad, r#"{"characters": "not an array"}"#)
            .await
            .unwrap();
        assert!(matches!(
            store.import(&bad).await,
            Err(StoreError::InvalidFormat)
        ));

        let missing = dir.path().join("missing.json");
        tokio::fs::write(&missing, r#"{"apiKey": "k"}"#).await.unwrap();
        assert!(matches!(
            store.import(&missing).await,
            Err(StoreError::InvalidFormat)
        ));
    }

    #[tokio::test]
    async fn test_import_accepts_structurally_close_document() {
        let dir = TempDir::new().expect("temp dir");
        let store = Store::new(dir.path().join("data.json"));

        // No apiKey, character without chatHistory: still a valid import.
        let close = dir.path().join("close.json");
        tokio::fs::write(
            &close,
            r#"{"characters": [{"id": "c1", "name": "葵", "avatar": "x", "description": "d"}]}"#,
        )
        .await
        .unwrap();

        let imported = store.import(&close).await.expect("import should succeed");
        assert_eq!(imported.characters.len(), 1);
        assert!(imported.api_key.is_none());
    }
}
