//! Character registry: the in-memory view of the persisted document.
//!
//! The registry owns the current [`AppData`] and an injected [`Store`].
//! Every mutation recomputes the document and funnels through the store's
//! single `save`, so within one process reads and writes stay consistent.

use crate::model::{AppData, Character, Message};
use crate::store::{Store, StoreError};
use std::path::Path;

/// The character registry and credential holder.
pub struct Registry {
    store: Store,
    data: AppData,
}

impl Registry {
    /// Open the registry, loading the current document (or starter data).
    pub async fn open(store: Store) -> Self {
        let data = store.load().await;
        Self { store, data }
    }

    /// Build a registry over an already-loaded document.
    pub fn with_data(store: Store, data: AppData) -> Self {
        Self { store, data }
    }

    /// The current document.
    pub fn data(&self) -> &AppData {
        &self.data
    }

    /// The stored API credential, if configured.
    pub fn api_key(&self) -> Option<&str> {
        self.data.api_key.as_deref()
    }

    /// Store the API credential.
    pub async fn set_api_key(&mut self, key: String) -> Result<(), StoreError> {
        self.data.api_key = Some(key);
        self.store.save(&self.data).await
    }

    /// Look up a character by id.
    pub fn get(&self, id: &str) -> Option<&Character> {
        self.data.characters.iter().find(|c| c.id == id)
    }

    /// Whether a character with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Add a new character.
    pub async fn add(&mut self, character: Character) -> Result<(), StoreError> {
        self.data.characters.push(character);
        self.store.save(&self.data).await
    }

    /// Replace a character by matching id. No-op (and no write) when the id
    /// is unknown; callers decide add-vs-update by pre-checking `contains`.
    pub async fn update(&mut self, character: Character) -> Result<bool, StoreError> {
        match self.data.characters.iter_mut().find(|c| c.id == character.id) {
            Some(slot) => {
                *slot = character;
                self.store.save(&self.data).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a character and their history. Returns whether anything was
    /// removed.
    pub async fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.data.characters.len();
        self.data.characters.retain(|c| c.id != id);
        if self.data.characters.len() == before {
            return Ok(false);
        }
        self.store.save(&self.data).await?;
        Ok(true)
    }

    /// Replace one character's chat history and persist. Used by the turn
    /// engine for its per-message incremental writes.
    pub async fn replace_history(
        &mut self,
        id: &str,
        history: Vec<Message>,
    ) -> Result<(), StoreError> {
        if let Some(character) = self.data.characters.iter_mut().find(|c| c.id == id) {
            character.chat_history = history;
        }
        self.store.save(&self.data).await
    }

    /// Characters ordered most-recently-active first. Ties keep the
    /// underlying array order (stable sort).
    pub fn list_by_recency(&self) -> Vec<&Character> {
        let mut list: Vec<&Character> = self.data.characters.iter().collect();
        list.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
        list
    }

    /// Export the full document to a backup file.
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.store.export(&self.data, path).await
    }

    /// Import a backup file, replacing the entire document wholesale.
    pub async fn import(&mut self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let data = self.store.import(path).await?;
        self.data = data;
        self.store.save(&self.data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn character(id: &str, name: &str) -> Character {
        Character {
            id: id.to_string(),
            name: name.to_string(),
            avatar: "x".to_string(),
            description: "d".to_string(),
            chat_history: Vec::new(),
        }
    }

    fn test_registry(dir: &TempDir) -> Registry {
        let store = Store::new(dir.path().join("data.json"));
        Registry::with_data(
            store,
            AppData {
                characters: Vec::new(),
                api_key: None,
            },
        )
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let dir = TempDir::new().unwrap();
        let mut registry = test_registry(&dir);

        registry.add(character("c1", "健太")).await.unwrap();
        assert!(registry.contains("c1"));
        assert_eq!(registry.get("c1").unwrap().name, "健太");
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut registry = test_registry(&dir);

        let updated = registry.update(character("ghost", "x")).await.unwrap();
        assert!(!updated);
        assert!(registry.data().characters.is_empty());
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut registry = test_registry(&dir);

        registry.add(character("c1", "健太")).await.unwrap();
        let mut edited = character("c1", "健太（改）");
        edited.description = "new".to_string();

        assert!(registry.update(edited.clone()).await.unwrap());
        let after_once = registry.data().clone();

        assert!(registry.update(edited).await.unwrap());
        assert_eq!(registry.data(), &after_once);
    }

    #[tokio::test]
    async fn test_remove_cascades_history() {
        let dir = TempDir::new().unwrap();
        let mut registry = test_registry(&dir);

        let mut c = character("c1", "健太");
        c.chat_history.push(Message::user_text("hi"));
        registry.add(c).await.unwrap();

        assert!(registry.remove("c1").await.unwrap());
        assert!(!registry.contains("c1"));
        assert!(!registry.remove("c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_recency_ordering() {
        let dir = TempDir::new().unwrap();
        let mut registry = test_registry(&dir);

        // T1 > T2, plus one silent character with an id-embedded creation
        // time, plus one with no usable timestamp at all.
        let mut a = character("char_100", "a");
        let mut msg = Message::user_text("old");
        msg.timestamp = 2_000;
        a.chat_history.push(msg);

        let mut b = character("char_200", "b");
        let mut msg = Message::user_text("new");
        msg.timestamp = 3_000;
        b.chat_history.push(msg);

        let c = character("char_500", "c");
        let d = character("default_kenta", "d");

        registry.add(d).await.unwrap();
        registry.add(a).await.unwrap();
        registry.add(b).await.unwrap();
        registry.add(c).await.unwrap();

        let names: Vec<_> = registry.list_by_recency().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c", "d"]);
    }

    #[tokio::test]
    async fn test_recency_tie_break_is_stable() {
        let dir = TempDir::new().unwrap();
        let mut registry = test_registry(&dir);

        registry.add(character("default_one", "one")).await.unwrap();
        registry.add(character("default_two", "two")).await.unwrap();

        let names: Vec<_> = registry.list_by_recency().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_mutations_persist_through_store() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("data.json"));

        {
            let mut registry = Registry::with_data(store.clone(), AppData::default());
            registry.add(character("c1", "健太")).await.unwrap();
            registry.set_api_key("key".to_string()).await.unwrap();
        }

        let reopened = Registry::open(store).await;
        assert!(reopened.contains("c1"));
        assert_eq!(reopened.api_key(), Some("key"));
    }
}
