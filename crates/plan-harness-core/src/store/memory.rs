//! In-memory [`KvStore`] implementation for tests and embedded use.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`, so prefix listing comes
//! back sorted like the SQLite backend's `ORDER BY key`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::KvStore;

/// In-memory key-value store.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(entries.remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{get_json, put_json};

    #[tokio::test]
    async fn put_get_delete() {
        let store = InMemoryStore::new();
        store.put("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prefix_listing_is_sorted_and_bounded() {
        let store = InMemoryStore::new();
        for key in ["session_cache:b", "session_cache:a", "sessions", "documents"] {
            store.put(key, "{}").await.unwrap();
        }
        let keys = store.keys_with_prefix("session_cache:").await.unwrap();
        assert_eq!(keys, vec!["session_cache:a", "session_cache:b"]);
    }

    #[tokio::test]
    async fn json_helpers() {
        let store = InMemoryStore::new();
        put_json(&store, "nums", &vec![1, 2, 3]).await.unwrap();
        let back: Option<Vec<i32>> = get_json(&store, "nums").await.unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        store.put("bad", "not json").await.unwrap();
        assert!(get_json::<Vec<i32>>(&store, "bad").await.is_err());
    }
}
