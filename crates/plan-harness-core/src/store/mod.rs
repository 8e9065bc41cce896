//! Storage abstraction for Plan Harness.
//!
//! Persisted state is JSON under well-known keys in a key-value store. The
//! [`KvStore`] trait is the narrow interface every component persists
//! through, so backends (SQLite, in-memory) are interchangeable.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Document collection.
pub const DOCUMENTS_KEY: &str = "documents";
/// Every training plan version.
pub const TRAINING_PLANS_KEY: &str = "training_plans";
/// Pattern fingerprints grouped by format.
pub const PATTERN_LIBRARY_KEY: &str = "pattern_library";
/// Prefix for base64 document payloads.
pub const PAYLOAD_PREFIX: &str = "document_payload:";
/// Prefix for per-document session caches.
pub const SESSION_CACHE_PREFIX: &str = "session_cache:";

pub fn payload_key(document_id: &str) -> String {
    format!("{PAYLOAD_PREFIX}{document_id}")
}

pub fn session_cache_key(document_id: &str) -> String {
    format!("{SESSION_CACHE_PREFIX}{document_id}")
}

/// Abstract key-value backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](KvStore::get) | Read a value |
/// | [`put`](KvStore::put) | Insert or overwrite a value |
/// | [`delete`](KvStore::delete) | Remove a key, returning whether it existed |
/// | [`keys_with_prefix`](KvStore::keys_with_prefix) | List keys, sorted |
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Read and deserialize a JSON value.
pub async fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("Stored value under '{key}' is not valid JSON"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Serialize and write a JSON value.
pub async fn put_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize value for '{key}'"))?;
    store.put(key, &raw).await
}
