//! Persistent key-value storage abstraction.
//!
//! The platform supplies the real backing store (secure storage on device,
//! `localStorage` on web); this crate only needs plain string key-value
//! semantics with JSON-serialized records. [`MemoryStore`] backs tests and
//! ephemeral in-process use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Fixed storage keys for session data.
pub mod keys {
    /// Key for the bearer auth token.
    pub const AUTH_TOKEN: &str = "mibu.auth_token";

    /// Key for the serialized user record.
    pub const USER: &str = "mibu.user";

    /// Key for the serialized collection array.
    pub const COLLECTION: &str = "mibu.collection";

    /// Key for the language preference.
    pub const LANGUAGE: &str = "mibu.language";

    /// Key for the last successfully fetched avatar preset list.
    pub const AVATAR_PRESETS: &str = "mibu.avatar_presets";
}

/// Errors that can occur against the backing store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The platform storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be (de)serialized.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Plain string key-value persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key; absent keys are not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read a JSON-serialized record.
///
/// # Errors
///
/// Returns `StorageError::Parse` when the stored value is not valid JSON
/// for `T`, or the backend's error when the read fails.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Write a record as JSON.
///
/// # Errors
///
/// Returns the backend's error when the write fails.
pub async fn set_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
