//! Key-value store abstraction
//!
//! The tracker keeps all of its state as JSON blobs under string keys.
//! Backends implement [`KeyValueStore`]; [`MemoryStore`] is the in-process
//! implementation used by tests and ephemeral deployments.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::error::{StorageError, StorageResult};

/// A synchronous string-keyed blob store
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value for a key
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write (or overwrite) the raw value for a key
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a key; missing keys are not an error
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys starting with `prefix`, sorted
    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Name of the backend for health reporting
    fn backend_name(&self) -> &'static str;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.data
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .lock()?
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));

        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_memory_prefix_scan() {
        let store = MemoryStore::new();
        store.set("badge_u1_1", "{}").unwrap();
        store.set("badge_u1_5", "{}").unwrap();
        store.set("badge_u2_1", "{}").unwrap();
        store.set("reminder_u1", "{}").unwrap();

        let keys = store.keys_with_prefix("badge_u1_").unwrap();
        assert_eq!(keys, vec!["badge_u1_1", "badge_u1_5"]);
    }
}
