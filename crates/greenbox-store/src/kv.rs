//! The key-value store abstraction and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Durable, synchronous get/set/remove of string-keyed JSON text.
///
/// Implementations make no attempt to validate what they hold; callers
/// decode values themselves and must guard against malformed data.
pub trait KeyValueStore: Send + Sync {
    /// Raw JSON text stored under `key`, if any.
    fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Store raw JSON text under `key`, replacing any previous value.
    fn set_raw(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed helpers on top of [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    /// Decode the value under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent and
    /// [`Error::Serialization`] when the stored text does not decode as `T`.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode `value` as JSON and store it under `key`.
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, &raw)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// Process-local store backed by a `HashMap`.
///
/// Nothing survives the process; used by tests and by the CLI when no
/// database can be opened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        level: u8,
    }

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.set_raw("a", "1").unwrap();
        assert_eq!(store.get_raw("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.len(), 1);

        store.set_raw("a", "2").unwrap();
        assert_eq!(store.get_raw("a").unwrap().as_deref(), Some("2"));

        store.remove("a").unwrap();
        assert!(store.get_raw("a").unwrap().is_none());
        // Removing twice is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn test_json_round_trip_through_ext() {
        let store = MemoryStore::new();
        let value = Sample {
            name: "basil".into(),
            level: 3,
        };

        store.set_json("sample", &value).unwrap();
        let back: Option<Sample> = store.get_json("sample").unwrap();
        assert_eq!(back, Some(value));
    }

    #[test]
    fn test_get_json_absent_is_none() {
        let store = MemoryStore::new();
        let value: Option<Sample> = store.get_json("missing").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_get_json_malformed_is_serialization_error() {
        let store = MemoryStore::new();
        store.set_raw("sample", "{not json").unwrap();

        let err = store.get_json::<Sample>("sample").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_ext_works_through_trait_object() {
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        store.set_json("n", &42u32).unwrap();
        assert_eq!(store.get_json::<u32>("n").unwrap(), Some(42));
    }
}
