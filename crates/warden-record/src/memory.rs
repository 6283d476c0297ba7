//! In-process storage backend.
//!
//! Clones of a [`MemoryStore`] share the same map, so several simulated
//! tabs inside one process (tests, demos) see each other's writes exactly
//! like browser tabs share local storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::{RecordError, SessionStore, StorageChange, TabId};

/// Capacity of the change channel. A subscriber that falls this far
/// behind sees `Lagged` and must re-read the store.
const CHANGE_CAPACITY: usize = 256;

struct Inner {
    values: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<StorageChange>,
}

/// A shared in-memory key/value store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                values: Mutex::new(HashMap::new()),
                changes,
            }),
        }
    }

    /// Locks the map. A panic while holding the lock cannot leave the map
    /// half-updated (every operation is a single insert/remove), so a
    /// poisoned lock is simply recovered.
    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.inner
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, key: &str, new_value: Option<String>, origin: TabId) {
        // No subscribers is fine: nobody else is listening yet.
        let _ = self.inner.changes.send(StorageChange {
            key: key.to_string(),
            new_value,
            origin,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, RecordError> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, origin: TabId) -> Result<(), RecordError> {
        self.values().insert(key.to_string(), value.to_string());
        self.notify(key, Some(value.to_string()), origin);
        Ok(())
    }

    fn remove(&self, key: &str, origin: TabId) -> Result<(), RecordError> {
        let existed = self.values().remove(key).is_some();
        if existed {
            self.notify(key, None, origin);
        }
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        origin: TabId,
    ) -> Result<bool, RecordError> {
        {
            let mut values = self.values();
            if values.get(key).map(String::as_str) != expected {
                return Ok(false);
            }
            match new {
                Some(v) => values.insert(key.to_string(), v.to_string()),
                None => values.remove(key),
            };
        }
        self.notify(key, new.map(str::to_string), origin);
        Ok(true)
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: TabId = TabId(1);
    const B: TabId = TabId(2);

    #[test]
    fn test_set_is_visible_to_clones_immediately() {
        let store = MemoryStore::new();
        let other_tab = store.clone();

        store.set("k", "v", A).unwrap();

        assert_eq!(other_tab.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_subscribe_reports_origin_of_each_write() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.set("k", "1", A).unwrap();
        store.remove("k", B).unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.origin, A);
        assert_eq!(first.new_value.as_deref(), Some("1"));
        let second = rx.try_recv().unwrap();
        assert_eq!(second.origin, B);
        assert_eq!(second.new_value, None);
    }

    #[test]
    fn test_remove_missing_key_is_silent() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.remove("absent", A).unwrap();

        assert!(rx.try_recv().is_err(), "nothing changed, nothing to report");
    }

    #[test]
    fn test_compare_and_swap_only_one_winner() {
        let store = MemoryStore::new();

        assert!(store.compare_and_swap("flag", None, Some("true"), A).unwrap());
        assert!(!store.compare_and_swap("flag", None, Some("true"), B).unwrap());
        assert!(
            store
                .compare_and_swap("flag", Some("true"), Some("false"), A)
                .unwrap()
        );
        assert_eq!(store.get("flag").unwrap().as_deref(), Some("false"));
    }

    #[test]
    fn test_compare_and_swap_to_none_removes_key() {
        let store = MemoryStore::new();
        store.set("flag", "true", A).unwrap();

        assert!(store.compare_and_swap("flag", Some("true"), None, A).unwrap());
        assert_eq!(store.get("flag").unwrap(), None);
    }
}
