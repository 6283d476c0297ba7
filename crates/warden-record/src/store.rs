//! The storage abstraction shared by all tabs.

use std::fmt;

use rand::Rng;
use tokio::sync::broadcast;

use crate::RecordError;

/// Identifies one tab (or window, or process) sharing the store.
///
/// Every write is tagged with its origin so that change notifications can
/// be suppressed in the tab that made them, mirroring how browser storage
/// events never fire in the writing tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u64);

impl TabId {
    /// A random tab id.
    pub fn random() -> Self {
        Self(rand::rng().random())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{:08x}", self.0 as u32)
    }
}

/// A change to one key, as seen by other tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// The key that changed.
    pub key: String,
    /// The new raw value, or `None` if the key was removed.
    pub new_value: Option<String>,
    /// The tab that made the change.
    pub origin: TabId,
}

/// Client-local key/value storage visible to every tab.
///
/// Writes are last-writer-wins. A write must be visible to `get` in the
/// same tab as soon as it returns; other tabs learn about it through
/// [`subscribe`](Self::subscribe).
///
/// # Trait bounds
///
/// - `Send + Sync` → one store is shared between a tab's runtime task and
///   the bus bridge task.
/// - `'static` → it lives as long as the tab.
pub trait SessionStore: Send + Sync + 'static {
    /// Reads the raw value under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, RecordError>;

    /// Writes `value` under `key`.
    fn set(&self, key: &str, value: &str, origin: TabId) -> Result<(), RecordError>;

    /// Removes `key`.
    fn remove(&self, key: &str, origin: TabId) -> Result<(), RecordError>;

    /// Atomically replaces the value under `key` with `new` (`None`
    /// removes it) if the current value equals `expected`.
    ///
    /// Returns `true` if the swap happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        origin: TabId,
    ) -> Result<bool, RecordError>;

    /// Subscribes to changes made by any tab, including this one.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}
