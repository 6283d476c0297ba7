//! Cross-process storage backend: one JSON file per key in a directory.
//!
//! ```text
//! <dir>/
//!   warden.session.json      {"key":"warden.session","origin":..,"value":"{..}"}
//!   warden.loggingOut.json   {"key":"warden.loggingOut","origin":..,"value":"false"}
//!   .warden.lock             held only during compare-and-swap
//! ```
//!
//! Writes go to a temporary file that is then renamed over the target, so
//! a reader never sees a half-written value. Removal writes a tombstone
//! (`"value": null`) instead of deleting, so the remover's tab id survives
//! for change notifications.
//!
//! Other processes cannot push notifications to us, so a watcher task
//! re-reads the directory every `watch_interval` and reports any file whose
//! content changed. That is the file-system stand-in for browser storage
//! events.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::{RecordError, SessionStore, StorageChange, TabId};

const CHANGE_CAPACITY: usize = 256;
const LOCK_FILE: &str = ".warden.lock";
/// Lock retries sleep the calling thread, which is usually a runtime
/// worker; attempts × retry bounds that stall at about 20 ms.
const LOCK_ATTEMPTS: u32 = 20;
const LOCK_RETRY: Duration = Duration::from_millis(1);
/// A lock older than this was left behind by a crashed process.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    key: String,
    origin: u64,
    value: Option<String>,
}

struct Inner {
    dir: PathBuf,
    changes: broadcast::Sender<StorageChange>,
    watcher: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// A [`SessionStore`] backed by files in a shared directory.
///
/// Clones share one watcher; it stops when the last clone is dropped.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<Inner>,
}

impl FileStore {
    /// Opens (creating if needed) a store in `dir` and starts watching it.
    ///
    /// Must be called from within a Tokio runtime, since the watcher is a
    /// spawned task.
    ///
    /// # Errors
    /// - [`RecordError::NoRuntime`] outside of a runtime
    /// - [`RecordError::Io`] if the directory cannot be created or listed
    pub fn open(dir: impl AsRef<Path>, watch_interval: Duration) -> Result<Self, RecordError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| RecordError::NoRuntime)?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(RecordError::Io)?;

        // Existing files are the baseline; only later edits are changes.
        let seen = snapshot(&dir)?;
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let watcher = runtime.spawn(watch(
            dir.clone(),
            changes.clone(),
            watch_interval.max(Duration::from_millis(1)),
            seen,
        ));

        debug!(dir = %dir.display(), "file store opened");

        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                changes,
                watcher,
            }),
        })
    }

    /// The directory holding the store's files.
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.inner.dir.join(file_name(key))
    }

    fn write_envelope(
        &self,
        key: &str,
        value: Option<&str>,
        origin: TabId,
    ) -> Result<(), RecordError> {
        let envelope = Envelope {
            key: key.to_string(),
            origin: origin.0,
            value: value.map(str::to_string),
        };
        let bytes = serde_json::to_vec(&envelope).map_err(RecordError::Encode)?;
        let target = self.path_for(key);
        let tmp = self
            .inner
            .dir
            .join(format!(".{}.{:x}.tmp", file_name(key), origin.0));
        fs::write(&tmp, bytes).map_err(RecordError::Io)?;
        fs::rename(&tmp, &target).map_err(RecordError::Io)
    }

    /// Takes the directory lock, blocking the thread between attempts.
    fn lock(&self) -> Result<LockGuard, RecordError> {
        let path = self.inner.dir.join(LOCK_FILE);
        for _ in 0..LOCK_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(LockGuard { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) {
                        warn!(path = %path.display(), "removing stale storage lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(RecordError::Io(e)),
            }
        }
        Err(RecordError::LockContended(path.display().to_string()))
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, RecordError> {
        let raw = match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RecordError::Io(e)),
        };
        let envelope: Envelope = serde_json::from_str(&raw).map_err(RecordError::Decode)?;
        Ok(envelope.value)
    }

    fn set(&self, key: &str, value: &str, origin: TabId) -> Result<(), RecordError> {
        self.write_envelope(key, Some(value), origin)
    }

    fn remove(&self, key: &str, origin: TabId) -> Result<(), RecordError> {
        if self.get(key)?.is_none() {
            return Ok(());
        }
        self.write_envelope(key, None, origin)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        origin: TabId,
    ) -> Result<bool, RecordError> {
        let _lock = self.lock()?;
        let current = self.get(key)?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.write_envelope(key, new, origin)?;
        Ok(true)
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.changes.subscribe()
    }
}

/// Removes the lock file when the compare-and-swap finishes, on every path.
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > LOCK_STALE_AFTER)
}

/// Maps a key to a safe file name: anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
fn file_name(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.json")
}

fn is_value_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    !hidden && path.extension().and_then(|e| e.to_str()) == Some("json")
}

fn snapshot(dir: &Path) -> Result<HashMap<PathBuf, String>, RecordError> {
    let mut seen = HashMap::new();
    for entry in fs::read_dir(dir).map_err(RecordError::Io)? {
        let path = entry.map_err(RecordError::Io)?.path();
        if !is_value_file(&path) {
            continue;
        }
        if let Ok(raw) = fs::read_to_string(&path) {
            seen.insert(path, raw);
        }
    }
    Ok(seen)
}

async fn watch(
    dir: PathBuf,
    changes: broadcast::Sender<StorageChange>,
    interval: Duration,
    mut seen: HashMap<PathBuf, String>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot list storage directory");
                continue;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !is_value_file(&path) {
                continue;
            }
            let Ok(raw) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            if seen.get(&path) == Some(&raw) {
                continue;
            }
            match serde_json::from_str::<Envelope>(&raw) {
                Ok(envelope) => {
                    let _ = changes.send(StorageChange {
                        key: envelope.key,
                        new_value: envelope.value,
                        origin: TabId(envelope.origin),
                    });
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "ignoring unreadable storage file");
                }
            }
            seen.insert(path, raw);
        }
    }
}
