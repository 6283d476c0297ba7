//! `Warden` builder and tab factory.
//!
//! This is the entry point for applications. It picks the storage backend
//! from the configuration, holds the identity provider, and opens one
//! session runtime per tab.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use warden_bus::SessionBus;
use warden_clock::{Clock, SystemClock};
use warden_engine::{EngineConfig, IdentityProvider, SessionHandle, SessionRuntime};
use warden_record::{
    FileStore, MemoryStore, RecordError, RecordKeys, SessionStore, StorageChange, TabId,
};

use crate::{Backend, WardenConfig, WardenError};

/// The backend chosen at runtime from [`WardenConfig`].
#[derive(Clone)]
pub enum AnyStore {
    /// In-process store.
    Memory(MemoryStore),
    /// Directory-backed store.
    File(FileStore),
}

impl SessionStore for AnyStore {
    fn get(&self, key: &str) -> Result<Option<String>, RecordError> {
        match self {
            Self::Memory(s) => s.get(key),
            Self::File(s) => s.get(key),
        }
    }

    fn set(&self, key: &str, value: &str, origin: TabId) -> Result<(), RecordError> {
        match self {
            Self::Memory(s) => s.set(key, value, origin),
            Self::File(s) => s.set(key, value, origin),
        }
    }

    fn remove(&self, key: &str, origin: TabId) -> Result<(), RecordError> {
        match self {
            Self::Memory(s) => s.remove(key, origin),
            Self::File(s) => s.remove(key, origin),
        }
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        origin: TabId,
    ) -> Result<bool, RecordError> {
        match self {
            Self::Memory(s) => s.compare_and_swap(key, expected, new, origin),
            Self::File(s) => s.compare_and_swap(key, expected, new, origin),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        match self {
            Self::Memory(s) => s.subscribe(),
            Self::File(s) => s.subscribe(),
        }
    }
}

/// Builder for a [`Warden`].
///
/// Not generic: the identity type is fixed by [`build`](Self::build).
///
/// # Example
///
/// ```rust,ignore
/// use warden::prelude::*;
///
/// let warden = WardenBuilder::new()
///     .idle_timeout(Duration::from_secs(600))
///     .namespace("myapp")
///     .build(my_identity)?;
/// let tab = warden.open_tab()?;
/// tab.login().await?;
/// ```
pub struct WardenBuilder {
    config: WardenConfig,
}

impl WardenBuilder {
    /// Creates a builder with default settings (in-memory store).
    pub fn new() -> Self {
        Self {
            config: WardenConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: WardenConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the countdown length (capped at 60 seconds).
    pub fn max_warning_seconds(mut self, seconds: u32) -> Self {
        self.config.max_warning_seconds = seconds;
        self
    }

    /// Sets the storage key namespace.
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.config.storage.namespace = namespace.to_string();
        self
    }

    /// Uses a directory-backed store, shareable between processes.
    pub fn file_store(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.storage.backend = Backend::File;
        self.config.storage.dir = Some(dir.into());
        self
    }

    /// Opens the backend and returns a ready [`Warden`].
    ///
    /// Must be called from within a Tokio runtime when the file backend
    /// is selected.
    pub fn build<I: IdentityProvider>(self, identity: I) -> Result<Warden<I>, WardenError> {
        self.config.check()?;
        let storage = &self.config.storage;
        let store = match storage.backend {
            Backend::Memory => AnyStore::Memory(MemoryStore::new()),
            Backend::File => {
                let dir = storage
                    .dir
                    .as_ref()
                    .ok_or_else(|| WardenError::Config("storage.dir is required".into()))?;
                let watch = Duration::from_millis(storage.watch_interval_ms);
                AnyStore::File(FileStore::open(dir, watch)?)
            }
        };

        tracing::info!(
            namespace = %storage.namespace,
            backend = ?storage.backend,
            idle_timeout_ms = self.config.idle_timeout_ms,
            "warden ready"
        );

        Ok(Warden {
            engine: self.config.engine_config(),
            keys: self.config.record_keys(),
            store: Arc::new(store),
            identity: Arc::new(identity),
        })
    }
}

impl Default for WardenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured session warden: one store, one identity provider, any
/// number of tabs.
pub struct Warden<I: IdentityProvider> {
    engine: EngineConfig,
    keys: RecordKeys,
    store: Arc<AnyStore>,
    identity: Arc<I>,
}

impl<I: IdentityProvider> Warden<I> {
    /// Opens a new tab on the system clock.
    pub fn open_tab(&self) -> Result<SessionHandle, WardenError> {
        self.open_tab_with_clock(SystemClock)
    }

    /// Opens a new tab reading time from `clock`.
    pub fn open_tab_with_clock<C: Clock>(&self, clock: C) -> Result<SessionHandle, WardenError> {
        let bus = SessionBus::new(Arc::clone(&self.store), self.keys.clone(), TabId::random())?;
        Ok(SessionRuntime::spawn(
            self.engine.clone(),
            bus,
            Arc::clone(&self.identity),
            clock,
        ))
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<AnyStore> {
        &self.store
    }

    /// The storage keys in use.
    pub fn keys(&self) -> &RecordKeys {
        &self.keys
    }

    /// The validated engine settings every tab runs with.
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }
}
