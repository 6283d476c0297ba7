//! File-based configuration.
//!
//! ```toml
//! idle_timeout_ms = 900000
//! max_warning_seconds = 60
//! poll_interval_ms = 500
//! activity_debounce_ms = 1000
//!
//! [storage]
//! namespace = "myapp"
//! backend = "file"
//! dir = "/run/user/1000/myapp-session"
//! ```
//!
//! Every field is optional; missing ones take the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_engine::{ActivityKind, EngineConfig};
use warden_record::RecordKeys;

use crate::WardenError;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    /// Inactivity before the warning, in milliseconds.
    pub idle_timeout_ms: u64,
    /// Countdown length in seconds (capped at 60).
    pub max_warning_seconds: u32,
    /// Slack after the countdown before the safety timeout, in ms.
    pub safety_margin_ms: u64,
    /// Record re-check interval, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum random delay before a tab's first poll, in milliseconds.
    pub poll_jitter_ms: u64,
    /// Interaction kinds that count as activity.
    pub activity_kinds: Vec<ActivityKind>,
    /// Smallest expiry move that activity writes to the record, in ms.
    pub activity_debounce_ms: u64,
    /// Where the shared record lives.
    pub storage: StorageConfig,
}

impl Default for WardenConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            idle_timeout_ms: millis(engine.idle_timeout),
            max_warning_seconds: engine.max_warning_seconds,
            safety_margin_ms: millis(engine.safety_margin),
            poll_interval_ms: millis(engine.poll_interval),
            poll_jitter_ms: millis(engine.poll_jitter),
            activity_kinds: engine.activity_kinds,
            activity_debounce_ms: millis(engine.activity_debounce),
            storage: StorageConfig::default(),
        }
    }
}

/// Which [`SessionStore`](warden_record::SessionStore) backs the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process only; tabs must share one process.
    #[default]
    Memory,
    /// A shared directory; tabs may live in different processes.
    File,
}

/// The `[storage]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Key prefix, so several apps can share one store.
    pub namespace: String,
    /// Backend kind.
    pub backend: Backend,
    /// Directory for the `file` backend.
    pub dir: Option<PathBuf>,
    /// How often the `file` backend scans for other processes' writes.
    pub watch_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: RecordKeys::DEFAULT_NAMESPACE.to_string(),
            backend: Backend::Memory,
            dir: None,
            watch_interval_ms: 100,
        }
    }
}

impl WardenConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, WardenError> {
        let config: Self =
            toml::from_str(source).map_err(|e| WardenError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| WardenError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// The engine settings this config describes.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            max_warning_seconds: self.max_warning_seconds,
            safety_margin: Duration::from_millis(self.safety_margin_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            countdown_tick: Duration::from_secs(1),
            poll_jitter: Duration::from_millis(self.poll_jitter_ms),
            activity_kinds: self.activity_kinds.clone(),
            activity_debounce: Duration::from_millis(self.activity_debounce_ms),
        }
        .validated()
    }

    /// Storage keys under the configured namespace.
    pub fn record_keys(&self) -> RecordKeys {
        RecordKeys::namespaced(&self.storage.namespace)
    }

    /// Rejects combinations that cannot work.
    pub(crate) fn check(&self) -> Result<(), WardenError> {
        if self.idle_timeout_ms == 0 {
            return Err(WardenError::Config("idle_timeout_ms must be positive".into()));
        }
        if self.storage.namespace.is_empty() {
            return Err(WardenError::Config("storage.namespace must not be empty".into()));
        }
        if self.storage.backend == Backend::File && self.storage.dir.is_none() {
            return Err(WardenError::Config(
                "storage.dir is required for the file backend".into(),
            ));
        }
        Ok(())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
