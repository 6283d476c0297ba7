//! User-activity detection.
//!
//! The host feeds raw interaction signals into an [`ActivityFeed`]; the
//! runtime reads them from the [`ActivityMonitor`] only while an
//! [`ActivityListener`] is alive. Dropping the listener is detaching.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Interaction signals that can count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    /// Mouse or pen pressed.
    PointerDown,
    /// Key pressed.
    KeyDown,
    /// Touch began.
    TouchStart,
    /// Scrolled.
    Scroll,
}

impl ActivityKind {
    /// Every kind, in declaration order.
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::PointerDown,
        ActivityKind::KeyDown,
        ActivityKind::TouchStart,
        ActivityKind::Scroll,
    ];
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PointerDown => "pointer-down",
            Self::KeyDown => "key-down",
            Self::TouchStart => "touch-start",
            Self::Scroll => "scroll",
        };
        f.write_str(s)
    }
}

/// Host-side sender for interaction signals. Cheap to clone.
#[derive(Clone)]
pub struct ActivityFeed {
    tx: mpsc::UnboundedSender<ActivityKind>,
    attached: Arc<AtomicBool>,
}

impl ActivityFeed {
    /// Reports one interaction. Returns `false` when nobody is listening,
    /// in which case the signal is dropped.
    pub fn signal(&self, kind: ActivityKind) -> bool {
        if !self.attached.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(kind).is_ok()
    }
}

/// Runtime-side receiver for interaction signals.
pub struct ActivityMonitor {
    kinds: HashSet<ActivityKind>,
    attached: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<ActivityKind>,
    rx: mpsc::UnboundedReceiver<ActivityKind>,
}

impl ActivityMonitor {
    /// A detached monitor that accepts only `kinds`.
    pub fn new(kinds: impl IntoIterator<Item = ActivityKind>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            kinds: kinds.into_iter().collect(),
            attached: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    /// A sender the host can hand to its event handlers.
    pub fn feed(&self) -> ActivityFeed {
        ActivityFeed {
            tx: self.tx.clone(),
            attached: Arc::clone(&self.attached),
        }
    }

    /// Starts listening. Listening stops when the returned guard drops.
    ///
    /// Signals queued before attaching are discarded.
    pub fn attach(&mut self) -> ActivityListener {
        while self.rx.try_recv().is_ok() {}
        self.attached.store(true, Ordering::Release);
        ActivityListener {
            attached: Arc::clone(&self.attached),
        }
    }

    /// Whether a listener is currently alive.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Waits for the next accepted signal.
    ///
    /// Signals of unconfigured kinds, and signals still queued after
    /// detaching, are skipped.
    pub async fn next(&mut self) -> Option<ActivityKind> {
        loop {
            let kind = self.rx.recv().await?;
            if !self.attached.load(Ordering::Acquire) {
                trace!(%kind, "activity dropped, monitor detached");
                continue;
            }
            if self.kinds.contains(&kind) {
                return Some(kind);
            }
        }
    }
}

/// Keeps an [`ActivityMonitor`] attached while alive.
#[must_use = "dropping the listener detaches immediately"]
pub struct ActivityListener {
    attached: Arc<AtomicBool>,
}

impl Drop for ActivityListener {
    fn drop(&mut self) {
        self.attached.store(false, Ordering::Release);
    }
}
