//! Session record types: the data every tab agrees on.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_clock::Timestamp;

// ---------------------------------------------------------------------------
// SessionClock
// ---------------------------------------------------------------------------

/// The shared idle clock of one logged-in session.
///
/// Persisted as `{"active": .., "expiresAt": .., "warningActive": ..}`.
///
/// Invariants (checked by [`is_consistent`](Self::is_consistent)):
/// - `warning_active` implies `active`
/// - `active` implies `expires_at` is set
///
/// Once a warning is raised, `expires_at` is frozen and only used to
/// compute how much of the countdown is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClock {
    /// `true` while the session is considered logged in.
    pub active: bool,
    /// Instant after which the session is idle-expired unless extended.
    pub expires_at: Option<Timestamp>,
    /// `true` while a countdown warning is showing in at least one tab.
    pub warning_active: bool,
}

impl SessionClock {
    /// The logged-out clock: every field cleared.
    pub fn inactive() -> Self {
        Self::default()
    }

    /// A fresh clock for a session that just started or was extended.
    pub fn started(now: Timestamp, idle_timeout: Duration) -> Self {
        Self {
            active: true,
            expires_at: Some(now.saturating_add(idle_timeout)),
            warning_active: false,
        }
    }

    /// The same clock with the warning flag raised.
    pub fn warned(self) -> Self {
        Self {
            warning_active: true,
            ..self
        }
    }

    /// Whether the field invariants hold.
    pub fn is_consistent(&self) -> bool {
        if self.warning_active && !self.active {
            return false;
        }
        !self.active || self.expires_at.is_some()
    }

    /// The instant the countdown runs out: `expires_at + grace`.
    ///
    /// `None` for an inactive clock.
    pub fn deadline(&self, grace: Duration) -> Option<Timestamp> {
        if !self.active {
            return None;
        }
        self.expires_at.map(|at| at.saturating_add(grace))
    }
}

// ---------------------------------------------------------------------------
// RecordKeys
// ---------------------------------------------------------------------------

/// Storage keys for the session record and its companion logout flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKeys {
    /// Key holding the serialized [`SessionClock`].
    pub session: String,
    /// Key holding the "logout in flight" boolean.
    pub logging_out: String,
}

impl RecordKeys {
    /// Default namespace for the keys.
    pub const DEFAULT_NAMESPACE: &'static str = "warden";

    /// Keys under `namespace`, e.g. `myapp.session` / `myapp.loggingOut`.
    pub fn namespaced(namespace: &str) -> Self {
        Self {
            session: format!("{namespace}.session"),
            logging_out: format!("{namespace}.loggingOut"),
        }
    }
}

impl Default for RecordKeys {
    fn default() -> Self {
        Self::namespaced(Self::DEFAULT_NAMESPACE)
    }
}
