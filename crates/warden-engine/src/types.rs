//! Inputs, effects, and states of the lifecycle machine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_record::SessionClock;

use crate::WarningView;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where one tab is in the session lifecycle.
///
/// ```text
/// Unauthenticated ──(login / adopt)──→ Active ──(idle)──→ Warning
///        ↑                               ↑ ↺ activity        │
///        │                               └───(extend)────────┤
///        └──────────(expire / logout)────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session. Nothing is armed.
    Unauthenticated,
    /// Logged in; polling for idle expiry and listening for activity.
    Active,
    /// Countdown visible. Activity is ignored; only Extend dismisses it.
    Warning {
        /// Seconds left on the countdown.
        remaining_seconds: u32,
    },
}

impl Phase {
    /// Returns `true` while a session exists in this tab.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }

    /// Returns `true` while the countdown is showing.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning { .. })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Unauthenticated"),
            Self::Active => write!(f, "Active"),
            Self::Warning { remaining_seconds } => write!(f, "Warning({remaining_seconds}s)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// The three logical timers a tab can have armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Repeating wall-clock check against the record.
    Poll,
    /// Repeating one-second countdown step.
    Countdown,
    /// Single-shot backstop that force-expires a stuck warning.
    Safety,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything that can happen to a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Authentication succeeded in this tab.
    Login,
    /// The activity monitor saw user interaction.
    Activity,
    /// The user chose "Extend" (or the app extended programmatically).
    Extend,
    /// The user chose "Logout now" (or the app logged out).
    LogoutNow,
    /// The poll timer fired; carries the freshly read record.
    Poll(SessionClock),
    /// A change notification arrived; carries the freshly read record.
    RecordChanged(SessionClock),
    /// The countdown timer fired.
    CountdownTick,
    /// The safety timer fired.
    SafetyTimeout,
    /// A `refresh_credential()` call failed.
    RefreshFailed,
    /// The tab is going away. Stops everything without logging out.
    Teardown,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// The countdown ran out.
    CountdownElapsed,
    /// The safety backstop fired while the warning was still up.
    SafetyTimeout,
    /// The user (or the app) logged out.
    UserLogout,
    /// The tab woke up after the whole warning window had passed.
    StaleWakeup,
    /// Another tab ended the session.
    LoggedOutElsewhere,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CountdownElapsed => "countdown elapsed",
            Self::SafetyTimeout => "safety timeout",
            Self::UserLogout => "user logout",
            Self::StaleWakeup => "stale wakeup",
            Self::LoggedOutElsewhere => "logged out elsewhere",
        };
        f.write_str(s)
    }
}

/// Application-level notifications, for any UI that cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionSignal {
    /// The warning was raised.
    AboutToExpire {
        /// Countdown length at warning entry.
        remaining_seconds: u32,
    },
    /// The warning was dismissed by an extension (here or in another tab).
    Extended,
    /// The session is over; show the logged-out view.
    Expired {
        /// Why it ended.
        reason: ExpiryReason,
    },
}

/// Work the runner must do after a transition.
///
/// The engine never touches timers, storage, or the network itself. It
/// returns these, in order, and the runner executes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Persist the clock to the shared record (and notify same-tab).
    WriteRecord(SessionClock),
    /// (Re-)arm a repeating timer.
    ArmRepeating {
        /// Which timer.
        timer: TimerKind,
        /// Interval between fires.
        every: Duration,
    },
    /// (Re-)arm a single-shot timer.
    ArmOnce {
        /// Which timer.
        timer: TimerKind,
        /// Delay before it fires.
        after: Duration,
    },
    /// Cancel a timer.
    Disarm(TimerKind),
    /// Start listening for user activity.
    AttachActivity,
    /// Stop listening for user activity.
    DetachActivity,
    /// Push a new state to the warning surface.
    Render(WarningView),
    /// Ask the identity provider to refresh the credential.
    RefreshCredential,
    /// Drop credential material held by this tab. Precedes every expiry,
    /// whether or not this tab terminates.
    ClearLocalCredentials,
    /// End the session for every tab by clearing the record and revoking
    /// the credential. Guarded by the logout latch.
    Terminate {
        /// Why.
        reason: ExpiryReason,
    },
    /// Broadcast an application signal.
    Emit(SessionSignal),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Active.to_string(), "Active");
        assert_eq!(
            Phase::Warning {
                remaining_seconds: 12
            }
            .to_string(),
            "Warning(12s)"
        );
        assert!(!Phase::Unauthenticated.is_authenticated());
    }

    #[test]
    fn test_signal_serializes_tagged() {
        let json = serde_json::to_string(&SessionSignal::Expired {
            reason: ExpiryReason::LoggedOutElsewhere,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"expired","reason":"logged_out_elsewhere"}"#);
    }
}
