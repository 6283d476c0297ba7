//! Wall clocks: where "now" comes from.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// An absolute instant, in milliseconds since the Unix epoch.
///
/// Serialized as a bare integer (`#[serde(transparent)]`) so the persisted
/// record reads `"expiresAt": 1700000000000` rather than a nested object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Creates a timestamp from raw epoch milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns the raw epoch milliseconds.
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns `self + d`, saturating at `u64::MAX`.
    pub fn saturating_add(self, d: Duration) -> Self {
        let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(ms))
    }

    /// Time from `earlier` to `self`, or zero if `earlier` is later.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Whole seconds from `now` until `self`, rounded up.
    ///
    /// 59.2 s left reads as 60, so a countdown shown the moment a deadline
    /// is detected starts at its full length. Zero once `self` has passed.
    pub fn ceil_secs_after(self, now: Timestamp) -> u64 {
        self.0.saturating_sub(now.0).div_ceil(1000)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = i64::try_from(self.0).ok();
        match ms.and_then(DateTime::<Utc>::from_timestamp_millis) {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// A source of wall-clock time.
///
/// Injected everywhere "now" matters so that tests can drive time by hand
/// instead of sleeping.
pub trait Clock: Send + Sync + 'static {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // Pre-1970 clocks are treated as the epoch itself.
        let ms = Utc::now().timestamp_millis();
        Timestamp(u64::try_from(ms).unwrap_or(0))
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so several simulated tabs can
/// observe one clock.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start.0)),
        }
    }

    /// Moves time forward by `d`.
    pub fn advance(&self, d: Duration) {
        let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jumps to an absolute instant (may go backwards).
    pub fn set(&self, to: Timestamp) {
        self.now_ms.store(to.0, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now_ms.load(Ordering::SeqCst))
    }
}

/// Wall-clock time derived from Tokio's clock.
///
/// Reads as `base + elapsed-since-creation`, where elapsed time comes from
/// `tokio::time::Instant`. Under `#[tokio::test(start_paused = true)]` the
/// wall clock therefore advances in lockstep with the timers, which keeps
/// whole-runtime tests deterministic.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: Timestamp,
    origin: tokio::time::Instant,
}

impl TokioClock {
    /// Anchors the clock at the current system time.
    pub fn new() -> Self {
        Self::starting_at(SystemClock.now())
    }

    /// Anchors the clock at an arbitrary wall-clock instant.
    pub fn starting_at(base: Timestamp) -> Self {
        Self {
            base,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        self.base.saturating_add(self.origin.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceil_secs_after_rounds_up_partial_seconds() {
        let deadline = Timestamp(60_000);
        assert_eq!(deadline.ceil_secs_after(Timestamp(0)), 60);
        assert_eq!(deadline.ceil_secs_after(Timestamp(500)), 60);
        assert_eq!(deadline.ceil_secs_after(Timestamp(1_000)), 59);
        assert_eq!(deadline.ceil_secs_after(Timestamp(59_999)), 1);
    }

    #[test]
    fn test_ceil_secs_after_past_deadline_is_zero() {
        assert_eq!(Timestamp(1_000).ceil_secs_after(Timestamp(1_000)), 0);
        assert_eq!(Timestamp(1_000).ceil_secs_after(Timestamp(9_000)), 0);
    }

    #[test]
    fn test_saturating_add_and_since() {
        let t = Timestamp(1_000).saturating_add(Duration::from_millis(250));
        assert_eq!(t, Timestamp(1_250));
        assert_eq!(
            t.saturating_duration_since(Timestamp(1_000)),
            Duration::from_millis(250)
        );
        assert_eq!(
            Timestamp(1_000).saturating_duration_since(t),
            Duration::ZERO
        );
    }

    #[test]
    fn test_timestamp_serializes_as_bare_integer() {
        let json = serde_json::to_string(&Timestamp(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_timestamp_display_is_rfc3339() {
        assert_eq!(Timestamp(0).to_string(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let a = ManualClock::starting_at(Timestamp(10));
        let b = a.clone();
        a.advance(Duration::from_millis(5));
        assert_eq!(b.now(), Timestamp(15));
        b.set(Timestamp(3));
        assert_eq!(a.now(), Timestamp(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::starting_at(Timestamp(1_000));
        tokio::time::advance(Duration::from_millis(750)).await;
        assert_eq!(clock.now(), Timestamp(1_750));
    }
}
