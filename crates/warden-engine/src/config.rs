//! Engine configuration.

use std::time::Duration;

use tracing::warn;

use crate::ActivityKind;

/// Timeouts and intervals that drive the session lifecycle.
///
/// Every budget is a field rather than a constant so tests can shrink them.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Inactivity allowed before the warning is raised.
    pub idle_timeout: Duration,

    /// Length of the visible countdown, in seconds. Capped at
    /// [`Self::MAX_WARNING_SECONDS`] regardless of the idle timeout.
    pub max_warning_seconds: u32,

    /// Extra time after the countdown's full length before the safety
    /// timeout force-expires a session stuck in the warning.
    pub safety_margin: Duration,

    /// How often the record is re-checked against the wall clock.
    /// Bounds detection latency; timers are never trusted to be exact.
    pub poll_interval: Duration,

    /// Countdown step. One tick removes exactly one second.
    pub countdown_tick: Duration,

    /// Up to this much random delay before a tab's first poll, so tabs
    /// opened together do not poll in lockstep.
    pub poll_jitter: Duration,

    /// Interaction signals that count as activity.
    pub activity_kinds: Vec<ActivityKind>,

    /// Activity that would move the expiry by less than this is not
    /// written to the record. An explicit extend always writes.
    pub activity_debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(15 * 60),
            max_warning_seconds: Self::MAX_WARNING_SECONDS,
            safety_margin: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            countdown_tick: Duration::from_secs(1),
            poll_jitter: Duration::from_millis(50),
            activity_kinds: ActivityKind::ALL.to_vec(),
            activity_debounce: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Hard cap on the countdown length.
    pub const MAX_WARNING_SECONDS: u32 = 60;

    /// Fastest accepted poll interval.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// A config with the given idle timeout and default everything else.
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Engine::new`](crate::Engine::new). Rules:
    /// - `max_warning_seconds` clamped to `1..=60`
    /// - `poll_interval` at least [`Self::MIN_POLL_INTERVAL`]
    /// - `countdown_tick` and `idle_timeout` non-zero
    /// - `activity_debounce` at most half the idle timeout
    pub fn validated(mut self) -> Self {
        if self.max_warning_seconds > Self::MAX_WARNING_SECONDS {
            warn!(
                requested = self.max_warning_seconds,
                max = Self::MAX_WARNING_SECONDS,
                "max_warning_seconds exceeds cap, clamping"
            );
        }
        self.max_warning_seconds = self.max_warning_seconds.clamp(1, Self::MAX_WARNING_SECONDS);
        self.poll_interval = self.poll_interval.max(Self::MIN_POLL_INTERVAL);
        if self.countdown_tick.is_zero() {
            self.countdown_tick = Duration::from_secs(1);
        }
        if self.idle_timeout.is_zero() {
            self.idle_timeout = Duration::from_millis(1);
        }
        self.activity_debounce = self.activity_debounce.min(self.idle_timeout / 2);
        self
    }

    /// Time between `expires_at` and the end of the countdown.
    pub fn grace(&self) -> Duration {
        Duration::from_secs(u64::from(self.max_warning_seconds))
    }

    /// Delay of the safety timeout, measured from warning entry.
    pub fn safety_timeout(&self) -> Duration {
        self.grace() + self.safety_margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_warning_seconds, 60);
        assert_eq!(cfg.poll_interval, Duration::from_millis(500));
        assert_eq!(cfg.safety_timeout(), Duration::from_secs(70));
        assert_eq!(cfg.activity_kinds.len(), 4);
        assert_eq!(cfg.activity_debounce, Duration::from_secs(1));
    }

    #[test]
    fn test_validated_bounds_debounce_by_idle_timeout() {
        let cfg = EngineConfig {
            activity_debounce: Duration::from_secs(30),
            ..EngineConfig::with_idle_timeout(Duration::from_secs(4))
        }
        .validated();
        assert_eq!(cfg.activity_debounce, Duration::from_secs(2));
    }

    #[test]
    fn test_validated_caps_warning_at_sixty() {
        let cfg = EngineConfig {
            max_warning_seconds: 600,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.max_warning_seconds, 60);
    }

    #[test]
    fn test_validated_fixes_zero_values() {
        let cfg = EngineConfig {
            max_warning_seconds: 0,
            poll_interval: Duration::ZERO,
            countdown_tick: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.max_warning_seconds, 1);
        assert_eq!(cfg.poll_interval, EngineConfig::MIN_POLL_INTERVAL);
        assert_eq!(cfg.countdown_tick, Duration::from_secs(1));
        assert!(!cfg.idle_timeout.is_zero());
    }

    #[test]
    fn test_safety_timeout_tracks_warning_length() {
        let cfg = EngineConfig {
            max_warning_seconds: 30,
            safety_margin: Duration::from_secs(5),
            ..Default::default()
        };
        assert_eq!(cfg.grace(), Duration::from_secs(30));
        assert_eq!(cfg.safety_timeout(), Duration::from_secs(35));
    }
}
