//! Cancellable single-shot and repeating timers.
//!
//! [`TimerQueue`] is the raw facility: schedule, cancel, wait for the next
//! fire. [`Timers`] layers one rule on top: each logical timer (a key) has
//! at most one live handle, and re-arming always cancels the old one first.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{trace, warn};

/// Smallest accepted repeat interval. Guards against a zero interval
/// turning the select loop into a busy spin.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Opaque identifier for a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// A timer that just fired, returned by [`TimerQueue::wait_next`].
#[derive(Debug, Clone)]
pub struct Fired<K> {
    /// The handle that fired.
    pub handle: TimerHandle,
    /// The key it was scheduled with.
    pub key: K,
    /// `true` if the timer stays scheduled (repeating).
    pub repeating: bool,
    /// How late the fire was relative to its deadline.
    pub late_by: Duration,
    /// Whole intervals skipped because the fire was late (repeating only).
    pub skipped: u64,
}

struct Entry<K> {
    key: K,
    deadline: Instant,
    period: Option<Duration>,
}

// ---------------------------------------------------------------------------
// TimerQueue
// ---------------------------------------------------------------------------

/// A set of pending timers driven by Tokio's clock.
///
/// A cancelled handle is removed immediately, so it can never fire.
/// Repeating timers that wake late are rescheduled from *now* (skipping
/// missed beats) rather than firing a burst of catch-up ticks.
pub struct TimerQueue<K> {
    entries: HashMap<TimerHandle, Entry<K>>,
    next_id: u64,
}

impl<K: Clone> TimerQueue<K> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Schedules `key` to fire once after `delay`.
    pub fn schedule_once(&mut self, delay: Duration, key: K) -> TimerHandle {
        self.insert(key, Instant::now() + delay, None)
    }

    /// Schedules `key` to fire every `interval`, first after one interval.
    pub fn schedule_repeating(&mut self, interval: Duration, key: K) -> TimerHandle {
        self.schedule_repeating_after(interval, interval, key)
    }

    /// Schedules `key` to fire first after `first`, then every `interval`.
    pub fn schedule_repeating_after(
        &mut self,
        first: Duration,
        interval: Duration,
        key: K,
    ) -> TimerHandle {
        let period = interval.max(MIN_INTERVAL);
        self.insert(key, Instant::now() + first, Some(period))
    }

    /// Cancels a timer. Returns `false` if it had already fired (single-shot)
    /// or was never scheduled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    /// Whether `handle` is still pending.
    pub fn is_live(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timers are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.earliest().map(|(_, deadline)| deadline)
    }

    /// Waits for the next timer to fire.
    ///
    /// With nothing scheduled this future pends forever, which lets
    /// `tokio::select!` keep serving its other branches. It is
    /// cancellation-safe: the queue is only mutated after the sleep
    /// completes, with no further await points.
    pub async fn wait_next(&mut self) -> Fired<K> {
        let Some((handle, deadline)) = self.earliest() else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(deadline).await;
        self.fire(handle, Instant::now())
    }

    fn insert(&mut self, key: K, deadline: Instant, period: Option<Duration>) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            handle,
            Entry {
                key,
                deadline,
                period,
            },
        );
        handle
    }

    /// Earliest deadline; ties go to the older handle so firing order is
    /// deterministic.
    fn earliest(&self) -> Option<(TimerHandle, Instant)> {
        self.entries
            .iter()
            .min_by_key(|(handle, entry)| (entry.deadline, handle.0))
            .map(|(handle, entry)| (*handle, entry.deadline))
    }

    fn fire(&mut self, handle: TimerHandle, now: Instant) -> Fired<K> {
        let Some(entry) = self.entries.get_mut(&handle) else {
            unreachable!("earliest() returned a handle that is not pending")
        };
        let late_by = now.saturating_duration_since(entry.deadline);
        let key = entry.key.clone();
        let period = entry.period;

        match period {
            Some(period) => {
                let skipped = (late_by.as_nanos() / period.as_nanos()) as u64;
                if skipped > 0 {
                    warn!(
                        %handle,
                        skipped,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "timer overrun, skipping ahead"
                    );
                }
                entry.deadline = now + period;
                trace!(%handle, "repeating timer fired");
                Fired {
                    handle,
                    key,
                    repeating: true,
                    late_by,
                    skipped,
                }
            }
            None => {
                self.entries.remove(&handle);
                trace!(%handle, "single-shot timer fired");
                Fired {
                    handle,
                    key,
                    repeating: false,
                    late_by,
                    skipped: 0,
                }
            }
        }
    }
}

impl<K: Clone> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// Keyed timers with at most one live handle per key.
///
/// ```text
/// arm(Poll) ──→ [handle 1 live]
/// arm(Poll) ──→ cancel 1, [handle 2 live]
/// disarm(Poll) ──→ cancel 2, nothing live
/// ```
pub struct Timers<K> {
    queue: TimerQueue<K>,
    slots: HashMap<K, TimerHandle>,
    /// Upper bound of random delay added to the first fire of a
    /// repeating timer, so tabs opened together don't poll in lockstep.
    jitter: Duration,
}

impl<K: Copy + Eq + Hash + fmt::Debug> Timers<K> {
    /// Creates an empty timer set with no jitter.
    pub fn new() -> Self {
        Self::with_jitter(Duration::ZERO)
    }

    /// Creates an empty timer set whose repeating timers get up to
    /// `jitter` of extra delay before their first fire.
    pub fn with_jitter(jitter: Duration) -> Self {
        Self {
            queue: TimerQueue::new(),
            slots: HashMap::new(),
            jitter,
        }
    }

    /// Arms `key` to fire once after `delay`, replacing any live handle.
    pub fn arm_once(&mut self, key: K, delay: Duration) -> TimerHandle {
        self.disarm(key);
        let handle = self.queue.schedule_once(delay, key);
        self.slots.insert(key, handle);
        handle
    }

    /// Arms `key` to fire every `interval`, replacing any live handle.
    pub fn arm_repeating(&mut self, key: K, interval: Duration) -> TimerHandle {
        self.disarm(key);
        let first = interval + self.random_jitter();
        let handle = self.queue.schedule_repeating_after(first, interval, key);
        self.slots.insert(key, handle);
        handle
    }

    /// Cancels `key`'s live handle. Returns `false` if nothing was armed.
    pub fn disarm(&mut self, key: K) -> bool {
        match self.slots.remove(&key) {
            Some(handle) => self.queue.cancel(handle),
            None => false,
        }
    }

    /// Cancels everything.
    pub fn disarm_all(&mut self) {
        for (_, handle) in self.slots.drain() {
            self.queue.cancel(handle);
        }
    }

    /// Whether `key` currently has a live handle.
    pub fn is_armed(&self, key: K) -> bool {
        self.slots
            .get(&key)
            .is_some_and(|handle| self.queue.is_live(*handle))
    }

    /// Number of live timers.
    pub fn live(&self) -> usize {
        self.queue.len()
    }

    /// Waits for the next armed timer and returns its key.
    ///
    /// Pends forever while nothing is armed.
    pub async fn next(&mut self) -> K {
        let fired = self.queue.wait_next().await;
        if !fired.repeating && self.slots.get(&fired.key) == Some(&fired.handle) {
            self.slots.remove(&fired.key);
        }
        fired.key
    }

    fn random_jitter(&self) -> Duration {
        let max_us = u64::try_from(self.jitter.as_micros()).unwrap_or(u64::MAX);
        if max_us == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::rng().random_range(0..max_us))
    }
}

impl<K: Copy + Eq + Hash + fmt::Debug> Default for Timers<K> {
    fn default() -> Self {
        Self::new()
    }
}
