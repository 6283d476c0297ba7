//! The session lifecycle state machine.
//!
//! [`Engine`] is pure: it owns no timers, no storage, no tasks. Each call to
//! [`Engine::handle`] takes one [`Input`] and the current wall-clock time
//! and returns the [`Effect`]s the runner must carry out. That keeps every
//! race in this module testable with plain timestamps.

use tracing::{debug, info, trace, warn};
use warden_clock::Timestamp;
use warden_record::SessionClock;

use crate::{
    Effect, EngineConfig, ExpiryReason, Input, Phase, SessionSignal, TimerKind, WarningView,
};

/// One tab's view of the session lifecycle.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    phase: Phase,
    /// Local mirror of the shared record, as last written or adopted.
    clock: SessionClock,
    /// A credential refresh failed; retry on the next activity.
    refresh_owed: bool,
}

impl Engine {
    /// Creates an unauthenticated engine. The config is validated first.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: config.validated(),
            phase: Phase::Unauthenticated,
            clock: SessionClock::inactive(),
            refresh_owed: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Local mirror of the shared record.
    pub fn clock(&self) -> SessionClock {
        self.clock
    }

    /// The validated config.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a failed refresh is waiting to be retried.
    pub fn refresh_owed(&self) -> bool {
        self.refresh_owed
    }

    /// Applies one input at wall-clock time `now`.
    pub fn handle(&mut self, input: Input, now: Timestamp) -> Vec<Effect> {
        let mut fx = Vec::new();
        trace!(phase = %self.phase, ?input, "engine input");

        match input {
            Input::Login => self.on_login(now, &mut fx),
            Input::Activity => self.on_activity(now, &mut fx),
            Input::Extend => self.on_extend(now, &mut fx),
            Input::LogoutNow => {
                if self.phase.is_authenticated() {
                    self.expire(ExpiryReason::UserLogout, true, &mut fx);
                }
            }
            Input::Poll(record) | Input::RecordChanged(record) => {
                self.reconcile(record, now, &mut fx);
            }
            Input::CountdownTick => self.on_countdown_tick(&mut fx),
            Input::SafetyTimeout => {
                if self.phase.is_warning() {
                    warn!(phase = %self.phase, "safety timeout fired, forcing expiry");
                    self.expire(ExpiryReason::SafetyTimeout, true, &mut fx);
                }
            }
            Input::RefreshFailed => {
                if self.phase.is_authenticated() {
                    self.refresh_owed = true;
                }
            }
            Input::Teardown => self.teardown(&mut fx),
        }

        fx
    }

    // -----------------------------------------------------------------------
    // Local inputs
    // -----------------------------------------------------------------------

    fn on_login(&mut self, now: Timestamp, fx: &mut Vec<Effect>) {
        if self.phase.is_warning() {
            Self::leave_warning(fx);
        }
        self.refresh_owed = false;
        let clock = SessionClock::started(now, self.config.idle_timeout);
        self.enter_active(clock, true, fx);
        info!(expires_at = ?clock.expires_at, "session started");
    }

    fn on_activity(&mut self, now: Timestamp, fx: &mut Vec<Effect>) {
        // Activity never dismisses a warning.
        if self.phase != Phase::Active {
            trace!(phase = %self.phase, "activity ignored");
            return;
        }
        // Past expiry, another tab may already have raised the warning; an
        // extension here would overwrite it.
        if self.clock.expires_at.is_some_and(|expires_at| now >= expires_at) {
            debug!("activity after expiry, raising the warning instead");
            self.enter_warning(now, true, fx);
            return;
        }
        let clock = SessionClock::started(now, self.config.idle_timeout);
        if self.moves_expiry(clock) {
            self.clock = clock;
            fx.push(Effect::WriteRecord(clock));
        } else {
            trace!("activity within debounce, record unchanged");
        }
        self.retry_owed_refresh(fx);
    }

    /// Whether `clock` pushes the expiry at least one debounce past ours.
    fn moves_expiry(&self, clock: SessionClock) -> bool {
        let (Some(current), Some(next)) = (self.clock.expires_at, clock.expires_at) else {
            return true;
        };
        let debounce = u64::try_from(self.config.activity_debounce.as_millis()).unwrap_or(u64::MAX);
        next.0.saturating_sub(current.0) >= debounce
    }

    fn retry_owed_refresh(&mut self, fx: &mut Vec<Effect>) {
        if self.refresh_owed {
            debug!("retrying owed credential refresh");
            self.refresh_owed = false;
            fx.push(Effect::RefreshCredential);
        }
    }

    fn on_extend(&mut self, now: Timestamp, fx: &mut Vec<Effect>) {
        match self.phase {
            Phase::Unauthenticated => debug!("extend ignored, no session"),
            Phase::Active => {
                self.clock = SessionClock::started(now, self.config.idle_timeout);
                fx.push(Effect::WriteRecord(self.clock));
                self.retry_owed_refresh(fx);
            }
            Phase::Warning { remaining_seconds } => {
                Self::leave_warning(fx);
                fx.push(Effect::RefreshCredential);
                self.refresh_owed = false;
                let clock = SessionClock::started(now, self.config.idle_timeout);
                self.enter_active(clock, true, fx);
                fx.push(Effect::Emit(SessionSignal::Extended));
                info!(remaining_seconds, expires_at = ?clock.expires_at, "session extended");
            }
        }
    }

    fn on_countdown_tick(&mut self, fx: &mut Vec<Effect>) {
        let Phase::Warning { remaining_seconds } = self.phase else {
            // Stale tick from a countdown that should already be gone.
            fx.push(Effect::Disarm(TimerKind::Countdown));
            return;
        };
        let remaining_seconds = remaining_seconds.saturating_sub(1);
        if remaining_seconds == 0 {
            self.expire(ExpiryReason::CountdownElapsed, true, fx);
            return;
        }
        self.phase = Phase::Warning { remaining_seconds };
        fx.push(Effect::Render(WarningView::showing(remaining_seconds)));
    }

    fn teardown(&mut self, fx: &mut Vec<Effect>) {
        fx.extend([
            Effect::Disarm(TimerKind::Poll),
            Effect::Disarm(TimerKind::Countdown),
            Effect::Disarm(TimerKind::Safety),
            Effect::DetachActivity,
        ]);
        if self.phase.is_warning() {
            fx.push(Effect::Render(WarningView::hidden()));
        }
        debug!(phase = %self.phase, "engine torn down");
        self.phase = Phase::Unauthenticated;
        self.clock = SessionClock::inactive();
        self.refresh_owed = false;
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Brings local state in line with the shared record and the clock.
    ///
    /// Runs on every poll and every change notification, with the record
    /// freshly read; notification payloads are never trusted.
    fn reconcile(&mut self, record: SessionClock, now: Timestamp, fx: &mut Vec<Effect>) {
        let grace = self.config.grace();

        let (true, Some(expires_at), Some(deadline)) =
            (record.active, record.expires_at, record.deadline(grace))
        else {
            if self.phase.is_authenticated() {
                info!(phase = %self.phase, "session ended by another tab");
                self.expire(ExpiryReason::LoggedOutElsewhere, false, fx);
            }
            return;
        };

        if now >= deadline {
            match self.phase {
                Phase::Unauthenticated => debug!(%deadline, "ignoring stale session record"),
                Phase::Active if !record.warning_active => {
                    warn!(%deadline, %now, "woke up past the warning window");
                    self.expire(ExpiryReason::StaleWakeup, true, fx);
                }
                _ => self.expire(ExpiryReason::CountdownElapsed, true, fx),
            }
            return;
        }

        match self.phase {
            Phase::Unauthenticated => {
                info!(%expires_at, "adopting session from another tab");
                self.enter_active(record, false, fx);
                if record.warning_active {
                    self.enter_warning(now, false, fx);
                } else if now >= expires_at {
                    self.enter_warning(now, true, fx);
                }
            }
            Phase::Active => {
                if self.clock.expires_at != record.expires_at {
                    debug!(%expires_at, "adopting expiry from record");
                }
                self.clock = record;
                if record.warning_active {
                    // Another tab raised the warning; follow without writing.
                    self.enter_warning(now, false, fx);
                } else if now >= expires_at {
                    self.enter_warning(now, true, fx);
                }
            }
            Phase::Warning { .. } => {
                if record.warning_active {
                    self.clock = record;
                    return;
                }
                // Another tab extended; dismiss without a second refresh.
                info!(%expires_at, "warning dismissed by another tab");
                Self::leave_warning(fx);
                self.enter_active(record, false, fx);
                fx.push(Effect::Emit(SessionSignal::Extended));
                if now >= expires_at {
                    self.enter_warning(now, true, fx);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn enter_active(&mut self, clock: SessionClock, write: bool, fx: &mut Vec<Effect>) {
        self.phase = Phase::Active;
        self.clock = clock;
        if write {
            fx.push(Effect::WriteRecord(clock));
        }
        fx.push(Effect::ArmRepeating {
            timer: TimerKind::Poll,
            every: self.config.poll_interval,
        });
        fx.push(Effect::AttachActivity);
    }

    fn enter_warning(&mut self, now: Timestamp, write: bool, fx: &mut Vec<Effect>) {
        let Some(deadline) = self.clock.deadline(self.config.grace()) else {
            return;
        };
        let remaining_seconds = deadline
            .ceil_secs_after(now)
            .min(u64::from(self.config.max_warning_seconds));
        let remaining_seconds = u32::try_from(remaining_seconds).unwrap_or(u32::MAX);
        if remaining_seconds == 0 {
            self.expire(ExpiryReason::CountdownElapsed, true, fx);
            return;
        }

        self.clock = self.clock.warned();
        self.phase = Phase::Warning { remaining_seconds };
        if write {
            fx.push(Effect::WriteRecord(self.clock));
        }
        fx.extend([
            Effect::DetachActivity,
            Effect::ArmRepeating {
                timer: TimerKind::Countdown,
                every: self.config.countdown_tick,
            },
            Effect::ArmOnce {
                timer: TimerKind::Safety,
                after: self.config.safety_timeout(),
            },
            Effect::Render(WarningView::showing(remaining_seconds)),
            Effect::Emit(SessionSignal::AboutToExpire { remaining_seconds }),
        ]);
        info!(remaining_seconds, %deadline, "session about to expire");
    }

    /// Cancels the countdown and its backstop and hides the surface.
    fn leave_warning(fx: &mut Vec<Effect>) {
        fx.extend([
            Effect::Disarm(TimerKind::Countdown),
            Effect::Disarm(TimerKind::Safety),
            Effect::Render(WarningView::hidden()),
        ]);
    }

    fn expire(&mut self, reason: ExpiryReason, terminate: bool, fx: &mut Vec<Effect>) {
        let was_warning = self.phase.is_warning();
        fx.extend([
            Effect::Disarm(TimerKind::Poll),
            Effect::Disarm(TimerKind::Countdown),
            Effect::Disarm(TimerKind::Safety),
            Effect::DetachActivity,
        ]);
        if was_warning {
            fx.push(Effect::Render(WarningView::hidden()));
        }
        fx.push(Effect::ClearLocalCredentials);
        if terminate {
            fx.push(Effect::Terminate { reason });
        }
        fx.push(Effect::Emit(SessionSignal::Expired { reason }));

        self.phase = Phase::Unauthenticated;
        self.clock = SessionClock::inactive();
        self.refresh_owed = false;
        info!(%reason, terminate, "session expired");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const IDLE_MS: u64 = 5_000;
    const GRACE_MS: u64 = 60_000;

    fn config() -> EngineConfig {
        EngineConfig {
            poll_jitter: Duration::ZERO,
            ..EngineConfig::with_idle_timeout(Duration::from_millis(IDLE_MS))
        }
    }

    fn at(ms: u64) -> Timestamp {
        Timestamp(ms)
    }

    fn logged_in() -> Engine {
        let mut engine = Engine::new(config());
        engine.handle(Input::Login, at(0));
        engine
    }

    /// Logged in at 0, polled at expiry: warning at 60s.
    fn warned() -> Engine {
        let mut engine = logged_in();
        let record = engine.clock();
        engine.handle(Input::Poll(record), at(IDLE_MS));
        engine
    }

    fn written(fx: &[Effect]) -> Vec<SessionClock> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::WriteRecord(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    fn terminations(fx: &[Effect]) -> Vec<ExpiryReason> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::Terminate { reason } => Some(*reason),
                _ => None,
            })
            .collect()
    }

    fn signals(fx: &[Effect]) -> Vec<SessionSignal> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::Emit(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn started_at(ms: u64) -> SessionClock {
        SessionClock::started(at(ms), Duration::from_millis(IDLE_MS))
    }

    // =====================================================================
    // Login / activity
    // =====================================================================

    #[test]
    fn test_login_writes_record_and_arms_poll() {
        let mut engine = Engine::new(config());
        let fx = engine.handle(Input::Login, at(1_000));

        assert_eq!(engine.phase(), Phase::Active);
        assert_eq!(written(&fx), vec![started_at(1_000)]);
        assert!(fx.contains(&Effect::ArmRepeating {
            timer: TimerKind::Poll,
            every: Duration::from_millis(500),
        }));
        assert!(fx.contains(&Effect::AttachActivity));
    }

    #[test]
    fn test_activity_in_active_pushes_expiry_forward() {
        let mut engine = logged_in();
        let fx = engine.handle(Input::Activity, at(3_000));

        assert_eq!(written(&fx), vec![started_at(3_000)]);
        assert_eq!(engine.clock().expires_at, Some(at(8_000)));
    }

    #[test]
    fn test_activity_past_expiry_raises_warning_instead_of_extending() {
        let mut engine = logged_in();
        let fx = engine.handle(Input::Activity, at(IDLE_MS + 50));

        assert!(engine.phase().is_warning());
        assert_eq!(written(&fx), vec![started_at(0).warned()]);
        assert_eq!(engine.clock().expires_at, Some(at(IDLE_MS)));
        assert!(!fx.contains(&Effect::AttachActivity));
    }

    #[test]
    fn test_activity_within_debounce_skips_write() {
        let mut engine = logged_in();
        engine.handle(Input::Activity, at(2_000));

        let fx = engine.handle(Input::Activity, at(2_400));
        assert!(written(&fx).is_empty());
        assert_eq!(engine.clock().expires_at, Some(at(7_000)));

        let fx = engine.handle(Input::Activity, at(3_000));
        assert_eq!(written(&fx), vec![started_at(3_000)]);
    }

    #[test]
    fn test_debounced_activity_still_retries_owed_refresh() {
        let mut engine = logged_in();
        engine.handle(Input::RefreshFailed, at(100));
        let fx = engine.handle(Input::Activity, at(200));

        assert!(written(&fx).is_empty());
        assert_eq!(fx, vec![Effect::RefreshCredential]);
    }

    #[test]
    fn test_activity_when_unauthenticated_does_nothing() {
        let mut engine = Engine::new(config());
        assert!(engine.handle(Input::Activity, at(0)).is_empty());
    }

    #[test]
    fn test_activity_during_warning_does_not_dismiss() {
        let mut engine = warned();
        let fx = engine.handle(Input::Activity, at(IDLE_MS + 100));

        assert!(fx.is_empty());
        assert!(engine.phase().is_warning());
    }

    #[test]
    fn test_poll_before_expiry_changes_nothing() {
        let mut engine = logged_in();
        let record = engine.clock();
        let fx = engine.handle(Input::Poll(record), at(IDLE_MS - 1));

        assert!(fx.is_empty());
        assert_eq!(engine.phase(), Phase::Active);
    }

    // =====================================================================
    // Warning entry
    // =====================================================================

    #[test]
    fn test_poll_at_expiry_enters_warning_with_sixty_seconds() {
        let mut engine = logged_in();
        let record = engine.clock();
        let fx = engine.handle(Input::Poll(record), at(IDLE_MS));

        assert_eq!(
            engine.phase(),
            Phase::Warning {
                remaining_seconds: 60
            }
        );
        assert_eq!(written(&fx), vec![started_at(0).warned()]);
        assert!(fx.contains(&Effect::DetachActivity));
        assert!(fx.contains(&Effect::ArmOnce {
            timer: TimerKind::Safety,
            after: Duration::from_secs(70),
        }));
        assert!(fx.contains(&Effect::Render(WarningView::showing(60))));
        assert_eq!(
            signals(&fx),
            vec![SessionSignal::AboutToExpire {
                remaining_seconds: 60
            }]
        );
    }

    #[test]
    fn test_late_poll_shortens_countdown_to_time_left() {
        let mut engine = logged_in();
        let record = engine.clock();
        // 20.5s past expiry: 39.5s of the window left, shown as 40.
        engine.handle(Input::Poll(record), at(IDLE_MS + 20_500));

        assert_eq!(
            engine.phase(),
            Phase::Warning {
                remaining_seconds: 40
            }
        );
    }

    #[test]
    fn test_countdown_ticks_down_one_second_at_a_time() {
        let mut engine = warned();
        let fx = engine.handle(Input::CountdownTick, at(IDLE_MS + 1_000));

        assert_eq!(
            engine.phase(),
            Phase::Warning {
                remaining_seconds: 59
            }
        );
        assert_eq!(fx, vec![Effect::Render(WarningView::showing(59))]);
    }

    #[test]
    fn test_countdown_reaching_zero_terminates_once() {
        let mut engine = warned();
        let mut all = Vec::new();
        for n in 1..=60 {
            all.extend(engine.handle(Input::CountdownTick, at(IDLE_MS + n * 1_000)));
        }

        assert_eq!(engine.phase(), Phase::Unauthenticated);
        assert_eq!(terminations(&all), vec![ExpiryReason::CountdownElapsed]);
        assert!(all.contains(&Effect::Render(WarningView::hidden())));
        assert!(all.contains(&Effect::Disarm(TimerKind::Safety)));
    }

    #[test]
    fn test_stale_countdown_tick_is_disarmed() {
        let mut engine = logged_in();
        let fx = engine.handle(Input::CountdownTick, at(100));
        assert_eq!(fx, vec![Effect::Disarm(TimerKind::Countdown)]);
        assert_eq!(engine.phase(), Phase::Active);
    }

    // =====================================================================
    // Extend / logout
    // =====================================================================

    #[test]
    fn test_extend_in_warning_refreshes_and_restarts_idle() {
        let mut engine = warned();
        let now = IDLE_MS + 15_000;
        let fx = engine.handle(Input::Extend, at(now));

        assert_eq!(engine.phase(), Phase::Active);
        assert_eq!(written(&fx), vec![started_at(now)]);
        assert!(fx.contains(&Effect::RefreshCredential));
        assert!(fx.contains(&Effect::Disarm(TimerKind::Countdown)));
        assert!(fx.contains(&Effect::Disarm(TimerKind::Safety)));
        assert!(fx.contains(&Effect::Render(WarningView::hidden())));
        assert_eq!(signals(&fx), vec![SessionSignal::Extended]);
    }

    #[test]
    fn test_extend_then_idle_warns_again_without_ghost_expiry() {
        let mut engine = warned();
        engine.handle(Input::Extend, at(IDLE_MS + 15_000));

        // Old safety deadline passes; the timer was disarmed, but even a
        // stray fire must not expire an Active session.
        let fx = engine.handle(Input::SafetyTimeout, at(IDLE_MS + 70_000));
        assert!(terminations(&fx).is_empty());
        assert_eq!(engine.phase(), Phase::Active);

        let record = engine.clock();
        engine.handle(Input::Poll(record), at(IDLE_MS + 15_000 + IDLE_MS));
        assert_eq!(
            engine.phase(),
            Phase::Warning {
                remaining_seconds: 60
            }
        );
    }

    #[test]
    fn test_extend_in_active_behaves_like_activity() {
        let mut engine = logged_in();
        let fx = engine.handle(Input::Extend, at(2_000));
        assert_eq!(written(&fx), vec![started_at(2_000)]);
        assert!(!fx.contains(&Effect::RefreshCredential));
    }

    #[test]
    fn test_extend_in_active_writes_even_within_debounce() {
        let mut engine = logged_in();
        let fx = engine.handle(Input::Extend, at(100));
        assert_eq!(written(&fx), vec![started_at(100)]);
    }

    #[test]
    fn test_logout_now_terminates_with_user_reason() {
        let mut engine = warned();
        let fx = engine.handle(Input::LogoutNow, at(IDLE_MS + 3_000));

        assert_eq!(engine.phase(), Phase::Unauthenticated);
        assert_eq!(terminations(&fx), vec![ExpiryReason::UserLogout]);
        assert!(fx.contains(&Effect::Render(WarningView::hidden())));
    }

    #[test]
    fn test_logout_now_when_unauthenticated_is_noop() {
        let mut engine = Engine::new(config());
        assert!(engine.handle(Input::LogoutNow, at(0)).is_empty());
    }

    // =====================================================================
    // Safety timeout
    // =====================================================================

    #[test]
    fn test_safety_timeout_expires_stuck_warning() {
        // Countdown never ticks (throttled tab); only the backstop fires.
        let mut engine = warned();
        let fx = engine.handle(Input::SafetyTimeout, at(IDLE_MS + 70_000));

        assert_eq!(engine.phase(), Phase::Unauthenticated);
        assert_eq!(terminations(&fx), vec![ExpiryReason::SafetyTimeout]);
    }

    // =====================================================================
    // Cross-tab reconciliation
    // =====================================================================

    #[test]
    fn test_follows_warning_raised_by_other_tab_without_writing() {
        let mut engine = logged_in();
        let fx = engine.handle(
            Input::RecordChanged(started_at(0).warned()),
            at(IDLE_MS + 200),
        );

        assert!(engine.phase().is_warning());
        assert!(written(&fx).is_empty());
        assert!(fx.contains(&Effect::Render(WarningView::showing(60))));
    }

    #[test]
    fn test_dismisses_warning_when_other_tab_extends() {
        let mut engine = warned();
        let now = IDLE_MS + 10_000;
        let fx = engine.handle(Input::RecordChanged(started_at(now)), at(now));

        assert_eq!(engine.phase(), Phase::Active);
        assert!(!fx.contains(&Effect::RefreshCredential));
        assert!(written(&fx).is_empty());
        assert!(fx.contains(&Effect::Disarm(TimerKind::Countdown)));
        assert!(fx.contains(&Effect::Render(WarningView::hidden())));
        assert_eq!(engine.clock().expires_at, Some(at(now + IDLE_MS)));
    }

    #[test]
    fn test_adopts_later_expiry_from_other_tab() {
        let mut engine = logged_in();
        let fx = engine.handle(Input::RecordChanged(started_at(3_000)), at(3_000));

        assert!(fx.is_empty());
        assert_eq!(engine.clock().expires_at, Some(at(8_000)));

        // Local expiry (5000) has passed but the adopted one hasn't.
        let record = engine.clock();
        engine.handle(Input::Poll(record), at(6_000));
        assert_eq!(engine.phase(), Phase::Active);
    }

    #[test]
    fn test_cleared_record_means_logged_out_elsewhere_without_terminate() {
        let mut engine = warned();
        let fx = engine.handle(Input::RecordChanged(SessionClock::inactive()), at(IDLE_MS + 500));

        assert_eq!(engine.phase(), Phase::Unauthenticated);
        assert!(terminations(&fx).is_empty());
        assert!(fx.contains(&Effect::ClearLocalCredentials));
        assert_eq!(
            signals(&fx),
            vec![SessionSignal::Expired {
                reason: ExpiryReason::LoggedOutElsewhere
            }]
        );
    }

    #[test]
    fn test_every_expiry_clears_local_credentials_before_terminate() {
        let mut engine = warned();
        let fx = engine.handle(Input::SafetyTimeout, at(IDLE_MS + 70_000));

        let clear = fx.iter().position(|e| *e == Effect::ClearLocalCredentials);
        let terminate = fx.iter().position(|e| matches!(e, Effect::Terminate { .. }));
        assert!(clear.is_some());
        assert!(clear < terminate);
    }

    #[test]
    fn test_unauthenticated_tab_adopts_live_session() {
        let mut engine = Engine::new(config());
        let fx = engine.handle(Input::RecordChanged(started_at(0)), at(1_000));

        assert_eq!(engine.phase(), Phase::Active);
        assert!(written(&fx).is_empty());
        assert!(fx.contains(&Effect::AttachActivity));
    }

    #[test]
    fn test_unauthenticated_tab_adopts_running_warning() {
        let mut engine = Engine::new(config());
        // 30s into the countdown.
        engine.handle(
            Input::RecordChanged(started_at(0).warned()),
            at(IDLE_MS + 30_000),
        );
        assert_eq!(
            engine.phase(),
            Phase::Warning {
                remaining_seconds: 30
            }
        );
    }

    #[test]
    fn test_unauthenticated_tab_ignores_stale_record() {
        let mut engine = Engine::new(config());
        let fx = engine.handle(
            Input::RecordChanged(started_at(0)),
            at(IDLE_MS + GRACE_MS + 1),
        );
        assert!(fx.is_empty());
        assert_eq!(engine.phase(), Phase::Unauthenticated);
    }

    #[test]
    fn test_waking_past_window_expires_immediately_as_stale() {
        let mut engine = logged_in();
        let record = engine.clock();
        let fx = engine.handle(Input::Poll(record), at(IDLE_MS + GRACE_MS + 5_000));

        assert_eq!(engine.phase(), Phase::Unauthenticated);
        assert_eq!(terminations(&fx), vec![ExpiryReason::StaleWakeup]);
        assert!(
            !fx.iter().any(|e| matches!(e, Effect::Render(v) if v.is_visible())),
            "no warning flashes on a stale wakeup"
        );
    }

    #[test]
    fn test_poll_past_deadline_during_warning_expires() {
        let mut engine = warned();
        let record = engine.clock();
        let fx = engine.handle(Input::Poll(record), at(IDLE_MS + GRACE_MS));

        assert_eq!(terminations(&fx), vec![ExpiryReason::CountdownElapsed]);
    }

    // =====================================================================
    // Refresh / teardown
    // =====================================================================

    #[test]
    fn test_failed_refresh_retried_on_next_activity() {
        let mut engine = warned();
        engine.handle(Input::Extend, at(IDLE_MS + 1_000));
        engine.handle(Input::RefreshFailed, at(IDLE_MS + 1_100));
        assert!(engine.refresh_owed());

        let fx = engine.handle(Input::Activity, at(IDLE_MS + 2_000));
        assert!(fx.contains(&Effect::RefreshCredential));
        assert!(!engine.refresh_owed());

        let fx = engine.handle(Input::Activity, at(IDLE_MS + 3_000));
        assert!(!fx.contains(&Effect::RefreshCredential));
    }

    #[test]
    fn test_teardown_stops_everything_without_terminate() {
        let mut engine = warned();
        let fx = engine.handle(Input::Teardown, at(IDLE_MS + 1_000));

        assert_eq!(engine.phase(), Phase::Unauthenticated);
        assert!(terminations(&fx).is_empty());
        assert!(written(&fx).is_empty());
        assert!(!fx.contains(&Effect::ClearLocalCredentials));
        for timer in [TimerKind::Poll, TimerKind::Countdown, TimerKind::Safety] {
            assert!(fx.contains(&Effect::Disarm(timer)));
        }
        assert!(fx.contains(&Effect::Render(WarningView::hidden())));
    }

    #[test]
    fn test_relogin_after_expiry_starts_clean() {
        let mut engine = warned();
        engine.handle(Input::LogoutNow, at(IDLE_MS + 1_000));
        let fx = engine.handle(Input::Login, at(100_000));

        assert_eq!(engine.phase(), Phase::Active);
        assert_eq!(written(&fx), vec![started_at(100_000)]);
    }
}
