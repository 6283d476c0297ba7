//! Session runtime: an actor that executes the engine's effects for one tab.
//!
//! The [`Engine`] decides; this task does. It owns the timers, the activity
//! listener, and the tab's connection to the shared record, and it feeds
//! every event that can change the session (commands, timer fires, record
//! changes, activity) through the engine one at a time.
//!
//! ```text
//! SessionHandle ──cmd──→ ┌──────────────────────┐ ──WriteRecord──→ SessionBus
//! Timers ──fire────────→ │ SessionRuntime       │ ──Terminate────→ IdentityProvider
//! SessionBus ──change──→ │   Engine::handle()   │ ──Render───────→ WarningPrompt
//! ActivityFeed ────────→ └──────────────────────┘ ──Emit─────────→ signals
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};
use warden_bus::{SessionBus, Subscription};
use warden_clock::{Clock, Timers};
use warden_record::{RecordKeys, SessionClock, SessionStore, TabId};

use crate::{
    ActivityFeed, ActivityListener, ActivityMonitor, Effect, Engine, EngineConfig, EngineError,
    ExpiryReason, IdentityProvider, Input, Phase, SessionSignal, TimerKind, WarningPrompt,
    WarningView,
};

/// Bound on queued commands per tab.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Signals buffered for slow subscribers before they start lagging.
const SIGNAL_CHANNEL_SIZE: usize = 64;

/// Commands sent to a runtime through its channel.
pub(crate) enum Command {
    Login { reply: oneshot::Sender<Phase> },
    Extend { reply: oneshot::Sender<Phase> },
    LogoutNow { reply: oneshot::Sender<Phase> },
    Snapshot { reply: oneshot::Sender<SessionSnapshot> },
    /// Fed back by the task that ran a failed refresh.
    RefreshFailed,
    Shutdown { reply: oneshot::Sender<()> },
}

/// A point-in-time view of one tab's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// The tab.
    pub tab: TabId,
    /// Lifecycle phase.
    pub phase: Phase,
    /// The tab's mirror of the shared record.
    pub clock: SessionClock,
    /// What the warning surface is showing.
    pub warning: WarningView,
}

/// Handle to a running session runtime.
///
/// Cheap to clone. Dropping every handle stops the runtime (without
/// logging out).
#[derive(Clone)]
pub struct SessionHandle {
    tab: TabId,
    sender: mpsc::Sender<Command>,
    view: watch::Receiver<WarningView>,
    signals: broadcast::Sender<SessionSignal>,
    activity: ActivityFeed,
}

impl SessionHandle {
    /// The tab this runtime serves.
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Reports a successful authentication and starts the idle clock.
    pub async fn login(&self) -> Result<Phase, EngineError> {
        self.request(|reply| Command::Login { reply }).await
    }

    /// Extends the session. Dismisses the warning if it is showing.
    pub async fn extend(&self) -> Result<Phase, EngineError> {
        self.request(|reply| Command::Extend { reply }).await
    }

    /// Ends the session for every tab.
    pub async fn logout_now(&self) -> Result<Phase, EngineError> {
        self.request(|reply| Command::LogoutNow { reply }).await
    }

    /// Reads the tab's current state.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, EngineError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Shorthand for `snapshot().await?.phase`.
    pub async fn phase(&self) -> Result<Phase, EngineError> {
        Ok(self.snapshot().await?.phase)
    }

    /// Stops the runtime: timers cancelled, activity detached, warning
    /// hidden. Does not log out. Waits until teardown has finished.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Sender for the host's interaction events.
    pub fn activity(&self) -> ActivityFeed {
        self.activity.clone()
    }

    /// Subscribes to application signals emitted from now on.
    pub fn signals(&self) -> broadcast::Receiver<SessionSignal> {
        self.signals.subscribe()
    }

    /// What the warning surface should show right now.
    pub fn warning(&self) -> WarningView {
        *self.view.borrow()
    }

    /// A connection for a warning UI.
    pub fn warning_prompt(&self) -> WarningPrompt {
        WarningPrompt::new(self.view.clone(), self.clone())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| EngineError::Unavailable(self.tab))?;
        reply_rx
            .await
            .map_err(|_| EngineError::Unavailable(self.tab))
    }
}

/// The runtime actor. Runs inside its own Tokio task.
pub struct SessionRuntime<S: SessionStore, I, C> {
    tab: TabId,
    engine: Engine,
    bus: Arc<SessionBus<S>>,
    identity: Arc<I>,
    clock: C,
    timers: Timers<TimerKind>,
    changes: Subscription,
    monitor: ActivityMonitor,
    listener: Option<ActivityListener>,
    view: watch::Sender<WarningView>,
    signals: broadcast::Sender<SessionSignal>,
    receiver: mpsc::Receiver<Command>,
    /// Weak so that in-flight refreshes never keep the runtime alive.
    feedback: mpsc::WeakSender<Command>,
}

impl<S, I, C> SessionRuntime<S, I, C>
where
    S: SessionStore,
    I: IdentityProvider,
    C: Clock,
{
    /// Spawns a runtime for the tab behind `bus` and returns its handle.
    ///
    /// On start the runtime reconciles with the record once, so a tab
    /// opened while another tab is logged in joins that session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: EngineConfig, bus: SessionBus<S>, identity: I, clock: C) -> SessionHandle {
        let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (view, view_rx) = watch::channel(WarningView::hidden());
        let (signals, _) = broadcast::channel(SIGNAL_CHANNEL_SIZE);
        let monitor = ActivityMonitor::new(config.activity_kinds.iter().copied());
        let activity = monitor.feed();
        let timers = Timers::with_jitter(config.poll_jitter);
        let changes = bus.subscribe();
        let tab = bus.tab();

        let actor = Self {
            tab,
            engine: Engine::new(config),
            bus: Arc::new(bus),
            identity: Arc::new(identity),
            clock,
            timers,
            changes,
            monitor,
            listener: None,
            view,
            signals: signals.clone(),
            receiver,
            feedback: sender.downgrade(),
        };
        tokio::spawn(actor.run());

        SessionHandle {
            tab,
            sender,
            view: view_rx,
            signals,
            activity,
        }
    }

    /// Connects a new tab (random id) to `store` and spawns its runtime.
    ///
    /// # Errors
    /// [`EngineError::Bus`] when called outside a Tokio runtime.
    pub fn connect(
        config: EngineConfig,
        store: Arc<S>,
        keys: RecordKeys,
        identity: I,
        clock: C,
    ) -> Result<SessionHandle, EngineError> {
        let bus = SessionBus::new(store, keys, TabId::random())?;
        Ok(Self::spawn(config, bus, identity, clock))
    }

    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        info!(tab = %self.tab, "session runtime started");

        let record = self.bus.read();
        self.apply(Input::RecordChanged(record));

        let mut shutdown_reply = None;
        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(_event) = self.changes.recv() => {
                    // Re-read rather than trust the payload.
                    let record = self.bus.read();
                    self.apply(Input::RecordChanged(record));
                }
                timer = self.timers.next() => {
                    let input = match timer {
                        TimerKind::Poll => Input::Poll(self.bus.read()),
                        TimerKind::Countdown => Input::CountdownTick,
                        TimerKind::Safety => Input::SafetyTimeout,
                    };
                    self.apply(input);
                }
                Some(kind) = self.monitor.next() => {
                    trace!(tab = %self.tab, %kind, "user activity");
                    self.apply(Input::Activity);
                }
            }
        }

        self.apply(Input::Teardown);
        info!(tab = %self.tab, "session runtime stopped");
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Login { reply } => {
                // A fresh login always starts with the latch open.
                self.bus.latch().release();
                self.apply(Input::Login);
                let _ = reply.send(self.engine.phase());
            }
            Command::Extend { reply } => {
                self.apply(Input::Extend);
                let _ = reply.send(self.engine.phase());
            }
            Command::LogoutNow { reply } => {
                self.apply(Input::LogoutNow);
                let _ = reply.send(self.engine.phase());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(SessionSnapshot {
                    tab: self.tab,
                    phase: self.engine.phase(),
                    clock: self.engine.clock(),
                    warning: *self.view.borrow(),
                });
            }
            Command::RefreshFailed => self.apply(Input::RefreshFailed),
            Command::Shutdown { .. } => {}
        }
    }

    /// Feeds one input through the engine and executes the result.
    fn apply(&mut self, input: Input) {
        let now = self.clock.now();
        for effect in self.engine.handle(input, now) {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::WriteRecord(clock) => {
                if let Err(error) = self.bus.write(&clock) {
                    warn!(tab = %self.tab, %error, "failed to write session record");
                }
            }
            Effect::ArmRepeating { timer, every } => {
                self.timers.arm_repeating(timer, every);
            }
            Effect::ArmOnce { timer, after } => {
                self.timers.arm_once(timer, after);
            }
            Effect::Disarm(timer) => {
                self.timers.disarm(timer);
            }
            Effect::AttachActivity => {
                if self.listener.is_none() {
                    self.listener = Some(self.monitor.attach());
                }
            }
            Effect::DetachActivity => self.listener = None,
            Effect::Render(view) => {
                self.view.send_if_modified(|current| {
                    let changed = *current != view;
                    *current = view;
                    changed
                });
            }
            Effect::RefreshCredential => self.refresh(),
            Effect::ClearLocalCredentials => self.identity.clear_local_credentials(),
            Effect::Terminate { reason } => self.terminate(reason),
            Effect::Emit(signal) => {
                let _ = self.signals.send(signal);
            }
        }
    }

    fn refresh(&self) {
        let identity = Arc::clone(&self.identity);
        let feedback = self.feedback.clone();
        let tab = self.tab;
        tokio::spawn(async move {
            match identity.refresh_credential().await {
                Ok(()) => debug!(%tab, "credential refreshed"),
                Err(error) => {
                    warn!(%tab, %error, "credential refresh failed, retrying on next activity");
                    if let Some(sender) = feedback.upgrade() {
                        let _ = sender.send(Command::RefreshFailed).await;
                    }
                }
            }
        });
    }

    /// Ends the session for every tab, at most once.
    ///
    /// The latch is held until the remote call settles, so a second tab
    /// reaching expiry in the meantime backs off.
    fn terminate(&self, reason: ExpiryReason) {
        let tab = self.tab;
        if !self.bus.latch().try_acquire() {
            debug!(%tab, %reason, "logout already in progress, skipping");
            return;
        }
        if !self.bus.read().active {
            debug!(%tab, %reason, "session already ended by another tab");
            self.bus.latch().release();
            return;
        }

        if let Err(error) = self.bus.clear() {
            warn!(%tab, %error, "failed to clear session record");
        }

        let bus = Arc::clone(&self.bus);
        let identity = Arc::clone(&self.identity);
        tokio::spawn(async move {
            match identity.terminate_credential().await {
                Ok(()) => info!(%tab, %reason, "credential terminated"),
                Err(error) => warn!(%tab, %reason, %error, "credential termination failed"),
            }
            bus.latch().release();
        });
    }
}
