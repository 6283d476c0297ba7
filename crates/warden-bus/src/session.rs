//! The session record wired to the event bus.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use warden_record::{
    LogoutLatch, RecordKeys, SessionClock, SessionStore, SharedRecord, StorageChange, TabId,
};

use crate::{BusError, DeliveryPath, EventBus, Subscription, Topic};

/// One tab's connection to the shared session record.
///
/// Every [`write`](Self::write) and [`clear`](Self::clear) is published on
/// the record's topic straight away (local path), and a bridge task
/// republishes changes made by *other* tabs (cross-tab path). Subscribers
/// therefore hear about every change exactly once, whoever made it.
///
/// Payloads are informational only. Events can arrive late or out of
/// order across tabs, so consumers should re-read the record with
/// [`read`](Self::read) rather than trust the payload.
pub struct SessionBus<S: SessionStore> {
    record: SharedRecord<S>,
    latch: LogoutLatch<S>,
    events: EventBus,
    topic: Topic,
    bridge: JoinHandle<()>,
}

impl<S: SessionStore> SessionBus<S> {
    /// Connects tab `tab` to `store` and starts the cross-tab bridge.
    ///
    /// # Errors
    /// [`BusError::NoRuntime`] when called outside a Tokio runtime.
    pub fn new(store: Arc<S>, keys: RecordKeys, tab: TabId) -> Result<Self, BusError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BusError::NoRuntime)?;
        let events = EventBus::new();
        let topic = Topic::new(keys.session.clone());

        // Subscribe before spawning so no change slips past between the
        // constructor returning and the task first running.
        let changes = store.subscribe();
        let bridge = runtime.spawn(bridge(
            changes,
            events.clone(),
            topic.clone(),
            tab,
        ));

        debug!(%tab, %topic, "session bus connected");

        Ok(Self {
            latch: LogoutLatch::new(Arc::clone(&store), &keys, tab),
            record: SharedRecord::new(store, keys, tab),
            events,
            topic,
            bridge,
        })
    }

    /// Reads the record (never fails; see [`SharedRecord::read`]).
    pub fn read(&self) -> SessionClock {
        self.record.read()
    }

    /// Writes the record and notifies same-tab subscribers.
    pub fn write(&self, clock: &SessionClock) -> Result<(), BusError> {
        self.record.write(clock)?;
        let payload = serde_json::to_string(clock).ok();
        self.events.publish(&self.topic, payload, DeliveryPath::Local);
        Ok(())
    }

    /// Removes the record and notifies same-tab subscribers.
    pub fn clear(&self) -> Result<(), BusError> {
        self.record.clear()?;
        self.events.publish(&self.topic, None, DeliveryPath::Local);
        Ok(())
    }

    /// Subscribes to record changes from any tab.
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe(self.topic.clone())
    }

    /// The underlying event bus, for application-level topics.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The logout latch shared by every tab on this store.
    pub fn latch(&self) -> &LogoutLatch<S> {
        &self.latch
    }

    /// The record's topic (same as its storage key).
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// This tab's id.
    pub fn tab(&self) -> TabId {
        self.record.tab()
    }
}

impl<S: SessionStore> Drop for SessionBus<S> {
    fn drop(&mut self) {
        self.bridge.abort();
    }
}

/// Forwards storage changes made by other tabs onto the event bus.
async fn bridge(
    mut changes: broadcast::Receiver<StorageChange>,
    events: EventBus,
    topic: Topic,
    tab: TabId,
) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                if change.origin == tab || change.key != topic.as_str() {
                    continue;
                }
                events.publish(&topic, change.new_value, DeliveryPath::CrossTab);
            }
            Err(RecvError::Lagged(missed)) => {
                // Whatever we missed, the record itself is current.
                warn!(%tab, missed, "storage notifications lagged, forcing re-read");
                events.publish(&topic, None, DeliveryPath::CrossTab);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
