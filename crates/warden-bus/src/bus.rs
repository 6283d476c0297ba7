//! In-process publish/subscribe keyed by topic.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;
use tracing::trace;

/// A named event stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    /// Creates a topic from any string-like name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The topic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an event reached this tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    /// Published by this tab.
    Local,
    /// Bridged from a storage change made by another tab.
    CrossTab,
}

/// A delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    /// Topic it was published on.
    pub topic: Topic,
    /// Raw payload. `None` means "removed", or "something changed, re-read".
    pub payload: Option<String>,
    /// Which path delivered it.
    pub path: DeliveryPath,
}

type Subscriber = (u64, mpsc::UnboundedSender<BusEvent>);

#[derive(Default)]
struct Registry {
    next_id: u64,
    topics: HashMap<Topic, Vec<Subscriber>>,
}

/// Topic-keyed pub/sub. Cheap to clone; clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers an event to every live subscriber of `topic`.
    ///
    /// Returns how many subscribers received it. Subscribers whose
    /// receiving end is gone are pruned on the way.
    pub fn publish(&self, topic: &Topic, payload: Option<String>, path: DeliveryPath) -> usize {
        let mut registry = lock(&self.registry);
        let Some(subscribers) = registry.topics.get_mut(topic) else {
            return 0;
        };
        let event = BusEvent {
            topic: topic.clone(),
            payload,
            path,
        };
        subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        trace!(%topic, ?path, delivered = subscribers.len(), "event published");
        subscribers.len()
    }

    /// Subscribes to `topic`. Dropping the [`Subscription`] unsubscribes.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .topics
            .entry(topic.clone())
            .or_default()
            .push((id, tx));

        Subscription {
            id,
            topic,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        lock(&self.registry)
            .topics
            .get(topic)
            .map_or(0, Vec::len)
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A live subscription to one topic.
///
/// Unsubscribes itself when dropped, so a listener's lifetime is exactly
/// the lifetime of this value.
pub struct Subscription {
    id: u64,
    topic: Topic,
    rx: mpsc::UnboundedReceiver<BusEvent>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Waits for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        self.rx.recv().await
    }

    /// Returns a pending event without waiting.
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        self.rx.try_recv().ok()
    }

    /// The subscribed topic.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = lock(&registry);
        if let Some(subscribers) = registry.topics.get_mut(&self.topic) {
            subscribers.retain(|(id, _)| *id != self.id);
            if subscribers.is_empty() {
                registry.topics.remove(&self.topic);
            }
        }
    }
}
