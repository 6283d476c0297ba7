//! Two tabs sharing one in-memory store.

use std::sync::Arc;
use std::time::Duration;

use warden_bus::{BusError, DeliveryPath, SessionBus};
use warden_clock::Timestamp;
use warden_record::{MemoryStore, RecordKeys, SessionClock, TabId};

fn tabs() -> (SessionBus<MemoryStore>, SessionBus<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let a = SessionBus::new(Arc::clone(&store), RecordKeys::default(), TabId(1)).unwrap();
    let b = SessionBus::new(store, RecordKeys::default(), TabId(2)).unwrap();
    (a, b)
}

fn clock() -> SessionClock {
    SessionClock::started(Timestamp(0), Duration::from_secs(5))
}

async fn next(sub: &mut warden_bus::Subscription) -> warden_bus::BusEvent {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("event should arrive")
        .expect("bus open")
}

#[tokio::test]
async fn test_write_notifies_own_tab_on_local_path() {
    let (a, _b) = tabs();
    let mut sub = a.subscribe();

    a.write(&clock()).unwrap();

    let event = next(&mut sub).await;
    assert_eq!(event.path, DeliveryPath::Local);
    assert!(sub.try_recv().is_none(), "no cross-tab echo of own write");
}

#[tokio::test]
async fn test_write_notifies_other_tab_on_cross_tab_path() {
    let (a, b) = tabs();
    let mut sub = b.subscribe();

    a.write(&clock()).unwrap();

    let event = next(&mut sub).await;
    assert_eq!(event.path, DeliveryPath::CrossTab);
    assert_eq!(b.read(), clock());
}

#[tokio::test]
async fn test_clear_is_seen_by_other_tab_as_removal() {
    let (a, b) = tabs();
    a.write(&clock()).unwrap();
    let mut sub = b.subscribe();

    a.clear().unwrap();

    let event = next(&mut sub).await;
    assert_eq!(event.payload, None);
    assert_eq!(b.read(), SessionClock::inactive());
}

#[tokio::test]
async fn test_latch_shared_between_tabs() {
    let (a, b) = tabs();

    assert!(a.latch().try_acquire());
    assert!(!b.latch().try_acquire());
    a.latch().release();
    assert!(b.latch().try_acquire());
}

#[test]
fn test_new_outside_runtime_fails() {
    let store = Arc::new(MemoryStore::new());
    let result = SessionBus::new(store, RecordKeys::default(), TabId(1));
    assert!(matches!(result, Err(BusError::NoRuntime)));
}
