//! Integration tests for the `Warden` builder and its backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use warden::clock::TokioClock;
use warden::prelude::*;
use warden::{Backend, WardenConfig};

#[derive(Default)]
struct CountingIdentity {
    terminations: AtomicUsize,
}

impl IdentityProvider for CountingIdentity {
    async fn refresh_credential(&self) -> Result<(), IdentityError> {
        Ok(())
    }

    async fn terminate_credential(&self) -> Result<(), IdentityError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_for_phase(tab: &SessionHandle, want: impl Fn(Phase) -> bool) -> Phase {
    for _ in 0..200 {
        let phase = tab.phase().await.unwrap();
        if want(phase) {
            return phase;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("phase never reached");
}

#[tokio::test(start_paused = true)]
async fn test_memory_warden_tabs_share_session() {
    let warden = warden::builder()
        .idle_timeout(Duration::from_secs(5))
        .namespace("shop")
        .build(CountingIdentity::default())
        .unwrap();
    let clock = TokioClock::new();
    let a = warden.open_tab_with_clock(clock).unwrap();
    let b = warden.open_tab_with_clock(clock).unwrap();
    assert_ne!(a.tab(), b.tab());

    a.login().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(b.phase().await.unwrap(), Phase::Active);
    assert_eq!(warden.keys().session, "shop.session");

    tokio::time::sleep(Duration::from_millis(5_600)).await;
    assert!(b.phase().await.unwrap().is_warning());
}

#[test]
fn test_builder_applies_config() {
    let config = WardenConfig::from_toml_str(
        r#"
        idle_timeout_ms = 2000
        max_warning_seconds = 90
        "#,
    )
    .unwrap();
    let warden = WardenBuilder::new()
        .config(config)
        .build(CountingIdentity::default())
        .unwrap();

    let engine = warden.engine_config();
    assert_eq!(engine.idle_timeout, Duration::from_secs(2));
    assert_eq!(engine.max_warning_seconds, 60);
}

#[tokio::test]
async fn test_file_warden_coordinates_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let identity = Arc::new(CountingIdentity::default());

    let config = WardenConfig {
        idle_timeout_ms: 60_000,
        poll_interval_ms: 20,
        poll_jitter_ms: 0,
        storage: warden::StorageConfig {
            backend: Backend::File,
            dir: Some(dir.path().to_path_buf()),
            watch_interval_ms: 10,
            ..Default::default()
        },
        ..Default::default()
    };
    // Two wardens on one directory stand in for two processes.
    let first = WardenBuilder::new()
        .config(config.clone())
        .build(Arc::clone(&identity))
        .unwrap();
    let second = WardenBuilder::new()
        .config(config)
        .build(Arc::clone(&identity))
        .unwrap();

    let a = first.open_tab().unwrap();
    let b = second.open_tab().unwrap();

    a.login().await.unwrap();
    wait_for_phase(&b, |p| p == Phase::Active).await;

    b.logout_now().await.unwrap();
    wait_for_phase(&a, |p| p == Phase::Unauthenticated).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(identity.terminations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_builder_infers_identity_from_build() {
    let warden: Warden<CountingIdentity> = warden::builder()
        .max_warning_seconds(30)
        .build(CountingIdentity::default())
        .unwrap();
    assert_eq!(warden.engine_config().max_warning_seconds, 30);

    let shared = WardenBuilder::default()
        .build(Arc::new(CountingIdentity::default()))
        .unwrap();
    assert_eq!(shared.keys().session, "warden.session");
}

#[test]
fn test_file_backend_requires_dir() {
    let mut config = WardenConfig::default();
    config.storage.backend = Backend::File;

    let result = WardenBuilder::new()
        .config(config)
        .build(CountingIdentity::default());
    assert!(matches!(result, Err(WardenError::Config(_))));
}
