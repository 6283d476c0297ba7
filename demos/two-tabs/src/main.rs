//! Two simulated tabs sharing one session.
//!
//! Tab A logs in and types for a while, then both tabs go idle. Both show
//! the countdown; tab B extends it. Everyone goes idle again and the
//! session expires, with the credential revoked once.
//!
//! Run with `cargo run -p two-tabs [config.toml]`; `RUST_LOG=warden=debug`
//! shows the engine's decisions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use warden::prelude::*;

// ---------------------------------------------------------------------------
// Identity provider
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DemoIdentity {
    terminated: AtomicUsize,
}

impl IdentityProvider for DemoIdentity {
    async fn refresh_credential(&self) -> Result<(), IdentityError> {
        tracing::info!("identity: credential refreshed");
        Ok(())
    }

    async fn terminate_credential(&self) -> Result<(), IdentityError> {
        let n = self.terminated.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(calls = n, "identity: credential terminated");
        Ok(())
    }

    fn clear_local_credentials(&self) {
        tracing::info!("identity: local credentials cleared");
    }
}

// ---------------------------------------------------------------------------
// Warning surface
// ---------------------------------------------------------------------------

struct ConsoleSurface {
    name: &'static str,
}

impl WarningSurface for ConsoleSurface {
    fn render(&mut self, view: WarningView) {
        if view.is_visible() {
            println!(
                "[{}] session expires in {}s  [Extend] [Logout now]",
                self.name,
                view.remaining_seconds()
            );
        } else {
            println!("[{}] (no warning)", self.name);
        }
    }
}

fn watch_tab(name: &'static str, tab: &SessionHandle) {
    let prompt = tab.warning_prompt();
    tokio::spawn(async move {
        prompt.drive(&mut ConsoleSurface { name }).await;
    });

    let mut signals = tab.signals();
    tokio::spawn(async move {
        while let Ok(signal) = signals.recv().await {
            println!("[{name}] signal: {signal:?}");
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), WardenError> {
    init_tracing("warden=info,two_tabs=info");

    let config = match std::env::args().nth(1) {
        Some(path) => WardenConfig::load(path)?,
        None => WardenConfig {
            idle_timeout_ms: 3_000,
            max_warning_seconds: 5,
            safety_margin_ms: 2_000,
            ..WardenConfig::default()
        },
    };
    let idle = Duration::from_millis(config.idle_timeout_ms);

    let warden = WardenBuilder::new().config(config).build(DemoIdentity::default())?;
    let a = warden.open_tab()?;
    let b = warden.open_tab()?;
    watch_tab("A", &a);
    watch_tab("B", &b);

    a.login().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let joined = b.phase().await?;
    tracing::info!(phase = %joined, "tab B after A's login");

    // Typing in tab A keeps both tabs alive.
    let keyboard = a.activity();
    for _ in 0..3 {
        tokio::time::sleep(idle / 2).await;
        keyboard.signal(ActivityKind::KeyDown);
    }

    // Idle until the warning has counted down a couple of seconds.
    tokio::time::sleep(idle + Duration::from_millis(2_500)).await;
    let (pa, pb) = (a.phase().await?, b.phase().await?);
    tracing::info!(a = %pa, b = %pb, "both tabs warned");
    b.warning_prompt().extend().await?;

    // Idle again, through the whole countdown.
    let max_warning = Duration::from_secs(u64::from(warden.engine_config().max_warning_seconds));
    tokio::time::sleep(idle + max_warning + Duration::from_secs(1)).await;
    let (pa, pb) = (a.phase().await?, b.phase().await?);
    tracing::info!(a = %pa, b = %pb, "session over");

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}
