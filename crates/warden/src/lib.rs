//! # Warden
//!
//! Idle-session timeout with cross-tab coordination.
//!
//! A logged-in user who stops interacting is warned, given a short
//! countdown to extend, and logged out if they don't. Every tab sharing the
//! session sees the same warning, and the credential is revoked exactly
//! once no matter how many tabs reach the deadline together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use warden::prelude::*;
//!
//! struct MyIdentity;
//!
//! impl IdentityProvider for MyIdentity {
//!     async fn refresh_credential(&self) -> Result<(), IdentityError> {
//!         Ok(())
//!     }
//!     async fn terminate_credential(&self) -> Result<(), IdentityError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), WardenError> {
//! let warden = warden::builder()
//!     .idle_timeout(std::time::Duration::from_secs(900))
//!     .build(MyIdentity)?;
//! let tab = warden.open_tab()?;
//! tab.login().await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod error;

pub use builder::{AnyStore, Warden, WardenBuilder};
pub use config::{Backend, StorageConfig, WardenConfig};
pub use error::WardenError;

pub use warden_bus as bus;
pub use warden_clock as clock;
pub use warden_engine as engine;
pub use warden_record as record;

use tracing_subscriber::EnvFilter;

/// Starts configuring a [`Warden`]. Same as [`WardenBuilder::new`].
pub fn builder() -> WardenBuilder {
    WardenBuilder::new()
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `"warden=info"`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{Warden, WardenBuilder, WardenConfig, WardenError, init_tracing};
    pub use warden_clock::{Clock, SystemClock, Timestamp};
    pub use warden_engine::{
        ActivityKind, ExpiryReason, IdentityError, IdentityProvider, Phase, SessionHandle,
        SessionSignal, WarningPrompt, WarningSurface, WarningView,
    };
}
