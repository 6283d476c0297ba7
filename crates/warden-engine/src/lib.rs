//! Idle-session lifecycle for Warden.
//!
//! The engine decides when an idle session gets a warning, runs the
//! countdown, and ends the session exactly once, while staying consistent
//! with every other tab through the shared record.
//!
//! # Key types
//!
//! - [`Engine`] — the pure state machine: `(state, input, now) -> effects`
//! - [`SessionRuntime`] / [`SessionHandle`] — the actor that executes
//!   effects (timers, record writes, identity calls) for one tab
//! - [`ActivityMonitor`] — turns user interaction into idle resets
//! - [`WarningView`] / [`WarningPrompt`] — what the warning UI binds to
//! - [`IdentityProvider`] — the remote credential service seam
//! - [`EngineConfig`] — timeouts and intervals
//!
//! ```text
//! Unauthenticated ──login──→ Active ──idle──→ Warning ──countdown 0──→ Unauthenticated
//!                              ↑ ↺ activity      │
//!                              └──── extend ─────┘
//! ```

mod activity;
mod config;
mod engine;
mod error;
mod identity;
mod runtime;
mod surface;
mod types;

pub use activity::{ActivityFeed, ActivityKind, ActivityListener, ActivityMonitor};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use identity::{IdentityError, IdentityProvider};
pub use runtime::{SessionHandle, SessionRuntime, SessionSnapshot};
pub use surface::{WarningPrompt, WarningSurface, WarningView};
pub use types::{Effect, ExpiryReason, Input, Phase, SessionSignal, TimerKind};
