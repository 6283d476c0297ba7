//! Clocks and timers for Warden.
//!
//! Two different notions of time live here, and they are kept apart on
//! purpose:
//!
//! - **Wall-clock time** ([`Clock`], [`Timestamp`]) — absolute epoch
//!   milliseconds. This is what gets written into the shared session
//!   record, because every tab must agree on *when* the session expires.
//! - **Timer time** ([`TimerQueue`], [`Timers`]) — Tokio's monotonic
//!   clock. Timers only decide *when to look again*; they never decide
//!   whether the session is expired.
//!
//! # Integration
//!
//! The timer set is designed to sit inside an actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         key = timers.next() => { /* a timer fired */ }
//!     }
//! }
//! ```

mod clock;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp, TokioClock};
pub use timer::{Fired, TimerHandle, TimerQueue, Timers};
