//! Change notifications for the shared session record.
//!
//! Browser-style storage events never fire in the tab that made the write,
//! so a tab that only listened to storage would miss its own changes. This
//! crate delivers every change over two paths and treats both as equally
//! authoritative:
//!
//! - **Local** — in-process pub/sub ([`EventBus`]), fed by every
//!   [`SessionBus::write`] in this tab
//! - **Cross-tab** — storage change notifications from other tabs, bridged
//!   onto the same [`EventBus`] topic by a background task
//!
//! ```text
//! SessionBus::write ──→ store.set ──→ (other tabs) storage change ──┐
//!        │                                                          │
//!        └──→ EventBus::publish(Local)      EventBus::publish(CrossTab)
//!                        │                              │
//!                        └──────── Subscription ────────┘
//! ```

mod bus;
mod error;
mod session;

pub use bus::{BusEvent, DeliveryPath, EventBus, Subscription, Topic};
pub use error::BusError;
pub use session::SessionBus;
