//! The shared session record for Warden.
//!
//! Every open tab reads and writes one small record that says whether the
//! session is active, when it expires, and whether a warning is showing.
//! This crate owns:
//!
//! 1. **The data** — [`SessionClock`] and its persisted keys ([`RecordKeys`])
//! 2. **Where it lives** — the [`SessionStore`] trait, with an in-process
//!    backend ([`MemoryStore`]) and a cross-process one ([`FileStore`])
//! 3. **How it is read and written** — [`SharedRecord`], which degrades a
//!    missing or corrupt record to "not logged in" instead of failing
//! 4. **Exactly-once logout** — [`LogoutLatch`], the companion flag that
//!    stops two tabs from both revoking the credential
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)      ← reconciles local state against the record
//!     ↕
//! Bus                 ← fans record changes out to every tab
//!     ↕
//! Record (this crate) ← key/value storage shared by all tabs
//! ```

mod clock;
mod error;
mod file;
mod latch;
mod memory;
mod record;
mod store;

pub use clock::{RecordKeys, SessionClock};
pub use error::RecordError;
pub use file::FileStore;
pub use latch::LogoutLatch;
pub use memory::MemoryStore;
pub use record::SharedRecord;
pub use store::{SessionStore, StorageChange, TabId};
