//! The "already logging out" latch.
//!
//! Two things can race to end a session: this tab's countdown and safety
//! timeout, and other tabs reaching the same conclusion at the same time.
//! Only one of them may revoke the credential. The latch is a single
//! compare-and-swap at two levels:
//!
//! ```text
//! local AtomicBool  false → true   (races inside this tab)
//! store flag    absent/false → true   (races between tabs)
//! ```
//!
//! Both must succeed for [`LogoutLatch::try_acquire`] to return `true`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::{RecordKeys, SessionStore, TabId};

const HELD: &str = "true";
const FREE: &str = "false";

/// Exactly-once guard around credential termination.
pub struct LogoutLatch<S: SessionStore> {
    store: Arc<S>,
    key: String,
    tab: TabId,
    local: AtomicBool,
}

impl<S: SessionStore> LogoutLatch<S> {
    /// Creates a latch stored under `keys.logging_out`.
    pub fn new(store: Arc<S>, keys: &RecordKeys, tab: TabId) -> Self {
        Self {
            store,
            key: keys.logging_out.clone(),
            tab,
            local: AtomicBool::new(false),
        }
    }

    /// Tries to become the one tab that performs the logout.
    ///
    /// If the store cannot be reached, the latch fails *open*: the local
    /// half still serializes this tab, and a duplicate remote revoke is
    /// preferable to a session that never gets revoked.
    ///
    /// Synchronous. With a file-backed store this may block the calling
    /// thread for a few milliseconds while another process holds the
    /// directory lock.
    pub fn try_acquire(&self) -> bool {
        if self
            .local
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(tab = %self.tab, "logout already in flight in this tab");
            return false;
        }

        let swapped = self
            .store
            .compare_and_swap(&self.key, None, Some(HELD), self.tab)
            .and_then(|won| {
                if won {
                    Ok(true)
                } else {
                    self.store
                        .compare_and_swap(&self.key, Some(FREE), Some(HELD), self.tab)
                }
            });

        match swapped {
            Ok(true) => true,
            Ok(false) => {
                debug!(tab = %self.tab, "logout already in flight in another tab");
                self.local.store(false, Ordering::Release);
                false
            }
            Err(e) => {
                warn!(tab = %self.tab, error = %e, "logout flag unavailable, proceeding without it");
                true
            }
        }
    }

    /// Releases the latch after the logout has settled.
    pub fn release(&self) {
        if let Err(e) = self.store.set(&self.key, FREE, self.tab) {
            warn!(tab = %self.tab, error = %e, "failed to clear logout flag");
        }
        self.local.store(false, Ordering::Release);
    }

    /// Whether any tab currently holds the latch.
    pub fn is_held(&self) -> bool {
        self.local.load(Ordering::Acquire)
            || matches!(self.store.get(&self.key), Ok(Some(v)) if v == HELD)
    }
}
