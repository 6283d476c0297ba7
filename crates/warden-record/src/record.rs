//! Typed access to the session record.

use std::sync::Arc;

use tracing::warn;

use crate::{RecordError, RecordKeys, SessionClock, SessionStore, TabId};

/// One tab's view of the shared [`SessionClock`].
///
/// Reading never fails: a missing, unparseable, or inconsistent record is
/// reported as [`SessionClock::inactive`], which routes the user back to
/// login rather than leaving them in an ambiguous state.
pub struct SharedRecord<S: SessionStore> {
    store: Arc<S>,
    keys: RecordKeys,
    tab: TabId,
}

impl<S: SessionStore> SharedRecord<S> {
    /// Creates a view over `store` that tags its writes with `tab`.
    pub fn new(store: Arc<S>, keys: RecordKeys, tab: TabId) -> Self {
        Self { store, keys, tab }
    }

    /// Reads the record, degrading anything unusable to "inactive".
    pub fn read(&self) -> SessionClock {
        match self.try_read() {
            Ok(Some(clock)) if clock.is_consistent() => clock,
            Ok(Some(clock)) => {
                warn!(tab = %self.tab, ?clock, "session record violates its invariants, treating as logged out");
                SessionClock::inactive()
            }
            Ok(None) => SessionClock::inactive(),
            Err(e) => {
                warn!(tab = %self.tab, error = %e, "session record unreadable, treating as logged out");
                SessionClock::inactive()
            }
        }
    }

    /// Reads the record, surfacing storage and decode errors.
    ///
    /// Returns `Ok(None)` if nothing is stored.
    pub fn try_read(&self) -> Result<Option<SessionClock>, RecordError> {
        let Some(raw) = self.store.get(&self.keys.session)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(RecordError::Decode)
    }

    /// Writes the record. Visible to [`read`](Self::read) in this tab as
    /// soon as this returns.
    pub fn write(&self, clock: &SessionClock) -> Result<(), RecordError> {
        let raw = serde_json::to_string(clock).map_err(RecordError::Encode)?;
        self.store.set(&self.keys.session, &raw, self.tab)
    }

    /// Removes the record entirely (logout).
    pub fn clear(&self) -> Result<(), RecordError> {
        self.store.remove(&self.keys.session, self.tab)
    }

    /// The keys this record uses.
    pub fn keys(&self) -> &RecordKeys {
        &self.keys
    }

    /// The tab this view writes as.
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
