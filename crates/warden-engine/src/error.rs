//! Error types for the engine layer.

use warden_bus::BusError;
use warden_record::TabId;

/// Errors that can occur while driving a session runtime.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The runtime task has stopped (shut down or panicked).
    #[error("session runtime for {0} is unavailable")]
    Unavailable(TabId),

    /// Connecting to the shared record failed.
    #[error(transparent)]
    Bus(#[from] BusError),
}
