//! Error types for the bus layer.

use warden_record::RecordError;

/// Errors that can occur while wiring or using the bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Reading or writing the shared record failed.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The cross-tab bridge is a spawned task and needs a Tokio runtime.
    #[error("no tokio runtime available for the cross-tab bridge")]
    NoRuntime,
}
