//! Error types for the record layer.

/// Errors that can occur while reading or writing the shared record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The backing storage could not be read or written.
    #[error("storage i/o failed: {0}")]
    Io(#[source] std::io::Error),

    /// Serializing a value for storage failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A stored value could not be parsed.
    ///
    /// Readers of the session record treat this as "no session", so it
    /// rarely surfaces past [`SharedRecord`](crate::SharedRecord).
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// Another process held the storage lock for too long.
    #[error("storage lock contended: {0}")]
    LockContended(String),

    /// A backend that needs a background watcher was opened outside of a
    /// Tokio runtime.
    #[error("no tokio runtime available to watch for storage changes")]
    NoRuntime,
}
