//! Unified error type for Warden.

use warden_bus::BusError;
use warden_engine::{EngineError, IdentityError};
use warden_record::RecordError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `warden` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// Shared-record storage failed (I/O, encoding, lock).
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Connecting to the event bus failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A session runtime is gone.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The identity provider refused or failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The configuration file is missing, unreadable, or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}
