//! The identity-provider seam.
//!
//! Warden never talks to an authentication service itself. The host
//! implements [`IdentityProvider`] and the runtime calls it when a session
//! is extended or ends.

use std::future::Future;

/// Errors an identity provider can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The service could not be reached or timed out. Worth retrying.
    #[error("identity service unavailable: {0}")]
    Transient(String),

    /// The service refused the request (credential revoked, etc.).
    #[error("identity service rejected the request: {0}")]
    Rejected(String),
}

/// The remote credential service behind a session.
///
/// Must be `Send + Sync + 'static`: one provider is shared by the runtime
/// and the short-lived tasks it spawns for each remote call.
///
/// # Example
///
/// ```rust
/// use warden_engine::{IdentityError, IdentityProvider};
///
/// /// Accepts everything. Only useful in tests and demos.
/// struct NoopIdentity;
///
/// impl IdentityProvider for NoopIdentity {
///     async fn refresh_credential(&self) -> Result<(), IdentityError> {
///         Ok(())
///     }
///
///     async fn terminate_credential(&self) -> Result<(), IdentityError> {
///         Ok(())
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Renews the credential's server-side lifetime. Called on Extend.
    ///
    /// A failure never ends the session; the runtime retries on the next
    /// user activity.
    fn refresh_credential(&self) -> impl Future<Output = Result<(), IdentityError>> + Send;

    /// Revokes the credential. Called at most once per session end across
    /// all tabs.
    ///
    /// A failure is logged; the session still ends locally.
    fn terminate_credential(&self) -> impl Future<Output = Result<(), IdentityError>> + Send;

    /// Drops any credential material held in this process. Called
    /// synchronously whenever a tab's session ends, including when another
    /// tab logged out, and before any `terminate_credential` from this tab.
    fn clear_local_credentials(&self) {}
}

impl<T: IdentityProvider> IdentityProvider for std::sync::Arc<T> {
    fn refresh_credential(&self) -> impl Future<Output = Result<(), IdentityError>> + Send {
        (**self).refresh_credential()
    }

    fn terminate_credential(&self) -> impl Future<Output = Result<(), IdentityError>> + Send {
        (**self).terminate_credential()
    }

    fn clear_local_credentials(&self) {
        (**self).clear_local_credentials();
    }
}
