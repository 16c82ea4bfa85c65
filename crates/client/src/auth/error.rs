//! Auth flow errors.

use thiserror::Error;

use crate::error::ApiError;
use crate::storage::StorageError;

/// Errors that can end a login attempt. Every variant returns the flow to
/// idle; none leaves the UI spinning.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The popup/deep-link callback did not arrive within the ceiling.
    /// Treated as silent abandonment by the UI (stop spinner, no alert).
    #[error("timed out waiting for the auth callback")]
    Timeout,

    /// The backend rejected the account for the selected portal.
    #[error("account cannot use the selected portal")]
    RoleMismatch,

    /// The callback carried a structured error code other than role
    /// mismatch.
    #[error("auth callback error: {0}")]
    Callback(String),

    /// The callback arrived without a token or error (malformed redirect).
    #[error("auth callback carried no token")]
    MissingToken,

    /// The callback URL did not match the expected scheme/route.
    #[error("malformed callback URL: {0}")]
    InvalidCallback(String),

    /// The listener was torn down before a callback arrived.
    #[error("callback listener closed")]
    ListenerClosed,

    /// A backend call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Session persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
