//! Store infrastructure errors.
//!
//! Authentication outcomes are not errors — they are [`Decision`] variants.
//! [`StoreError`] covers the one failure class the contract keeps separate:
//! the key-value backend being unreachable or returning garbage. It
//! propagates to the caller instead of being folded into "no session".
//!
//! [`Decision`]: crate::provider::Decision

/// Errors raised by a [`SessionStore`](crate::store::SessionStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    /// A stored session record could not be decoded.
    #[error("stored session record is not valid JSON")]
    Encoding(#[from] serde_json::Error),
}
