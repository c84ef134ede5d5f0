//! Error types for the Keyknox module.

use thiserror::Error;

use crate::types::KeyknoxHash;

/// Errors that can occur during Keyknox operations.
#[derive(Debug, Error)]
pub enum KeyknoxError {
    /// The supplied previous hash is not the entry's current hash.
    #[error("concurrency conflict: expected hash {expected}, current hash is {actual}")]
    ConcurrencyConflict {
        expected: KeyknoxHash,
        actual: KeyknoxHash,
    },

    /// The service rejected the access token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The entry does not exist or is not shared with the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport failure (network, server error).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with something inconsistent with the request.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Token acquisition failed.
    #[error("token error: {0}")]
    Token(#[from] keycard_auth::TokenError),

    /// Encryption capability failure.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Envelope error.
    #[error("seal error: {0}")]
    Seal(#[from] keycard_seal::SealError),

    /// Every attempt of a pull-compute-push loop hit a conflict.
    #[error("gave up after {attempts} conflicting attempts")]
    RetriesExhausted { attempts: u32 },
}

impl KeyknoxError {
    /// Whether a fresh pull followed by a new push may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, KeyknoxError::ConcurrencyConflict { .. })
    }
}

/// Result type for Keyknox operations.
pub type Result<T> = std::result::Result<T, KeyknoxError>;
