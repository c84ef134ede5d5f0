//! Error types for Keycard.

use keycard_auth::TokenError;
use keycard_core::{CoreError, ValidationError};
use keycard_keyknox::{KeyknoxError, KeyknoxHash};
use thiserror::Error;

/// Errors that can occur during Keycard operations.
#[derive(Debug, Error)]
pub enum KeycardError {
    /// A value could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Key material is unusable.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A card failed its cryptographic checks (the card is rejected).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A write named a previous hash that is no longer current.
    #[error("concurrency conflict: expected hash {expected}, current hash is {actual}")]
    ConcurrencyConflict {
        expected: KeyknoxHash,
        actual: KeyknoxHash,
    },

    /// The remote side could not be reached or failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Token acquisition failed.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// The requested card or value does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service rejected the access token or the request's identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Other roaming storage error.
    #[error("keyknox error: {0}")]
    Keyknox(KeyknoxError),
}

impl KeycardError {
    /// Whether repeating the operation (after a fresh read) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeycardError::ConcurrencyConflict { .. } | KeycardError::Transport(_)
        )
    }

    /// Whether the failure means data did not verify.
    pub fn is_cryptographically_invalid(&self) -> bool {
        matches!(self, KeycardError::Validation(_))
    }
}

impl From<CoreError> for KeycardError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidKey(msg) => KeycardError::InvalidKey(msg),
            CoreError::InvalidSignature => KeycardError::InvalidKey("invalid signature".into()),
            CoreError::Encoding(msg) | CoreError::Decoding(msg) | CoreError::MalformedCard(msg) => {
                KeycardError::Encoding(msg)
            }
            CoreError::DuplicateSigner(signer) => {
                KeycardError::Encoding(format!("duplicate signer {}", signer))
            }
        }
    }
}

impl From<KeyknoxError> for KeycardError {
    fn from(e: KeyknoxError) -> Self {
        match e {
            KeyknoxError::ConcurrencyConflict { expected, actual } => {
                KeycardError::ConcurrencyConflict { expected, actual }
            }
            KeyknoxError::Unauthorized(msg) => KeycardError::Unauthorized(msg),
            KeyknoxError::NotFound(msg) => KeycardError::NotFound(msg),
            KeyknoxError::Transport(msg) => KeycardError::Transport(msg),
            KeyknoxError::Token(e) => KeycardError::Token(e),
            other => KeycardError::Keyknox(other),
        }
    }
}

/// Result type for Keycard operations.
pub type Result<T> = std::result::Result<T, KeycardError>;
