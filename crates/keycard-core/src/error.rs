//! Error types for Keycard Core.

use thiserror::Error;

/// Core errors that can occur while building, signing, or encoding cards.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("duplicate signer: {0}")]
    DuplicateSigner(String),

    #[error("malformed card: {0}")]
    MalformedCard(String),
}

/// Validation errors raised when a card (imported or returned by the
/// publication service) fails its cryptographic checks.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("card id mismatch: claimed {claimed}, computed {computed}")]
    IdMismatch { claimed: String, computed: String },

    #[error("card has no self signature")]
    MissingSelfSignature,

    #[error("signature verification failed for signer {0}")]
    SignatureFailed(String),

    #[error("card has no valid service signature")]
    MissingServiceSignature,

    #[error("no whitelisted signer verified the card")]
    WhitelistFailed,

    #[error("malformed card: {0}")]
    Malformed(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature => ValidationError::Malformed("invalid signature".into()),
            CoreError::InvalidKey(msg)
            | CoreError::Encoding(msg)
            | CoreError::Decoding(msg)
            | CoreError::MalformedCard(msg) => ValidationError::Malformed(msg),
            CoreError::DuplicateSigner(signer) => {
                ValidationError::Malformed(format!("duplicate signer {}", signer))
            }
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
