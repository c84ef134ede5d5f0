//! Error types for sealed envelopes.

use thiserror::Error;

/// Errors that can occur while sealing or opening an envelope.
#[derive(Debug, Error)]
pub enum SealError {
    /// Sealing requires at least one recipient.
    #[error("no recipients given")]
    NoRecipients,

    /// The envelope holds no key share for this secret key.
    #[error("not a recipient of this envelope")]
    NotARecipient,

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error (wrong key or tampered data).
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// No verifier key matched the embedded signature.
    #[error("signature did not verify under any trusted key")]
    SignatureFailed,

    /// The header format version is unknown.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] keycard_core::CoreError),
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, SealError>;
