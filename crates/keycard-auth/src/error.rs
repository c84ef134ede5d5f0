//! Error types for token acquisition.

use thiserror::Error;

/// Errors that can occur while obtaining an access token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The provider produced an empty token.
    #[error("access token is empty")]
    EmptyToken,

    /// The caller's callback reported a failure.
    #[error("token callback failed: {0}")]
    Callback(anyhow::Error),

    /// The completion handle was dropped without being invoked.
    #[error("token callback dropped its completion without answering")]
    CompletionDropped,
}

/// Result type for token operations.
pub type Result<T> = std::result::Result<T, TokenError>;
