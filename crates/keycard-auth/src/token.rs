//! Access tokens and the context they are requested for.

use std::fmt;

use crate::error::{Result, TokenError};

/// Service name used by card publication and lookup.
pub const CARDS_SERVICE: &str = "cards";

/// Service name used by the roaming key storage.
pub const KEYKNOX_SERVICE: &str = "keyknox";

/// Describes what a token will be used for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenContext {
    /// The identity the token should authenticate, if the caller knows it.
    pub identity: Option<String>,
    pub service: String,
    pub operation: String,
    /// Set after the server rejected the previous token.
    pub force_reload: bool,
}

impl TokenContext {
    pub fn new(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            identity: None,
            service: service.into(),
            operation: operation.into(),
            force_reload: false,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// The same context, asking the provider to bypass any cached token.
    pub fn reloaded(&self) -> Self {
        Self {
            force_reload: true,
            ..self.clone()
        }
    }
}

/// An opaque, non-empty bearer token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(TokenError::EmptyToken);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl AsRef<str> for AccessToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
