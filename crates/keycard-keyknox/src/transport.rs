//! Transport abstraction for the Keyknox service.
//!
//! The transport carries one authenticated request to the service and
//! returns its answer. Implementations may use HTTP or anything else; the
//! wire format is theirs to choose. [`crate::memory`] provides an
//! in-process service with the same semantics.

use async_trait::async_trait;
use std::sync::Arc;

use keycard_auth::AccessToken;

use crate::error::Result;
use crate::types::{EncryptedKeyknoxValue, KeysRequest, PullRequest, PushRequest, ResetRequest};

/// A channel to the Keyknox service.
///
/// Implementations must be thread-safe (Send + Sync). A rejected token is
/// reported as [`KeyknoxError::Unauthorized`](crate::KeyknoxError::Unauthorized).
#[async_trait]
pub trait KeyknoxTransport: Send + Sync {
    /// Write a value, subject to the previous-hash check.
    async fn push(&self, token: &AccessToken, request: PushRequest) -> Result<EncryptedKeyknoxValue>;

    /// Read a value.
    async fn pull(&self, token: &AccessToken, request: PullRequest) -> Result<EncryptedKeyknoxValue>;

    /// List keys under a root.
    async fn get_keys(&self, token: &AccessToken, request: KeysRequest) -> Result<Vec<String>>;

    /// Empty matching values and advance their versions.
    async fn reset(&self, token: &AccessToken, request: ResetRequest) -> Result<EncryptedKeyknoxValue>;
}

#[async_trait]
impl<T: KeyknoxTransport + ?Sized> KeyknoxTransport for Arc<T> {
    async fn push(&self, token: &AccessToken, request: PushRequest) -> Result<EncryptedKeyknoxValue> {
        (**self).push(token, request).await
    }

    async fn pull(&self, token: &AccessToken, request: PullRequest) -> Result<EncryptedKeyknoxValue> {
        (**self).pull(token, request).await
    }

    async fn get_keys(&self, token: &AccessToken, request: KeysRequest) -> Result<Vec<String>> {
        (**self).get_keys(token, request).await
    }

    async fn reset(&self, token: &AccessToken, request: ResetRequest) -> Result<EncryptedKeyknoxValue> {
        (**self).reset(token, request).await
    }
}
