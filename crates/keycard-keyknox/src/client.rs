//! The Keyknox storage client.
//!
//! Wraps a [`KeyknoxTransport`] with token acquisition. Every call asks the
//! provider for a token scoped to the `keyknox` service and the operation;
//! when the service rejects the token the client reloads it once and
//! retries once. Nothing else is retried here: conflicts and transport
//! failures go straight back to the caller.

use async_trait::async_trait;
use std::future::Future;
use tracing::debug;

use keycard_auth::{AccessToken, AccessTokenProvider, TokenContext, KEYKNOX_SERVICE};

use crate::error::{KeyknoxError, Result};
use crate::transport::KeyknoxTransport;
use crate::types::{
    DecryptedKeyknoxValue, EncryptedKeyknoxValue, KeyknoxPath, KeysRequest, PullRequest,
    PushRequest, ResetRequest,
};

/// Operations of the roaming storage, independent of how they are carried.
#[async_trait]
pub trait KeyknoxApi: Send + Sync {
    async fn push_value(&self, request: PushRequest) -> Result<EncryptedKeyknoxValue>;

    async fn pull_value(&self, request: PullRequest) -> Result<EncryptedKeyknoxValue>;

    async fn get_keys(&self, request: KeysRequest) -> Result<Vec<String>>;

    /// Empties matching values. The returned value has no content.
    async fn reset_value(&self, request: ResetRequest) -> Result<DecryptedKeyknoxValue>;
}

/// Configuration for [`KeyknoxClient`].
#[derive(Debug, Clone)]
pub struct KeyknoxClientConfig {
    /// Reload the token and retry once when the service rejects it.
    pub retry_on_unauthorized: bool,
}

impl Default for KeyknoxClientConfig {
    fn default() -> Self {
        Self {
            retry_on_unauthorized: true,
        }
    }
}

/// Client for the Keyknox service.
pub struct KeyknoxClient<T, P> {
    transport: T,
    provider: P,
    identity: Option<String>,
    config: KeyknoxClientConfig,
}

impl<T: KeyknoxTransport, P: AccessTokenProvider> KeyknoxClient<T, P> {
    pub fn new(transport: T, provider: P) -> Self {
        Self::with_config(transport, provider, KeyknoxClientConfig::default())
    }

    pub fn with_config(transport: T, provider: P, config: KeyknoxClientConfig) -> Self {
        Self {
            transport,
            provider,
            identity: None,
            config,
        }
    }

    /// Identity passed to the token provider in every context.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn context(&self, operation: &str) -> TokenContext {
        let ctx = TokenContext::new(KEYKNOX_SERVICE, operation);
        match &self.identity {
            Some(identity) => ctx.with_identity(identity.clone()),
            None => ctx,
        }
    }

    async fn authorized<R, F, Fut>(&self, operation: &str, call: F) -> Result<R>
    where
        F: Fn(AccessToken) -> Fut + Send + Sync,
        Fut: Future<Output = Result<R>> + Send,
        R: Send,
    {
        let ctx = self.context(operation);
        let token = self.provider.get_token(&ctx).await?;

        match call(token).await {
            Err(KeyknoxError::Unauthorized(reason)) if self.config.retry_on_unauthorized => {
                debug!(operation, %reason, "keyknox rejected token, reloading");
                let token = self.provider.get_token(&ctx.reloaded()).await?;
                call(token).await
            }
            other => other,
        }
    }
}

fn check_path(requested: &KeyknoxPath, value: &EncryptedKeyknoxValue) -> Result<()> {
    if *requested != value.path {
        return Err(KeyknoxError::InvalidResponse(format!(
            "asked for {}, service answered for {}",
            requested, value.path
        )));
    }
    Ok(())
}

#[async_trait]
impl<T: KeyknoxTransport, P: AccessTokenProvider> KeyknoxApi for KeyknoxClient<T, P> {
    async fn push_value(&self, request: PushRequest) -> Result<EncryptedKeyknoxValue> {
        let transport = &self.transport;
        let value = self
            .authorized("push", |token| {
                let request = request.clone();
                async move { transport.push(&token, request).await }
            })
            .await?;
        check_path(&request.path, &value)?;
        Ok(value)
    }

    async fn pull_value(&self, request: PullRequest) -> Result<EncryptedKeyknoxValue> {
        let transport = &self.transport;
        let value = self
            .authorized("pull", |token| {
                let request = request.clone();
                async move { transport.pull(&token, request).await }
            })
            .await?;
        check_path(&request.path, &value)?;
        Ok(value)
    }

    async fn get_keys(&self, request: KeysRequest) -> Result<Vec<String>> {
        let transport = &self.transport;
        self.authorized("get_keys", |token| {
            let request = request.clone();
            async move { transport.get_keys(&token, request).await }
        })
        .await
    }

    async fn reset_value(&self, request: ResetRequest) -> Result<DecryptedKeyknoxValue> {
        let transport = &self.transport;
        let value = self
            .authorized("reset", |token| {
                let request = request.clone();
                async move { transport.reset(&token, request).await }
            })
            .await?;
        if !value.is_empty() {
            return Err(KeyknoxError::InvalidResponse(
                "reset answered with content".into(),
            ));
        }
        Ok(value.into_decrypted(Default::default()))
    }
}
