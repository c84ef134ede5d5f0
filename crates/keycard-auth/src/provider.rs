//! Token providers.
//!
//! Consumers only see [`AccessTokenProvider`]; whether the token is a fixed
//! string or comes from a caller callback is invisible to them.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Result, TokenError};
use crate::token::{AccessToken, TokenContext};

/// Capability that yields an access token for a context.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn get_token(&self, ctx: &TokenContext) -> Result<AccessToken>;
}

#[async_trait]
impl<P: AccessTokenProvider + ?Sized> AccessTokenProvider for Arc<P> {
    async fn get_token(&self, ctx: &TokenContext) -> Result<AccessToken> {
        (**self).get_token(ctx).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Constant provider
// ─────────────────────────────────────────────────────────────────────────────

/// Always returns the same token, ignoring `force_reload`.
#[derive(Clone, Debug)]
pub struct ConstAccessTokenProvider {
    token: AccessToken,
}

impl ConstAccessTokenProvider {
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }

    /// Build from a raw string, rejecting an empty one.
    pub fn from_string(token: impl Into<String>) -> Result<Self> {
        Ok(Self::new(AccessToken::new(token)?))
    }
}

#[async_trait]
impl AccessTokenProvider for ConstAccessTokenProvider {
    async fn get_token(&self, _ctx: &TokenContext) -> Result<AccessToken> {
        Ok(self.token.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Callback provider
// ─────────────────────────────────────────────────────────────────────────────

/// Single-use handle through which a callback answers a token request.
///
/// Consuming `self` on [`complete`](Self::complete) makes a second answer
/// impossible. Dropping the handle unanswered fails the request with
/// [`TokenError::CompletionDropped`].
#[derive(Debug)]
pub struct TokenCompletion {
    tx: oneshot::Sender<anyhow::Result<String>>,
}

impl TokenCompletion {
    pub fn complete(self, result: anyhow::Result<String>) {
        // The requester may have gone away; nothing to report then.
        let _ = self.tx.send(result);
    }

    pub fn succeed(self, token: impl Into<String>) {
        self.complete(Ok(token.into()))
    }

    pub fn fail(self, error: anyhow::Error) {
        self.complete(Err(error))
    }
}

type TokenCallback = dyn Fn(TokenContext, TokenCompletion) + Send + Sync;

/// Obtains tokens from a caller-supplied callback.
///
/// The callback may answer synchronously or hand the completion to another
/// thread or task; the result is delivered to whoever awaits `get_token`.
#[derive(Clone)]
pub struct CallbackAccessTokenProvider {
    callback: Arc<TokenCallback>,
}

impl CallbackAccessTokenProvider {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(TokenContext, TokenCompletion) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl std::fmt::Debug for CallbackAccessTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackAccessTokenProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl AccessTokenProvider for CallbackAccessTokenProvider {
    async fn get_token(&self, ctx: &TokenContext) -> Result<AccessToken> {
        if ctx.force_reload {
            debug!(service = %ctx.service, operation = %ctx.operation, "forcing token reload");
        }

        let (tx, rx) = oneshot::channel();
        (self.callback)(ctx.clone(), TokenCompletion { tx });

        match rx.await {
            Ok(Ok(token)) => AccessToken::new(token),
            Ok(Err(e)) => Err(TokenError::Callback(e)),
            Err(_) => Err(TokenError::CompletionDropped),
        }
    }
}
