//! Keyknox manager: encrypted values on top of the storage client.
//!
//! The manager owns no lock. Concurrent writers are serialized by the
//! service's previous-hash check alone; [`KeyknoxManager::update_value`]
//! turns that into a bounded pull → compute → push loop.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::client::KeyknoxApi;
use crate::crypto::KeyknoxCrypto;
use crate::error::{KeyknoxError, Result};
use crate::types::{
    DecryptedKeyknoxValue, EncryptedKeyknoxValue, KeyknoxHash, KeyknoxPath, PullRequest,
    PushRequest, ResetRequest,
};

/// Bound on the conflict-retry loop.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Combines a storage client with an encryption capability.
pub struct KeyknoxManager<A, C> {
    api: A,
    crypto: C,
}

impl<A: KeyknoxApi, C: KeyknoxCrypto> KeyknoxManager<A, C> {
    pub fn new(api: A, crypto: C) -> Self {
        Self { api, crypto }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn decrypt(&self, encrypted: EncryptedKeyknoxValue) -> Result<DecryptedKeyknoxValue> {
        if encrypted.is_empty() {
            return Ok(encrypted.into_decrypted(Bytes::new()));
        }
        let data = self.crypto.decrypt(&encrypted.meta, &encrypted.value)?;
        Ok(encrypted.into_decrypted(Bytes::from(data)))
    }

    /// Encrypt `data` and push it to `path`, sharing with `identities`.
    pub async fn push_value(
        &self,
        path: &KeyknoxPath,
        identities: &[String],
        data: &[u8],
        previous_hash: Option<KeyknoxHash>,
    ) -> Result<DecryptedKeyknoxValue> {
        let (meta, value) = self.crypto.encrypt(data)?;
        let pushed = self
            .api
            .push_value(PushRequest {
                identities: identities.to_vec(),
                path: path.clone(),
                meta,
                value,
                previous_hash,
                overwrite: false,
            })
            .await?;
        debug!(%path, version = pushed.version, "pushed encrypted value");
        Ok(pushed.into_decrypted(Bytes::copy_from_slice(data)))
    }

    /// Pull and decrypt. `identity = None` reads the caller's own namespace.
    pub async fn pull_value(
        &self,
        identity: Option<&str>,
        path: &KeyknoxPath,
    ) -> Result<DecryptedKeyknoxValue> {
        let encrypted = self
            .api
            .pull_value(PullRequest {
                identity: identity.map(str::to_string),
                path: path.clone(),
            })
            .await?;
        self.decrypt(encrypted)
    }

    /// Empty the value at `path`.
    pub async fn reset_value(&self, path: &KeyknoxPath) -> Result<DecryptedKeyknoxValue> {
        self.api.reset_value(ResetRequest::path(path)).await
    }

    /// Read-modify-write `path` in the caller's own namespace.
    ///
    /// `compute` receives the current plaintext (empty if none) and returns
    /// the new one. On a concurrency conflict the value is pulled again and
    /// `compute` re-run, up to `config.max_attempts` attempts in total.
    pub async fn update_value<F>(
        &self,
        path: &KeyknoxPath,
        identities: &[String],
        mut compute: F,
        config: &RetryConfig,
    ) -> Result<DecryptedKeyknoxValue>
    where
        F: FnMut(&[u8]) -> Result<Vec<u8>> + Send,
    {
        let attempts = config.max_attempts.max(1);
        for attempt in 1..=attempts {
            let current = self.pull_value(None, path).await?;
            let next = compute(&current.value)?;

            match self
                .push_value(path, identities, &next, Some(current.hash))
                .await
            {
                Err(KeyknoxError::ConcurrencyConflict { expected, actual }) => {
                    warn!(%path, attempt, %expected, %actual, "keyknox write conflict, retrying");
                }
                other => return other,
            }
        }
        Err(KeyknoxError::RetriesExhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::KeyknoxClient;
    use crate::crypto::SealCrypto;
    use crate::memory::MemoryKeyknoxTransport;
    use crate::transport::KeyknoxTransport;
    use async_trait::async_trait;
    use keycard_auth::{AccessToken, ConstAccessTokenProvider};
    use keycard_core::Keypair;
    use keycard_seal::X25519StaticSecret;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    type Client<T> = KeyknoxClient<T, ConstAccessTokenProvider>;

    fn path() -> KeyknoxPath {
        KeyknoxPath::new("e3kit", "backup", "main")
    }

    fn crypto() -> SealCrypto {
        SealCrypto::new(
            Keypair::from_seed(&[1; 32]),
            X25519StaticSecret::from_bytes([1; 32]),
        )
    }

    fn manager<T: KeyknoxTransport>(transport: T) -> KeyknoxManager<Client<T>, SealCrypto> {
        let client = KeyknoxClient::new(
            transport,
            ConstAccessTokenProvider::from_string("alice-token").unwrap(),
        );
        KeyknoxManager::new(client, crypto())
    }

    fn memory() -> Arc<MemoryKeyknoxTransport> {
        let service = MemoryKeyknoxTransport::new();
        service.authorize("alice-token", "alice").unwrap();
        Arc::new(service)
    }

    #[tokio::test]
    async fn test_push_pull_decrypts() {
        let service = memory();
        let manager = manager(service.clone());

        let pushed = manager
            .push_value(&path(), &[], b"secret material", None)
            .await
            .unwrap();
        assert_eq!(&pushed.value[..], b"secret material");

        // The service only holds ciphertext
        let stored = service.entry("alice", &path()).unwrap().unwrap();
        assert_ne!(&stored.value[..], b"secret material");

        let pulled = manager.pull_value(None, &path()).await.unwrap();
        assert_eq!(&pulled.value[..], b"secret material");
        assert_eq!(pulled.hash, pushed.hash);
    }

    #[tokio::test]
    async fn test_pull_empty_skips_crypto() {
        let manager = manager(memory());
        let pulled = manager.pull_value(None, &path()).await.unwrap();
        assert!(pulled.value.is_empty());
        assert_eq!(pulled.version, 0);
    }

    #[tokio::test]
    async fn test_reset_then_pull_is_empty() {
        let manager = manager(memory());
        manager.push_value(&path(), &[], b"x", None).await.unwrap();
        let reset = manager.reset_value(&path()).await.unwrap();
        assert_eq!(reset.version, 2);

        let pulled = manager.pull_value(None, &path()).await.unwrap();
        assert!(pulled.value.is_empty());
        assert_eq!(pulled.hash, reset.hash);
    }

    #[tokio::test]
    async fn test_update_value_appends() {
        let manager = manager(memory());
        for chunk in [b"a", b"b", b"c"] {
            manager
                .update_value(
                    &path(),
                    &[],
                    |current| {
                        let mut next = current.to_vec();
                        next.extend_from_slice(chunk);
                        Ok(next)
                    },
                    &RetryConfig::default(),
                )
                .await
                .unwrap();
        }
        let pulled = manager.pull_value(None, &path()).await.unwrap();
        assert_eq!(&pulled.value[..], b"abc");
        assert_eq!(pulled.version, 3);
    }

    /// Lets a competing writer slip in before the first `n` pushes.
    struct RacingTransport {
        inner: Arc<MemoryKeyknoxTransport>,
        rival: AccessToken,
        races_left: AtomicU32,
    }

    #[async_trait]
    impl KeyknoxTransport for RacingTransport {
        async fn push(&self, token: &AccessToken, request: PushRequest) -> Result<EncryptedKeyknoxValue> {
            let left = self.races_left.load(Ordering::SeqCst);
            if left > 0 {
                self.races_left.store(left - 1, Ordering::SeqCst);
                let current = self
                    .inner
                    .pull(&self.rival, PullRequest { identity: None, path: request.path.clone() })
                    .await?;
                let mut rival = request.clone();
                rival.previous_hash = Some(current.hash);
                self.inner.push(&self.rival, rival).await?;
            }
            self.inner.push(token, request).await
        }
        async fn pull(&self, token: &AccessToken, request: PullRequest) -> Result<EncryptedKeyknoxValue> {
            self.inner.pull(token, request).await
        }
        async fn get_keys(&self, token: &AccessToken, request: crate::types::KeysRequest) -> Result<Vec<String>> {
            self.inner.get_keys(token, request).await
        }
        async fn reset(&self, token: &AccessToken, request: ResetRequest) -> Result<EncryptedKeyknoxValue> {
            self.inner.reset(token, request).await
        }
    }

    fn racing(races: u32) -> RacingTransport {
        let inner = memory();
        // Second device of the same identity
        inner.authorize("alice-laptop", "alice").unwrap();
        RacingTransport {
            inner,
            rival: AccessToken::new("alice-laptop").unwrap(),
            races_left: AtomicU32::new(races),
        }
    }

    #[tokio::test]
    async fn test_update_value_retries_conflicts() {
        let manager = manager(racing(2));
        let mut calls = 0;
        let result = manager
            .update_value(
                &path(),
                &[],
                |_| {
                    calls += 1;
                    Ok(b"mine".to_vec())
                },
                &RetryConfig::default(),
            )
            .await
            .unwrap();
        assert_eq!(calls, 3);
        assert_eq!(&result.value[..], b"mine");
        // Two rival writes plus ours
        assert_eq!(result.version, 3);
    }

    #[tokio::test]
    async fn test_update_value_gives_up() {
        let manager = manager(racing(10));
        let err = manager
            .update_value(
                &path(),
                &[],
                |_| Ok(b"mine".to_vec()),
                &RetryConfig { max_attempts: 3 },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KeyknoxError::RetriesExhausted { attempts: 3 }));
    }

    #[tokio::test]
    async fn test_compute_error_aborts() {
        let manager = manager(memory());
        let err = manager
            .update_value(
                &path(),
                &[],
                |_| Err(KeyknoxError::Crypto("refused".into())),
                &RetryConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KeyknoxError::Crypto(_)));
    }
}
