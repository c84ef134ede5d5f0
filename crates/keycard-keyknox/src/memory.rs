//! In-memory implementation of the Keyknox service.
//!
//! Keeps the same semantics as the remote service (token authorization,
//! previous-hash checks, identity sharing, reset) with no persistence.
//! Used by tests and local tooling.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use keycard_auth::AccessToken;

use crate::error::{KeyknoxError, Result};
use crate::transport::KeyknoxTransport;
use crate::types::{
    EncryptedKeyknoxValue, KeyknoxHash, KeyknoxPath, KeysRequest, PullRequest, PushRequest,
    ResetRequest,
};

/// In-memory Keyknox service.
///
/// All data is lost when the service is dropped. Thread-safe via RwLock.
pub struct MemoryKeyknoxTransport {
    inner: RwLock<MemoryKeyknoxInner>,
}

#[derive(Default)]
struct MemoryKeyknoxInner {
    /// Bearer token -> identity.
    tokens: HashMap<String, String>,

    /// (owner, path) -> entry.
    entries: HashMap<(String, KeyknoxPath), StoredEntry>,
}

#[derive(Clone)]
struct StoredEntry {
    identities: BTreeSet<String>,
    meta: Bytes,
    value: Bytes,
    version: u64,
    hash: KeyknoxHash,
}

impl StoredEntry {
    /// Empty the entry. The version still advances and the hash chains on.
    fn reset(&mut self) {
        self.version += 1;
        self.meta = Bytes::new();
        self.value = Bytes::new();
        self.hash = KeyknoxHash::chain(&self.hash, self.version, &[], &[]);
    }

    fn to_value(&self, owner: &str, path: &KeyknoxPath) -> EncryptedKeyknoxValue {
        EncryptedKeyknoxValue {
            owner: owner.to_string(),
            identities: self.identities.iter().cloned().collect(),
            path: path.clone(),
            meta: self.meta.clone(),
            value: self.value.clone(),
            version: self.version,
            hash: self.hash,
        }
    }
}

fn empty_value(owner: &str, path: KeyknoxPath) -> EncryptedKeyknoxValue {
    EncryptedKeyknoxValue {
        owner: owner.to_string(),
        identities: vec![owner.to_string()],
        path,
        meta: Bytes::new(),
        value: Bytes::new(),
        version: 0,
        hash: KeyknoxHash::ZERO,
    }
}

impl MemoryKeyknoxTransport {
    /// Create a new empty service.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryKeyknoxInner::default()),
        }
    }

    /// Accept `token` as authenticating `identity`.
    pub fn authorize(&self, token: impl Into<String>, identity: impl Into<String>) -> Result<()> {
        self.write()?.tokens.insert(token.into(), identity.into());
        Ok(())
    }

    /// Stop accepting `token`.
    pub fn revoke_token(&self, token: &str) -> Result<()> {
        self.write()?.tokens.remove(token);
        Ok(())
    }

    /// Current stored state of an entry, bypassing authorization.
    pub fn entry(&self, owner: &str, path: &KeyknoxPath) -> Result<Option<EncryptedKeyknoxValue>> {
        let inner = self.read()?;
        Ok(inner
            .entries
            .get(&(owner.to_string(), path.clone()))
            .map(|e| e.to_value(owner, path)))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryKeyknoxInner>> {
        self.inner
            .read()
            .map_err(|_| KeyknoxError::Transport("keyknox state lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryKeyknoxInner>> {
        self.inner
            .write()
            .map_err(|_| KeyknoxError::Transport("keyknox state lock poisoned".into()))
    }
}

impl Default for MemoryKeyknoxTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKeyknoxInner {
    fn identity(&self, token: &AccessToken) -> Result<String> {
        self.tokens
            .get(token.as_str())
            .cloned()
            .ok_or_else(|| KeyknoxError::Unauthorized("unknown access token".into()))
    }
}

fn check_path(path: &KeyknoxPath) -> Result<()> {
    if path.root1.is_empty() || path.root2.is_empty() || path.key.is_empty() {
        return Err(KeyknoxError::InvalidRequest(format!(
            "path components must not be empty: {}",
            path
        )));
    }
    Ok(())
}

#[async_trait]
impl KeyknoxTransport for MemoryKeyknoxTransport {
    async fn push(&self, token: &AccessToken, request: PushRequest) -> Result<EncryptedKeyknoxValue> {
        check_path(&request.path)?;
        let mut inner = self.write()?;
        let owner = inner.identity(token)?;
        let key = (owner.clone(), request.path.clone());

        let (current_hash, current_version, current_identities) = match inner.entries.get(&key) {
            Some(e) => (e.hash, e.version, e.identities.clone()),
            None => (KeyknoxHash::ZERO, 0, BTreeSet::new()),
        };

        let expected = request.previous_hash.unwrap_or(KeyknoxHash::ZERO);
        if expected != current_hash {
            return Err(KeyknoxError::ConcurrencyConflict {
                expected,
                actual: current_hash,
            });
        }

        let mut identities = if request.overwrite {
            BTreeSet::new()
        } else {
            current_identities
        };
        identities.extend(request.identities);
        identities.insert(owner.clone());

        let version = current_version + 1;
        let hash = KeyknoxHash::chain(&current_hash, version, &request.meta, &request.value);
        let entry = StoredEntry {
            identities,
            meta: request.meta,
            value: request.value,
            version,
            hash,
        };
        let response = entry.to_value(&owner, &request.path);
        inner.entries.insert(key, entry);

        debug!(%owner, path = %request.path, version, "keyknox push accepted");
        Ok(response)
    }

    async fn pull(&self, token: &AccessToken, request: PullRequest) -> Result<EncryptedKeyknoxValue> {
        check_path(&request.path)?;
        let inner = self.read()?;
        let caller = inner.identity(token)?;
        let owner = request.identity.unwrap_or_else(|| caller.clone());

        match inner.entries.get(&(owner.clone(), request.path.clone())) {
            None => Ok(empty_value(&owner, request.path)),
            Some(entry) if entry.identities.contains(&caller) => {
                Ok(entry.to_value(&owner, &request.path))
            }
            Some(_) => Err(KeyknoxError::NotFound(format!(
                "{} of {}",
                request.path, owner
            ))),
        }
    }

    async fn get_keys(&self, token: &AccessToken, request: KeysRequest) -> Result<Vec<String>> {
        let inner = self.read()?;
        let caller = inner.identity(token)?;
        let owner = request.identity.unwrap_or_else(|| caller.clone());

        let keys: BTreeSet<String> = inner
            .entries
            .iter()
            .filter(|((o, path), entry)| {
                *o == owner
                    && entry.identities.contains(&caller)
                    && path.matches(request.root1.as_deref(), request.root2.as_deref(), None)
            })
            .map(|((_, path), _)| path.key.clone())
            .collect();

        Ok(keys.into_iter().collect())
    }

    async fn reset(&self, token: &AccessToken, request: ResetRequest) -> Result<EncryptedKeyknoxValue> {
        let mut inner = self.write()?;
        let owner = inner.identity(token)?;

        let requested = KeyknoxPath::new(
            request.root1.clone().unwrap_or_default(),
            request.root2.clone().unwrap_or_default(),
            request.key.clone().unwrap_or_default(),
        );
        let single = request.root1.is_some() && request.root2.is_some() && request.key.is_some();

        if single {
            check_path(&requested)?;
            let entry = inner
                .entries
                .entry((owner.clone(), requested.clone()))
                .or_insert_with(|| StoredEntry {
                    identities: BTreeSet::from([owner.clone()]),
                    meta: Bytes::new(),
                    value: Bytes::new(),
                    version: 0,
                    hash: KeyknoxHash::ZERO,
                });
            entry.reset();
            debug!(%owner, path = %requested, version = entry.version, "keyknox reset");
            return Ok(entry.to_value(&owner, &requested));
        }

        // Sorted so that equal versions resolve to the first path
        let mut matching: Vec<(String, KeyknoxPath)> = inner
            .entries
            .keys()
            .filter(|(o, path)| {
                *o == owner
                    && path.matches(
                        request.root1.as_deref(),
                        request.root2.as_deref(),
                        request.key.as_deref(),
                    )
            })
            .cloned()
            .collect();
        matching.sort();

        let mut latest: Option<EncryptedKeyknoxValue> = None;
        for key in matching {
            let Some(entry) = inner.entries.get_mut(&key) else {
                continue;
            };
            entry.reset();
            if latest.as_ref().map_or(true, |l| entry.version > l.version) {
                latest = Some(entry.to_value(&key.0, &key.1));
            }
        }

        debug!(%owner, path = %requested, "keyknox reset");
        Ok(match latest {
            Some(value) => EncryptedKeyknoxValue {
                path: requested,
                ..value
            },
            None => empty_value(&owner, requested),
        })
    }
}
