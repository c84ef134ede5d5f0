//! Keyknox data types: paths, version hashes, entries and requests.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a value inside one identity's namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyknoxPath {
    pub root1: String,
    pub root2: String,
    pub key: String,
}

impl KeyknoxPath {
    pub fn new(root1: impl Into<String>, root2: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            root1: root1.into(),
            root2: root2.into(),
            key: key.into(),
        }
    }

    /// Whether this path falls under the given (possibly wildcard) components.
    pub fn matches(&self, root1: Option<&str>, root2: Option<&str>, key: Option<&str>) -> bool {
        root1.map_or(true, |r| r == self.root1)
            && root2.map_or(true, |r| r == self.root2)
            && key.map_or(true, |k| k == self.key)
    }
}

impl fmt::Display for KeyknoxPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.root1, self.root2, self.key)
    }
}

/// Version hash of an entry. Chained: each accepted write hashes the
/// previous hash together with the new version and content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyknoxHash(pub [u8; 32]);

impl KeyknoxHash {
    /// Hash of an entry that was never written.
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// `BLAKE3(previous || version || len(meta) || meta || value)`.
    pub fn chain(previous: &KeyknoxHash, version: u64, meta: &[u8], value: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&previous.0);
        hasher.update(&version.to_be_bytes());
        hasher.update(&(meta.len() as u64).to_be_bytes());
        hasher.update(meta);
        hasher.update(value);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut arr = [0u8; 32];
        hex::decode_to_slice(s, &mut arr)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for KeyknoxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyknoxHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for KeyknoxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex()[..16])
    }
}

/// An entry as stored by the service: content is opaque ciphertext.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyknoxValue {
    pub owner: String,
    pub identities: Vec<String>,
    pub path: KeyknoxPath,
    pub meta: Bytes,
    pub value: Bytes,
    pub version: u64,
    pub hash: KeyknoxHash,
}

impl EncryptedKeyknoxValue {
    /// An entry that holds nothing (never written, or reset).
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.value.is_empty()
    }

    /// Keep version bookkeeping, replace the ciphertext by plaintext.
    pub fn into_decrypted(self, value: Bytes) -> DecryptedKeyknoxValue {
        DecryptedKeyknoxValue {
            owner: self.owner,
            identities: self.identities,
            path: self.path,
            meta: self.meta,
            value,
            version: self.version,
            hash: self.hash,
        }
    }
}

/// An entry whose value has been decrypted locally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptedKeyknoxValue {
    pub owner: String,
    pub identities: Vec<String>,
    pub path: KeyknoxPath,
    pub meta: Bytes,
    pub value: Bytes,
    pub version: u64,
    pub hash: KeyknoxHash,
}

/// Write a value into the caller's own namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushRequest {
    /// Identities allowed to read the entry, besides the owner.
    pub identities: Vec<String>,
    pub path: KeyknoxPath,
    pub meta: Bytes,
    pub value: Bytes,
    /// Hash the caller last saw. `None` means "no entry yet".
    pub previous_hash: Option<KeyknoxHash>,
    /// Replace the identity list instead of extending it.
    pub overwrite: bool,
}

/// Read a value. `identity = None` reads the caller's own namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullRequest {
    pub identity: Option<String>,
    pub path: KeyknoxPath,
}

/// List keys. Missing components are wildcards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeysRequest {
    pub identity: Option<String>,
    pub root1: Option<String>,
    pub root2: Option<String>,
}

/// Empty matching values of the caller. Missing components are wildcards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResetRequest {
    pub root1: Option<String>,
    pub root2: Option<String>,
    pub key: Option<String>,
}

impl ResetRequest {
    /// Reset exactly one path.
    pub fn path(path: &KeyknoxPath) -> Self {
        Self {
            root1: Some(path.root1.clone()),
            root2: Some(path.root2.clone()),
            key: Some(path.key.clone()),
        }
    }
}
