//! # Keycard Keyknox
//!
//! Client for Keyknox, the roaming storage of small encrypted blobs.
//!
//! ## Overview
//!
//! Each identity owns a namespace of values addressed by
//! `(root1, root2, key)`. Every accepted write bumps the entry's version and
//! chains its hash; a write is only accepted when it names the current hash
//! as its previous hash. That single check is the whole concurrency model:
//! there is no client-side lock.
//!
//! ## Key Types
//!
//! - [`KeyknoxTransport`] - The seam to the remote service
//! - [`MemoryKeyknoxTransport`] - In-memory service for tests
//! - [`KeyknoxClient`] - Token-authenticated client ([`KeyknoxApi`])
//! - [`KeyknoxManager`] - Encrypted values plus the conflict-retry loop
//! - [`KeyknoxCrypto`] / [`SealCrypto`] - The encryption capability
//!
//! ## Design Notes
//!
//! - **Optimistic concurrency**: stale previous hash → `ConcurrencyConflict`, state unchanged
//! - **Reset**: empties a value but still advances version and hash
//! - **Sharing**: readers other than the owner must be listed in the entry's identities

pub mod client;
pub mod crypto;
pub mod error;
pub mod manager;
pub mod memory;
pub mod transport;
pub mod types;

pub use client::{KeyknoxApi, KeyknoxClient, KeyknoxClientConfig};
pub use crypto::{KeyknoxCrypto, SealCrypto};
pub use error::{KeyknoxError, Result};
pub use manager::{KeyknoxManager, RetryConfig};
pub use memory::MemoryKeyknoxTransport;
pub use transport::KeyknoxTransport;
pub use types::{
    DecryptedKeyknoxValue, EncryptedKeyknoxValue, KeyknoxHash, KeyknoxPath, KeysRequest,
    PullRequest, PushRequest, ResetRequest,
};
