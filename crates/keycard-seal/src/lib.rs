//! # Keycard Seal
//!
//! Multi-recipient sign-then-encrypt envelopes, used to protect values kept
//! in roaming storage.
//!
//! ## Encryption Model
//!
//! Sealed content uses a two-layer key model:
//!
//! 1. **Content Key**: A random ChaCha20-Poly1305 key that encrypts the signed plaintext
//! 2. **Key Shares**: The content key is wrapped for each recipient via X25519 ECDH
//!
//! The plaintext is signed with the sender's Ed25519 key before encryption.
//! [`open`] verifies that signature against a list of trusted keys and fails
//! unless one of them matches.

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keyshare;

pub use crypto::{ContentKey, SealNonce, X25519PublicKey, X25519StaticSecret};
pub use envelope::{open, seal, EncryptionFormat, SealHeader, Sealed, SEAL_VERSION};
pub use error::{Result, SealError};
pub use keyshare::KeyShare;
