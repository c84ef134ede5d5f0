//! Per-recipient key shares.
//!
//! The content key of an envelope is wrapped once per recipient using an
//! ephemeral X25519 agreement.

use serde::{Deserialize, Serialize};

use crate::crypto::{ContentKey, EphemeralKeyPair, SealNonce, X25519PublicKey, X25519StaticSecret};
use crate::error::Result;

/// The content key, encrypted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShare {
    /// Who can unwrap this share.
    pub recipient: X25519PublicKey,

    /// Sender's side of the ECDH.
    pub ephemeral_public: X25519PublicKey,

    /// The content key, encrypted with the derived wrapping key.
    pub wrapped_key: Vec<u8>,

    pub nonce: SealNonce,
}

impl KeyShare {
    /// Wrap `content_key` for `recipient`.
    pub fn create(content_key: &ContentKey, recipient: &X25519PublicKey) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let wrap_key = ephemeral
            .diffie_hellman(recipient)
            .derive_wrap_key(&ephemeral_public, recipient);

        let nonce = SealNonce::generate();
        let wrapped_key = wrap_key.encrypt(content_key.as_bytes(), &nonce)?;

        Ok(Self {
            recipient: *recipient,
            ephemeral_public,
            wrapped_key,
            nonce,
        })
    }

    /// Recover the content key with the recipient's secret.
    pub fn unwrap_key(&self, secret: &X25519StaticSecret) -> Result<ContentKey> {
        let wrap_key = secret
            .diffie_hellman(&self.ephemeral_public)
            .derive_wrap_key(&self.ephemeral_public, &self.recipient);
        let bytes = wrap_key.decrypt(&self.wrapped_key, &self.nonce)?;
        ContentKey::from_slice(&bytes)
    }
}
