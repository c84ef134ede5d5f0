//! Key agreement and symmetric encryption for sealed envelopes.
//!
//! X25519 for agreeing on a wrapping key with each recipient,
//! ChaCha20-Poly1305 for both the content and the wrapped content key.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{Result, SealError};

/// BLAKE3 derive_key context for recipient wrapping keys.
const WRAP_KEY_CONTEXT: &str = "keycard-seal v1 2024 recipient key wrap";

/// An X25519 public key identifying an envelope recipient.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519PublicKey({}...)", hex::encode(&self.0[..8]))
    }
}

/// A long-lived X25519 secret held by a recipient.
#[derive(Clone)]
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey(*PublicKey::from(&self.0).as_bytes())
    }

    pub fn diffie_hellman(&self, peer: &X25519PublicKey) -> SharedKey {
        SharedKey(*self.0.diffie_hellman(&peer.to_dalek()).as_bytes())
    }
}

impl fmt::Debug for X25519StaticSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519StaticSecret({:?})", self.public_key())
    }
}

/// One-shot X25519 secret used by the sender for a single key share.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey(*PublicKey::from(&secret).as_bytes());
        Self { secret, public }
    }

    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Consumes the secret: it can only be used once.
    pub fn diffie_hellman(self, peer: &X25519PublicKey) -> SharedKey {
        SharedKey(*self.secret.diffie_hellman(&peer.to_dalek()).as_bytes())
    }
}

/// Raw output of an X25519 agreement. Never used as a key directly.
pub struct SharedKey([u8; 32]);

impl SharedKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the key that wraps the content key for one recipient.
    ///
    /// Both public halves are bound in so a share cannot be replayed for a
    /// different recipient.
    pub fn derive_wrap_key(
        &self,
        ephemeral: &X25519PublicKey,
        recipient: &X25519PublicKey,
    ) -> ContentKey {
        let mut hasher = blake3::Hasher::new_derive_key(WRAP_KEY_CONTEXT);
        hasher.update(&self.0);
        hasher.update(ephemeral.as_bytes());
        hasher.update(recipient.as_bytes());
        ContentKey(*hasher.finalize().as_bytes())
    }
}

/// A 256-bit ChaCha20-Poly1305 key.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            SealError::DecryptionError(format!("content key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn encrypt(&self, plaintext: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| SealError::EncryptionError(e.to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| SealError::EncryptionError(e.to_string()))
    }

    pub fn decrypt(&self, ciphertext: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| SealError::DecryptionError(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|e| SealError::DecryptionError(e.to_string()))
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentKey(<redacted>)")
    }
}

/// A 96-bit ChaCha20-Poly1305 nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealNonce(pub [u8; 12]);

impl SealNonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_agreement_matches_static() {
        let bob = X25519StaticSecret::generate();
        let eph = EphemeralKeyPair::generate();
        let eph_public = eph.public_key();

        let sender_side = eph.diffie_hellman(&bob.public_key());
        let recipient_side = bob.diffie_hellman(&eph_public);
        assert_eq!(sender_side.as_bytes(), recipient_side.as_bytes());
    }

    #[test]
    fn test_public_key_debug_is_truncated_hex() {
        let key = X25519PublicKey([0xab; 32]);
        assert_eq!(format!("{:?}", key), "X25519PublicKey(abababababababab...)");
    }

    #[test]
    fn test_wrap_key_binds_recipient() {
        let shared = SharedKey([0x42; 32]);
        let a = X25519PublicKey([1; 32]);
        let b = X25519PublicKey([2; 32]);

        assert_eq!(
            shared.derive_wrap_key(&a, &b).as_bytes(),
            shared.derive_wrap_key(&a, &b).as_bytes()
        );
        assert_ne!(
            shared.derive_wrap_key(&a, &b).as_bytes(),
            shared.derive_wrap_key(&a, &a).as_bytes()
        );
    }

    #[test]
    fn test_content_key_rejects_tampering() {
        let key = ContentKey::generate();
        let nonce = SealNonce::generate();
        let mut ciphertext = key.encrypt(b"roaming secret", &nonce).unwrap();
        assert_eq!(key.decrypt(&ciphertext, &nonce).unwrap(), b"roaming secret");

        ciphertext[0] ^= 0x01;
        assert!(matches!(
            key.decrypt(&ciphertext, &nonce),
            Err(SealError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_content_key_from_slice() {
        assert!(ContentKey::from_slice(&[0; 31]).is_err());
        assert!(ContentKey::from_slice(&[0; 32]).is_ok());
    }
}
