//! Encryption capability for Keyknox values.
//!
//! The service only ever sees `meta` and `value` as opaque bytes. What they
//! contain is decided by a [`KeyknoxCrypto`] implementation; the default one
//! seals values with `keycard-seal`.

use bytes::Bytes;

use keycard_core::{Keypair, PublicKey, Signer};
use keycard_seal::{open, seal, X25519PublicKey, X25519StaticSecret};

use crate::error::{KeyknoxError, Result};

/// Encrypts values before a push and decrypts them after a pull.
pub trait KeyknoxCrypto: Send + Sync {
    /// Returns `(meta, value)`.
    fn encrypt(&self, data: &[u8]) -> Result<(Bytes, Bytes)>;

    fn decrypt(&self, meta: &[u8], value: &[u8]) -> Result<Vec<u8>>;
}

/// Sign-then-encrypt with the local keys, for a list of recipients.
///
/// Values are encrypted for the local encryption key plus every added
/// recipient, and accepted when signed by the local signing key or any
/// added verifier.
pub struct SealCrypto {
    signer: Keypair,
    secret: X25519StaticSecret,
    recipients: Vec<X25519PublicKey>,
    verifiers: Vec<PublicKey>,
}

impl SealCrypto {
    pub fn new(signer: Keypair, secret: X25519StaticSecret) -> Self {
        let recipients = vec![secret.public_key()];
        let verifiers = vec![signer.public_key()];
        Self {
            signer,
            secret,
            recipients,
            verifiers,
        }
    }

    /// Also encrypt for `recipient`.
    pub fn with_recipient(mut self, recipient: X25519PublicKey) -> Self {
        if !self.recipients.contains(&recipient) {
            self.recipients.push(recipient);
        }
        self
    }

    /// Also accept values signed by `verifier`.
    pub fn with_verifier(mut self, verifier: PublicKey) -> Self {
        if !self.verifiers.contains(&verifier) {
            self.verifiers.push(verifier);
        }
        self
    }

    pub fn recipients(&self) -> &[X25519PublicKey] {
        &self.recipients
    }
}

impl KeyknoxCrypto for SealCrypto {
    fn encrypt(&self, data: &[u8]) -> Result<(Bytes, Bytes)> {
        let sealed = seal(data, &self.signer, &self.recipients)?;
        Ok((Bytes::from(sealed.meta), Bytes::from(sealed.value)))
    }

    fn decrypt(&self, meta: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        if meta.is_empty() {
            return Err(KeyknoxError::Crypto("value has no envelope header".into()));
        }
        Ok(open(meta, value, &self.secret, &self.verifiers)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keycard_seal::SealError;

    fn crypto(seed: u8) -> SealCrypto {
        SealCrypto::new(
            Keypair::from_seed(&[seed; 32]),
            X25519StaticSecret::from_bytes([seed; 32]),
        )
    }

    #[test]
    fn test_roundtrip_for_self() {
        let alice = crypto(1);
        let (meta, value) = alice.encrypt(b"private keys").unwrap();
        assert_eq!(alice.decrypt(&meta, &value).unwrap(), b"private keys");
    }

    #[test]
    fn test_shared_between_devices() {
        let bob_secret = X25519StaticSecret::from_bytes([2; 32]);
        let bob_signer = Keypair::from_seed(&[2; 32]);

        let alice = crypto(1).with_recipient(bob_secret.public_key());
        let bob = SealCrypto::new(bob_signer, bob_secret)
            .with_verifier(Keypair::from_seed(&[1; 32]).public_key());

        let (meta, value) = alice.encrypt(b"shared").unwrap();
        assert_eq!(bob.decrypt(&meta, &value).unwrap(), b"shared");
    }

    #[test]
    fn test_untrusted_signer_rejected() {
        let bob_secret = X25519StaticSecret::from_bytes([2; 32]);
        let alice = crypto(1).with_recipient(bob_secret.public_key());
        let bob = SealCrypto::new(Keypair::from_seed(&[2; 32]), bob_secret);

        let (meta, value) = alice.encrypt(b"shared").unwrap();
        assert!(matches!(
            bob.decrypt(&meta, &value),
            Err(KeyknoxError::Seal(SealError::SignatureFailed))
        ));
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            crypto(1).decrypt(&[], b"x"),
            Err(KeyknoxError::Crypto(_))
        ));
    }
}
