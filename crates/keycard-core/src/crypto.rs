//! Cryptographic primitives for Keycard.
//!
//! Wraps SHA-256 fingerprinting and Ed25519 signing with strong types.
//! Everything above this module consumes signing through the [`Signer`]
//! capability and never touches `ed25519-dalek` directly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature as DalekSignature, Signer as _, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::canonical::Snapshot;
use crate::error::{CoreError, Result};

/// Identifier of the fingerprint algorithm. Versioned so that a future
/// change is explicit rather than silent.
pub const FINGERPRINT_ALGORITHM: &str = "sha256/v1";

/// A 32-byte SHA-256 fingerprint of a snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    /// Fingerprint arbitrary bytes.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Fingerprint a snapshot.
    pub fn of(snapshot: &Snapshot) -> Self {
        Self::hash(snapshot.as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::Decoding(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::Decoding("fingerprint must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Create from raw bytes, checking that they encode a curve point.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| CoreError::InvalidKey("not an Ed25519 public key".into()))?;
        Ok(Self(bytes))
    }

    /// Create from a slice of any length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::InvalidKey(format!("public key must be 32 bytes, got {}", bytes.len()))
        })?;
        Self::from_bytes(arr)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Decode from standard base64.
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let verifying_key = VerifyingKey::from_bytes(&self.0)
            .map_err(|_| CoreError::InvalidKey("not an Ed25519 public key".into()))?;
        let sig = DalekSignature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, rejecting wrong lengths.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| CoreError::InvalidSignature)?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Decode from standard base64.
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|_| CoreError::InvalidSignature)?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &hex::encode(self.0)[..16])
    }
}

/// The signing capability consumed by cards and signature sets.
///
/// Implementations must be deterministic for a given key and message
/// (no entropy is added by callers).
pub trait Signer: Send + Sync {
    /// The public half of the signing key.
    fn public_key(&self) -> PublicKey;

    /// Sign a message.
    fn try_sign(&self, message: &[u8]) -> Result<Signature>;
}

/// An Ed25519 keypair.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Import private key material of unknown shape.
    pub fn from_private_key_bytes(bytes: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::InvalidKey(format!("private key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Get the raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Signer for Keypair {
    fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    fn try_sign(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.sign(message))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", Signer::public_key(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let message = b"hello world";
        let signature = keypair.sign(message);

        keypair
            .public_key()
            .verify(message, &signature)
            .expect("valid signature should verify");

        assert!(keypair.public_key().verify(b"hello worlD", &signature).is_err());
    }

    #[test]
    fn test_wrong_key_does_not_verify() {
        let keypair = Keypair::generate();
        let other = Keypair::generate();
        let signature = keypair.sign(b"data");
        assert!(other.public_key().verify(b"data", &signature).is_err());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let kp = Keypair::from_seed(&[0x42; 32]);
        assert_eq!(kp.sign(b"msg"), kp.sign(b"msg"));
        assert_eq!(kp.public_key(), Keypair::from_seed(&[0x42; 32]).public_key());
    }

    #[test]
    fn test_fingerprint_hex() {
        // SHA-256 of the empty string
        let fp = Fingerprint::hash(b"");
        assert_eq!(
            fp.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(Fingerprint::from_hex(&fp.to_hex()).unwrap(), fp);
        assert!(Fingerprint::from_hex("abcd").is_err());
    }

    #[test]
    fn test_fingerprint_distinct() {
        assert_ne!(Fingerprint::hash(b"a"), Fingerprint::hash(b"b"));
    }

    #[test]
    fn test_private_key_wrong_length() {
        let err = Keypair::from_private_key_bytes(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidKey(_)));
    }

    #[test]
    fn test_public_key_base64_roundtrip() {
        let pk = Keypair::generate().public_key();
        assert_eq!(PublicKey::from_base64(&pk.to_base64()).unwrap(), pk);
        assert!(PublicKey::from_base64("AAAA").is_err());
    }

    #[test]
    fn test_signature_base64() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"x");
        assert_eq!(Signature::from_base64(&sig.to_base64()).unwrap(), sig);
        assert!(matches!(
            Signature::from_base64("AAAA"),
            Err(CoreError::InvalidSignature)
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fingerprint_hex_roundtrips(data in prop::collection::vec(any::<u8>(), 0..256)) {
                let fp = Fingerprint::hash(&data);
                prop_assert_eq!(fp, Fingerprint::hash(&data));
                prop_assert_eq!(fp.to_hex().len(), 64);
                prop_assert_eq!(Fingerprint::from_hex(&fp.to_hex()).unwrap(), fp);
            }

            #[test]
            fn fingerprint_distinguishes_inputs(
                a in prop::collection::vec(any::<u8>(), 0..64),
                b in prop::collection::vec(any::<u8>(), 0..64),
            ) {
                prop_assume!(a != b);
                prop_assert_ne!(Fingerprint::hash(&a), Fingerprint::hash(&b));
            }
        }
    }
}
