//! Sealed envelopes: sign-then-encrypt for many recipients.
//!
//! A sealed value is split into two opaque byte strings:
//!
//! - `meta`: CBOR header with the format version, nonce and key shares
//! - `value`: the ciphertext of the signed plaintext
//!
//! Opening decrypts first and then requires the embedded signature to
//! verify under at least one trusted key. There is no way to obtain the
//! plaintext of an envelope whose signature does not verify.

use serde::{Deserialize, Serialize};

use keycard_core::{PublicKey, Signature, Signer};

use crate::crypto::{ContentKey, SealNonce, X25519PublicKey, X25519StaticSecret};
use crate::error::{Result, SealError};
use crate::keyshare::KeyShare;

/// Current header version.
pub const SEAL_VERSION: u8 = 1;

/// Symmetric algorithm of the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// Decoded form of `meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealHeader {
    pub version: u8,
    pub format: EncryptionFormat,
    pub nonce: SealNonce,
    pub shares: Vec<KeyShare>,
}

impl SealHeader {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| SealError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| SealError::SerializationError(e.to_string()))
    }

    /// Recipients able to open the envelope.
    pub fn recipients(&self) -> impl Iterator<Item = &X25519PublicKey> {
        self.shares.iter().map(|s| &s.recipient)
    }
}

/// Plaintext plus its signature; this is what gets encrypted.
#[derive(Serialize, Deserialize)]
struct SignedContent {
    signature: Vec<u8>,
    data: Vec<u8>,
}

/// The two halves of a sealed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub meta: Vec<u8>,
    pub value: Vec<u8>,
}

/// Sign `plaintext` with `signer` and encrypt it for every recipient.
pub fn seal(plaintext: &[u8], signer: &dyn Signer, recipients: &[X25519PublicKey]) -> Result<Sealed> {
    if recipients.is_empty() {
        return Err(SealError::NoRecipients);
    }

    let signature = signer.try_sign(plaintext)?;
    let signed = SignedContent {
        signature: signature.as_bytes().to_vec(),
        data: plaintext.to_vec(),
    };
    let mut inner = Vec::new();
    ciborium::into_writer(&signed, &mut inner)
        .map_err(|e| SealError::SerializationError(e.to_string()))?;

    let content_key = ContentKey::generate();
    let nonce = SealNonce::generate();
    let value = content_key.encrypt(&inner, &nonce)?;

    let shares = recipients
        .iter()
        .map(|r| KeyShare::create(&content_key, r))
        .collect::<Result<Vec<_>>>()?;

    let header = SealHeader {
        version: SEAL_VERSION,
        format: EncryptionFormat::ChaCha20Poly1305,
        nonce,
        shares,
    };

    Ok(Sealed {
        meta: header.to_bytes()?,
        value,
    })
}

/// Decrypt with `secret` and verify against any one of `verifiers`.
///
/// Fails closed: an empty verifier list never opens anything.
pub fn open(
    meta: &[u8],
    value: &[u8],
    secret: &X25519StaticSecret,
    verifiers: &[PublicKey],
) -> Result<Vec<u8>> {
    let header = SealHeader::from_bytes(meta)?;
    if header.version != SEAL_VERSION {
        return Err(SealError::UnsupportedVersion(header.version));
    }

    let me = secret.public_key();
    let share = header
        .shares
        .iter()
        .find(|s| s.recipient == me)
        .ok_or(SealError::NotARecipient)?;
    let content_key = share.unwrap_key(secret)?;

    let inner = match header.format {
        EncryptionFormat::ChaCha20Poly1305 => content_key.decrypt(value, &header.nonce)?,
    };
    let signed: SignedContent = ciborium::from_reader(inner.as_slice())
        .map_err(|e| SealError::SerializationError(e.to_string()))?;

    let signature =
        Signature::from_slice(&signed.signature).map_err(|_| SealError::SignatureFailed)?;
    if !verifiers
        .iter()
        .any(|key| key.verify(&signed.data, &signature).is_ok())
    {
        return Err(SealError::SignatureFailed);
    }

    Ok(signed.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keycard_core::Keypair;

    struct Party {
        signing: Keypair,
        secret: X25519StaticSecret,
    }

    impl Party {
        fn new(seed: u8) -> Self {
            Self {
                signing: Keypair::from_seed(&[seed; 32]),
                secret: X25519StaticSecret::from_bytes([seed.wrapping_add(100); 32]),
            }
        }
    }

    #[test]
    fn test_seal_open_multiple_recipients() {
        let alice = Party::new(1);
        let bob = Party::new(2);

        let sealed = seal(
            b"roaming keys",
            &alice.signing,
            &[alice.secret.public_key(), bob.secret.public_key()],
        )
        .unwrap();

        for party in [&alice, &bob] {
            let opened = open(
                &sealed.meta,
                &sealed.value,
                &party.secret,
                &[alice.signing.public_key()],
            )
            .unwrap();
            assert_eq!(opened, b"roaming keys");
        }
    }

    #[test]
    fn test_not_a_recipient() {
        let alice = Party::new(1);
        let eve = Party::new(3);
        let sealed = seal(b"x", &alice.signing, &[alice.secret.public_key()]).unwrap();

        assert!(matches!(
            open(&sealed.meta, &sealed.value, &eve.secret, &[alice.signing.public_key()]),
            Err(SealError::NotARecipient)
        ));
    }

    #[test]
    fn test_verify_using_one_of() {
        let alice = Party::new(1);
        let bob = Party::new(2);
        let carol = Party::new(4);
        let sealed = seal(b"x", &alice.signing, &[bob.secret.public_key()]).unwrap();

        // Signed by Alice, checked against {Carol}: fails
        assert!(matches!(
            open(&sealed.meta, &sealed.value, &bob.secret, &[carol.signing.public_key()]),
            Err(SealError::SignatureFailed)
        ));
        // Checked against {Carol, Alice}: succeeds
        open(
            &sealed.meta,
            &sealed.value,
            &bob.secret,
            &[carol.signing.public_key(), alice.signing.public_key()],
        )
        .unwrap();
        // No verifiers: fails closed
        assert!(matches!(
            open(&sealed.meta, &sealed.value, &bob.secret, &[]),
            Err(SealError::SignatureFailed)
        ));
    }

    #[test]
    fn test_tampered_value() {
        let alice = Party::new(1);
        let mut sealed = seal(b"secret", &alice.signing, &[alice.secret.public_key()]).unwrap();
        let last = sealed.value.len() - 1;
        sealed.value[last] ^= 0xff;

        assert!(matches!(
            open(&sealed.meta, &sealed.value, &alice.secret, &[alice.signing.public_key()]),
            Err(SealError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_no_recipients() {
        let alice = Party::new(1);
        assert!(matches!(
            seal(b"x", &alice.signing, &[]),
            Err(SealError::NoRecipients)
        ));
    }

    #[test]
    fn test_header_lists_recipients() {
        let alice = Party::new(1);
        let bob = Party::new(2);
        let sealed = seal(
            b"x",
            &alice.signing,
            &[alice.secret.public_key(), bob.secret.public_key()],
        )
        .unwrap();
        let header = SealHeader::from_bytes(&sealed.meta).unwrap();
        let recipients: Vec<_> = header.recipients().copied().collect();
        assert_eq!(
            recipients,
            vec![alice.secret.public_key(), bob.secret.public_key()]
        );
        assert!(SealHeader::from_bytes(b"\xff\x00").is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn open_returns_sealed_plaintext(data in prop::collection::vec(any::<u8>(), 0..512)) {
                let alice = Party::new(1);
                let sealed = seal(&data, &alice.signing, &[alice.secret.public_key()]).unwrap();
                let opened = open(&sealed.meta, &sealed.value, &alice.secret, &[alice.signing.public_key()]).unwrap();
                prop_assert_eq!(opened, data);
            }
        }
    }
}
