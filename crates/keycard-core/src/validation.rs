//! Card validation: signature verification and structural checks.
//!
//! [`parse_card`] is the mandatory import path. It never corrects anything:
//! a mismatching id or a broken signature is an error. Issuer policy on top
//! of that is pluggable through [`CardVerifier`].

use crate::canonical::parse_snapshot;
use crate::card::{Card, CardContent, RawCard, CARD_VERSION};
use crate::crypto::PublicKey;
use crate::error::ValidationError;
use crate::signature::{SELF_SIGNER, SERVICE_SIGNER};
use crate::types::CardId;

/// Decode and verify a raw card.
///
/// This performs:
/// - Snapshot decoding
/// - Fingerprint recomputation and claimed id check
/// - Self signature verification under the embedded public key
/// - Service signature verification when `service_key` is known
///
/// A card is only marked published when its `"keycard"` entry verifies
/// under `service_key`. Without a service key the entry cannot be checked
/// and the card is reported as unpublished.
pub fn parse_card(
    raw: &RawCard,
    service_key: Option<&PublicKey>,
) -> Result<Card, ValidationError> {
    // 1. Decode content
    let content: CardContent = parse_snapshot(&raw.content_snapshot)?;
    if content.identity.is_empty() {
        return Err(ValidationError::Malformed("empty identity".into()));
    }
    if content.version != CARD_VERSION {
        return Err(ValidationError::Malformed(format!(
            "unsupported card version {}",
            content.version
        )));
    }

    // 2. Recompute the id
    let fingerprint = raw.fingerprint();
    let id = CardId::from(fingerprint);
    if let Some(claimed) = raw.id {
        if claimed != id {
            return Err(ValidationError::IdMismatch {
                claimed: claimed.to_hex(),
                computed: id.to_hex(),
            });
        }
    }

    // 3. Self signature
    let public_key = PublicKey::from_base64(&content.public_key)?;
    if !raw.signatures.contains(SELF_SIGNER) {
        return Err(ValidationError::MissingSelfSignature);
    }
    if !raw
        .signatures
        .verify_signer(&fingerprint, SELF_SIGNER, &public_key)
    {
        return Err(ValidationError::SignatureFailed(SELF_SIGNER.into()));
    }

    // 4. Service signature
    let is_published = match (raw.signatures.contains(SERVICE_SIGNER), service_key) {
        (true, Some(key)) => {
            if !raw.signatures.verify_signer(&fingerprint, SERVICE_SIGNER, key) {
                return Err(ValidationError::SignatureFailed(SERVICE_SIGNER.into()));
            }
            true
        }
        _ => false,
    };

    let previous_card_id = content
        .previous_card_id
        .as_deref()
        .map(CardId::from_hex)
        .transpose()
        .map_err(|e| ValidationError::Malformed(format!("previous card id: {}", e)))?;

    Ok(Card {
        id,
        identity: content.identity,
        public_key,
        created_at: content.created_at,
        version: content.version,
        previous_card_id,
        snapshot: raw.content_snapshot.clone(),
        signatures: raw.signatures.clone(),
        is_published,
        is_outdated: false,
        previous_card: None,
    })
}

/// Issuer policy applied to cards that already passed [`parse_card`].
pub trait CardVerifier: Send + Sync {
    fn verify(&self, card: &Card) -> Result<(), ValidationError>;

    /// Key under which service signatures are checked by [`parse_card`].
    fn service_key(&self) -> Option<&PublicKey> {
        None
    }
}

/// Accepts every card `parse_card` accepted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullVerifier;

impl CardVerifier for NullVerifier {
    fn verify(&self, _card: &Card) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// A signer identifier paired with the key its signature must verify under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierCredentials {
    pub signer: String,
    pub public_key: PublicKey,
}

impl VerifierCredentials {
    pub fn new(signer: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            signer: signer.into(),
            public_key,
        }
    }
}

/// A group of credentials of which at least one must have signed the card.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Whitelist {
    pub credentials: Vec<VerifierCredentials>,
}

impl Whitelist {
    pub fn new(credentials: Vec<VerifierCredentials>) -> Self {
        Self { credentials }
    }

    /// Passes if any one credential's entry verifies. An empty list never passes.
    pub fn passes(&self, card: &Card) -> bool {
        let fingerprint = card.fingerprint();
        self.credentials.iter().any(|c| {
            card.signatures
                .verify_signer(&fingerprint, &c.signer, &c.public_key)
        })
    }
}

/// The default verifier: self signature, service signature, whitelists.
#[derive(Clone, Debug)]
pub struct KeycardVerifier {
    service_key: PublicKey,
    verify_self_signature: bool,
    verify_service_signature: bool,
    whitelists: Vec<Whitelist>,
}

impl KeycardVerifier {
    pub fn new(service_key: PublicKey) -> Self {
        Self {
            service_key,
            verify_self_signature: true,
            verify_service_signature: true,
            whitelists: Vec::new(),
        }
    }

    pub fn verify_self_signature(mut self, enabled: bool) -> Self {
        self.verify_self_signature = enabled;
        self
    }

    pub fn verify_service_signature(mut self, enabled: bool) -> Self {
        self.verify_service_signature = enabled;
        self
    }

    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelists.push(whitelist);
        self
    }
}

impl CardVerifier for KeycardVerifier {
    fn service_key(&self) -> Option<&PublicKey> {
        Some(&self.service_key)
    }

    fn verify(&self, card: &Card) -> Result<(), ValidationError> {
        let fingerprint = card.fingerprint();

        if self.verify_self_signature {
            if !card.signatures.contains(SELF_SIGNER) {
                return Err(ValidationError::MissingSelfSignature);
            }
            if !card
                .signatures
                .verify_signer(&fingerprint, SELF_SIGNER, &card.public_key)
            {
                return Err(ValidationError::SignatureFailed(SELF_SIGNER.into()));
            }
        }

        if self.verify_service_signature
            && !card
                .signatures
                .verify_signer(&fingerprint, SERVICE_SIGNER, &self.service_key)
        {
            return Err(ValidationError::MissingServiceSignature);
        }

        if self.whitelists.iter().any(|w| !w.passes(card)) {
            return Err(ValidationError::WhitelistFailed);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::Snapshot;
    use crate::card::CardBuilder;
    use crate::crypto::{Keypair, Signature, Signer};
    use crate::signature::SignatureEntry;

    fn owner() -> Keypair {
        Keypair::from_seed(&[1; 32])
    }

    fn service() -> Keypair {
        Keypair::from_seed(&[2; 32])
    }

    fn self_signed() -> RawCard {
        let kp = owner();
        CardBuilder::new("alice", kp.public_key())
            .created_at(1_700_000_000)
            .build()
            .unwrap()
            .self_sign(&kp)
            .unwrap()
    }

    fn published() -> RawCard {
        let mut raw = self_signed();
        raw.add_signature(SERVICE_SIGNER, &service()).unwrap();
        raw
    }

    #[test]
    fn test_parse_self_signed() {
        let raw = self_signed();
        let card = parse_card(&raw, None).unwrap();
        assert_eq!(card.identity, "alice");
        assert_eq!(card.public_key, owner().public_key());
        assert_eq!(card.id, raw.computed_id());
        assert!(!card.is_published);
        assert!(card.previous_card_id.is_none());
    }

    #[test]
    fn test_parse_published() {
        let card = parse_card(&published(), Some(&service().public_key())).unwrap();
        assert!(card.is_published);
    }

    #[test]
    fn test_service_entry_unconfirmed_without_key() {
        let card = parse_card(&published(), None).unwrap();
        assert!(!card.is_published);
        assert!(card.signatures.contains(SERVICE_SIGNER));
    }

    #[test]
    fn test_forged_service_entry_rejected() {
        let mut raw = self_signed();
        raw.signatures
            .insert(SignatureEntry {
                signer: SERVICE_SIGNER.into(),
                signature: Signature::from_bytes([0; 64]),
            })
            .unwrap();

        assert!(!parse_card(&raw, None).unwrap().is_published);
        assert!(matches!(
            parse_card(&raw, Some(&service().public_key())),
            Err(ValidationError::SignatureFailed(signer)) if signer == SERVICE_SIGNER
        ));
    }

    #[test]
    fn test_service_entry_by_other_key_rejected() {
        let other = Keypair::from_seed(&[9; 32]).public_key();
        assert!(matches!(
            parse_card(&published(), Some(&other)),
            Err(ValidationError::SignatureFailed(_))
        ));
    }

    #[test]
    fn test_claimed_id_mismatch_rejected() {
        let mut raw = self_signed();
        raw.id = Some(CardId::from_bytes([0; 32]));
        let err = parse_card(&raw, None).unwrap_err();
        assert!(matches!(err, ValidationError::IdMismatch { .. }));
    }

    #[test]
    fn test_missing_self_signature() {
        let kp = owner();
        let raw = CardBuilder::new("alice", kp.public_key())
            .build()
            .unwrap()
            .into_raw();
        assert!(matches!(
            parse_card(&raw, None),
            Err(ValidationError::MissingSelfSignature)
        ));
    }

    #[test]
    fn test_self_signature_by_other_key() {
        // Content claims owner's key, "self" entry made by an impostor
        let kp = owner();
        let mut raw = CardBuilder::new("alice", kp.public_key())
            .build()
            .unwrap()
            .into_raw();
        raw.add_signature(SELF_SIGNER, &Keypair::from_seed(&[3; 32]))
            .unwrap();
        assert!(matches!(
            parse_card(&raw, None),
            Err(ValidationError::SignatureFailed(_))
        ));
    }

    #[test]
    fn test_flipped_snapshot_byte_invalidates_signatures() {
        let raw = published();
        let original_fp = raw.fingerprint();

        let mut bytes = raw.content_snapshot.as_bytes().to_vec();
        // Flip a byte inside the identity string, keeping JSON valid
        let pos = bytes.windows(5).position(|w| w == b"alice").unwrap();
        bytes[pos] = b'b';
        let tampered = RawCard {
            content_snapshot: Snapshot::from_bytes(bytes),
            signatures: raw.signatures.clone(),
            id: None,
        };

        let fp = tampered.fingerprint();
        assert_ne!(fp, original_fp);
        for entry in &tampered.signatures {
            for key in [owner().public_key(), service().public_key()] {
                assert!(!entry.verifies(&fp, &key));
            }
        }
        assert!(matches!(
            parse_card(&tampered, None),
            Err(ValidationError::SignatureFailed(_))
        ));
    }

    #[test]
    fn test_garbage_snapshot_is_malformed() {
        let raw = RawCard {
            content_snapshot: Snapshot::from_bytes(&b"not json"[..]),
            signatures: Default::default(),
            id: None,
        };
        assert!(matches!(
            parse_card(&raw, None),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_keycard_verifier_requires_service_signature() {
        let verifier = KeycardVerifier::new(service().public_key());

        let card = parse_card(&self_signed(), None).unwrap();
        assert!(matches!(
            verifier.verify(&card),
            Err(ValidationError::MissingServiceSignature)
        ));

        let card = parse_card(&published(), Some(&service().public_key())).unwrap();
        verifier.verify(&card).unwrap();

        let relaxed = verifier.clone().verify_service_signature(false);
        relaxed.verify(&parse_card(&self_signed(), None).unwrap()).unwrap();
    }

    #[test]
    fn test_keycard_verifier_wrong_service_key() {
        let verifier = KeycardVerifier::new(Keypair::from_seed(&[9; 32]).public_key());
        let card = parse_card(&published(), None).unwrap();
        assert!(matches!(
            verifier.verify(&card),
            Err(ValidationError::MissingServiceSignature)
        ));
    }

    #[test]
    fn test_whitelists() {
        let endorser = Keypair::from_seed(&[4; 32]);
        let stranger = Keypair::from_seed(&[5; 32]);

        let mut raw = published();
        raw.add_signature("endorser", &endorser).unwrap();
        let card = parse_card(&raw, None).unwrap();

        let passing = KeycardVerifier::new(service().public_key()).with_whitelist(Whitelist::new(vec![
            VerifierCredentials::new("stranger", stranger.public_key()),
            VerifierCredentials::new("endorser", endorser.public_key()),
        ]));
        passing.verify(&card).unwrap();

        let failing = KeycardVerifier::new(service().public_key()).with_whitelist(Whitelist::new(vec![
            VerifierCredentials::new("stranger", stranger.public_key()),
        ]));
        assert!(matches!(
            failing.verify(&card),
            Err(ValidationError::WhitelistFailed)
        ));

        let empty = KeycardVerifier::new(service().public_key()).with_whitelist(Whitelist::default());
        assert!(empty.verify(&card).is_err());
    }

    #[test]
    fn test_null_verifier() {
        NullVerifier
            .verify(&parse_card(&self_signed(), None).unwrap())
            .unwrap();
    }
}
