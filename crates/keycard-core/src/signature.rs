//! Signature sets: the multi-party signatures attached to a card.
//!
//! A set is ordered by insertion and holds at most one entry per signer
//! identifier. An empty set is a valid intermediate state for an unsigned
//! card but never for a published one.

use serde::{Deserialize, Serialize};

use crate::crypto::{Fingerprint, PublicKey, Signature, Signer};
use crate::error::{CoreError, Result};

/// Signer identifier of the card owner.
pub const SELF_SIGNER: &str = "self";

/// Signer identifier of the publication service.
pub const SERVICE_SIGNER: &str = "keycard";

/// A single signature over a card fingerprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureEntry {
    pub signer: String,
    pub signature: Signature,
}

impl SignatureEntry {
    /// Check this entry against a fingerprint and a public key.
    pub fn verifies(&self, fingerprint: &Fingerprint, public_key: &PublicKey) -> bool {
        public_key
            .verify(fingerprint.as_bytes(), &self.signature)
            .is_ok()
    }
}

/// Insertion-ordered collection of signatures with unique signers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureSet {
    entries: Vec<SignatureEntry>,
}

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a signature entry with the given signer capability.
    ///
    /// The entry is not inserted; callers decide where it goes.
    pub fn sign(
        signer_id: impl Into<String>,
        fingerprint: &Fingerprint,
        signer: &dyn Signer,
    ) -> Result<SignatureEntry> {
        let signature = signer.try_sign(fingerprint.as_bytes())?;
        Ok(SignatureEntry {
            signer: signer_id.into(),
            signature,
        })
    }

    /// Add an entry. A signer may appear only once.
    pub fn insert(&mut self, entry: SignatureEntry) -> Result<()> {
        if self.contains(&entry.signer) {
            return Err(CoreError::DuplicateSigner(entry.signer));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Look up the entry of a signer.
    pub fn get(&self, signer: &str) -> Option<&SignatureEntry> {
        self.entries.iter().find(|e| e.signer == signer)
    }

    pub fn contains(&self, signer: &str) -> bool {
        self.get(signer).is_some()
    }

    /// Signer identifiers in insertion order.
    pub fn signers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.signer.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SignatureEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True iff the named signer's entry exists and verifies under `public_key`.
    pub fn verify_signer(
        &self,
        fingerprint: &Fingerprint,
        signer: &str,
        public_key: &PublicKey,
    ) -> bool {
        self.get(signer)
            .is_some_and(|e| e.verifies(fingerprint, public_key))
    }

    /// True iff at least one entry verifies under at least one candidate.
    ///
    /// Fails closed: no entries, no candidates, or no match all yield false.
    pub fn verify_using_one_of(&self, fingerprint: &Fingerprint, candidates: &[PublicKey]) -> bool {
        self.entries.iter().any(|entry| {
            candidates
                .iter()
                .any(|key| entry.verifies(fingerprint, key))
        })
    }

    /// Single trusted key variant of [`Self::verify_using_one_of`].
    pub fn verify(&self, fingerprint: &Fingerprint, trusted: &PublicKey) -> bool {
        self.verify_using_one_of(fingerprint, std::slice::from_ref(trusted))
    }
}

impl<'a> IntoIterator for &'a SignatureSet {
    type Item = &'a SignatureEntry;
    type IntoIter = std::slice::Iter<'a, SignatureEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Wire form of a signature entry: signature bytes as base64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignature {
    pub signer: String,
    pub signature: String,
}

impl From<&SignatureEntry> for RawSignature {
    fn from(entry: &SignatureEntry) -> Self {
        Self {
            signer: entry.signer.clone(),
            signature: entry.signature.to_base64(),
        }
    }
}

impl TryFrom<&RawSignature> for SignatureEntry {
    type Error = CoreError;

    fn try_from(raw: &RawSignature) -> Result<Self> {
        Ok(Self {
            signer: raw.signer.clone(),
            signature: Signature::from_base64(&raw.signature)?,
        })
    }
}
