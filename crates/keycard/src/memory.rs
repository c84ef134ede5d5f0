//! In-memory card publication service.
//!
//! Holds a service keypair, authorizes tokens against identities, stores
//! published cards and endorses them with the `"keycard"` signature. A
//! [`Tamper`] mode makes it answer with corrupted cards so that client-side
//! verification can be exercised.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use keycard_auth::AccessToken;
use keycard_core::{
    parse_card, CardBuilder, CardId, Fingerprint, Keypair, PublicKey, RawCard, SignatureSet,
    Signer, Snapshot, SELF_SIGNER, SERVICE_SIGNER,
};

use crate::error::{KeycardError, Result};
use crate::transport::CardTransport;

/// Ways the service can corrupt the cards it returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tamper {
    /// Flip the last byte of the content snapshot.
    FlipSnapshotByte,
    /// Remove the owner's self signature.
    DropSelfSignature,
    /// Claim an id that does not match the content.
    WrongId,
    /// Answer without the service signature.
    SkipServiceSignature,
    /// Endorse with a key other than the service key.
    ForeignServiceKey,
    /// Answer with a different, otherwise valid card.
    SubstituteCard,
}

struct StoredCard {
    raw: RawCard,
    identity: String,
    revoked: bool,
}

#[derive(Default)]
struct CardServiceInner {
    /// Bearer token -> identity.
    tokens: HashMap<String, String>,
    cards: HashMap<CardId, StoredCard>,
    /// Publication order.
    order: Vec<CardId>,
    tamper: Option<Tamper>,
}

impl CardServiceInner {
    fn identity(&self, token: &AccessToken) -> Result<String> {
        self.tokens
            .get(token.as_str())
            .cloned()
            .ok_or_else(|| KeycardError::Unauthorized("unknown access token".into()))
    }
}

/// In-memory card publication service.
///
/// All data is lost when the service is dropped. Thread-safe via RwLock.
pub struct MemoryCardService {
    service_key: Keypair,
    inner: RwLock<CardServiceInner>,
}

impl MemoryCardService {
    /// Create a service with a freshly generated service key.
    pub fn new() -> Self {
        Self::with_service_key(Keypair::generate())
    }

    pub fn with_service_key(service_key: Keypair) -> Self {
        Self {
            service_key,
            inner: RwLock::new(CardServiceInner::default()),
        }
    }

    /// Key under which the service endorses published cards.
    pub fn service_public_key(&self) -> PublicKey {
        self.service_key.public_key()
    }

    /// Accept `token` as authenticating `identity`.
    pub fn authorize(&self, token: impl Into<String>, identity: impl Into<String>) -> Result<()> {
        self.write()?.tokens.insert(token.into(), identity.into());
        Ok(())
    }

    /// Corrupt every subsequent response, or stop doing so with `None`.
    pub fn set_tamper(&self, tamper: Option<Tamper>) -> Result<()> {
        self.write()?.tamper = tamper;
        Ok(())
    }

    /// Number of stored cards, revoked ones included.
    pub fn card_count(&self) -> Result<usize> {
        Ok(self.read()?.cards.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CardServiceInner>> {
        self.inner
            .read()
            .map_err(|_| KeycardError::Transport("card service lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CardServiceInner>> {
        self.inner
            .write()
            .map_err(|_| KeycardError::Transport("card service lock poisoned".into()))
    }

    fn respond(&self, raw: RawCard, tamper: Option<Tamper>) -> Result<RawCard> {
        let Some(tamper) = tamper else {
            return Ok(raw);
        };
        debug!(?tamper, "tampering with card response");

        let mut raw = raw;
        match tamper {
            Tamper::FlipSnapshotByte => {
                let mut bytes = raw.content_snapshot.as_bytes().to_vec();
                if let Some(last) = bytes.last_mut() {
                    *last ^= 0x01;
                }
                raw.content_snapshot = Snapshot::from_bytes(bytes);
            }
            Tamper::DropSelfSignature => {
                raw.signatures = retain_signers(&raw.signatures, |s| s != SELF_SIGNER)?;
            }
            Tamper::WrongId => {
                raw.id = Some(CardId::from(Fingerprint::hash(b"not this card")));
            }
            Tamper::SkipServiceSignature => {
                raw.signatures = retain_signers(&raw.signatures, |s| s != SERVICE_SIGNER)?;
            }
            Tamper::ForeignServiceKey => {
                raw.signatures = retain_signers(&raw.signatures, |s| s != SERVICE_SIGNER)?;
                let foreign = Keypair::from_seed(&[0xEE; 32]);
                raw.add_signature(SERVICE_SIGNER, &foreign)?;
            }
            Tamper::SubstituteCard => {
                let other = Keypair::from_seed(&[0xDD; 32]);
                let identity = parse_card(&raw, None)
                    .map(|card| card.identity)
                    .unwrap_or_else(|_| "mallory".to_string());
                let unsigned = CardBuilder::new(identity, other.public_key()).build()?;
                let id = unsigned.id();
                raw = unsigned.self_sign(&other)?;
                raw.add_signature(SERVICE_SIGNER, &self.service_key)?;
                raw.id = Some(id);
            }
        }
        Ok(raw)
    }
}

impl Default for MemoryCardService {
    fn default() -> Self {
        Self::new()
    }
}

fn retain_signers(set: &SignatureSet, keep: impl Fn(&str) -> bool) -> Result<SignatureSet> {
    let mut kept = SignatureSet::new();
    for entry in set.iter().filter(|e| keep(&e.signer)) {
        kept.insert(entry.clone())?;
    }
    Ok(kept)
}

#[async_trait]
impl CardTransport for MemoryCardService {
    async fn publish(&self, token: &AccessToken, card: RawCard) -> Result<RawCard> {
        let (stored, tamper) = {
            let mut inner = self.write()?;
            let identity = inner.identity(token)?;

            let parsed = parse_card(&card, Some(&self.service_key.public_key()))?;
            if parsed.identity != identity {
                return Err(KeycardError::Unauthorized(format!(
                    "token for {} cannot publish a card for {}",
                    identity, parsed.identity
                )));
            }
            if parsed.is_published {
                return Err(KeycardError::Transport("card is already published".into()));
            }
            if let Some(previous) = parsed.previous_card_id {
                match inner.cards.get(&previous) {
                    Some(prev) if prev.identity == identity => {}
                    _ => {
                        return Err(KeycardError::NotFound(format!(
                            "previous card {} not found",
                            previous
                        )))
                    }
                }
            }

            let stored = match inner.cards.get(&parsed.id) {
                Some(existing) => existing.raw.clone(),
                None => {
                    let mut raw = card;
                    raw.add_signature(SERVICE_SIGNER, &self.service_key)?;
                    raw.id = Some(parsed.id);
                    inner.cards.insert(
                        parsed.id,
                        StoredCard {
                            raw: raw.clone(),
                            identity: identity.clone(),
                            revoked: false,
                        },
                    );
                    inner.order.push(parsed.id);
                    debug!(%identity, card_id = ?parsed.id, "published card");
                    raw
                }
            };
            (stored, inner.tamper)
        };
        self.respond(stored, tamper)
    }

    async fn get(&self, token: &AccessToken, id: &CardId) -> Result<RawCard> {
        let (raw, tamper) = {
            let inner = self.read()?;
            inner.identity(token)?;
            match inner.cards.get(id) {
                Some(stored) if !stored.revoked => (stored.raw.clone(), inner.tamper),
                _ => return Err(KeycardError::NotFound(format!("card {}", id))),
            }
        };
        self.respond(raw, tamper)
    }

    async fn search(&self, token: &AccessToken, identity: &str) -> Result<Vec<RawCard>> {
        let (found, tamper) = {
            let inner = self.read()?;
            inner.identity(token)?;
            let found: Vec<RawCard> = inner
                .order
                .iter()
                .filter_map(|id| inner.cards.get(id))
                .filter(|stored| stored.identity == identity && !stored.revoked)
                .map(|stored| stored.raw.clone())
                .collect();
            (found, inner.tamper)
        };
        found
            .into_iter()
            .map(|raw| self.respond(raw, tamper))
            .collect()
    }

    async fn revoke(&self, token: &AccessToken, id: &CardId) -> Result<()> {
        let mut inner = self.write()?;
        let identity = inner.identity(token)?;
        match inner.cards.get_mut(id) {
            Some(stored) if stored.identity == identity => {
                stored.revoked = true;
                debug!(%identity, card_id = ?id, "revoked card");
                Ok(())
            }
            Some(_) => Err(KeycardError::Unauthorized(format!(
                "{} does not own card {}",
                identity, id
            ))),
            None => Err(KeycardError::NotFound(format!("card {}", id))),
        }
    }
}
