//! Cards: signed, content-addressed bindings of a public key to an identity.
//!
//! A card moves through `Unsigned → SelfSigned → Published`. The content is
//! canonicalized once into a [`Snapshot`]; the card id is the fingerprint of
//! that snapshot and every signature covers exactly that fingerprint.
//!
//! ```text
//! CardBuilder ──build──▶ UnsignedCard ──self_sign──▶ RawCard (SelfSigned)
//!                                                      │ service appends "keycard"
//!                                                      ▼
//!                                          RawCard (Published) ──parse_card──▶ Card
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canonical::{canonicalize, Snapshot};
use crate::crypto::{Fingerprint, PublicKey, Signer};
use crate::error::{CoreError, Result};
use crate::signature::{RawSignature, SignatureEntry, SignatureSet, SELF_SIGNER, SERVICE_SIGNER};
use crate::types::CardId;

/// Content format version.
pub const CARD_VERSION: &str = "1.0";

/// Current Unix time in seconds.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The part of a card that is canonicalized and signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContent {
    pub identity: String,
    /// Base64 of the 32-byte Ed25519 public key.
    pub public_key: String,
    pub version: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_card_id: Option<String>,
}

/// Lifecycle state of a raw card, derived from which signers are present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardState {
    Unsigned,
    SelfSigned,
    Published,
}

/// Builder for new cards.
#[derive(Debug)]
pub struct CardBuilder {
    identity: String,
    public_key: PublicKey,
    previous_card_id: Option<CardId>,
    created_at: Option<i64>,
}

impl CardBuilder {
    pub fn new(identity: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            identity: identity.into(),
            public_key,
            previous_card_id: None,
            created_at: None,
        }
    }

    /// Mark this card as replacing an earlier one.
    pub fn previous_card_id(mut self, id: CardId) -> Self {
        self.previous_card_id = Some(id);
        self
    }

    /// Set the creation time (Unix seconds). Defaults to now.
    pub fn created_at(mut self, secs: i64) -> Self {
        self.created_at = Some(secs);
        self
    }

    /// Canonicalize the content and compute its fingerprint.
    pub fn build(self) -> Result<UnsignedCard> {
        if self.identity.is_empty() {
            return Err(CoreError::MalformedCard("identity must not be empty".into()));
        }

        let content = CardContent {
            identity: self.identity,
            public_key: self.public_key.to_base64(),
            version: CARD_VERSION.to_string(),
            created_at: self.created_at.unwrap_or_else(now_secs),
            previous_card_id: self.previous_card_id.map(|id| id.to_hex()),
        };
        let snapshot = canonicalize(&content)?;
        let fingerprint = Fingerprint::of(&snapshot);

        Ok(UnsignedCard {
            content,
            public_key: self.public_key,
            snapshot,
            fingerprint,
        })
    }
}

/// A card whose content is fixed but which carries no signatures yet.
#[derive(Clone, Debug)]
pub struct UnsignedCard {
    content: CardContent,
    public_key: PublicKey,
    snapshot: Snapshot,
    fingerprint: Fingerprint,
}

impl UnsignedCard {
    pub fn content(&self) -> &CardContent {
        &self.content
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn id(&self) -> CardId {
        self.fingerprint.into()
    }

    /// Sign with the owner's key, producing a self-signed raw card.
    ///
    /// The signer's public key must be the one embedded in the content.
    pub fn self_sign(self, signer: &dyn Signer) -> Result<RawCard> {
        if signer.public_key() != self.public_key {
            return Err(CoreError::InvalidKey(
                "signer key does not match card public key".into(),
            ));
        }

        let entry = SignatureSet::sign(SELF_SIGNER, &self.fingerprint, signer)
            .map_err(|e| CoreError::InvalidKey(format!("signer cannot sign: {}", e)))?;

        let mut raw = self.into_raw();
        raw.signatures.insert(entry)?;
        Ok(raw)
    }

    /// The raw form without any signature (state `Unsigned`).
    pub fn into_raw(self) -> RawCard {
        RawCard {
            content_snapshot: self.snapshot,
            signatures: SignatureSet::new(),
            id: Some(self.fingerprint.into()),
        }
    }
}

/// Export and wire form of a card.
///
/// Serializes as `{"content_snapshot": b64, "signatures": [...], "id"?: hex}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCardJson", into = "RawCardJson")]
pub struct RawCard {
    pub content_snapshot: Snapshot,
    pub signatures: SignatureSet,
    /// The id claimed by whoever produced this raw card. Never trusted.
    pub id: Option<CardId>,
}

impl RawCard {
    /// Recompute the fingerprint from the snapshot bytes.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.content_snapshot)
    }

    /// The id derived from the snapshot (not the claimed one).
    pub fn computed_id(&self) -> CardId {
        self.fingerprint().into()
    }

    pub fn state(&self) -> CardState {
        if self.signatures.contains(SERVICE_SIGNER) {
            CardState::Published
        } else if self.signatures.contains(SELF_SIGNER) {
            CardState::SelfSigned
        } else {
            CardState::Unsigned
        }
    }

    /// Append a signature from an endorser.
    pub fn add_signature(&mut self, signer_id: impl Into<String>, signer: &dyn Signer) -> Result<()> {
        let entry = SignatureSet::sign(signer_id, &self.fingerprint(), signer)?;
        self.signatures.insert(entry)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CoreError::Encoding(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::Decoding(e.to_string()))
    }

    /// Base64 of the JSON form.
    pub fn export_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_json()?))
    }

    pub fn import_base64(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s.trim())
            .map_err(|e| CoreError::Decoding(format!("card base64: {}", e)))?;
        let json = String::from_utf8(bytes).map_err(|e| CoreError::Decoding(e.to_string()))?;
        Self::from_json(&json)
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct RawCardJson {
    content_snapshot: String,
    signatures: Vec<RawSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

impl From<RawCard> for RawCardJson {
    fn from(raw: RawCard) -> Self {
        Self {
            content_snapshot: raw.content_snapshot.to_base64(),
            signatures: raw.signatures.iter().map(RawSignature::from).collect(),
            id: raw.id.map(|id| id.to_hex()),
        }
    }
}

impl TryFrom<RawCardJson> for RawCard {
    type Error = CoreError;

    fn try_from(json: RawCardJson) -> Result<Self> {
        let content_snapshot = Snapshot::from_base64(&json.content_snapshot)?;
        let mut signatures = SignatureSet::new();
        for raw in &json.signatures {
            signatures.insert(SignatureEntry::try_from(raw)?)?;
        }
        let id = json
            .id
            .map(|s| CardId::from_hex(&s))
            .transpose()
            .map_err(|e| CoreError::Decoding(format!("card id: {}", e)))?;
        Ok(Self {
            content_snapshot,
            signatures,
            id,
        })
    }
}

/// A card that passed verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub identity: String,
    pub public_key: PublicKey,
    pub created_at: i64,
    pub version: String,
    pub previous_card_id: Option<CardId>,
    pub snapshot: Snapshot,
    pub signatures: SignatureSet,
    pub is_published: bool,
    /// Set when a newer card in the same chain supersedes this one.
    pub is_outdated: bool,
    pub previous_card: Option<Box<Card>>,
}

impl Card {
    pub fn fingerprint(&self) -> Fingerprint {
        self.id.fingerprint()
    }

    /// Export form, carrying the card's own id as the claimed id.
    pub fn to_raw(&self) -> RawCard {
        RawCard {
            content_snapshot: self.snapshot.clone(),
            signatures: self.signatures.clone(),
            id: Some(self.id),
        }
    }
}
