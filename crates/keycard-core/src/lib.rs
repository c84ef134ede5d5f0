//! # Keycard Core
//!
//! Pure primitives for Keycard: canonical snapshots, fingerprints,
//! signature sets, and cards.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Snapshot`] - Canonical bytes of a structured value
//! - [`Fingerprint`] - SHA-256 of a snapshot
//! - [`SignatureSet`] - Insertion-ordered signatures with unique signers
//! - [`RawCard`] / [`Card`] - A card before and after verification
//!
//! ## Canonicalization
//!
//! All card content is encoded as canonical JSON. See [`canonical`] module.

pub mod canonical;
pub mod card;
pub mod crypto;
pub mod error;
pub mod signature;
pub mod types;
pub mod validation;

pub use canonical::{canonicalize, canonicalize_value, is_canonical, parse_snapshot, Snapshot};
pub use card::{Card, CardBuilder, CardContent, CardState, RawCard, UnsignedCard, CARD_VERSION};
pub use crypto::{Fingerprint, Keypair, PublicKey, Signature, Signer, FINGERPRINT_ALGORITHM};
pub use error::{CoreError, ValidationError};
pub use signature::{SignatureEntry, SignatureSet, SELF_SIGNER, SERVICE_SIGNER};
pub use types::CardId;
pub use validation::{
    parse_card, CardVerifier, KeycardVerifier, NullVerifier, VerifierCredentials, Whitelist,
};
