//! # Keycard
//!
//! Verifiable identity cards and roaming encrypted key storage.
//!
//! ## Overview
//!
//! Keycard provides:
//!
//! - **Cards**: an identity bound to a public key, self-signed by the owner
//!   and endorsed by the publication service
//! - **Keyknox**: small encrypted blobs stored remotely and synchronized
//!   between devices with optimistic concurrency
//! - **Access tokens**: every remote call is authenticated through an
//!   application-supplied provider
//!
//! ## Key Concepts
//!
//! - **Card id**: the SHA-256 fingerprint of the card's canonical content.
//!   It is always recomputed, never taken on trust.
//! - **Rotation**: a new card names the card it replaces; searches link the
//!   chain and flag superseded cards as outdated.
//! - **Version hash**: every Keyknox write must name the current hash, so a
//!   stale writer is rejected instead of silently overwriting.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keycard::{CardManager, MemoryCardService};
//! use keycard::auth::ConstAccessTokenProvider;
//! use keycard::core::{Keypair, KeycardVerifier};
//!
//! async fn example() -> keycard::Result<()> {
//!     let service = Arc::new(MemoryCardService::new());
//!     service.authorize("alice-token", "alice")?;
//!
//!     let manager = CardManager::new(
//!         service.clone(),
//!         ConstAccessTokenProvider::from_string("alice-token")?,
//!         KeycardVerifier::new(service.service_public_key()),
//!     );
//!
//!     let key = Keypair::generate();
//!     let card = manager.publish(&key, "alice", None).await?;
//!     let exported = manager.export_card_as_base64(&card)?;
//!     let imported = manager.import_card_from_base64(&exported)?;
//!     assert_eq!(imported.id, card.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `keycard::core` - Canonical snapshots, fingerprints, signatures, cards
//! - `keycard::auth` - Access token providers
//! - `keycard::seal` - Sign-then-encrypt envelopes
//! - `keycard::keyknox` - Roaming storage client

pub mod error;
pub mod manager;
pub mod memory;
pub mod transport;

// Re-export component crates
pub use keycard_auth as auth;
pub use keycard_core as core;
pub use keycard_keyknox as keyknox;
pub use keycard_seal as seal;

pub use error::{KeycardError, Result};
pub use manager::{CardManager, CardManagerConfig};
pub use memory::{MemoryCardService, Tamper};
pub use transport::CardTransport;

// Re-export commonly used types
pub use keycard_core::{Card, CardId, Fingerprint, Keypair, PublicKey, RawCard};
pub use keycard_keyknox::{KeyknoxHash, KeyknoxManager, KeyknoxPath};
