//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Keys are derived from the
//! identity name, so every run sees the same cards and the same ids.

use std::sync::Arc;

use keycard::{CardManager, MemoryCardService};
use keycard_auth::ConstAccessTokenProvider;
use keycard_core::{CardBuilder, CardId, Fingerprint, KeycardVerifier, Keypair, PublicKey, RawCard, Signer};
use keycard_keyknox::{KeyknoxClient, KeyknoxManager, MemoryKeyknoxTransport, SealCrypto};
use keycard_seal::X25519StaticSecret;

/// Creation time used by fixture cards (2025-01-14T16:00:00Z).
pub const FIXED_CREATED_AT: i64 = 1_736_870_400;

pub type FixtureCardManager =
    CardManager<Arc<MemoryCardService>, ConstAccessTokenProvider, KeycardVerifier>;

pub type FixtureKeyknoxClient = KeyknoxClient<Arc<MemoryKeyknoxTransport>, ConstAccessTokenProvider>;

pub type FixtureKeyknoxManager = KeyknoxManager<FixtureKeyknoxClient, SealCrypto>;

/// One identity (on one device) with its keys and authorized services.
pub struct TestFixture {
    pub identity: String,
    pub keypair: Keypair,
    pub encryption_secret: X25519StaticSecret,
    /// Bearer token accepted by both services for `identity`.
    pub token: String,
    pub cards: Arc<MemoryCardService>,
    pub keyknox: Arc<MemoryKeyknoxTransport>,
}

impl TestFixture {
    /// Create a fixture with its own fresh services.
    pub fn new(identity: &str) -> Self {
        Self::with_services(
            identity,
            Arc::new(MemoryCardService::with_service_key(Keypair::from_seed(&[0x5E; 32]))),
            Arc::new(MemoryKeyknoxTransport::new()),
        )
    }

    /// Create a fixture on shared services.
    pub fn with_services(
        identity: &str,
        cards: Arc<MemoryCardService>,
        keyknox: Arc<MemoryKeyknoxTransport>,
    ) -> Self {
        let seed = *Fingerprint::hash(identity.as_bytes()).as_bytes();
        let fixture = Self {
            identity: identity.to_string(),
            keypair: Keypair::from_seed(&seed),
            encryption_secret: X25519StaticSecret::from_bytes(seed),
            token: format!("{}-token", identity),
            cards,
            keyknox,
        };
        fixture.authorize(&fixture.token);
        fixture
    }

    /// Another device of the same identity: same keys, same services, its
    /// own token.
    pub fn device(&self, name: &str) -> Self {
        let token = format!("{}-{}-token", self.identity, name);
        self.authorize(&token);
        Self {
            identity: self.identity.clone(),
            keypair: self.keypair.clone(),
            encryption_secret: self.encryption_secret.clone(),
            token,
            cards: self.cards.clone(),
            keyknox: self.keyknox.clone(),
        }
    }

    fn authorize(&self, token: &str) {
        self.cards
            .authorize(token, self.identity.as_str())
            .expect("card service lock poisoned");
        self.keyknox
            .authorize(token, self.identity.as_str())
            .expect("keyknox lock poisoned");
    }

    /// Get the keypair's public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    pub fn token_provider(&self) -> ConstAccessTokenProvider {
        ConstAccessTokenProvider::from_string(self.token.clone()).expect("fixture token is not empty")
    }

    /// Card manager that requires the service signature.
    pub fn card_manager(&self) -> FixtureCardManager {
        CardManager::new(
            self.cards.clone(),
            self.token_provider(),
            KeycardVerifier::new(self.cards.service_public_key()),
        )
    }

    pub fn keyknox_client(&self) -> FixtureKeyknoxClient {
        KeyknoxClient::new(self.keyknox.clone(), self.token_provider()).with_identity(self.identity.clone())
    }

    /// Keyknox manager sealing values for this identity's own keys.
    pub fn keyknox_manager(&self) -> FixtureKeyknoxManager {
        KeyknoxManager::new(
            self.keyknox_client(),
            SealCrypto::new(self.keypair.clone(), self.encryption_secret.clone()),
        )
    }

    /// A self-signed card at [`FIXED_CREATED_AT`].
    pub fn raw_card(&self, previous_card_id: Option<CardId>) -> RawCard {
        let mut builder = CardBuilder::new(self.identity.as_str(), self.public_key())
            .created_at(FIXED_CREATED_AT);
        if let Some(previous) = previous_card_id {
            builder = builder.previous_card_id(previous);
        }
        builder
            .build()
            .and_then(|unsigned| unsigned.self_sign(&self.keypair))
            .expect("fixture card builds")
    }
}

/// Fixtures for several identities sharing one pair of services.
pub fn multi_party_fixtures(identities: &[&str]) -> Vec<TestFixture> {
    let cards = Arc::new(MemoryCardService::with_service_key(Keypair::from_seed(&[0x5E; 32])));
    let keyknox = Arc::new(MemoryKeyknoxTransport::new());
    identities
        .iter()
        .map(|identity| TestFixture::with_services(identity, cards.clone(), keyknox.clone()))
        .collect()
}
