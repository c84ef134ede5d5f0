//! Card manager: generation, publication, lookup, import and export.
//!
//! Every card that reaches the caller went through [`parse_card`] and the
//! configured [`CardVerifier`], whether it came from the publication
//! service or from an imported string. Nothing is ever repaired: a card
//! that does not verify is an error.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use tracing::{debug, warn};

use keycard_auth::{AccessToken, AccessTokenProvider, TokenContext, CARDS_SERVICE};
use keycard_core::{
    parse_card, Card, CardBuilder, CardId, CardVerifier, RawCard, Signer, ValidationError,
};

use crate::error::{KeycardError, Result};
use crate::transport::CardTransport;

/// Configuration for [`CardManager`].
#[derive(Debug, Clone)]
pub struct CardManagerConfig {
    /// Run the verifier on cards returned by the service.
    ///
    /// Structural checks (fingerprint, claimed id, signatures) always run.
    /// A service signature is checked under the verifier's service key.
    pub verify_responses: bool,

    /// Reload the token and retry once when the service rejects it.
    pub retry_on_unauthorized: bool,
}

impl Default for CardManagerConfig {
    fn default() -> Self {
        Self {
            verify_responses: true,
            retry_on_unauthorized: true,
        }
    }
}

/// The card facade.
pub struct CardManager<T, P, V> {
    transport: T,
    provider: P,
    verifier: V,
    config: CardManagerConfig,
}

impl<T, P, V> CardManager<T, P, V>
where
    T: CardTransport,
    P: AccessTokenProvider,
    V: CardVerifier,
{
    pub fn new(transport: T, provider: P, verifier: V) -> Self {
        Self::with_config(transport, provider, verifier, CardManagerConfig::default())
    }

    pub fn with_config(transport: T, provider: P, verifier: V, config: CardManagerConfig) -> Self {
        Self {
            transport,
            provider,
            verifier,
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    // =========================================================================
    // Generation and publication
    // =========================================================================

    /// Build a card for `identity` and self-sign it with `signer`.
    pub fn generate_raw_card(
        &self,
        signer: &dyn Signer,
        identity: &str,
        previous_card_id: Option<CardId>,
    ) -> Result<RawCard> {
        let mut builder = CardBuilder::new(identity, signer.public_key());
        if let Some(previous) = previous_card_id {
            builder = builder.previous_card_id(previous);
        }
        Ok(builder.build()?.self_sign(signer)?)
    }

    /// Submit a self-signed card and verify what the service sends back.
    ///
    /// The answer must be the same card (same recomputed id), still carry a
    /// valid self signature, and carry a service signature. Anything else is
    /// reported as [`KeycardError::Validation`].
    pub async fn publish_card(&self, raw: RawCard) -> Result<Card> {
        let original = parse_card(&raw, self.verifier.service_key())?;
        let ctx = TokenContext::new(CARDS_SERVICE, "publish").with_identity(original.identity.clone());

        let transport = &self.transport;
        let response = self
            .authorized(ctx, |token| {
                let raw = raw.clone();
                async move { transport.publish(&token, raw).await }
            })
            .await?;

        let card = self.accept(response).map_err(|e| {
            warn!(card_id = ?original.id, error = %e, "rejected publication response");
            e
        })?;

        if card.id != original.id {
            warn!(expected = ?original.id, answered = ?card.id, "service answered with another card");
            return Err(ValidationError::IdMismatch {
                claimed: card.id.to_hex(),
                computed: original.id.to_hex(),
            }
            .into());
        }
        if !card.is_published {
            warn!(card_id = ?card.id, "service answered without its signature");
            return Err(ValidationError::MissingServiceSignature.into());
        }

        debug!(identity = %card.identity, card_id = ?card.id, "published card");
        Ok(card)
    }

    /// Generate, self-sign and publish in one step.
    pub async fn publish(
        &self,
        signer: &dyn Signer,
        identity: &str,
        previous_card_id: Option<CardId>,
    ) -> Result<Card> {
        let raw = self.generate_raw_card(signer, identity, previous_card_id)?;
        self.publish_card(raw).await
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Fetch and verify a card by id.
    pub async fn get_card(&self, id: &CardId) -> Result<Card> {
        let transport = &self.transport;
        let ctx = TokenContext::new(CARDS_SERVICE, "get");
        let response = self
            .authorized(ctx, |token| async move { transport.get(&token, id).await })
            .await?;

        let card = self.accept(response).map_err(|e| {
            warn!(card_id = ?id, error = %e, "rejected fetched card");
            e
        })?;
        if card.id != *id {
            warn!(requested = ?id, answered = ?card.id, "service answered with another card");
            return Err(ValidationError::IdMismatch {
                claimed: card.id.to_hex(),
                computed: id.to_hex(),
            }
            .into());
        }
        Ok(card)
    }

    /// Fetch and verify every card of `identity`.
    ///
    /// Rotation chains are linked: a card referenced as another result's
    /// previous card is attached to it as `previous_card` and flagged
    /// outdated. Only chain heads are returned, in service order.
    pub async fn search_cards(&self, identity: &str) -> Result<Vec<Card>> {
        let transport = &self.transport;
        let ctx = TokenContext::new(CARDS_SERVICE, "search");
        let responses = self
            .authorized(ctx, |token| async move { transport.search(&token, identity).await })
            .await?;

        let mut cards = Vec::with_capacity(responses.len());
        for raw in responses {
            let card = self.accept(raw).map_err(|e| {
                warn!(%identity, error = %e, "rejected search result");
                e
            })?;
            if card.identity != identity {
                warn!(%identity, answered = %card.identity, "search answered for another identity");
                return Err(ValidationError::Malformed(format!(
                    "search for {} returned a card of {}",
                    identity, card.identity
                ))
                .into());
            }
            cards.push(card);
        }
        Ok(link_chains(cards))
    }

    /// Revoke one of the caller's cards.
    pub async fn revoke_card(&self, id: &CardId) -> Result<()> {
        let transport = &self.transport;
        let ctx = TokenContext::new(CARDS_SERVICE, "revoke");
        self.authorized(ctx, |token| async move { transport.revoke(&token, id).await })
            .await?;
        debug!(card_id = ?id, "revoked card");
        Ok(())
    }

    // =========================================================================
    // Import / export
    // =========================================================================

    /// Re-derive and verify a raw card.
    pub fn import_card(&self, raw: &RawCard) -> Result<Card> {
        let card = parse_card(raw, self.verifier.service_key())?;
        self.verifier.verify(&card)?;
        Ok(card)
    }

    pub fn import_card_from_base64(&self, encoded: &str) -> Result<Card> {
        self.import_card(&RawCard::import_base64(encoded)?)
    }

    pub fn import_card_from_json(&self, json: &str) -> Result<Card> {
        self.import_card(&RawCard::from_json(json)?)
    }

    pub fn export_card_as_raw(&self, card: &Card) -> RawCard {
        card.to_raw()
    }

    pub fn export_card_as_json(&self, card: &Card) -> Result<String> {
        Ok(card.to_raw().to_json()?)
    }

    pub fn export_card_as_base64(&self, card: &Card) -> Result<String> {
        Ok(card.to_raw().export_base64()?)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn accept(&self, raw: RawCard) -> Result<Card> {
        let card = parse_card(&raw, self.verifier.service_key())?;
        if self.config.verify_responses {
            self.verifier.verify(&card)?;
        }
        Ok(card)
    }

    async fn authorized<R, F, Fut>(&self, ctx: TokenContext, call: F) -> Result<R>
    where
        F: Fn(AccessToken) -> Fut + Send + Sync,
        Fut: Future<Output = Result<R>> + Send,
        R: Send,
    {
        let token = self.provider.get_token(&ctx).await?;

        match call(token).await {
            Err(KeycardError::Unauthorized(reason)) if self.config.retry_on_unauthorized => {
                debug!(operation = %ctx.operation, %reason, "card service rejected token, reloading");
                let token = self.provider.get_token(&ctx.reloaded()).await?;
                call(token).await
            }
            other => other,
        }
    }
}

fn link_chains(cards: Vec<Card>) -> Vec<Card> {
    let mut order = Vec::with_capacity(cards.len());
    let mut by_id = HashMap::with_capacity(cards.len());
    for card in cards {
        if !by_id.contains_key(&card.id) {
            order.push(card.id);
            by_id.insert(card.id, card);
        }
    }

    let superseded: HashSet<CardId> = by_id
        .values()
        .filter_map(|card| card.previous_card_id)
        .filter(|previous| by_id.contains_key(previous))
        .collect();

    let heads: Vec<Card> = order
        .iter()
        .filter(|id| !superseded.contains(*id))
        .filter_map(|id| by_id.remove(id))
        .collect();

    heads
        .into_iter()
        .map(|head| attach_previous(head, &mut by_id))
        .collect()
}

fn attach_previous(mut card: Card, pool: &mut HashMap<CardId, Card>) -> Card {
    if let Some(previous) = card.previous_card_id.and_then(|id| pool.remove(&id)) {
        let mut previous = attach_previous(previous, pool);
        previous.is_outdated = true;
        card.previous_card = Some(Box::new(previous));
    }
    card
}
