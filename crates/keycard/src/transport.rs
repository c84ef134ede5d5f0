//! Transport abstraction for the card publication service.
//!
//! A [`CardTransport`] carries one authenticated request and hands back
//! whatever the service answered. Nothing it returns is trusted: the
//! [`CardManager`](crate::CardManager) re-derives and re-verifies every card.

use async_trait::async_trait;
use std::sync::Arc;

use keycard_auth::AccessToken;
use keycard_core::{CardId, RawCard};

use crate::error::Result;

/// A channel to the card publication service.
///
/// A rejected token is reported as
/// [`KeycardError::Unauthorized`](crate::KeycardError::Unauthorized).
#[async_trait]
pub trait CardTransport: Send + Sync {
    /// Submit a self-signed card. Returns the card as the service stored it.
    async fn publish(&self, token: &AccessToken, card: RawCard) -> Result<RawCard>;

    /// Fetch a card by id.
    async fn get(&self, token: &AccessToken, id: &CardId) -> Result<RawCard>;

    /// All non-revoked cards published for `identity`.
    async fn search(&self, token: &AccessToken, identity: &str) -> Result<Vec<RawCard>>;

    /// Revoke a card owned by the token's identity.
    async fn revoke(&self, token: &AccessToken, id: &CardId) -> Result<()>;
}

#[async_trait]
impl<T: CardTransport + ?Sized> CardTransport for Arc<T> {
    async fn publish(&self, token: &AccessToken, card: RawCard) -> Result<RawCard> {
        (**self).publish(token, card).await
    }

    async fn get(&self, token: &AccessToken, id: &CardId) -> Result<RawCard> {
        (**self).get(token, id).await
    }

    async fn search(&self, token: &AccessToken, identity: &str) -> Result<Vec<RawCard>> {
        (**self).search(token, identity).await
    }

    async fn revoke(&self, token: &AccessToken, id: &CardId) -> Result<()> {
        (**self).revoke(token, id).await
    }
}
