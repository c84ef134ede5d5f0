//! Proptest generators for property-based testing.

use proptest::prelude::*;

use keycard_core::{CardBuilder, CardId, Fingerprint, Keypair, PublicKey, RawCard, Signer};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random public key.
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a random CardId.
pub fn card_id() -> impl Strategy<Value = CardId> {
    any::<[u8; 32]>().prop_map(CardId::from_bytes)
}

/// Generate a random Fingerprint.
pub fn fingerprint() -> impl Strategy<Value = Fingerprint> {
    any::<[u8; 32]>().prop_map(Fingerprint::from_bytes)
}

/// Generate a non-empty identity, sometimes with characters that need escaping.
pub fn identity() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9._-]{0,31}",
        "[a-z]{1,8}@[a-z]{1,8}\\.com",
        "[a-zA-Z0-9 \"\\\\\u{e9}\u{4e2d}]{1,16}",
    ]
}

/// Generate a reasonable creation time (Unix seconds).
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800
}

/// Parameters for generating a card.
#[derive(Debug, Clone)]
pub struct CardParams {
    pub keypair: Keypair,
    pub identity: String,
    pub created_at: i64,
    pub previous_card_id: Option<CardId>,
}

impl Arbitrary for CardParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (keypair(), identity(), timestamp(), proptest::option::of(card_id()))
            .prop_map(|(keypair, identity, created_at, previous_card_id)| CardParams {
                keypair,
                identity,
                created_at,
                previous_card_id,
            })
            .boxed()
    }
}

/// Generate card parameters.
pub fn card_params() -> impl Strategy<Value = CardParams> {
    any::<CardParams>()
}

/// Build and self-sign a card from parameters.
pub fn raw_card_from_params(params: &CardParams) -> RawCard {
    let mut builder = CardBuilder::new(params.identity.as_str(), params.keypair.public_key())
        .created_at(params.created_at);
    if let Some(previous) = params.previous_card_id {
        builder = builder.previous_card_id(previous);
    }
    builder
        .build()
        .and_then(|unsigned| unsigned.self_sign(&params.keypair))
        .expect("generated card params are valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use keycard_core::{is_canonical, parse_card, CardState};

    proptest! {
        #[test]
        fn test_card_id_deterministic(params: CardParams) {
            let c1 = raw_card_from_params(&params);
            let c2 = raw_card_from_params(&params);

            prop_assert_eq!(c1.computed_id(), c2.computed_id());
            prop_assert_eq!(c1.content_snapshot, c2.content_snapshot);
        }

        #[test]
        fn test_generated_cards_verify(params in card_params()) {
            let raw = raw_card_from_params(&params);
            prop_assert!(is_canonical(raw.content_snapshot.as_bytes()));
            prop_assert_eq!(raw.state(), CardState::SelfSigned);

            let card = parse_card(&raw, None).unwrap();
            prop_assert_eq!(card.identity, params.identity);
            prop_assert_eq!(card.previous_card_id, params.previous_card_id);
        }

        #[test]
        fn test_card_id_unique_with_different_identity(
            kp in keypair(),
            a in identity(),
            b in identity(),
        ) {
            prop_assume!(a != b);

            let card = |identity: &str| {
                CardBuilder::new(identity, kp.public_key())
                    .created_at(1000)
                    .build()
                    .unwrap()
                    .id()
            };

            prop_assert_ne!(card(&a), card(&b));
        }
    }
}
