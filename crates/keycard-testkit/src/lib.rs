//! # Keycard Testkit
//!
//! Testing utilities for Keycard.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed inputs whose canonical card content is known byte for byte
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Deterministic identities wired to in-memory services
//!
//! ## Golden Vectors
//!
//! ```rust
//! use keycard_testkit::vectors::{all_vectors, generate_card_from_vector};
//!
//! for vector in all_vectors() {
//!     let card = generate_card_from_vector(&vector);
//!     println!("{}: {}", vector.name, card.computed_id());
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use keycard_testkit::generators::{raw_card_from_params, CardParams};
//!
//! proptest! {
//!     #[test]
//!     fn card_id_is_deterministic(params: CardParams) {
//!         let c1 = raw_card_from_params(&params);
//!         let c2 = raw_card_from_params(&params);
//!         prop_assert_eq!(c1.computed_id(), c2.computed_id());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use keycard_testkit::fixtures::TestFixture;
//!
//! let alice = TestFixture::new("alice");
//! let card = alice.raw_card(None);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, TestFixture, FIXED_CREATED_AT};
pub use generators::{raw_card_from_params, CardParams};
pub use vectors::{all_vectors, generate_card_from_vector, verify_all_vectors, GoldenVector};
