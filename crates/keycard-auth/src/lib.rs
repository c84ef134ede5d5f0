//! # Keycard Auth
//!
//! The access token capability used by every remote Keycard operation.
//!
//! Two interchangeable providers are available:
//!
//! - [`ConstAccessTokenProvider`] - a fixed token, mostly for tests and tools
//! - [`CallbackAccessTokenProvider`] - asks the application through a
//!   callback that answers exactly once via [`TokenCompletion`]

pub mod error;
pub mod provider;
pub mod token;

pub use error::{Result, TokenError};
pub use provider::{
    AccessTokenProvider, CallbackAccessTokenProvider, ConstAccessTokenProvider, TokenCompletion,
};
pub use token::{AccessToken, TokenContext, CARDS_SERVICE, KEYKNOX_SERVICE};
