//! Identity provider implementations

pub mod mock;
pub mod oauth;

pub use mock::MockProvider;
pub use oauth::{OAuthClientConfig, OAuthProvider};
