//! Identity Provider Bridge
//!
//! The bridge turns a provider login into a verified email. Each configured
//! provider builds its consent page URL, trades the authorization code for an
//! access token and reads the email from its user-info endpoint.
//!
//! ## Providers
//!
//! - **Google**: access token passed as the `access_token` query parameter
//! - **GitHub**: access token passed as `Authorization: token <t>`
//! - **Mock**: for testing purposes
//!
//! ## Usage
//!
//! ```ignore
//! use oauthz_bridge::{ProviderRegistry, handlers::*};
//!
//! let registry = ProviderRegistry::builder()
//!     .with_provider(OAuthProvider::google("google", OAuthClientConfig::new(
//!         "client-id",
//!         "client-secret",
//!         "https://accounts.google.com/o/oauth2/auth",
//!         "https://oauth2.googleapis.com/token",
//!         "https://send.example.org/callback",
//!     ))?)
//!     .build();
//!
//! let provider = registry.require("google")?;
//! let assertion = provider.verify(code).await?;
//! println!("Identity: {}", assertion.hashed());
//! ```

pub mod bridge;
pub mod error;
pub mod handlers;
pub mod types;

pub use bridge::{IdentityProvider, ProviderRegistry, ProviderRegistryBuilder};
pub use error::{BridgeError, Result};
pub use types::{AccessToken, IdentityAssertion, ProviderKind};
