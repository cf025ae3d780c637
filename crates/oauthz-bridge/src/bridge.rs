//! Provider registry - routes logins to the configured identity providers

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};
use crate::types::{AccessToken, IdentityAssertion, ProviderKind};

/// Trait for identity providers
///
/// Each provider knows how to send a user to its consent page, trade the
/// returned authorization code for an access token and read the verified
/// email for that token.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Name the provider is registered under (the `service` parameter)
    fn name(&self) -> &str;

    /// Kind of provider
    fn kind(&self) -> ProviderKind;

    /// URL of the provider consent page carrying `state`
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for an access token
    ///
    /// Fails with [`BridgeError::TokenExchangeFailed`] on any transport or
    /// provider-reported error.
    async fn exchange(&self, code: &str) -> Result<AccessToken>;

    /// Fetch the verified email for an access token
    ///
    /// Fails with [`BridgeError::IdentityFetchFailed`] if the call errors or
    /// the response carries no `email`.
    async fn fetch_email(&self, token: &AccessToken) -> Result<String>;

    /// Run the exchange and the email lookup back to back
    async fn verify(&self, code: &str) -> Result<IdentityAssertion> {
        let token = self.exchange(code).await?;
        debug!(provider = %self.name(), "Authorization code exchanged");
        let email = self.fetch_email(&token).await?;
        Ok(IdentityAssertion::new(self.name(), email))
    }
}

/// Registry of identity providers keyed by name
///
/// Built once at startup; the set of providers is fixed afterwards.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    /// Register a provider under its own name
    pub fn register<P: IdentityProvider + 'static>(&mut self, provider: P) {
        self.register_arc(Arc::new(provider));
    }

    /// Register an already shared provider
    pub fn register_arc(&mut self, provider: Arc<dyn IdentityProvider>) {
        info!(
            provider = %provider.name(),
            kind = %provider.kind(),
            "Registered identity provider"
        );
        if let Some(previous) = self.providers.insert(provider.name().to_string(), provider) {
            warn!(provider = %previous.name(), "Replaced identity provider");
        }
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(name).cloned()
    }

    /// Get a provider by name or fail with `UnsupportedProvider`
    pub fn require(&self, name: &str) -> Result<Arc<dyn IdentityProvider>> {
        self.get(name)
            .ok_or_else(|| BridgeError::UnsupportedProvider(name.to_string()))
    }

    /// Check if a provider is registered
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Builder for creating a ProviderRegistry
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    registry: ProviderRegistry,
}

impl ProviderRegistryBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider
    pub fn with_provider<P: IdentityProvider + 'static>(mut self, provider: P) -> Self {
        self.registry.register(provider);
        self
    }

    /// Build the registry
    pub fn build(self) -> ProviderRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::MockProvider;

    #[test]
    fn test_registration() {
        let registry = ProviderRegistry::builder()
            .with_provider(MockProvider::new("google"))
            .build();

        assert!(registry.contains("google"));
        assert!(!registry.contains("github"));
        assert_eq!(registry.names(), vec!["google".to_string()]);
    }

    #[test]
    fn test_require_unknown() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.require("google"),
            Err(BridgeError::UnsupportedProvider(name)) if name == "google"
        ));
    }

    #[tokio::test]
    async fn test_verify_combines_exchange_and_lookup() {
        let registry = ProviderRegistry::builder()
            .with_provider(MockProvider::new("github").with_identity("code-1", "bob@example.com"))
            .build();

        let provider = registry.require("github").unwrap();
        let assertion = provider.verify("code-1").await.unwrap();
        assert_eq!(assertion.provider, "github");
        assert_eq!(assertion.email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_verify_stops_at_exchange_failure() {
        let provider = MockProvider::new("google").with_identity("FAIL:x", "never@example.com");
        assert!(matches!(
            provider.verify("FAIL:x").await,
            Err(BridgeError::TokenExchangeFailed(_))
        ));
    }
}
