//! Mock identity provider
//!
//! For testing purposes - resolves authorization codes from a fixed table.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::bridge::IdentityProvider;
use crate::error::{BridgeError, Result};
use crate::types::{AccessToken, ProviderKind};

const MOCK_AUTH_URL: &str = "https://mock.invalid/authorize";

/// Mock identity provider for testing
///
/// Codes are handled as follows:
/// - `"FAIL:<message>"` - the code exchange fails
/// - a code registered with [`MockProvider::with_identity`] - resolves to that email
/// - any other code - the exchange succeeds but the email lookup fails
pub struct MockProvider {
    name: String,
    auth_url: String,
    identities: HashMap<String, String>,
}

impl MockProvider {
    /// Create a mock provider registered under `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auth_url: MOCK_AUTH_URL.to_string(),
            identities: HashMap::new(),
        }
    }

    /// Override the consent page URL
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Map an authorization code to a verified email
    pub fn with_identity(mut self, code: impl Into<String>, email: impl Into<String>) -> Self {
        self.identities.insert(code.into(), email.into());
        self
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn authorization_url(&self, state: &str) -> String {
        format!("{}?state={}", self.auth_url, state)
    }

    async fn exchange(&self, code: &str) -> Result<AccessToken> {
        if let Some(message) = code.strip_prefix("FAIL:") {
            return Err(BridgeError::TokenExchangeFailed(message.to_string()));
        }
        Ok(AccessToken::new(format!("mock-token:{}", code)))
    }

    async fn fetch_email(&self, token: &AccessToken) -> Result<String> {
        let code = token
            .secret()
            .strip_prefix("mock-token:")
            .ok_or_else(|| BridgeError::IdentityFetchFailed("foreign token".into()))?;

        self.identities
            .get(code)
            .cloned()
            .ok_or_else(|| BridgeError::IdentityFetchFailed("no email for token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_code() {
        let provider = MockProvider::new("google").with_identity("abc", "alice@example.com");
        let token = provider.exchange("abc").await.unwrap();
        assert_eq!(provider.fetch_email(&token).await.unwrap(), "alice@example.com");
    }

    #[tokio::test]
    async fn test_unknown_code_fails_at_lookup() {
        let provider = MockProvider::new("google");
        let token = provider.exchange("unknown").await.unwrap();
        assert!(matches!(
            provider.fetch_email(&token).await,
            Err(BridgeError::IdentityFetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_prefix() {
        let provider = MockProvider::new("google");
        assert!(matches!(
            provider.exchange("FAIL:denied").await,
            Err(BridgeError::TokenExchangeFailed(m)) if m == "denied"
        ));
    }

    #[test]
    fn test_authorization_url_carries_state() {
        let provider = MockProvider::new("google")
            .with_auth_url("https://idp.test/consent");
        assert_eq!(
            provider.authorization_url("00ff"),
            "https://idp.test/consent?state=00ff"
        );
    }
}
