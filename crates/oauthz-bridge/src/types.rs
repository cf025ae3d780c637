//! Core types for the identity provider bridge

use oauthz_core::HashedIdentity;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Supported identity provider kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google accounts, token passed as a query parameter
    Google,
    /// GitHub, token passed in the `Authorization` header
    Github,
    /// In-process provider for tests
    Mock,
}

impl ProviderKind {
    /// Default user-info endpoint for the kind
    pub fn default_userinfo_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Google => Some("https://www.googleapis.com/oauth2/v2/userinfo"),
            ProviderKind::Github => Some("https://api.github.com/user"),
            ProviderKind::Mock => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Github => write!(f, "github"),
            ProviderKind::Mock => write!(f, "mock"),
        }
    }
}

/// Parses configured provider names. `mock` is not accepted here: it can
/// only be wired up in code.
impl std::str::FromStr for ProviderKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(ProviderKind::Google),
            "github" => Ok(ProviderKind::Github),
            _ => Err(BridgeError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// OAuth2 access token returned by a code exchange
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([redacted])")
    }
}

/// A verified email recovered from a provider session
///
/// Produced once per callback and consumed immediately; only the hashed form
/// ever leaves the issuance path.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityAssertion {
    /// Name of the provider that verified the email
    pub provider: String,

    /// Verified email, exactly as returned by the provider
    pub email: String,
}

impl IdentityAssertion {
    pub fn new(provider: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            email: email.into(),
        }
    }

    /// Hash the email for use in a policy
    pub fn hashed(&self) -> HashedIdentity {
        HashedIdentity::from_email(&self.email)
    }
}

impl std::fmt::Debug for IdentityAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityAssertion")
            .field("provider", &self.provider)
            .field("identity", &self.hashed().as_str())
            .finish()
    }
}
