//! OAuth2 authorization-code providers
//!
//! Google and GitHub share the authorization-code flow and differ only in
//! how the user-info request carries the access token.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::bridge::IdentityProvider;
use crate::error::{BridgeError, Result};
use crate::types::{AccessToken, ProviderKind};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Client registration with an OAuth2 provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    #[serde(skip_serializing)]
    pub client_secret: String,

    /// Requested scopes
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Consent page endpoint
    pub auth_url: String,

    /// Token endpoint
    pub token_url: String,

    /// Where the provider sends the user back to
    pub redirect_url: String,

    /// User-info endpoint; defaults to the provider kind's well-known URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_url: Option<String>,
}

impl OAuthClientConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: Vec::new(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            redirect_url: redirect_url.into(),
            userinfo_url: None,
        }
    }

    /// Set the requested scopes
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Override the user-info endpoint
    pub fn with_userinfo_url(mut self, url: impl Into<String>) -> Self {
        self.userinfo_url = Some(url.into());
        self
    }
}

/// Token endpoint response; providers report errors in the body as well
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// OAuth2 provider backed by real HTTP endpoints
pub struct OAuthProvider {
    name: String,
    kind: ProviderKind,
    config: OAuthClientConfig,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("client_id", &self.config.client_id)
            .finish()
    }
}

impl OAuthProvider {
    /// Create a provider of the given kind
    ///
    /// All endpoints are parsed up front so a bad URL fails at startup.
    pub fn new(
        name: impl Into<String>,
        kind: ProviderKind,
        config: OAuthClientConfig,
    ) -> Result<Self> {
        let name = name.into();

        let default_userinfo = kind.default_userinfo_url().ok_or_else(|| {
            BridgeError::InvalidConfig(format!("{} is not an OAuth2 provider kind", kind))
        })?;
        if config.client_id.is_empty() {
            return Err(BridgeError::InvalidConfig(format!(
                "{}: client id is empty",
                name
            )));
        }

        let auth_url = parse_url(&name, "authorization endpoint", &config.auth_url)?;
        let token_url = parse_url(&name, "token endpoint", &config.token_url)?;
        let userinfo_url = parse_url(
            &name,
            "user-info endpoint",
            config.userinfo_url.as_deref().unwrap_or(default_userinfo),
        )?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("oauthz/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            name,
            kind,
            config,
            auth_url,
            token_url,
            userinfo_url,
            http_client,
        })
    }

    /// Google provider with its well-known user-info endpoint
    pub fn google(name: impl Into<String>, config: OAuthClientConfig) -> Result<Self> {
        Self::new(name, ProviderKind::Google, config)
    }

    /// GitHub provider with its well-known user-info endpoint
    pub fn github(name: impl Into<String>, config: OAuthClientConfig) -> Result<Self> {
        Self::new(name, ProviderKind::Github, config)
    }

    fn userinfo_request(&self, token: &AccessToken) -> reqwest::RequestBuilder {
        match self.kind {
            ProviderKind::Github => self
                .http_client
                .get(self.userinfo_url.clone())
                .header(AUTHORIZATION, format!("token {}", token.secret())),
            _ => {
                let mut url = self.userinfo_url.clone();
                url.query_pairs_mut()
                    .append_pair("access_token", token.secret());
                self.http_client.get(url)
            }
        }
    }
}

fn parse_url(provider: &str, what: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| {
        BridgeError::InvalidConfig(format!("{}: invalid {} '{}': {}", provider, what, raw, e))
    })
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_url)
                .append_pair("response_type", "code");
            if !self.config.scopes.is_empty() {
                query.append_pair("scope", &self.config.scopes.join(" "));
            }
            query.append_pair("state", state);
        }
        url.to_string()
    }

    async fn exchange(&self, code: &str) -> Result<AccessToken> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(self.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| BridgeError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        let body: TokenResponse = response.json().await.map_err(|e| {
            BridgeError::TokenExchangeFailed(format!("status {}: {}", status, e))
        })?;

        if let Some(error) = body.error {
            warn!(provider = %self.name, error = %error, "Provider rejected authorization code");
            let detail = body.error_description.unwrap_or_default();
            let message = format!("{} {}", error, detail);
            return Err(BridgeError::TokenExchangeFailed(
                message.trim_end().to_string(),
            ));
        }
        if !status.is_success() {
            return Err(BridgeError::TokenExchangeFailed(format!("status {}", status)));
        }

        match body.access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
            _ => Err(BridgeError::TokenExchangeFailed(
                "response carries no access_token".into(),
            )),
        }
    }

    async fn fetch_email(&self, token: &AccessToken) -> Result<String> {
        let response = self
            .userinfo_request(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                BridgeError::IdentityFetchFailed(format!("failed getting user info: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::IdentityFetchFailed(format!(
                "user info status {}",
                status
            )));
        }

        let info: UserInfo = response.json().await.map_err(|e| {
            BridgeError::IdentityFetchFailed(format!("unreadable user info: {}", e))
        })?;

        match info.email {
            Some(email) if !email.is_empty() => {
                debug!(provider = %self.name, "User info carries an email");
                Ok(email)
            }
            _ => Err(BridgeError::IdentityFetchFailed(
                BridgeError::MissingClaim("email".into()).to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthClientConfig {
        OAuthClientConfig::new(
            "client-1",
            "secret-1",
            "https://accounts.google.com/o/oauth2/auth",
            "https://oauth2.googleapis.com/token",
            "https://send.example.org/callback",
        )
        .with_scopes(vec!["email".into(), "openid".into()])
    }

    #[test]
    fn test_authorization_url_parameters() {
        let provider = OAuthProvider::google("google", config()).unwrap();
        let url = Url::parse(&provider.authorization_url("deadbeef")).unwrap();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "client-1".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "https://send.example.org/callback".into()
        )));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), "email openid".into())));
        assert!(pairs.contains(&("state".into(), "deadbeef".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "client_secret"));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let mut bad = config();
        bad.token_url = "not a url".into();
        assert!(matches!(
            OAuthProvider::google("google", bad),
            Err(BridgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_mock_kind() {
        assert!(matches!(
            OAuthProvider::new("mock", ProviderKind::Mock, config()),
            Err(BridgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_google_token_in_query() {
        let provider = OAuthProvider::google("google", config()).unwrap();
        let request = provider
            .userinfo_request(&AccessToken::new("tok"))
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://www.googleapis.com/oauth2/v2/userinfo?access_token=tok"
        );
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_github_token_in_header() {
        let provider = OAuthProvider::github("github", config()).unwrap();
        let request = provider
            .userinfo_request(&AccessToken::new("tok"))
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "https://api.github.com/user");
        assert_eq!(request.headers().get(AUTHORIZATION).unwrap(), "token tok");
    }

    #[test]
    fn test_client_secret_not_serialized() {
        let json = serde_json::to_string(&config()).unwrap();
        assert!(!json.contains("secret-1"));
    }
}
