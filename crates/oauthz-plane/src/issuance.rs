//! Issuance orchestration
//!
//! Ties the state store, the identity providers, the epoch source, the
//! policy builder and the credential minter into the two steps of a login:
//! starting it (redirect to the provider) and completing it (callback).

use std::sync::Arc;

use oauthz_bridge::{BridgeError, IdentityAssertion, ProviderRegistry};
use oauthz_core::{CredentialMinter, HashedIdentity, OauthzError, PolicyBuilder};
use thiserror::Error;
use tracing::{info, warn};

use crate::network::EpochSource;
use crate::state::{StateError, StateStore};

/// How a failed request should be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 400 with a short message
    Reject,
    /// Silent redirect back to the landing page
    RestartLogin,
    /// 500
    ServerFault,
}

/// Errors raised while issuing a credential
#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid oauth state")]
    InvalidState,

    #[error("code exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("identity fetch failed: {0}")]
    IdentityFetchFailed(String),

    #[error("current epoch unavailable: {0}")]
    EpochUnavailable(String),

    #[error("policy construction failed: {0}")]
    PolicyFailed(String),

    #[error("credential signing failed: {0}")]
    SigningFailed(String),
}

impl IssuanceError {
    pub fn disposition(&self) -> Disposition {
        match self {
            IssuanceError::BadRequest(_) => Disposition::Reject,
            IssuanceError::InvalidState
            | IssuanceError::TokenExchangeFailed(_)
            | IssuanceError::IdentityFetchFailed(_) => Disposition::RestartLogin,
            IssuanceError::EpochUnavailable(_)
            | IssuanceError::PolicyFailed(_)
            | IssuanceError::SigningFailed(_) => Disposition::ServerFault,
        }
    }
}

impl From<StateError> for IssuanceError {
    fn from(_: StateError) -> Self {
        IssuanceError::InvalidState
    }
}

impl From<BridgeError> for IssuanceError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::TokenExchangeFailed(msg) => IssuanceError::TokenExchangeFailed(msg),
            BridgeError::IdentityFetchFailed(msg) => IssuanceError::IdentityFetchFailed(msg),
            BridgeError::MissingClaim(claim) => {
                IssuanceError::IdentityFetchFailed(format!("missing {}", claim))
            }
            BridgeError::UnsupportedProvider(name) => {
                IssuanceError::BadRequest(format!("unsupported service {}", name))
            }
            BridgeError::InvalidConfig(msg) => IssuanceError::BadRequest(msg),
        }
    }
}

impl From<OauthzError> for IssuanceError {
    fn from(err: OauthzError) -> Self {
        match err {
            OauthzError::SigningFailed(msg) => IssuanceError::SigningFailed(msg),
            OauthzError::EpochOverflow(msg) | OauthzError::InvalidConfig(msg) => {
                IssuanceError::PolicyFailed(msg)
            }
            other => IssuanceError::SigningFailed(other.to_string()),
        }
    }
}

/// A freshly minted credential
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// Base64 signed credential
    pub credential: String,
    /// Hashed identity the policy is bound to
    pub identity: HashedIdentity,
    /// Credential expiration epoch
    pub expiration: u64,
}

/// Runs logins from redirect to signed credential
pub struct Issuer {
    providers: ProviderRegistry,
    states: Arc<StateStore>,
    epochs: Arc<dyn EpochSource>,
    policy: PolicyBuilder,
    minter: CredentialMinter,
    subject: Option<String>,
}

impl Issuer {
    pub fn new(
        providers: ProviderRegistry,
        states: Arc<StateStore>,
        epochs: Arc<dyn EpochSource>,
        policy: PolicyBuilder,
        minter: CredentialMinter,
    ) -> Self {
        Self {
            providers,
            states,
            epochs,
            policy,
            minter,
            subject: None,
        }
    }

    /// Bind every issued credential to this subject
    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn states(&self) -> &Arc<StateStore> {
        &self.states
    }

    pub fn policy_builder(&self) -> &PolicyBuilder {
        &self.policy
    }

    /// Start a login with the named provider
    ///
    /// Returns the provider consent URL. A missing, empty or unknown service
    /// is a `BadRequest` and records nothing.
    pub fn start_login(&self, service: Option<&str>) -> Result<String, IssuanceError> {
        let service = service
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IssuanceError::BadRequest("no valid service param".into()))?;

        let provider = self
            .providers
            .get(service)
            .ok_or_else(|| IssuanceError::BadRequest("unsupported service".into()))?;

        let state = self.states.issue(provider.name());
        info!(provider = %provider.name(), "Login started");
        Ok(provider.authorization_url(&state))
    }

    /// Finish a login from the provider callback
    ///
    /// The state is consumed before anything else, so a replayed callback
    /// fails even if the first attempt failed later on.
    pub async fn complete_login(
        &self,
        state: &str,
        code: &str,
    ) -> Result<IssuedCredential, IssuanceError> {
        let assertion = match self.verify_callback(state, code).await {
            Ok(assertion) => assertion,
            Err(err) => {
                warn!(error = %err, "Login failed");
                return Err(err);
            }
        };
        self.issue_for(&assertion).await
    }

    async fn verify_callback(
        &self,
        state: &str,
        code: &str,
    ) -> Result<IdentityAssertion, IssuanceError> {
        let provider_name = self.states.consume(state)?;
        let provider = self
            .providers
            .get(&provider_name)
            .ok_or(IssuanceError::InvalidState)?;

        if code.is_empty() {
            return Err(IssuanceError::TokenExchangeFailed("missing code".into()));
        }

        Ok(provider.verify(code).await?)
    }

    /// Mint a credential for an already verified identity
    pub async fn issue_for(
        &self,
        assertion: &IdentityAssertion,
    ) -> Result<IssuedCredential, IssuanceError> {
        let identity = assertion.hashed();

        let epoch = self.epochs.current_epoch().await.map_err(|e| {
            warn!(error = %e, "Current epoch unavailable");
            IssuanceError::EpochUnavailable(e.to_string())
        })?;

        let policy = self.policy.build(&identity, epoch)?;
        let expiration = self.policy.credential_expiration(epoch)?;
        let credential = self
            .minter
            .mint(policy, self.subject.as_deref(), expiration)
            .map_err(|e| {
                warn!(error = %e, "Credential signing failed");
                IssuanceError::from(e)
            })?;

        info!(
            provider = %assertion.provider,
            identity = %identity,
            epoch,
            expiration,
            "Issued bearer credential"
        );

        Ok(IssuedCredential {
            credential,
            identity,
            expiration,
        })
    }
}
