//! Bearer credentials
//!
//! A bearer credential carries an access policy, an optional subject and an
//! expiration epoch. Whoever holds the signed credential gets the rights in
//! the policy until the network's epoch passes `expiration`. The record is
//! never modified after signing; see [`crate::crypto`].

use serde::{Deserialize, Serialize};

use crate::error::{OauthzError, Result};
use crate::policy::AccessPolicy;

/// Unsigned bearer credential record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerCredential {
    /// Policy restricting what the bearer may do
    pub policy: AccessPolicy,

    /// Identity the credential is bound to; `None` means any holder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Last epoch at which the credential is valid
    pub expiration: u64,

    /// Base64 public key of the issuer, for verifiers without a key registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_key: Option<String>,
}

impl BearerCredential {
    /// Create a builder for constructing credentials
    pub fn builder() -> CredentialBuilder {
        CredentialBuilder::new()
    }

    /// Check whether the credential is still valid at `epoch`
    pub fn is_valid_at(&self, epoch: u64) -> bool {
        epoch <= self.expiration
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(OauthzError::from)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(OauthzError::from)
    }
}

/// Builder for [`BearerCredential`]
#[derive(Debug, Default)]
pub struct CredentialBuilder {
    policy: Option<AccessPolicy>,
    subject: Option<String>,
    expiration: Option<u64>,
    issuer_key: Option<String>,
}

impl CredentialBuilder {
    /// Create a new credential builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the policy
    pub fn policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Bind the credential to a subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Bind the credential to a subject if one is given
    pub fn maybe_subject(mut self, subject: Option<&str>) -> Self {
        self.subject = subject.map(str::to_string);
        self
    }

    /// Set the expiration epoch
    pub fn expiration(mut self, epoch: u64) -> Self {
        self.expiration = Some(epoch);
        self
    }

    /// Record the issuer public key
    pub fn issuer_key(mut self, key: impl Into<String>) -> Self {
        self.issuer_key = Some(key.into());
        self
    }

    /// Build the credential
    ///
    /// Returns an error if the policy or expiration is missing.
    pub fn build(self) -> Result<BearerCredential> {
        let policy = self
            .policy
            .ok_or(OauthzError::MissingField("policy".into()))?;
        let expiration = self
            .expiration
            .ok_or(OauthzError::MissingField("expiration".into()))?;

        Ok(BearerCredential {
            policy,
            subject: self.subject,
            expiration,
            issuer_key: self.issuer_key,
        })
    }
}
