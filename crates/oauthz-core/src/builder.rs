//! Upload policy construction
//!
//! Produces the three-rule policy handed to every authenticated user:
//!
//! 1. **Deny** `Put` for objects with no content type at all. A not-equal
//!    filter passes on a missing attribute, so without this rule an object
//!    lacking `Content-Type` would slip through rule 2.
//! 2. **Allow** `Put` when the object carries the caller's hashed identity,
//!    has a content type outside the script/markup denylist, fits the size
//!    cap and expires no later than the computed bound.
//! 3. **Deny** `Put` unconditionally.
//!
//! The order is part of the contract and is covered by tests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OauthzError, Result};
use crate::identity::HashedIdentity;
use crate::policy::{
    AccessPolicy, ContainerId, Filter, Operation, Role, Rule, ATTRIBUTE_CONTENT_TYPE,
    ATTRIBUTE_EXPIRATION_EPOCH,
};

/// Default object attribute carrying the hashed identity
pub const DEFAULT_IDENTITY_ATTRIBUTE: &str = "Email";

/// Content types a bearer may never upload
///
/// Matched by exact string equality. `text/htmlh` is a malformed variant
/// seen in the wild and is listed on purpose.
pub const DENIED_CONTENT_TYPES: [&str; 6] = [
    "application/javascript",
    "application/x-javascript",
    "text/javascript",
    "application/xhtml+xml",
    "text/html",
    "text/htmlh",
];

/// Inputs of the upload policy that do not change between requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Container uploads are allowed into
    pub container: ContainerId,

    /// Object attribute carrying the hashed identity
    pub identity_attribute: String,

    /// Credential lifetime in epochs
    pub lifetime: u64,

    /// Maximum payload size in bytes
    pub max_object_size: u64,

    /// Maximum time an uploaded object may live
    pub max_object_age: Duration,

    /// Length of one epoch in milliseconds
    pub ms_per_epoch: u64,
}

impl PolicyConfig {
    /// Create a configuration with the default identity attribute
    pub fn new(container: ContainerId) -> Self {
        Self {
            container,
            identity_attribute: DEFAULT_IDENTITY_ATTRIBUTE.to_string(),
            lifetime: 30,
            max_object_size: 200 << 20,
            max_object_age: Duration::from_secs(4 * 24 * 3600),
            ms_per_epoch: 3_600_000,
        }
    }

    /// Set the identity attribute
    pub fn with_identity_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.identity_attribute = attribute.into();
        self
    }

    /// Set the credential lifetime in epochs
    pub fn with_lifetime(mut self, epochs: u64) -> Self {
        self.lifetime = epochs;
        self
    }

    /// Set the maximum payload size
    pub fn with_max_object_size(mut self, bytes: u64) -> Self {
        self.max_object_size = bytes;
        self
    }

    /// Set the maximum object age
    pub fn with_max_object_age(mut self, age: Duration) -> Self {
        self.max_object_age = age;
        self
    }

    /// Set the epoch length
    pub fn with_ms_per_epoch(mut self, ms: u64) -> Self {
        self.ms_per_epoch = ms;
        self
    }
}

/// Builds the ordered upload policy for a hashed identity
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    config: PolicyConfig,
}

impl PolicyBuilder {
    /// Create a builder, rejecting configurations that cannot produce a policy
    pub fn new(config: PolicyConfig) -> Result<Self> {
        if config.container.as_str().is_empty() {
            return Err(OauthzError::InvalidConfig("container id is empty".into()));
        }
        if config.identity_attribute.is_empty() {
            return Err(OauthzError::InvalidConfig("identity attribute is empty".into()));
        }
        if config.ms_per_epoch == 0 {
            return Err(OauthzError::InvalidConfig(
                "milliseconds per epoch must be positive".into(),
            ));
        }
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Maximum object age expressed in whole epochs, rounded down
    pub fn age_epochs(&self) -> u64 {
        let epochs = self.config.max_object_age.as_millis() / u128::from(self.config.ms_per_epoch);
        u64::try_from(epochs).unwrap_or(u64::MAX)
    }

    /// Epoch at which a credential issued now expires
    pub fn credential_expiration(&self, current_epoch: u64) -> Result<u64> {
        current_epoch.checked_add(self.config.lifetime).ok_or_else(|| {
            OauthzError::EpochOverflow(format!(
                "{} + lifetime {}",
                current_epoch, self.config.lifetime
            ))
        })
    }

    /// Latest expiration epoch an uploaded object may declare
    pub fn max_expiration_epoch(&self, current_epoch: u64) -> Result<u64> {
        let ages = self.age_epochs();
        self.credential_expiration(current_epoch)?
            .checked_add(ages)
            .ok_or_else(|| {
                OauthzError::EpochOverflow(format!(
                    "{} + lifetime {} + age {}",
                    current_epoch, self.config.lifetime, ages
                ))
            })
    }

    /// Build the policy for one identity at the given epoch
    pub fn build(&self, identity: &HashedIdentity, current_epoch: u64) -> Result<AccessPolicy> {
        let max_expiration = self.max_expiration_epoch(current_epoch)?;

        let mut policy = AccessPolicy::new(self.config.container.clone());

        policy.push(
            Rule::deny(Operation::Put)
                .for_role(Role::Others)
                .with_filter(Filter::attribute_absent(ATTRIBUTE_CONTENT_TYPE)),
        );

        policy.push(
            Rule::allow(Operation::Put)
                .for_role(Role::Others)
                .with_filter(Filter::attribute_eq(
                    self.config.identity_attribute.as_str(),
                    identity.as_str(),
                ))
                .with_filters(
                    DENIED_CONTENT_TYPES
                        .iter()
                        .map(|ct| Filter::attribute_ne(ATTRIBUTE_CONTENT_TYPE, *ct)),
                )
                .with_filter(Filter::attribute_ne(ATTRIBUTE_CONTENT_TYPE, ""))
                .with_filter(Filter::payload_le(self.config.max_object_size))
                .with_filter(Filter::attribute_le(ATTRIBUTE_EXPIRATION_EPOCH, max_expiration)),
        );

        policy.push(Rule::deny(Operation::Put).for_role(Role::Others));

        Ok(policy)
    }
}
