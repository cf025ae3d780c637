//! # OAuthz Core
//!
//! Policy construction and credential signing for the OAuthz issuance
//! service. Nothing in this crate performs I/O.
//!
//! ## Key Concepts
//!
//! - **Hashed identity**: hex SHA-256 of a verified email, the only form in
//!   which an identity appears in a policy
//! - **Access policy**: ordered rules evaluated first-match-wins
//! - **Bearer credential**: a policy plus expiration epoch, signed by the
//!   issuer and handed out as base64
//!
//! ## Upload policy
//!
//! [`PolicyBuilder`] always produces the same three rules for a container:
//!
//! 1. deny uploads without a `Content-Type` attribute
//! 2. allow uploads tagged with the caller's hashed identity, a permitted
//!    content type, a bounded size and a bounded expiration epoch
//! 3. deny every other upload

pub mod builder;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod mint;
pub mod policy;

pub use builder::{PolicyBuilder, PolicyConfig, DEFAULT_IDENTITY_ATTRIBUTE, DENIED_CONTENT_TYPES};
pub use credential::{BearerCredential, CredentialBuilder};
pub use crypto::{CredentialSigner, KeyPair, PublicKey, SignedCredential};
pub use error::{OauthzError, Result};
pub use identity::HashedIdentity;
pub use mint::CredentialMinter;
pub use policy::{
    AccessPolicy, Action, ContainerId, Filter, FilterSubject, Matcher, ObjectRequest, Operation,
    Role, Rule, ATTRIBUTE_CONTENT_TYPE, ATTRIBUTE_EXPIRATION_EPOCH,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
