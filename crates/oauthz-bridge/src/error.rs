//! Error types for the identity provider bridge

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while talking to an identity provider
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Provider name is not one of the supported kinds
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Authorization code could not be exchanged for an access token
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// The user-info endpoint did not yield a verified email
    #[error("Identity fetch failed: {0}")]
    IdentityFetchFailed(String),

    /// Missing required claim in a provider response
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    /// Provider configuration is unusable
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

}
