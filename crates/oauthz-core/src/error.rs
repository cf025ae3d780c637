//! Error types for policy construction and credential signing

use thiserror::Error;

/// Result type alias using OauthzError
pub type Result<T> = std::result::Result<T, OauthzError>;

/// Errors that can occur while building policies or minting credentials
#[derive(Error, Debug)]
pub enum OauthzError {
    /// Policy builder configuration is unusable
    #[error("Invalid policy configuration: {0}")]
    InvalidConfig(String),

    /// Epoch arithmetic left the u64 range
    #[error("Epoch overflow: {0}")]
    EpochOverflow(String),

    /// Filter value could not be interpreted
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// The signing key refused to produce a signature
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Credential signature verification failed
    #[error("Credential signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Key material is malformed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// COSE encoding/decoding error
    #[error("COSE error: {0}")]
    CoseError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Base64 decoding error
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl From<ed25519_dalek::SignatureError> for OauthzError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        OauthzError::SignatureInvalid(err.to_string())
    }
}

impl From<serde_json::Error> for OauthzError {
    fn from(err: serde_json::Error) -> Self {
        OauthzError::SerializationError(err.to_string())
    }
}

impl From<coset::CoseError> for OauthzError {
    fn from(err: coset::CoseError) -> Self {
        OauthzError::CoseError(format!("{:?}", err))
    }
}

impl From<base64::DecodeError> for OauthzError {
    fn from(err: base64::DecodeError) -> Self {
        OauthzError::EncodingError(err.to_string())
    }
}
