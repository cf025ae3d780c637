//! Hashed identities
//!
//! A verified email never leaves the issuance path in clear text. It is
//! reduced to a lowercase hex SHA-256 digest that serves both as the value
//! the access policy matches on and as the opaque label handed back to the
//! caller.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 digest of a verified email
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashedIdentity(String);

impl HashedIdentity {
    /// Hash a verified email
    ///
    /// The email is hashed byte for byte, without case folding or trimming,
    /// so the result matches what other parties compute from the same value.
    pub fn from_email(email: &str) -> Self {
        let digest = Sha256::digest(email.as_bytes());
        Self(hex::encode(digest))
    }

    /// Get the hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the hex digest
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for HashedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HashedIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
