//! Issuer signing key loading

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use oauthz_core::{KeyPair, OauthzError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Failed to read signing key {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed signing key {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Load the issuer key from a file holding a base64 32-byte Ed25519 seed
pub fn load_key_pair(kid: &str, path: &Path) -> Result<KeyPair, KeyError> {
    let shown = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|source| KeyError::Read {
        path: shown.clone(),
        source,
    })?;

    let malformed = |reason: String| KeyError::Malformed {
        path: shown.clone(),
        reason,
    };
    let seed = STANDARD
        .decode(contents.trim())
        .map_err(|e| malformed(e.to_string()))?;
    let key_pair =
        KeyPair::from_seed(kid, &seed).map_err(|e: OauthzError| malformed(e.to_string()))?;

    info!(kid = %kid, path = %shown, "Loaded signing key");
    Ok(key_pair)
}

/// Load the configured key or fall back to an ephemeral one
pub fn key_pair_or_ephemeral(kid: &str, path: Option<&Path>) -> Result<KeyPair, KeyError> {
    match path {
        Some(path) => load_key_pair(kid, path),
        None => {
            warn!(
                kid = %kid,
                "No signing key configured; credentials signed by this ephemeral key will not verify after restart"
            );
            Ok(KeyPair::generate(kid))
        }
    }
}
