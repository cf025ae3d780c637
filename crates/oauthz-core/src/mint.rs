//! Credential minting
//!
//! Packs a policy, an optional subject and an expiration epoch into a
//! [`BearerCredential`], signs it with the issuer key and returns the
//! base64 transport form.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::credential::BearerCredential;
use crate::crypto::{CredentialSigner, SignedCredential};
use crate::error::Result;
use crate::policy::AccessPolicy;

/// Signs bearer credentials with a fixed issuer key
#[derive(Clone)]
pub struct CredentialMinter {
    signer: Arc<dyn CredentialSigner>,
}

impl std::fmt::Debug for CredentialMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialMinter")
            .field("kid", &self.signer.key_id())
            .finish()
    }
}

impl CredentialMinter {
    pub fn new(signer: Arc<dyn CredentialSigner>) -> Self {
        Self { signer }
    }

    /// Key identifier of the issuer
    pub fn key_id(&self) -> &str {
        self.signer.key_id()
    }

    /// Build and sign a credential, returning standard padded base64
    ///
    /// A signer failure surfaces as [`crate::OauthzError::SigningFailed`];
    /// no partial credential is ever returned.
    pub fn mint(
        &self,
        policy: AccessPolicy,
        subject: Option<&str>,
        expiration: u64,
    ) -> Result<String> {
        let credential = BearerCredential::builder()
            .policy(policy)
            .maybe_subject(subject)
            .expiration(expiration)
            .issuer_key(STANDARD.encode(self.signer.public_key_bytes()))
            .build()?;

        SignedCredential::sign(self.signer.as_ref(), &credential)?.to_base64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, PublicKey};
    use crate::error::OauthzError;
    use crate::policy::{ContainerId, Operation, Role, Rule};

    struct RefusingSigner;

    impl CredentialSigner for RefusingSigner {
        fn key_id(&self) -> &str {
            "refusing"
        }

        fn public_key_bytes(&self) -> [u8; 32] {
            [0u8; 32]
        }

        fn sign(&self, _message: &[u8]) -> Result<Vec<u8>> {
            Err(OauthzError::SigningFailed("key unavailable".into()))
        }
    }

    fn policy() -> AccessPolicy {
        let mut policy = AccessPolicy::new(ContainerId::new("cid"));
        policy.push(Rule::deny(Operation::Put).for_role(Role::Others));
        policy
    }

    #[test]
    fn test_mint_verifiable_credential() {
        let kp = KeyPair::generate("oauthz");
        let minter = CredentialMinter::new(Arc::new(kp.clone()));

        let encoded = minter.mint(policy(), None, 130).unwrap();
        let signed = SignedCredential::from_base64(&encoded).unwrap();
        let credential = kp.public_key().verify_credential(&signed).unwrap();

        assert_eq!(credential.policy, policy());
        assert_eq!(credential.expiration, 130);
        assert!(credential.subject.is_none());
    }

    #[test]
    fn test_mint_records_subject_and_issuer_key() {
        let kp = KeyPair::generate("oauthz");
        let minter = CredentialMinter::new(Arc::new(kp.clone()));

        let encoded = minter.mint(policy(), Some("owner-1"), 7).unwrap();
        let credential = SignedCredential::from_base64(&encoded)
            .unwrap()
            .extract_credential()
            .unwrap();

        assert_eq!(credential.subject.as_deref(), Some("owner-1"));
        let issuer = PublicKey::from_base64("oauthz", credential.issuer_key.as_deref().unwrap())
            .unwrap();
        assert_eq!(issuer.to_bytes(), kp.public_key().to_bytes());
    }

    #[test]
    fn test_signer_failure_propagates() {
        let minter = CredentialMinter::new(Arc::new(RefusingSigner));
        assert!(matches!(
            minter.mint(policy(), None, 1),
            Err(OauthzError::SigningFailed(_))
        ));
    }
}
