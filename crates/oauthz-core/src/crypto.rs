//! Credential signing
//!
//! Credentials are wrapped in COSE_Sign1 with an Ed25519 signature over the
//! JSON-encoded [`BearerCredential`]. The protected header carries the EdDSA
//! algorithm and the issuer key id. The transport form is the CBOR envelope
//! encoded as standard base64 with padding.

use crate::credential::BearerCredential;
use crate::error::{OauthzError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use coset::{iana, CborSerializable, CoseSign1, CoseSign1Builder, HeaderBuilder};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// COSE algorithm identifier for EdDSA (Ed25519)
const EDDSA_ALG: iana::Algorithm = iana::Algorithm::EdDSA;

/// Anything able to sign credential bytes on behalf of the issuer
///
/// The production implementation is [`KeyPair`]; tests substitute signers
/// that refuse to sign.
pub trait CredentialSigner: Send + Sync {
    /// Key identifier placed in the protected header
    fn key_id(&self) -> &str;

    /// Raw Ed25519 public key
    fn public_key_bytes(&self) -> [u8; 32];

    /// Produce a detached signature over `message`
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Bearer credential wrapped in a signed COSE_Sign1 envelope
#[derive(Debug, Clone)]
pub struct SignedCredential {
    cose: CoseSign1,
}

impl SignedCredential {
    /// Sign a credential with the given signer
    pub fn sign(signer: &dyn CredentialSigner, credential: &BearerCredential) -> Result<Self> {
        let payload = credential.to_bytes()?;

        let protected = HeaderBuilder::new()
            .algorithm(EDDSA_ALG)
            .key_id(signer.key_id().as_bytes().to_vec())
            .build();

        let cose = CoseSign1Builder::new()
            .protected(protected)
            .payload(payload)
            .try_create_signature(&[], |data| signer.sign(data))?
            .build();

        Ok(Self { cose })
    }

    /// Get the key ID from the protected header
    pub fn kid(&self) -> Option<String> {
        let kid = &self.cose.protected.header.key_id;
        if kid.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(kid).to_string())
        }
    }

    /// Get the signature bytes
    pub fn signature(&self) -> &[u8] {
        &self.cose.signature
    }

    /// Serialize to CBOR bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.cose.clone().to_vec().map_err(OauthzError::from)
    }

    /// Deserialize from CBOR bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let cose = CoseSign1::from_slice(bytes).map_err(OauthzError::from)?;
        Ok(Self { cose })
    }

    /// Encode as standard padded base64 of the CBOR envelope
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    /// Decode from standard padded base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Extract and deserialize the credential from the payload
    ///
    /// This does NOT verify the signature. Use `PublicKey::verify_credential` for that.
    pub fn extract_credential(&self) -> Result<BearerCredential> {
        let payload = self
            .cose
            .payload
            .as_ref()
            .ok_or(OauthzError::MissingField("payload".into()))?;
        BearerCredential::from_bytes(payload)
    }
}

/// Ed25519 key pair for signing credentials
#[derive(Clone)]
pub struct KeyPair {
    kid: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate(kid: impl Into<String>) -> Self {
        Self::from_signing_key(kid, SigningKey::generate(&mut OsRng))
    }

    /// Create a key pair from an existing signing key
    pub fn from_signing_key(kid: impl Into<String>, signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            kid: kid.into(),
            signing_key,
            verifying_key,
        }
    }

    /// Create a key pair from a 32-byte seed
    pub fn from_seed(kid: impl Into<String>, seed: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = seed.try_into().map_err(|_| {
            OauthzError::InvalidKey(format!("expected 32-byte seed, got {} bytes", seed.len()))
        })?;
        Ok(Self::from_signing_key(kid, SigningKey::from_bytes(&seed)))
    }

    /// Get the key identifier
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            kid: self.kid.clone(),
            verifying_key: self.verifying_key,
        }
    }

    /// Sign a credential and wrap it in COSE_Sign1
    pub fn sign_credential(&self, credential: &BearerCredential) -> Result<SignedCredential> {
        SignedCredential::sign(self, credential)
    }
}

impl CredentialSigner for KeyPair {
    fn key_id(&self) -> &str {
        &self.kid
    }

    fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| OauthzError::SigningFailed(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

/// Ed25519 public key for verification
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey").field("kid", &self.kid).finish()
    }
}

impl PublicKey {
    /// Create a public key from raw bytes
    pub fn from_bytes(kid: impl Into<String>, bytes: &[u8; 32]) -> Result<Self> {
        let verifying_key =
            VerifyingKey::from_bytes(bytes).map_err(|e| OauthzError::InvalidKey(e.to_string()))?;
        Ok(Self {
            kid: kid.into(),
            verifying_key,
        })
    }

    /// Create a public key from standard base64
    pub fn from_base64(kid: impl Into<String>, encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| OauthzError::InvalidKey("invalid key length".into()))?;
        Self::from_bytes(kid, &bytes)
    }

    /// Get the key identifier
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Get the raw verifying key bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Standard base64 of the raw key
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Verify a signed credential and extract the payload
    pub fn verify_credential(&self, signed: &SignedCredential) -> Result<BearerCredential> {
        self.verify_cose(&signed.cose)?;
        signed.extract_credential()
    }

    fn verify_cose(&self, cose: &CoseSign1) -> Result<()> {
        let kid = &cose.protected.header.key_id;
        if !kid.is_empty() {
            let kid_str = String::from_utf8_lossy(kid);
            if kid_str != self.kid {
                return Err(OauthzError::SignatureInvalid(format!(
                    "key ID mismatch: expected '{}', got '{}'",
                    self.kid, kid_str
                )));
            }
        }

        let sig_structure = cose.tbs_data(&[]);

        let signature_bytes: [u8; 64] = cose
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| OauthzError::SignatureInvalid("invalid signature length".into()))?;
        let signature = Signature::from_bytes(&signature_bytes);

        self.verifying_key
            .verify(&sig_structure, &signature)
            .map_err(OauthzError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{PolicyBuilder, PolicyConfig};
    use crate::identity::HashedIdentity;
    use crate::policy::{AccessPolicy, ContainerId, Operation, Role, Rule};

    fn credential(expiration: u64) -> BearerCredential {
        let mut policy = AccessPolicy::new(ContainerId::new("cid"));
        policy.push(Rule::deny(Operation::Put).for_role(Role::Others));
        BearerCredential::builder()
            .policy(policy)
            .expiration(expiration)
            .build()
            .unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate("oauthz-1");
        let original = credential(130);

        let signed = kp.sign_credential(&original).unwrap();
        assert_eq!(signed.kid().as_deref(), Some("oauthz-1"));
        assert_eq!(signed.signature().len(), 64);

        let verified = kp.public_key().verify_credential(&signed).unwrap();
        assert_eq!(verified, original);
    }

    #[test]
    fn test_verification_fails_with_wrong_key() {
        let kp1 = KeyPair::generate("oauthz");
        let kp2 = KeyPair::generate("oauthz");

        let signed = kp1.sign_credential(&credential(1)).unwrap();
        let result = kp2.public_key().verify_credential(&signed);

        assert!(matches!(result, Err(OauthzError::SignatureInvalid(_))));
    }

    #[test]
    fn test_verification_fails_on_kid_mismatch() {
        let kp = KeyPair::generate("a");
        let other = PublicKey::from_bytes("b", &kp.public_key().to_bytes()).unwrap();

        let signed = kp.sign_credential(&credential(1)).unwrap();
        assert!(other.verify_credential(&signed).is_err());
    }

    #[test]
    fn test_swapped_payload_is_rejected() {
        let kp = KeyPair::generate("oauthz");
        let mut signed = kp.sign_credential(&credential(130)).unwrap();

        signed.cose.payload = Some(credential(9_999).to_bytes().unwrap());

        assert!(kp.public_key().verify_credential(&signed).is_err());
        // Unverified extraction still reads the forged body
        assert_eq!(signed.extract_credential().unwrap().expiration, 9_999);
    }

    /// Sign the upload policy for alice, then replace it with `forge(policy)`
    /// while keeping the original signature
    fn sign_then_swap_policy(forge: impl Fn(&mut AccessPolicy)) -> (KeyPair, SignedCredential) {
        let builder = PolicyBuilder::new(PolicyConfig::new(ContainerId::new("cid"))).unwrap();
        let policy = builder
            .build(&HashedIdentity::from_email("alice@example.com"), 100)
            .unwrap();
        let original = BearerCredential::builder()
            .policy(policy)
            .expiration(130)
            .build()
            .unwrap();

        let kp = KeyPair::generate("oauthz");
        let mut signed = kp.sign_credential(&original).unwrap();

        let mut forged = original.clone();
        forge(&mut forged.policy);
        assert_ne!(forged.policy, original.policy);
        signed.cose.payload = Some(forged.to_bytes().unwrap());

        (kp, signed)
    }

    #[test]
    fn test_reordered_rules_are_rejected() {
        let (kp, signed) = sign_then_swap_policy(|policy| policy.rules.swap(0, 1));
        assert!(matches!(
            kp.public_key().verify_credential(&signed),
            Err(OauthzError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_rewritten_filter_value_is_rejected() {
        let mallory = HashedIdentity::from_email("mallory@example.com");
        let (kp, signed) = sign_then_swap_policy(|policy| {
            policy.rules[1].filters[0].value = mallory.as_str().to_string();
        });

        assert!(matches!(
            kp.public_key().verify_credential(&signed),
            Err(OauthzError::SignatureInvalid(_))
        ));
        let unverified = signed.extract_credential().unwrap();
        assert_eq!(unverified.policy.rules[1].filters[0].value, mallory.as_str());
    }

    #[test]
    fn test_base64_roundtrip() {
        let kp = KeyPair::generate("oauthz");
        let original = credential(42);

        let encoded = kp.sign_credential(&original).unwrap().to_base64().unwrap();
        assert!(STANDARD.decode(&encoded).is_ok());

        let restored = SignedCredential::from_base64(&encoded).unwrap();
        assert_eq!(kp.public_key().verify_credential(&restored).unwrap(), original);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let kp = KeyPair::from_seed("oauthz", &[7u8; 32]).unwrap();
        let first = kp.sign_credential(&credential(5)).unwrap();
        let second = kp.sign_credential(&credential(5)).unwrap();
        assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
    }

    #[test]
    fn test_from_seed_rejects_wrong_length() {
        assert!(matches!(
            KeyPair::from_seed("oauthz", &[0u8; 31]),
            Err(OauthzError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_public_key_base64() {
        let kp = KeyPair::generate("oauthz");
        let pk = kp.public_key();
        let restored = PublicKey::from_base64("oauthz", &pk.to_base64()).unwrap();
        assert_eq!(restored.to_bytes(), pk.to_bytes());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let kp = KeyPair::from_seed("oauthz", &[9u8; 32]).unwrap();
        let debug = format!("{:?}", kp);
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("9, 9"));
    }
}
