//! Property-based tests for the upload policy
//!
//! The issued policy must admit exactly the uploads tagged with the caller's
//! hashed identity that also satisfy the content type, size and expiration
//! bounds, and refuse everything else.

use std::sync::Arc;

use oauthz_core::{
    Action, ContainerId, CredentialMinter, HashedIdentity, KeyPair, ObjectRequest, PolicyBuilder,
    PolicyConfig, SignedCredential, ATTRIBUTE_CONTENT_TYPE, ATTRIBUTE_EXPIRATION_EPOCH,
    DEFAULT_IDENTITY_ATTRIBUTE, DENIED_CONTENT_TYPES,
};
use proptest::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

const MAX_SIZE: u64 = 200 << 20;

fn create_builder() -> PolicyBuilder {
    PolicyBuilder::new(PolicyConfig::new(ContainerId::new(
        "8zdBGjFMAJZpH5ZpNp5fTv2M6szf7aWDbtw9fkzv7gJA",
    )))
    .expect("default config is valid")
}

fn upload(identity: &HashedIdentity, content_type: &str, size: u64, expiry: u64) -> ObjectRequest {
    ObjectRequest::put()
        .with_attribute(DEFAULT_IDENTITY_ATTRIBUTE, identity.as_str())
        .with_attribute(ATTRIBUTE_CONTENT_TYPE, content_type)
        .with_attribute(ATTRIBUTE_EXPIRATION_EPOCH, expiry.to_string())
        .with_payload_length(size)
}

fn email_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9.]{1,16}@[a-z]{2,10}\\.[a-z]{2,4}"
}

fn permitted_content_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("image/png".to_string()),
        Just("image/jpeg".to_string()),
        Just("application/octet-stream".to_string()),
        Just("text/plain".to_string()),
        Just("video/mp4".to_string()),
    ]
}

// =============================================================================
// Allow path
// =============================================================================

proptest! {
    #[test]
    fn prop_conforming_upload_is_allowed(
        email in email_strategy(),
        content_type in permitted_content_type(),
        current in 0..1_000_000_000u64,
        size in 0..=MAX_SIZE,
        slack in 0..=126u64,
    ) {
        let builder = create_builder();
        let identity = HashedIdentity::from_email(&email);
        let policy = builder.build(&identity, current).unwrap();
        let bound = builder.max_expiration_epoch(current).unwrap();

        let request = upload(&identity, &content_type, size, bound - slack.min(bound));
        prop_assert_eq!(policy.evaluate(&request), Some(Action::Allow));
    }
}

// =============================================================================
// Deny paths
// =============================================================================

proptest! {
    #[test]
    fn prop_foreign_identity_is_denied(
        owner in email_strategy(),
        intruder in email_strategy(),
        current in 0..1_000_000u64,
    ) {
        prop_assume!(owner != intruder);
        let builder = create_builder();
        let policy = builder.build(&HashedIdentity::from_email(&owner), current).unwrap();

        let request = upload(&HashedIdentity::from_email(&intruder), "image/png", 1, current);
        prop_assert_eq!(policy.evaluate(&request), Some(Action::Deny));
    }

    #[test]
    fn prop_denied_content_type_is_denied(
        email in email_strategy(),
        index in 0..DENIED_CONTENT_TYPES.len(),
        current in 0..1_000_000u64,
    ) {
        let builder = create_builder();
        let identity = HashedIdentity::from_email(&email);
        let policy = builder.build(&identity, current).unwrap();

        let request = upload(&identity, DENIED_CONTENT_TYPES[index], 1, current);
        prop_assert_eq!(policy.evaluate(&request), Some(Action::Deny));
    }

    #[test]
    fn prop_missing_content_type_is_denied(
        email in email_strategy(),
        current in 0..1_000_000u64,
    ) {
        let builder = create_builder();
        let identity = HashedIdentity::from_email(&email);
        let policy = builder.build(&identity, current).unwrap();

        let request = ObjectRequest::put()
            .with_attribute(DEFAULT_IDENTITY_ATTRIBUTE, identity.as_str())
            .with_attribute(ATTRIBUTE_EXPIRATION_EPOCH, current.to_string())
            .with_payload_length(1);
        prop_assert_eq!(policy.evaluate(&request), Some(Action::Deny));
    }

    #[test]
    fn prop_oversized_upload_is_denied(
        email in email_strategy(),
        excess in 1..1_000_000u64,
    ) {
        let builder = create_builder();
        let identity = HashedIdentity::from_email(&email);
        let policy = builder.build(&identity, 100).unwrap();

        let request = upload(&identity, "image/png", MAX_SIZE + excess, 100);
        prop_assert_eq!(policy.evaluate(&request), Some(Action::Deny));
    }

    #[test]
    fn prop_late_expiration_is_denied(
        email in email_strategy(),
        current in 0..1_000_000u64,
        excess in 1..1_000u64,
    ) {
        let builder = create_builder();
        let identity = HashedIdentity::from_email(&email);
        let policy = builder.build(&identity, current).unwrap();
        let bound = builder.max_expiration_epoch(current).unwrap();

        let request = upload(&identity, "image/png", 1, bound + excess);
        prop_assert_eq!(policy.evaluate(&request), Some(Action::Deny));
    }

    /// The final rule makes every upload decision explicit
    #[test]
    fn prop_every_upload_gets_a_decision(
        email in email_strategy(),
        content_type in "[a-z/+.-]{0,24}",
        size in any::<u64>(),
        expiry in any::<u64>(),
    ) {
        let builder = create_builder();
        let identity = HashedIdentity::from_email(&email);
        let policy = builder.build(&identity, 0).unwrap();

        let request = upload(&identity, &content_type, size, expiry);
        prop_assert!(policy.evaluate(&request).is_some());
    }
}

// =============================================================================
// Minting
// =============================================================================

proptest! {
    #[test]
    fn prop_minted_credential_carries_built_policy(
        email in email_strategy(),
        current in 0..1_000_000u64,
    ) {
        let builder = create_builder();
        let identity = HashedIdentity::from_email(&email);
        let policy = builder.build(&identity, current).unwrap();
        let expiration = builder.credential_expiration(current).unwrap();

        let kp = KeyPair::generate("oauthz");
        let minter = CredentialMinter::new(Arc::new(kp.clone()));
        let encoded = minter.mint(policy.clone(), None, expiration).unwrap();

        let signed = SignedCredential::from_base64(&encoded).unwrap();
        let credential = kp.public_key().verify_credential(&signed).unwrap();

        prop_assert_eq!(credential.policy, policy);
        prop_assert_eq!(credential.expiration, current + 30);
    }
}
