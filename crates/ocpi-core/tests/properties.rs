//! Property-based tests for the token codec and credential aggregates
//!
//! Uses proptest for property-based testing with arbitrary inputs.

use chrono::{Duration, Utc};
use ocpi_core::{
    BootstrapToken, PhysicalToken, TokenCodec, TokenFields, TokenType, UnusableReason,
    WhitelistType,
};
use proptest::prelude::*;
use uuid::Uuid;

// =============================================================================
// Authorization header encoding
// =============================================================================

proptest! {
    /// Any printable-ASCII token survives the header round trip
    #[test]
    fn prop_header_roundtrip(token in "[ -~]{1,64}") {
        let codec = TokenCodec::new();
        let header = TokenCodec::to_authorization_header_value(&token);
        prop_assert_eq!(codec.from_authorization_header_value(&header), Some(token));
    }

    /// Round trip holds with the legacy shim disabled too
    #[test]
    fn prop_header_roundtrip_strict(token in "[!-~]{1,64}") {
        let codec = TokenCodec::new().with_legacy_plain_tokens(false);
        let header = TokenCodec::to_authorization_header_value(&token);
        prop_assert_eq!(codec.from_authorization_header_value(&header), Some(token));
    }

    /// Headers with another scheme never yield a token
    #[test]
    fn prop_foreign_scheme_rejected(value in "[A-Za-z0-9+/=]{1,40}") {
        let codec = TokenCodec::new();
        let header = format!("Bearer {}", value);
        prop_assert!(codec.from_authorization_header_value(&header).is_none());
    }
}

// =============================================================================
// Digests
// =============================================================================

proptest! {
    #[test]
    fn prop_verify_accepts_own_digest(token in "[A-Za-z0-9_-]{8,64}", secret in "[a-z]{0,16}") {
        let codec = TokenCodec::new().with_digest_secret(secret);
        let digest = codec.digest(&token);
        prop_assert!(codec.verify(&token, &digest));
    }

    #[test]
    fn prop_verify_rejects_other_digest(
        a in "[A-Za-z0-9_-]{8,64}",
        b in "[A-Za-z0-9_-]{8,64}",
    ) {
        prop_assume!(a != b);
        let codec = TokenCodec::new();
        prop_assert!(!codec.verify(&a, &codec.digest(&b)));
    }
}

// =============================================================================
// Bootstrap tokens
// =============================================================================

proptest! {
    /// Once consumed, a bootstrap token reports ALREADY_USED whatever its expiry
    #[test]
    fn prop_consumed_is_already_used(
        expiry_offset_days in proptest::option::of(-400i64..400),
        check_offset_days in 0i64..800,
    ) {
        let now = Utc::now();
        let token = BootstrapToken {
            id: Uuid::new_v4(),
            secret_digest: "d".into(),
            description: None,
            expires_at: expiry_offset_days.map(|d| now + Duration::days(d)),
            used_at: None,
            used_by: None,
            created_at: now,
        };
        let used = token.consume("NL-TST", now).expect("fresh token is consumable");
        let usability = used.usability(now + Duration::days(check_offset_days));
        prop_assert!(!usability.usable);
        prop_assert_eq!(usability.reason, Some(UnusableReason::AlreadyUsed));
    }
}

// =============================================================================
// Physical token transitions
// =============================================================================

fn token_fields(uid: &str, whitelist: WhitelistType) -> TokenFields {
    TokenFields {
        country_code: "NL".into(),
        party_id: "TST".into(),
        uid: uid.into(),
        token_type: TokenType::Rfid,
        contract_id: "NL-TST-C00000001".into(),
        visual_number: None,
        issuer: "Test".into(),
        group_id: None,
        valid: true,
        whitelist,
        language: None,
        last_updated: Utc::now(),
    }
}

proptest! {
    /// Transitions keep identity fields and always move the timestamp forward
    #[test]
    fn prop_transitions_preserve_identity(uid in "[A-Z0-9]{1,36}", skew_secs in -3600i64..3600) {
        let token = PhysicalToken::new(token_fields(&uid, WhitelistType::Allowed)).unwrap();
        let now = token.last_updated() + Duration::seconds(skew_secs);

        let invalid = token.invalidate(now).unwrap();
        prop_assert_eq!(invalid.uid(), token.uid());
        prop_assert!(!invalid.is_valid());
        prop_assert!(invalid.last_updated() > token.last_updated());

        let never = invalid.update_whitelist(WhitelistType::Never, now).unwrap();
        prop_assert_eq!(never.whitelist(), WhitelistType::Never);
        prop_assert!(!never.is_valid());
        prop_assert!(never.last_updated() > invalid.last_updated());
    }
}
