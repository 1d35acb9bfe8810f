//! Property-based tests for service-common crate.
//!
//! These tests verify universal properties across all inputs using proptest.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use proptest::prelude::*;
use service_common::{
    EnvReader, RetryConfig, RetryPolicy, ServiceError, check_dotted, hash_and_encode,
    is_valid_base64_url, is_valid_key,
};

// Any byte string encoded as unpadded base64url validates with its exact length.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_encoded_bytes_validate(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let encoded = URL_SAFE_NO_PAD.encode(&bytes);
        prop_assert_eq!(is_valid_base64_url(&encoded), Some(bytes.len()));
    }

    #[test]
    fn prop_padding_always_rejected(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let padded = format!("{}=", URL_SAFE_NO_PAD.encode(&bytes));
        prop_assert_eq!(is_valid_base64_url(&padded), None);
    }

    #[test]
    fn prop_key_valid_only_at_exact_size(len in 0usize..128) {
        let key = URL_SAFE_NO_PAD.encode(vec![0xA5_u8; len]);
        prop_assert_eq!(is_valid_key(&key, "Ed25519"), len == 32);
        prop_assert_eq!(is_valid_key(&key, "Curve25519"), len == 32);
        prop_assert_eq!(is_valid_key(&key, "P384"), len == 97);
    }

    #[test]
    fn prop_dotted_counts_every_segment(
        segments in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..24), 1..6)
    ) {
        let joined = segments
            .iter()
            .map(|s| URL_SAFE_NO_PAD.encode(s))
            .collect::<Vec<_>>()
            .join(".");
        let check = check_dotted(&joined);
        prop_assert_eq!(check.parts, segments.len());
        prop_assert!(check.valid);
    }
}

// Hashes are fixed-length, URL-safe and deterministic.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_hash_shape(input in ".*") {
        let hashed = hash_and_encode(&input);
        prop_assert_eq!(hashed.len(), 43);
        prop_assert!(hashed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        prop_assert_eq!(&hashed, &hash_and_encode(&input));
        prop_assert_eq!(is_valid_base64_url(&hashed), Some(32));
    }
}

// Backoff delays never shrink and never exceed the cap.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_backoff_monotonic_and_capped(
        initial_ms in 1u64..1000,
        max_ms in 1000u64..60_000,
        multiplier in 1.0f64..4.0,
    ) {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .with_initial_delay(Duration::from_millis(initial_ms))
                .with_max_delay(Duration::from_millis(max_ms))
                .with_multiplier(multiplier)
                .without_jitter(),
        );

        let mut previous = Duration::ZERO;
        for attempt in 0..20 {
            let delay = policy.delay_for_attempt(attempt);
            prop_assert!(delay >= previous);
            prop_assert!(delay <= Duration::from_millis(max_ms));
            previous = delay;
        }
    }

    #[test]
    fn prop_retryable_errors_are_consistent(msg in "[a-zA-Z0-9 ]{1,50}") {
        prop_assert!(ServiceError::unavailable(msg.clone()).is_retryable());
        prop_assert!(ServiceError::Timeout(Duration::from_secs(1)).is_retryable());

        let non_retryable = vec![
            ServiceError::missing_env(msg.clone()),
            ServiceError::invalid_config(msg.clone()),
            ServiceError::Logging(msg.clone()),
            ServiceError::Internal(msg.clone()),
            ServiceError::ShuttingDown,
        ];
        for err in non_retryable {
            prop_assert!(!err.is_retryable(), "Error {:?} should not be retryable", err);
        }
    }
}

// Integer settings parse exactly what was written.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_env_int_parses(value in any::<i64>()) {
        let mut source = HashMap::new();
        source.insert("VALUE".to_string(), value.to_string());
        let env = EnvReader::new(source);

        prop_assert_eq!(env.require_int("VALUE").unwrap(), value);
        prop_assert_eq!(env.require_int_non_zero("VALUE").is_ok(), value != 0);
    }

    #[test]
    fn prop_env_list_drops_blanks(items in prop::collection::vec("[a-z]{0,6}", 0..8)) {
        let mut source = HashMap::new();
        source.insert("ITEMS".to_string(), items.join(" , "));
        let env = EnvReader::new(source);

        let expected: Vec<String> = items.into_iter().filter(|i| !i.is_empty()).collect();
        prop_assert_eq!(env.list("ITEMS"), expected);
    }
}
