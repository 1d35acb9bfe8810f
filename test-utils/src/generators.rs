//! Shared proptest generators.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use proptest::prelude::*;
use service_common::{KeyType, LogLevel};

/// Generate supported key types.
pub fn key_type_strategy() -> impl Strategy<Value = KeyType> {
    prop_oneof![
        Just(KeyType::Curve25519),
        Just(KeyType::Ed25519),
        Just(KeyType::P384),
    ]
}

/// Generate a correctly sized base64url key together with its type.
pub fn valid_key_strategy() -> impl Strategy<Value = (KeyType, String)> {
    key_type_strategy().prop_flat_map(|key_type| {
        prop::collection::vec(any::<u8>(), key_type.expected_len())
            .prop_map(move |bytes| (key_type, URL_SAFE_NO_PAD.encode(bytes)))
    })
}

/// Generate unpadded base64url strings of arbitrary payloads.
pub fn base64_url_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<u8>(), 0..128).prop_map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate dot separated base64url tokens with 1 to 5 segments.
pub fn dotted_token_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(base64_url_strategy(), 1..=5).prop_map(|parts| parts.join("."))
}

/// Generate strings containing at least one character outside the base64url
/// alphabet.
pub fn invalid_base64_url_strategy() -> impl Strategy<Value = String> {
    ("[A-Za-z0-9_-]{0,16}", "[+/=!@ .]", "[A-Za-z0-9_-]{0,16}")
        .prop_map(|(head, bad, tail)| format!("{head}{bad}{tail}"))
}

/// Generate every recognized log level name in mixed case.
pub fn log_level_name_strategy() -> impl Strategy<Value = (String, LogLevel)> {
    prop_oneof![
        Just(("OFF", LogLevel::Off)),
        Just(("SERVICE", LogLevel::Service)),
        Just(("CRITICAL", LogLevel::Critical)),
        Just(("ERROR", LogLevel::Error)),
        Just(("WARN", LogLevel::Warn)),
        Just(("INFO", LogLevel::Info)),
        Just(("DEBUG", LogLevel::Debug)),
    ]
    .prop_flat_map(|(name, level)| {
        prop::collection::vec(any::<bool>(), name.len()).prop_map(move |upper| {
            let mixed: String = name
                .chars()
                .zip(upper)
                .map(|(c, up)| if up { c } else { c.to_ascii_lowercase() })
                .collect();
            (mixed, level)
        })
    })
}

/// Generate short hook delays.
pub fn delay_strategy() -> impl Strategy<Value = Duration> {
    (0u64..5_000).prop_map(Duration::from_millis)
}
