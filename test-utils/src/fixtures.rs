//! Test fixtures with sample data.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use service_common::{EnvReader, KeyType};

/// A sample base64url key of the right size for `key_type`.
#[must_use]
pub fn sample_key(key_type: KeyType) -> String {
    let bytes: Vec<u8> = (0..key_type.expected_len())
        .map(|i| u8::try_from(i % 251).unwrap_or_default())
        .collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A three part dotted token with base64url header, payload and signature.
#[must_use]
pub fn sample_dotted_token() -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"client-1","exp":1700000000}"#);
    let signature = URL_SAFE_NO_PAD.encode([9_u8; 64]);
    format!("{header}.{payload}.{signature}")
}

/// A timestamp `secs` seconds in the past.
#[must_use]
pub fn seconds_ago(secs: i64) -> DateTime<Utc> {
    Utc::now() - TimeDelta::seconds(secs)
}

/// A fully populated service environment.
#[must_use]
pub fn sample_service_env() -> HashMap<String, String> {
    [
        ("SERVICE_NAME", "notes"),
        ("LOG_LEVEL", "DEBUG"),
        ("LOG_OUTPUT", "/dev/null"),
        ("LOG_JSON", "true"),
        ("SHUTDOWN_TIMEOUT", "10"),
        ("READY_MAX_RETRIES", "3"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Reader over `pairs`, for configuration tests.
#[must_use]
pub fn env_reader(pairs: &[(&str, &str)]) -> EnvReader<HashMap<String, String>> {
    EnvReader::new(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    )
}
