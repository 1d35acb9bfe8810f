//! Validation helpers for base64url encoded keys and tokens, and timestamp
//! freshness checks.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};

use crate::ServiceError;

/// Unpadded base64url that tolerates non-zero trailing bits.
const RAW_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// Supported public key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// X25519 key agreement key.
    Curve25519,
    /// Ed25519 signing key.
    Ed25519,
    /// Uncompressed P-384 point.
    P384,
}

impl KeyType {
    /// Decoded length in bytes of a key of this type.
    #[must_use]
    pub const fn expected_len(self) -> usize {
        match self {
            Self::Curve25519 | Self::Ed25519 => 32,
            Self::P384 => 97,
        }
    }
}

impl FromStr for KeyType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Curve25519" => Ok(Self::Curve25519),
            "Ed25519" => Ok(Self::Ed25519),
            "P384" => Ok(Self::P384),
            other => Err(ServiceError::invalid_config(format!("unknown key type {other:?}"))),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Curve25519 => "Curve25519",
            Self::Ed25519 => "Ed25519",
            Self::P384 => "P384",
        })
    }
}

/// Result of [`check_dotted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DottedCheck {
    /// Number of `.` separated segments.
    pub parts: usize,
    /// Whether every segment is valid base64url.
    pub valid: bool,
}

/// Decode `subject` as unpadded base64url, returning the decoded length.
///
/// Carriage returns and line feeds are skipped, so wrapped input validates.
///
/// # Examples
///
/// ```
/// use service_common::validation::is_valid_base64_url;
///
/// assert_eq!(is_valid_base64_url("aGVsbG8"), Some(5));
/// assert_eq!(is_valid_base64_url(""), Some(0));
/// assert_eq!(is_valid_base64_url("aGVsbG8="), None);
/// ```
#[must_use]
pub fn is_valid_base64_url(subject: &str) -> Option<usize> {
    let unwrapped = if subject.contains(['\r', '\n']) {
        Cow::Owned(subject.replace(['\r', '\n'], ""))
    } else {
        Cow::Borrowed(subject)
    };
    RAW_URL.decode(unwrapped.as_bytes()).ok().map(|bytes| bytes.len())
}

/// Check that `key` is base64url of exactly the size `key_type` requires.
///
/// Unknown key types are never valid.
#[must_use]
pub fn is_valid_key(key: &str, key_type: &str) -> bool {
    let Ok(key_type) = key_type.parse::<KeyType>() else {
        return false;
    };
    is_valid_base64_url(key) == Some(key_type.expected_len())
}

/// Split `subject` on `.` and check every segment is base64url.
#[must_use]
pub fn check_dotted(subject: &str) -> DottedCheck {
    let mut parts = 0;
    let mut valid = true;
    for part in subject.split('.') {
        parts += 1;
        valid = valid && is_valid_base64_url(part).is_some();
    }
    DottedCheck { parts, valid }
}

/// True when `t` is no more than `window_secs` seconds in the past.
///
/// Timestamps in the future are always within the window.
#[must_use]
pub fn is_time_within_window(t: DateTime<Utc>, window_secs: i64) -> bool {
    let window = TimeDelta::try_seconds(window_secs).unwrap_or(TimeDelta::MAX);
    Utc::now().signed_duration_since(t) <= window
}
