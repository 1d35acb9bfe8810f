//! Content hashing helpers.
//!
//! Produces short, URL-safe identifiers from arbitrary input: BLAKE2b with a
//! 256-bit digest, encoded as unpadded base64url (always 43 characters).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use blake2::Blake2b;
use blake2::digest::Digest;
use blake2::digest::consts::U32;

type Blake2b256 = Blake2b<U32>;

/// Hash a string with BLAKE2b-256 and encode the digest as base64url.
///
/// # Examples
///
/// ```
/// use service_common::hashing::hash_and_encode;
///
/// let id = hash_and_encode("note-name");
/// assert_eq!(id.len(), 43);
/// assert_eq!(id, hash_and_encode("note-name"));
/// ```
#[must_use]
pub fn hash_and_encode(input: &str) -> String {
    hash_and_encode_bytes(input.as_bytes())
}

/// Hash raw bytes with BLAKE2b-256 and encode the digest as base64url.
#[must_use]
pub fn hash_and_encode_bytes(input: &[u8]) -> String {
    let digest = Blake2b256::digest(input);
    URL_SAFE_NO_PAD.encode(digest)
}
