use serde::Serialize;
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the full digest when deriving a cache
/// key. Matches the on-disk filename stems.
const KEY_DIGEST_LEN: usize = 16;

/// Serialize a value to canonical JSON: object keys are emitted in
/// lexicographic order, so equal values always produce equal bytes.
///
/// The value is round-tripped through [`serde_json::Value`], whose map type
/// is key-ordered.
pub fn canonical_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&value)
}

/// The full SHA-256 checksum (64 hex characters) of a value's canonical JSON
/// form. Used to detect corrupted cache payloads.
pub fn checksum<T: Serialize>(value: &T) -> serde_json::Result<String> {
    Ok(hex_sha256(canonical_json(value)?.as_bytes()))
}

/// A short, stable cache-key digest (16 hex characters) of a value's
/// canonical JSON form.
///
/// The value returned by [`digest`] is stable across releases and platforms.
pub fn digest<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut full = hex_sha256(canonical_json(value)?.as_bytes());
    full.truncate(KEY_DIGEST_LEN);
    Ok(full)
}

/// [`digest`] for an already-built [`serde_json::Value`], which cannot fail
/// to serialize.
pub fn digest_value(value: &serde_json::Value) -> String {
    let canonical =
        serde_json::to_string(value).expect("serializing a JSON value cannot fail");
    let mut full = hex_sha256(canonical.as_bytes());
    full.truncate(KEY_DIGEST_LEN);
    full
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
