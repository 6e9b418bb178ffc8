//! SHA-256 over canonical JSON bytes, used to mint `RunId`s and any other
//! content-addressed identifier.

use crate::canonical_json::to_canonical_bytes;
use crate::IoError;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Lowercase 64-hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 of a value's canonical JSON representation.
pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String, IoError> {
    let bytes = to_canonical_bytes(value)?;
    Ok(sha256_hex(&bytes))
}
