//! BLAKE3 fingerprints for documents and individual entries.

use serde_json::Value;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash a JSON value through its compact serialization.
///
/// Key order is part of the hash: documents keep insertion order, so two
/// syntheses of the same stack hash identically.
pub fn hash_value(value: &Value) -> String {
    let mut hasher = blake3::Hasher::new();
    // Writing into a Hasher never fails.
    let _ = serde_json::to_writer(&mut hasher, value);
    format!("blake3:{}", hasher.finalize().to_hex())
}

/// Compute a composite hash from multiple component hashes.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}
