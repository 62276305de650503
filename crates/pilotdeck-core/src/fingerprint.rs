//! Content fingerprints of fetched payloads.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::Result;

/// Computes the fingerprint of a payload.
///
/// The payload is serialized to JSON and hashed with SHA-256. Object keys are
/// serialized in sorted order, so logically equal payloads share a fingerprint.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized.
pub fn content_hash(payload: &Value) -> Result<String> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_payloads_share_fingerprint() {
        let a = json!({"balance": 1.5, "skills": [1, 2, 3]});
        let b = json!({"skills": [1, 2, 3], "balance": 1.5});
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_different_payloads_differ() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let hash = content_hash(&json!(null)).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
