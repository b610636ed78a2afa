//! SHA-256 helpers shared by the block store and metadata layers.

use sha2::{Digest, Sha256};

/// Lowercase-hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Returns `true` if `sha256_hex(data) == expected` (case-insensitive).
pub fn verify_sha256(expected: &str, data: &[u8]) -> bool {
    sha256_hex(data).eq_ignore_ascii_case(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // sha256("") = e3b0c4...
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn verify_roundtrip() {
        let data = b"hello world";
        let h = sha256_hex(data);
        assert!(verify_sha256(&h, data));
        assert!(!verify_sha256(&h, b"hello worlD"));
    }
}
