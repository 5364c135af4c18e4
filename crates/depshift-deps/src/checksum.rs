//! Lockfile fingerprints

use sha2::{Digest, Sha256};

/// SHA-256 of `data`, hex encoded
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_fingerprint() {
        let checksum = fingerprint(b"hello world");
        assert_eq!(checksum.len(), 64);
        assert_eq!(
            checksum,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        assert_eq!(fingerprint(b"lockfile v1"), fingerprint(b"lockfile v1"));
        assert_ne!(fingerprint(b"lockfile v1"), fingerprint(b"lockfile v2"));
    }
}
