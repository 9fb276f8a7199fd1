//! Content checksums.
//!
//! The catalog and every transaction-log entry carry a SHA-256 checksum of
//! their serialized content. The checksum is advisory: it detects accidental
//! corruption, it is not a cryptographic commitment.

use sha2::{Digest, Sha256};

/// Computes the lowercase hex SHA-256 digest of `data`.
#[must_use]
pub fn content_checksum(data: &[u8]) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable() {
        assert_eq!(content_checksum(b"hello"), content_checksum(b"hello"));
    }

    #[test]
    fn checksum_detects_change() {
        assert_ne!(content_checksum(b"hello"), content_checksum(b"hello!"));
    }

    #[test]
    fn checksum_is_hex_sha256() {
        let sum = content_checksum(b"");
        assert_eq!(sum.len(), 64);
        assert_eq!(
            sum,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
