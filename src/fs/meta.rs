use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a byte slice.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
