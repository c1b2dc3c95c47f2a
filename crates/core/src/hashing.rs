//! Shared SHA-256 hex digest utility.
//!
//! Session markers are keyed by the digest of the bearer token rather than
//! the token itself, so a store dump never contains usable credentials.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}
