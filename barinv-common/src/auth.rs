//! Password hashing for the login request
//!
//! The backend expects the password pre-hashed client-side: hex-encoded
//! SHA-256 of the UTF-8 password bytes.

use sha2::{Digest, Sha256};

/// Hash a password the way the login endpoint expects it.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
